//! NPM Plugin - publish and unpublish fixture packages through the npm CLI
//!
//! npm reports most problems on stderr, and the registry under test is the
//! only thing we talk to, so success is judged from the error stream:
//! - `unpublish`: `code E404` means the package was never published
//! - `publish`: notice/info chatter is dropped before judging

use crate::core::error::SeedError;
use crate::core::traits::{PackageOperations, UnpublishOutcome};
use crate::security::{CommandOutput, SafeCommandExecutor, SecretEnv, SecureTokenManager};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Environment variable the installed `.npmrc` reads the token from
pub const TOKEN_ENV: &str = "NPM_TOKEN";

lazy_static! {
    static ref NOT_FOUND_PATTERN: Regex = Regex::new(r"code E404").unwrap();
    static ref PUBLISH_NOISE_PATTERN: Regex =
        Regex::new(r"^\s*(npm (notice|info|http|timing)\b|.*\bnotice\b|.*Tarball)").unwrap();
}

/// Decide an unpublish result from npm's error stream
pub fn unpublish_outcome(stderr: &str) -> Option<UnpublishOutcome> {
    if NOT_FOUND_PATTERN.is_match(stderr) {
        return Some(UnpublishOutcome::NotFound);
    }
    if stderr.trim().is_empty() {
        return Some(UnpublishOutcome::Removed);
    }
    None
}

/// Error-stream lines left after dropping publish noise, or `None` if nothing is left
pub fn publish_errors(stderr: &str) -> Option<String> {
    let remaining: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !PUBLISH_NOISE_PATTERN.is_match(line))
        .collect();

    if remaining.is_empty() {
        None
    } else {
        Some(remaining.join("\n"))
    }
}

/// npm CLI runner for fixture packages
pub struct NpmCli {
    executor: SafeCommandExecutor,
    npm_bin: String,
    package_dir: PathBuf,
    strict_exit_code: bool,
    tokens: Mutex<SecureTokenManager>,
}

impl NpmCli {
    /// `package_dir` holds one directory per fixture package, named after it
    pub fn new(
        executor: SafeCommandExecutor,
        npm_bin: impl Into<String>,
        package_dir: PathBuf,
    ) -> Self {
        Self {
            executor,
            npm_bin: npm_bin.into(),
            package_dir,
            strict_exit_code: false,
            tokens: Mutex::new(SecureTokenManager::new()),
        }
    }

    /// Treat a non-zero exit as failure even when stderr is clean
    pub fn with_strict_exit_code(mut self, strict: bool) -> Self {
        self.strict_exit_code = strict;
        self
    }

    /// Directory passed to `npm publish` for `package`
    pub fn package_path(&self, package: &str) -> PathBuf {
        self.package_dir.join(package)
    }

    async fn run(
        &self,
        token: &SecretString,
        args: &[&str],
    ) -> Result<CommandOutput, SeedError> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(token);

        let envs = [SecretEnv {
            name: TOKEN_ENV,
            value: token,
        }];
        let output = self.executor.execute(&self.npm_bin, args, &envs).await?;

        if !output.stdout.trim().is_empty() {
            debug!(stdout = %self.mask(&output.stdout), "npm output");
        }
        Ok(output)
    }

    fn mask(&self, text: &str) -> String {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mask_tokens_in_string(text)
    }

    /// Exit status check applied once stderr has been judged clean
    fn check_exit(
        &self,
        action: &'static str,
        package: &str,
        output: &CommandOutput,
    ) -> Result<(), SeedError> {
        if output.success() {
            return Ok(());
        }
        if self.strict_exit_code {
            return Err(SeedError::CommandExit {
                action,
                package: package.to_string(),
                code: output.code,
            });
        }
        warn!(
            package,
            code = ?output.code,
            "npm {} exited non-zero with a clean error stream",
            action
        );
        Ok(())
    }
}

#[async_trait]
impl PackageOperations for NpmCli {
    async fn unpublish(
        &self,
        token: &SecretString,
        package: &str,
    ) -> Result<UnpublishOutcome, SeedError> {
        let output = self
            .run(token, &["unpublish", "--silent", package, "-f"])
            .await?;

        match unpublish_outcome(&output.stderr) {
            Some(UnpublishOutcome::NotFound) => {
                info!(package, "package was not published");
                Ok(UnpublishOutcome::NotFound)
            }
            Some(outcome) => {
                self.check_exit("unpublish", package, &output)?;
                info!(package, "package unpublished");
                Ok(outcome)
            }
            None => Err(SeedError::Command {
                action: "unpublish",
                package: package.to_string(),
                stderr: self.mask(&output.stderr),
            }),
        }
    }

    async fn publish(&self, token: &SecretString, package: &str) -> Result<(), SeedError> {
        let path = self.package_path(package).to_string_lossy().into_owned();
        let output = self
            .run(token, &["publish", "--info", path.as_str()])
            .await?;

        if let Some(errors) = publish_errors(&output.stderr) {
            return Err(SeedError::Command {
                action: "publish",
                package: package.to_string(),
                stderr: self.mask(&errors),
            });
        }

        self.check_exit("publish", package, &output)?;
        info!(package, "package published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublish_clean_stderr() {
        assert_eq!(unpublish_outcome(""), Some(UnpublishOutcome::Removed));
        assert_eq!(unpublish_outcome("  \n"), Some(UnpublishOutcome::Removed));
    }

    #[test]
    fn test_unpublish_not_found() {
        let stderr = "npm ERR! code E404\nnpm ERR! 404 Not Found - DELETE http://registry:4873/registry-test1/-rev/undefined\n";
        assert_eq!(unpublish_outcome(stderr), Some(UnpublishOutcome::NotFound));
    }

    #[test]
    fn test_unpublish_other_error() {
        let stderr = "npm ERR! code E403\nnpm ERR! 403 Forbidden\n";
        assert_eq!(unpublish_outcome(stderr), None);
    }

    #[test]
    fn test_publish_ignores_notice_lines() {
        let stderr = "npm notice \nnpm notice 📦  registry-test1@1.0.0\nnpm notice === Tarball Contents ===\nnpm notice 120B package.json\nnpm notice === Tarball Details ===\nnpm info publish registry-test1\nnpm http fetch PUT 201 http://registry:4873/registry-test1 52ms\n";
        assert_eq!(publish_errors(stderr), None);
    }

    #[test]
    fn test_publish_reports_remaining_lines() {
        let stderr = "npm notice 📦  registry-test1@1.0.0\nnpm ERR! code E409\nnpm ERR! 409 Conflict - this package is already present\n";
        assert_eq!(
            publish_errors(stderr).unwrap(),
            "npm ERR! code E409\nnpm ERR! 409 Conflict - this package is already present"
        );
    }

    #[test]
    fn test_publish_empty_stderr() {
        assert_eq!(publish_errors(""), None);
    }

    #[test]
    fn test_package_path() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let npm = NpmCli::new(executor, "npm", PathBuf::from("/app/package"));
        assert_eq!(
            npm.package_path("registry-test1"),
            PathBuf::from("/app/package/registry-test1")
        );
    }

    #[test]
    fn test_check_exit_lenient_and_strict() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        };

        let lenient = NpmCli::new(
            SafeCommandExecutor::new(std::env::temp_dir()).unwrap(),
            "npm",
            PathBuf::from("package"),
        );
        assert!(lenient.check_exit("publish", "pkg", &output).is_ok());

        let strict = NpmCli::new(
            SafeCommandExecutor::new(std::env::temp_dir()).unwrap(),
            "npm",
            PathBuf::from("package"),
        )
        .with_strict_exit_code(true);
        let err = strict.check_exit("publish", "pkg", &output).unwrap_err();
        assert!(matches!(err, SeedError::CommandExit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_disallowed_npm_bin() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let npm = NpmCli::new(executor, "/usr/bin/yarn", PathBuf::from("package"));
        let token = SecretString::from("token".to_string());

        let err = npm.publish(&token, "registry-test1").await.unwrap_err();
        assert!(matches!(err, SeedError::CommandLaunch(_)));
    }

    #[cfg(unix)]
    mod fake_npm {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        const TOKEN: &str = "npm_abcdef123456";

        /// Writes an `npm` script that logs its args and token next to itself
        fn npm_script(dir: &TempDir, body: &str) -> String {
            let path = dir.path().join("npm");
            let script = format!(
                "#!/bin/sh\n\
                 echo \"$@\" >> \"$(dirname \"$0\")/args.log\"\n\
                 echo \"$NPM_TOKEN\" > \"$(dirname \"$0\")/token.log\"\n\
                 {}\n",
                body
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn npm_cli(dir: &TempDir, body: &str) -> NpmCli {
            let executor = SafeCommandExecutor::new(dir.path()).unwrap();
            NpmCli::new(executor, npm_script(dir, body), PathBuf::from("package"))
        }

        fn read_log(dir: &TempDir, name: &str) -> String {
            std::fs::read_to_string(dir.path().join(name)).unwrap()
        }

        fn token() -> SecretString {
            SecretString::from(TOKEN.to_string())
        }

        #[tokio::test]
        async fn test_unpublish_not_found_passes_token_in_env() {
            let dir = TempDir::new().unwrap();
            let npm = npm_cli(&dir, "echo 'npm ERR! code E404' >&2; exit 1");

            let outcome = npm.unpublish(&token(), "registry-test1").await.unwrap();

            assert_eq!(outcome, UnpublishOutcome::NotFound);
            assert_eq!(
                read_log(&dir, "args.log"),
                "unpublish --silent registry-test1 -f\n"
            );
            assert_eq!(read_log(&dir, "token.log"), format!("{}\n", TOKEN));
        }

        #[tokio::test]
        async fn test_unpublish_clean_stream_removes() {
            let dir = TempDir::new().unwrap();
            let npm = npm_cli(&dir, "exit 0");

            let outcome = npm.unpublish(&token(), "registry-test1").await.unwrap();
            assert_eq!(outcome, UnpublishOutcome::Removed);
        }

        #[tokio::test]
        async fn test_publish_arguments_and_notice_output() {
            let dir = TempDir::new().unwrap();
            let npm = npm_cli(
                &dir,
                "echo 'npm notice === Tarball Contents ===' >&2\n\
                 echo 'npm http fetch PUT 201 http://registry:4873/registry-test1' >&2",
            );

            npm.publish(&token(), "registry-test1").await.unwrap();

            assert_eq!(
                read_log(&dir, "args.log"),
                "publish --info package/registry-test1\n"
            );
        }

        #[tokio::test]
        async fn test_publish_error_is_masked() {
            let dir = TempDir::new().unwrap();
            let npm = npm_cli(
                &dir,
                "echo \"npm ERR! 403 token $NPM_TOKEN rejected\" >&2; exit 1",
            );

            let err = npm.publish(&token(), "registry-test1").await.unwrap_err();

            match err {
                SeedError::Command {
                    action,
                    package,
                    stderr,
                } => {
                    assert_eq!(action, "publish");
                    assert_eq!(package, "registry-test1");
                    assert_eq!(stderr, "npm ERR! 403 token npm...456 rejected");
                }
                other => panic!("unexpected error: {}", other),
            }
        }

        #[tokio::test]
        async fn test_masking_survives_poisoned_lock() {
            let dir = TempDir::new().unwrap();
            let npm = npm_cli(&dir, "echo \"npm ERR! bad $NPM_TOKEN\" >&2; exit 1");

            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let _guard = npm.tokens.lock().unwrap();
                panic!("poison");
            }));
            assert!(npm.tokens.is_poisoned());

            let err = npm.publish(&token(), "registry-test1").await.unwrap_err();
            let message = err.to_string();
            assert!(!message.contains(TOKEN));
            assert!(message.contains("npm...456"));
        }

        #[tokio::test]
        async fn test_exit_code_with_clean_stream() {
            let dir = TempDir::new().unwrap();

            let lenient = npm_cli(&dir, "exit 2");
            let outcome = lenient.unpublish(&token(), "registry-test1").await.unwrap();
            assert_eq!(outcome, UnpublishOutcome::Removed);

            let strict = npm_cli(&dir, "exit 2").with_strict_exit_code(true);
            let err = strict.publish(&token(), "registry-test1").await.unwrap_err();
            assert!(matches!(
                err,
                SeedError::CommandExit {
                    action: "publish",
                    code: Some(2),
                    ..
                }
            ));
        }
    }
}
