//! SafeCommandExecutor: allow-listed subprocess execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved programs can execute
//! - **Injection prevention**: Arguments are passed as a vector, never through a shell
//! - **Secret environment**: Tokens are injected as environment variables, not arguments
//! - **Timeout control**: Optionally kills processes that hang
//!
//! # Example
//!
//! ```rust,no_run
//! use registry_seeder::SafeCommandExecutor;
//!
//! # async fn demo() -> Result<(), registry_seeder::CommandError> {
//! let executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! let output = executor.execute("npm", &["--version"], &[]).await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Programs the executor runs by default
const ALLOWED_COMMANDS: &[&str] = &["npm"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Fully drained output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Environment variable passed to a child process
pub struct SecretEnv<'a> {
    pub name: &'a str,
    pub value: &'a SecretString,
}

/// Safe command executor with security controls
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Optional timeout for command execution
    timeout: Option<Duration>,
    allowed: Vec<String>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
            allowed: ALLOWED_COMMANDS.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// Set command execution timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Allow an additional program name
    pub fn allow(mut self, command: &str) -> Self {
        self.allowed.push(command.to_string());
        self
    }

    /// Whether `program` (a bare name or a path) resolves to an allowed name
    pub fn is_allowed(&self, program: &str) -> bool {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);

        #[cfg(target_os = "windows")]
        let name = name.strip_suffix(".cmd").unwrap_or(name);

        self.allowed.iter().any(|a| a == name)
    }

    /// Run `program` to completion, draining stdout and stderr.
    ///
    /// The child inherits the current environment with `envs` layered on top.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Program not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - Timeout elapsed; the child is killed
    pub async fn execute(
        &self,
        program: &str,
        args: &[&str],
        envs: &[SecretEnv<'_>],
    ) -> Result<CommandOutput, CommandError> {
        if !self.is_allowed(program) {
            return Err(CommandError::CommandNotAllowed(program.to_string()));
        }

        // npm is a .cmd shim on Windows, not an .exe
        #[cfg(target_os = "windows")]
        let program_name = if matches!(program, "npm" | "yarn" | "pnpm") {
            format!("{}.cmd", program)
        } else {
            program.to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let program_name = program.to_string();

        let mut command = Command::new(&program_name);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for env in envs {
            command.env(env.name, env.value.expose_secret());
        }

        debug!(program = %program_name, ?args, "spawning command");

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| CommandError::Timeout(timeout))?,
            None => command.output().await,
        }
        .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", program_name, e)))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
