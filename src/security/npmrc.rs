//! Installs the registry credentials file for the executing account
//!
//! npm only reads `~/.npmrc` from the invoking user's home, so the project's
//! `.npmrc` is copied there before any npm command runs.

use crate::core::error::SeedError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Name of the npm user config file
pub const NPMRC_FILENAME: &str = ".npmrc";

/// Home-directory `.npmrc` path for `account`
pub fn npmrc_destination(account: &str) -> PathBuf {
    if account == "root" {
        PathBuf::from("/root").join(NPMRC_FILENAME)
    } else {
        PathBuf::from("/home").join(account).join(NPMRC_FILENAME)
    }
}

/// Account name from the password database entry, then `USER`, then `LOGNAME`
pub fn account_name(
    effective: Option<String>,
    user: Option<String>,
    logname: Option<String>,
) -> Result<String, SeedError> {
    effective
        .into_iter()
        .chain(user)
        .chain(logname)
        .find(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            SeedError::Config(
                "cannot determine executing account (no passwd entry, USER/LOGNAME unset)"
                    .to_string(),
            )
        })
}

/// Name of the account running this process
pub fn current_account() -> Result<String, SeedError> {
    account_name(
        effective_account(),
        std::env::var("USER").ok(),
        std::env::var("LOGNAME").ok(),
    )
}

/// Login name of the effective uid, looked up in the password database
#[cfg(unix)]
pub fn effective_account() -> Option<String> {
    use std::ffi::CStr;
    use std::mem::MaybeUninit;

    let uid = unsafe { libc::geteuid() };
    let mut buf: Vec<libc::c_char> = vec![0; 1024];

    loop {
        let mut entry = MaybeUninit::<libc::passwd>::uninit();
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        // SAFETY: every pointer refers to live storage owned by this frame, and
        // `buf.len()` is the real capacity of `buf`.
        let rc = unsafe {
            libc::getpwuid_r(
                uid,
                entry.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };

        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }

        // SAFETY: on success `result` points at `entry`, whose strings live in `buf`.
        let name = unsafe { CStr::from_ptr((*result).pw_name) };
        return name.to_str().ok().map(str::to_string);
    }
}

#[cfg(not(unix))]
pub fn effective_account() -> Option<String> {
    None
}

/// Copies a credentials file to its destination
#[derive(Debug, Clone)]
pub struct NpmrcInstaller {
    source: PathBuf,
    destination: PathBuf,
}

impl NpmrcInstaller {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Installer targeting the home directory of `account`
    pub fn for_account(source: impl Into<PathBuf>, account: &str) -> Self {
        Self::new(source, npmrc_destination(account))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Copy the file content, returning the number of bytes written
    pub async fn install(&self) -> Result<usize, SeedError> {
        let content = fs::read_to_string(&self.source)
            .await
            .map_err(|source| SeedError::CredentialFile {
                path: self.source.clone(),
                source,
            })?;

        fs::write(&self.destination, content.as_bytes())
            .await
            .map_err(|source| SeedError::CredentialFile {
                path: self.destination.clone(),
                source,
            })?;

        info!(
            from = %self.source.display(),
            to = %self.destination.display(),
            "installed registry credentials"
        );
        Ok(content.len())
    }
}
