//! Error handling for registry seeding
//!
//! Every failure aborts the whole run, so the error type mostly exists to
//! carry enough context for a useful log line and a non-zero exit.

use crate::security::command_executor::CommandError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for seeding operations
#[derive(Error, Debug)]
pub enum SeedError {
    /// Registry answered with a non-2xx status
    #[error("[{operation}] request failed with HTTP {status}: {body}")]
    Request {
        operation: &'static str,
        status: u16,
        body: serde_json::Value,
    },

    /// Registry could not be reached at all
    #[error("[{operation}] could not reach registry: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Response body was not the JSON we expected
    #[error("[{operation}] invalid registry response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },

    /// npm wrote something to stderr that is not benign
    #[error("[{package}] npm {action} failed: {stderr}")]
    Command {
        action: &'static str,
        package: String,
        stderr: String,
    },

    /// npm exited non-zero while strict exit code checking is enabled
    #[error("[{package}] npm {action} exited with status {code:?}")]
    CommandExit {
        action: &'static str,
        package: String,
        code: Option<i32>,
    },

    #[error(transparent)]
    CommandLaunch(#[from] CommandError),

    #[error("credential file {}: {source}", path.display())]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl SeedError {
    /// Stable identifier used in log lines
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request { .. } => "REQUEST_FAILED",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Command { .. } => "COMMAND_FAILED",
            Self::CommandExit { .. } => "COMMAND_EXIT_STATUS",
            Self::CommandLaunch(_) => "COMMAND_LAUNCH_FAILED",
            Self::CredentialFile { .. } => "CREDENTIAL_FILE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Request { status: 401, .. } | Self::Request { status: 403, .. } => vec![
                "Check NPM_DEFAULT_PASSWORD matches the password the user was created with",
                "Reset the registry storage if the test users were created elsewhere",
            ],
            Self::Request { .. } => vec!["Check the registry logs for the rejected request"],
            Self::Transport { .. } => vec![
                "Check NPM_REGISTRY_ADDR points at a running registry",
                "Increase STARTUP_DELAY_SECS if the registry starts slowly",
            ],
            Self::InvalidResponse { .. } => {
                vec!["Make sure NPM_REGISTRY_ADDR points at an npm-compatible registry"]
            }
            Self::Command { .. } | Self::CommandExit { .. } => vec![
                "Inspect the npm output above",
                "Check that the installed .npmrc reads the token from ${NPM_TOKEN}",
            ],
            Self::CommandLaunch(_) => {
                vec!["Make sure npm is installed and on PATH (or set NPM_BIN)"]
            }
            Self::CredentialFile { .. } => vec![
                "Check that .npmrc exists next to the working directory (or set NPMRC_SOURCE)",
                "Check the home directory of the executing account is writable",
            ],
            Self::Config(_) => vec!["Check the fixture file and environment variables"],
            Self::InvalidTransition { .. } => vec![],
        }
    }
}
