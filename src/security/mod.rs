pub mod command_executor;
pub mod npmrc;
pub mod token_manager;

pub use command_executor::{CommandError, CommandOutput, SafeCommandExecutor, SecretEnv};
pub use npmrc::{NpmrcInstaller, current_account, effective_account, npmrc_destination};
pub use token_manager::SecureTokenManager;
