pub mod core;
pub mod orchestration;
pub mod plugins;
pub mod registry;
pub mod security;

pub use self::core::*;
pub use orchestration::{PackageAction, PackageOutcome, RegistrySeeder, RunReport, SeedOptions};
pub use plugins::NpmCli;
pub use registry::{RegistryClient, TokenResolver, TokenSource};
pub use security::{
    CommandError, CommandOutput, NpmrcInstaller, SafeCommandExecutor, SecretEnv,
    SecureTokenManager,
};
