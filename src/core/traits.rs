//! Seams between the run sequence and the outside world
//!
//! The HTTP registry and the npm CLI both sit behind a trait so the run
//! sequence can be exercised with in-memory doubles.

use crate::core::error::SeedError;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Result of an unpublish attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpublishOutcome {
    /// The package existed and was removed
    Removed,
    /// The registry had never seen the package
    NotFound,
}

/// Account endpoints of an npm-compatible registry
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Create an account and return its token
    ///
    /// Returns `Ok(None)` when the registry reports the name as already
    /// registered.
    async fn create_user(
        &self,
        name: &str,
        password: &SecretString,
    ) -> Result<Option<SecretString>, SeedError>;

    /// Log in with basic auth and obtain a fresh token
    async fn login(&self, name: &str, password: &SecretString) -> Result<SecretString, SeedError>;

    /// Whether the registry accepts `token` for the current-user endpoint
    async fn is_valid_token(&self, token: &SecretString) -> Result<bool, SeedError>;
}

/// Publish and unpublish fixture packages on behalf of a user
#[async_trait]
pub trait PackageOperations: Send + Sync {
    /// Force-unpublish `package`; a package that was never published is not an error
    async fn unpublish(
        &self,
        token: &SecretString,
        package: &str,
    ) -> Result<UnpublishOutcome, SeedError>;

    /// Publish the fixture package directory named `package`
    async fn publish(&self, token: &SecretString, package: &str) -> Result<(), SeedError>;
}
