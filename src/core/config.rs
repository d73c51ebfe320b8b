//! Fixture and runtime configuration types
//!
//! The user table is owned by whoever drives the run and handed around by
//! reference; nothing here is global.

use crate::core::error::SeedError;
use reqwest::Url;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Registry used when `NPM_REGISTRY_ADDR` is unset
pub const DEFAULT_REGISTRY_ADDR: &str = "http://registry:4873";

/// Password used for every fixture user without an explicit one
pub const DEFAULT_PASSWORD: &str = "fake-password";

/// Placeholder token; the registry rejects it and the user gets re-authenticated
pub const INVALID_TOKEN: &str = "invalid-token";

/// How long to wait for the registry container before the first request
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(6);

/// Fixture file as written on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureFile {
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub packages: Vec<FixturePackage>,
}

impl FixtureFile {
    /// Two users, each owning one fixture package
    pub fn builtin() -> Self {
        Self {
            users: vec![
                UserEntry::from_env("user-1", "USER_1_NPM_TOKEN"),
                UserEntry::from_env("user-2", "USER_2_NPM_TOKEN"),
            ],
            packages: vec![
                FixturePackage::new("registry-test1", "user-1"),
                FixturePackage::new("registry-test2", "user-2"),
            ],
        }
    }
}

/// One user in a fixture file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Literal token, takes precedence over `token_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Environment variable holding the user's token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

impl UserEntry {
    fn from_env(name: &str, token_env: &str) -> Self {
        Self {
            name: name.to_string(),
            password: None,
            token: None,
            token_env: Some(token_env.to_string()),
        }
    }
}

/// A fixture package and the user who owns it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixturePackage {
    pub name: String,
    pub owner: String,
}

impl FixturePackage {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// A registry user and the credentials held for it
#[derive(Debug)]
pub struct UserAccount {
    pub name: String,
    pub password: SecretString,
    /// Absent until the registry hands one out (or one is configured)
    pub token: Option<SecretString>,
}

impl UserAccount {
    pub fn new(name: impl Into<String>, password: &str, token: Option<&str>) -> Self {
        Self {
            name: name.into(),
            password: SecretString::from(password.to_string()),
            token: token.map(|t| SecretString::from(t.to_string())),
        }
    }
}

/// Users in configuration order
#[derive(Debug, Default)]
pub struct UserTable {
    users: Vec<UserAccount>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user; names must be unique and non-empty
    pub fn insert(&mut self, user: UserAccount) -> Result<(), SeedError> {
        if user.name.trim().is_empty() {
            return Err(SeedError::Config("user name must not be empty".to_string()));
        }
        if self.contains(&user.name) {
            return Err(SeedError::Config(format!(
                "user '{}' is configured more than once",
                user.name
            )));
        }
        self.users.push(user);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut UserAccount> {
        self.users.iter_mut().find(|u| u.name == name)
    }

    /// Names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.users.iter().map(|u| u.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Users plus the packages they own, with ownership checked up front
#[derive(Debug)]
pub struct FixtureSet {
    pub users: UserTable,
    packages: Vec<FixturePackage>,
}

impl FixtureSet {
    /// Build a fixture set, rejecting packages whose owner is not a configured user
    pub fn new(users: UserTable, packages: Vec<FixturePackage>) -> Result<Self, SeedError> {
        if users.is_empty() {
            return Err(SeedError::Config("no fixture users configured".to_string()));
        }

        let mut seen = HashSet::new();
        for package in &packages {
            if package.name.trim().is_empty() {
                return Err(SeedError::Config("package name must not be empty".to_string()));
            }
            if !seen.insert(package.name.as_str()) {
                return Err(SeedError::Config(format!(
                    "package '{}' is configured more than once",
                    package.name
                )));
            }
            if !users.contains(&package.owner) {
                return Err(SeedError::Config(format!(
                    "package '{}' is owned by unknown user '{}'",
                    package.name, package.owner
                )));
            }
        }

        Ok(Self { users, packages })
    }

    pub fn packages(&self) -> &[FixturePackage] {
        &self.packages
    }

    /// Packages owned by `owner`, in configuration order
    pub fn packages_owned_by(&self, owner: &str) -> Vec<String> {
        self.packages
            .iter()
            .filter(|p| p.owner == owner)
            .map(|p| p.name.clone())
            .collect()
    }
}

/// Everything the run sequence needs from configuration
#[derive(Debug)]
pub struct SeedConfig {
    pub registry_url: Url,
    pub fixtures: FixtureSet,
    pub http_timeout: Option<Duration>,
}
