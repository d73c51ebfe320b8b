//! Configuration loader for registry-seeder
//!
//! Turns CLI/environment values and an optional YAML fixture file into a
//! validated [`SeedConfig`].

use super::config::*;
use crate::core::error::SeedError;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

lazy_static! {
    /// Environment variable reference (${VAR_NAME})
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Base URL of the registry under test
    pub registry_addr: String,

    /// Password for users without an explicit one
    pub default_password: String,

    /// Optional YAML fixture file replacing the built-in fixtures
    pub fixtures_path: Option<PathBuf>,

    /// Environment used for `token_env` lookups and `${VAR}` expansion
    pub env: HashMap<String, String>,

    pub http_timeout: Option<Duration>,
}

impl Default for ConfigLoadOptions {
    fn default() -> Self {
        Self {
            registry_addr: DEFAULT_REGISTRY_ADDR.to_string(),
            default_password: DEFAULT_PASSWORD.to_string(),
            fixtures_path: None,
            env: HashMap::new(),
            http_timeout: None,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate the seeding configuration
    pub async fn load(options: ConfigLoadOptions) -> Result<SeedConfig, SeedError> {
        let registry_url = Self::parse_registry_url(&options.registry_addr)?;

        let fixture_file = match &options.fixtures_path {
            Some(path) => Self::load_fixture_file(path).await?,
            None => FixtureFile::builtin(),
        };

        let fixtures = Self::build_fixture_set(fixture_file, &options)?;
        debug!(
            users = fixtures.users.len(),
            packages = fixtures.packages().len(),
            "fixtures loaded"
        );

        Ok(SeedConfig {
            registry_url,
            fixtures,
            http_timeout: options.http_timeout,
        })
    }

    /// Only http(s) registries are accepted
    pub fn parse_registry_url(addr: &str) -> Result<Url, SeedError> {
        let url = Url::parse(addr)
            .map_err(|e| SeedError::Config(format!("invalid registry address '{}': {}", addr, e)))?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(SeedError::Config(format!(
                "registry address '{}' must be an http(s) URL with a host",
                addr
            ))),
        }
    }

    /// Load a fixture file from YAML
    async fn load_fixture_file(path: &Path) -> Result<FixtureFile, SeedError> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            SeedError::Config(format!(
                "failed to read fixture file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            SeedError::Config(format!(
                "failed to parse fixture file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Resolve passwords and tokens, then check package ownership
    fn build_fixture_set(
        file: FixtureFile,
        options: &ConfigLoadOptions,
    ) -> Result<FixtureSet, SeedError> {
        let mut users = UserTable::new();

        for entry in file.users {
            let password = match entry.password {
                Some(ref password) => Self::expand_string(password, &options.env),
                None => options.default_password.clone(),
            };

            let token = match (&entry.token, &entry.token_env) {
                (Some(token), _) => Some(Self::expand_string(token, &options.env)),
                (None, Some(var)) => {
                    let value = options.env.get(var).cloned();
                    if value.is_none() {
                        debug!(user = %entry.name, var = %var, "token variable not set");
                    }
                    value
                }
                (None, None) => None,
            };

            users.insert(UserAccount::new(entry.name, &password, token.as_deref()))?;
        }

        FixtureSet::new(users, file.packages)
    }

    /// Expand `${VAR}` references from `env`; unknown variables are left as-is
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                warn!("Environment variable {} not found", var_name);
            }
        }

        result
    }
}
