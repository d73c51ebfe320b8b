//! Token resolution for fixture users
//!
//! A held token is reused when the registry still accepts it. Otherwise the
//! account is created, and if it already exists we log in instead.

use crate::core::config::UserTable;
use crate::core::error::SeedError;
use crate::core::traits::RegistryApi;
use crate::security::SecureTokenManager;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

/// Where a resolved token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// The held token was still valid
    Reused,
    /// A new account was created
    Created,
    /// The account existed; a login produced a fresh token
    LoggedIn,
}

/// Resolves tokens against a registry
pub struct TokenResolver<'a> {
    api: &'a dyn RegistryApi,
}

impl<'a> TokenResolver<'a> {
    pub fn new(api: &'a dyn RegistryApi) -> Self {
        Self { api }
    }

    /// Make sure `user` holds a token the registry accepts
    ///
    /// The resolved token is stored back into `users`; read it from there.
    pub async fn resolve(
        &self,
        users: &mut UserTable,
        user: &str,
    ) -> Result<TokenSource, SeedError> {
        let account = users
            .get_mut(user)
            .ok_or_else(|| SeedError::Config(format!("unknown user '{}'", user)))?;

        if let Some(token) = &account.token {
            if self.api.is_valid_token(token).await? {
                debug!(user, token = %SecureTokenManager::mask(token), "reusing valid token");
                return Ok(TokenSource::Reused);
            }
            debug!(user, "held token rejected by registry");
        }

        let (token, source) = match self.api.create_user(&account.name, &account.password).await? {
            Some(token) => (token, TokenSource::Created),
            None => {
                debug!(user, "user already registered, logging in");
                let token = self.api.login(&account.name, &account.password).await?;
                (token, TokenSource::LoggedIn)
            }
        };

        info!(user, token = %SecureTokenManager::mask(&token), ?source, "obtained token");
        account.token = Some(token);
        Ok(source)
    }
}

/// Copy of the token currently held for `user`
pub fn held_token(users: &UserTable, user: &str) -> Result<SecretString, SeedError> {
    users
        .get(user)
        .and_then(|u| u.token.as_ref())
        .map(|t| SecretString::from(t.expose_secret().to_string()))
        .ok_or_else(|| SeedError::Config(format!("no token held for user '{}'", user)))
}
