//! Token masking for log output
//!
//! Tokens are held as `secrecy::SecretString`; this module decides what
//! little of them may appear in logs and error messages.

use secrecy::{ExposeSecret, SecretString};

/// Masks tokens before they reach a log line
///
/// # Examples
///
/// ```
/// use registry_seeder::security::SecureTokenManager;
/// use secrecy::SecretString;
///
/// let mut manager = SecureTokenManager::new();
/// manager.register(&SecretString::from("abcdef123456".to_string()));
/// assert_eq!(manager.mask_tokens_in_string("token=abcdef123456"), "token=abc...456");
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    known: Vec<SecretString>,
}

impl SecureTokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a token so it can be scrubbed from subprocess output
    pub fn register(&mut self, token: &SecretString) {
        let value = token.expose_secret();
        if value.is_empty() || self.known.iter().any(|t| t.expose_secret() == value) {
            return;
        }
        self.known.push(SecretString::from(value.to_string()));
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_seeder::security::SecureTokenManager;
    ///
    /// assert_eq!(SecureTokenManager::mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(SecureTokenManager::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masked form of a held secret
    pub fn mask(token: &SecretString) -> String {
        Self::mask_token(token.expose_secret())
    }

    /// Replace every registered token in `text` with its masked form
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for token in &self.known {
            let value = token.expose_secret();
            masked = masked.replace(value, &Self::mask_token(value));
        }

        masked
    }
}
