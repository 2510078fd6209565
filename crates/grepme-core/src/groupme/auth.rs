//! Access token resolution for the GroupMe API.
//!
//! The token is resolved once at startup and handed to
//! [`GroupMeClient`](crate::groupme::GroupMeClient) at construction. Sources,
//! highest priority first:
//! 1. An explicit value (`--token` or `GREPME_TOKEN`)
//! 2. `api.token` from the config file (or `GREPME__API__TOKEN`)
//! 3. The token file written by `grepme --save-token`

use std::fmt;
use std::path::Path;

use crate::CoreError;
use crate::groupme::storage::TokenStorage;

/// A GroupMe developer access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Parse a token, trimming surrounding whitespace. Blank input yields `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw token, for the `token` query parameter.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Resolves and persists the access token.
#[derive(Debug, Clone)]
pub struct AuthManager {
    storage: TokenStorage,
}

impl AuthManager {
    /// Page where users create an access token.
    pub const TOKEN_URL: &str = "https://dev.groupme.com/";

    /// Create an auth manager whose token file lives in `data_dir`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            storage: TokenStorage::new(data_dir),
        }
    }

    /// Underlying token storage.
    #[must_use]
    pub const fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    /// Pick the first available token from the explicit value, the configured
    /// value, and the token file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Auth`] if no source provides a token, or an I/O
    /// error if the token file cannot be read.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        configured: Option<&str>,
    ) -> Result<AccessToken, CoreError> {
        if let Some(token) = explicit.and_then(AccessToken::parse) {
            log::debug!("using access token from command line or environment");
            return Ok(token);
        }
        if let Some(token) = configured.and_then(AccessToken::parse) {
            log::debug!("using access token from configuration");
            return Ok(token);
        }
        if let Some(token) = self.storage.load_token()? {
            log::debug!("using access token from {}", self.storage.path().display());
            return Ok(token);
        }
        Err(CoreError::Auth(format!(
            "no access token found. Get one at {} and pass --token, set GREPME_TOKEN, \
             or run 'grepme --save-token <TOKEN>'",
            Self::TOKEN_URL
        )))
    }

    /// Persist a token for later runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank or cannot be written.
    pub fn save(&self, raw: &str) -> Result<AccessToken, CoreError> {
        let token = AccessToken::parse(raw)
            .ok_or_else(|| CoreError::Auth("refusing to store an empty token".to_string()))?;
        self.storage.store_token(&token)?;
        Ok(token)
    }

    /// Remove the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be removed.
    pub fn forget(&self) -> Result<(), CoreError> {
        self.storage.clear_token()
    }
}
