//! Credential Providers
//!
//! Supplies the bearer token attached to every chat request. Issuing and
//! refreshing tokens happens elsewhere; a provider only reports what it has.

use std::path::{Path, PathBuf};

/// Environment variable read by [`EnvCredentials`]
pub const TOKEN_ENV_VAR: &str = "STREAMCHAT_TOKEN";

/// Source of the bearer token
///
/// `None` means unauthenticated: the exchange fails without any network
/// activity.
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, if any
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none)
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    /// Provider that always returns `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider with no token
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self { token: None }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Token read from `STREAMCHAT_TOKEN` at request time
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Token stored in a file, re-read on every request
///
/// A login flow can rewrite the file while the client runs; the next
/// exchange picks the new token up.
#[derive(Clone, Debug)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    /// Provider reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Provider reading the default token file, if a config dir exists
    #[must_use]
    pub fn default_location() -> Option<Self> {
        default_token_path().map(Self::new)
    }

    /// The file this provider reads
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for TokenFile {
    fn bearer_token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) => {
                tracing::debug!(path = ?self.path, error = %e, "No token file");
                None
            }
        }
    }
}

/// `$XDG_CONFIG_HOME/streamchat/token` (platform equivalent elsewhere)
#[must_use]
pub fn default_token_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("streamchat").join("token"))
}
