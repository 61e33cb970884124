use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::fs;

use crate::config::types::de_opt_duration;
use crate::session::identity::Identity;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_IDENTITY_PROVIDER: &str = "https://identity.ic0.app";
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// -----------------------------------------------------------------------------
// ----- ProviderConfig --------------------------------------------------------

/// Parameters for one interactive login.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub identity_provider: String,
    pub timeout: Duration,
    pub max_time_to_live: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            identity_provider: DEFAULT_IDENTITY_PROVIDER.to_string(),
            timeout: DEFAULT_LOGIN_TIMEOUT,
            max_time_to_live: None,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- IdentityProvider ------------------------------------------------------

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity persisted from an earlier run, if any.
    async fn restore(&self) -> Result<Option<Identity>, ProviderError> {
        Ok(None)
    }

    /// Run the challenge/response flow until the provider answers.
    async fn challenge(&self, config: &ProviderConfig) -> Result<Identity, ProviderError>;

    /// Best-effort revocation of a previously issued identity.
    async fn revoke(&self, _identity: &Identity) -> Result<(), ProviderError> {
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- AnonymousProvider -----------------------------------------------------

/// Provider for gateways that never log in.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousProvider;

#[async_trait]
impl IdentityProvider for AnonymousProvider {
    async fn challenge(&self, _config: &ProviderConfig) -> Result<Identity, ProviderError> {
        Err(ProviderError::Cancelled)
    }
}

// -----------------------------------------------------------------------------
// ----- KeyFileProvider -------------------------------------------------------

/// Non-interactive provider reading a principal and secret from a TOML file:
///
/// ```toml
/// principal = "w7x7r-cok77-xa"
/// secret = "..."
/// time_to_live = "8h"
/// ```
#[derive(Debug, Clone)]
pub struct KeyFileProvider {
    path: PathBuf,
}

impl KeyFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Identity, ProviderError> {
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ProviderError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        let file: KeyFile = toml::from_str(&raw).map_err(|e| ProviderError::KeyFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        if file.principal.trim().is_empty() || file.secret.is_empty() {
            return Err(ProviderError::KeyFile {
                path: self.path.clone(),
                reason: "principal and secret must be non-empty".to_string(),
            });
        }

        let identity = Identity::authenticated(
            file.principal,
            SecretString::new(file.secret.into_boxed_str()),
        );

        Ok(match file.time_to_live {
            Some(ttl) => identity.with_time_to_live(ttl),
            None => identity,
        })
    }
}

#[async_trait]
impl IdentityProvider for KeyFileProvider {
    async fn challenge(&self, config: &ProviderConfig) -> Result<Identity, ProviderError> {
        Ok(self.load().await?.capped_at(config.max_time_to_live))
    }
}

#[derive(Deserialize)]
struct KeyFile {
    principal: String,
    secret: String,

    #[serde(default, deserialize_with = "de_opt_duration")]
    time_to_live: Option<Duration>,
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("login was cancelled")]
    Cancelled,

    #[error("identity provider rejected the login: {0}")]
    Rejected(String),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid key file {path:?}: {reason}")]
    KeyFile { path: PathBuf, reason: String },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
