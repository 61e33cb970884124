use serde::Deserialize;
use std::{collections::HashMap, path::Path, time::Duration};
use thiserror::Error;
use tokio::fs;

use super::types::{de_duration, de_opt_duration};
use crate::gateway::{
    CANISTER_UNAVAILABLE_CODE, DEFAULT_SWEEP_EVERY, GatewayOptions, LedgerCanisters,
};
use crate::rate_limit::RateLimit;
use crate::retry::{PolicyError, RetryPolicy};
use crate::session::ProviderConfig;
use crate::session::provider::{DEFAULT_IDENTITY_PROVIDER, DEFAULT_LOGIN_TIMEOUT};

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub replica: ReplicaConfig,
    pub canisters: LedgerCanisters,
    pub auth: AuthConfig,
    pub retry: RetryPolicy,
    pub transient_codes: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReplicaConfig {
    pub host: String,
    pub port: u16,

    #[serde(default = "default_connect_timeout", deserialize_with = "de_duration")]
    pub connect_timeout: Duration,

    #[serde(default = "default_call_timeout", deserialize_with = "de_duration")]
    pub call_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub require_authentication: bool,
    pub identity_provider: String,
    pub login_timeout: Duration,
    pub max_time_to_live: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// `None` when `enabled = false`.
    pub default: Option<RateLimit>,
    pub operations: HashMap<String, RateLimit>,
    pub sweep_every: u64,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    pub async fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Config, ConfigError> {
        let doc: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;

        let retry = RetryPolicy::new(
            doc.retry.max_attempts,
            doc.retry.base_delay,
            doc.retry.backoff_multiplier,
        )?;

        let default = limit_from("rate_limit", doc.rate_limit.window, doc.rate_limit.max_requests)?;

        let mut operations = HashMap::with_capacity(doc.rate_limit.operations.len());
        for (name, entry) in doc.rate_limit.operations {
            let section = format!("rate_limit.operations.{name}");
            let limit = limit_from(
                &section,
                entry.window.unwrap_or(default.window),
                entry.max_requests.unwrap_or(default.max_requests),
            )?;
            operations.insert(name, limit);
        }

        Ok(Config {
            replica: doc.replica,
            canisters: doc.canisters,
            auth: AuthConfig {
                require_authentication: doc.auth.require_authentication,
                identity_provider: doc.auth.identity_provider,
                login_timeout: doc.auth.login_timeout,
                max_time_to_live: doc.auth.max_time_to_live,
            },
            retry,
            transient_codes: doc.retry.transient_codes,
            rate_limit: RateLimitConfig {
                default: doc.rate_limit.enabled.then_some(default),
                operations,
                sweep_every: doc.rate_limit.sweep_every,
            },
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Public --------------------------------------------------------

impl Config {
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            require_authentication: self.auth.require_authentication,
            rate_limit: self.rate_limit.default,
            operation_limits: self.rate_limit.operations.clone(),
            retry: self.retry,
            transient_codes: self.transient_codes.clone(),
            sweep_every: self.rate_limit.sweep_every,
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            identity_provider: self.auth.identity_provider.clone(),
            timeout: self.auth.login_timeout,
            max_time_to_live: self.auth.max_time_to_live,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigFile {
    replica: ReplicaConfig,
    canisters: LedgerCanisters,

    #[serde(default)]
    auth: AuthSection,

    #[serde(default)]
    retry: RetrySection,

    #[serde(default)]
    rate_limit: RateLimitSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AuthSection {
    require_authentication: bool,
    identity_provider: String,

    #[serde(deserialize_with = "de_duration")]
    login_timeout: Duration,

    #[serde(deserialize_with = "de_opt_duration")]
    max_time_to_live: Option<Duration>,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            require_authentication: true,
            identity_provider: DEFAULT_IDENTITY_PROVIDER.to_string(),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            max_time_to_live: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RetrySection {
    max_attempts: u32,

    #[serde(deserialize_with = "de_duration")]
    base_delay: Duration,

    backoff_multiplier: f64,
    transient_codes: Vec<String>,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts(),
            base_delay: policy.base_delay(),
            backoff_multiplier: policy.backoff_multiplier(),
            transient_codes: vec![CANISTER_UNAVAILABLE_CODE.to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RateLimitSection {
    enabled: bool,

    #[serde(deserialize_with = "de_duration")]
    window: Duration,

    max_requests: u32,
    sweep_every: u64,
    operations: HashMap<String, OperationLimitEntry>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            window: DEFAULT_RATE_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
            sweep_every: DEFAULT_SWEEP_EVERY,
            operations: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationLimitEntry {
    #[serde(default, deserialize_with = "de_opt_duration")]
    window: Option<Duration>,

    #[serde(default)]
    max_requests: Option<u32>,
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_MAX_REQUESTS: u32 = 30;

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

fn limit_from(section: &str, window: Duration, max_requests: u32) -> Result<RateLimit, ConfigError> {
    if window.is_zero() {
        return Err(ConfigError::InvalidField(format!("{section}.window")));
    }
    if max_requests == 0 {
        return Err(ConfigError::InvalidField(format!("{section}.max_requests")));
    }
    Ok(RateLimit::new(window, max_requests))
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("invalid [retry] section: {0}")]
    Retry(#[from] PolicyError),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
