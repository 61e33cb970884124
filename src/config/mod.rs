pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod types;

pub use cli::{CliConfig, CliError, Command, typed_args};
pub use config::{AuthConfig, Config, ConfigError, RateLimitConfig, ReplicaConfig};
pub use types::LogLevel;
