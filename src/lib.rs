// Gateway to the crystal ledger; transport details stay behind remote::Agent.
pub mod config;
pub mod errors;
pub mod gateway;
pub mod rate_limit;
pub mod remote;
pub mod retry;
pub mod session;
pub mod shared_types;

pub use config::Config;
pub use errors::{ErrorKind, ErrorPayload, GatewayError};
pub use gateway::{Gateway, GatewayOptions};
