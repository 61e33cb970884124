pub mod identity;
pub mod manager;
pub mod provider;

pub use identity::{ANONYMOUS_PRINCIPAL, Identity, Session};
pub use manager::SessionManager;
pub use provider::{
    AnonymousProvider, IdentityProvider, KeyFileProvider, ProviderConfig, ProviderError,
};
