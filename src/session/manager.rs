use parking_lot::RwLock;
use std::sync::Arc;
use tokio::{sync::OnceCell, time::timeout};
use tracing::{info, warn};

use crate::errors::GatewayError;
use crate::remote::Agent;
use crate::session::identity::{Identity, Session};
use crate::session::provider::{IdentityProvider, ProviderConfig, ProviderError};
use crate::shared_types::Clock;

// -----------------------------------------------------------------------------
// ----- SessionManager --------------------------------------------------------

/// Owns the gateway's identity. Every replacement installs a fresh
/// [`Session`] with a bumped generation and pushes the identity to the agent.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    agent: Arc<dyn Agent>,
    clock: Arc<dyn Clock>,
    ready: OnceCell<()>,
    current: RwLock<Option<Arc<Session>>>,
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Static ------------------------------------------------

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        agent: Arc<dyn Agent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            agent,
            clock,
            ready: OnceCell::new(),
            current: RwLock::new(None),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Public ------------------------------------------------

impl SessionManager {
    /// Establish the restored (or anonymous) identity. Only the first call
    /// does anything; concurrent callers wait for it.
    pub async fn initialize(&self) {
        self.ready
            .get_or_init(|| async {
                let identity = match self.provider.restore().await {
                    Ok(Some(identity)) => identity,
                    Ok(None) => Identity::anonymous(),
                    Err(e) => {
                        warn!("could not restore identity, starting anonymous: {e}");
                        Identity::anonymous()
                    }
                };

                let (session, _) = self.install(identity);
                info!(
                    principal = session.principal(),
                    anonymous = session.is_anonymous(),
                    "session initialized"
                );
            })
            .await;
    }

    pub async fn login(&self, config: &ProviderConfig) -> Result<Arc<Session>, GatewayError> {
        self.initialize().await;

        let identity = match timeout(config.timeout, self.provider.challenge(config)).await {
            Err(_) => {
                warn!(provider = %config.identity_provider, "login timed out");
                return Err(GatewayError::authentication(format!(
                    "login timed out after {}",
                    humantime::format_duration(config.timeout)
                )));
            }
            Ok(Err(ProviderError::Cancelled)) => {
                warn!(provider = %config.identity_provider, "login cancelled");
                return Err(GatewayError::authentication("login cancelled"));
            }
            Ok(Err(e)) => {
                warn!(provider = %config.identity_provider, "login failed: {e}");
                return Err(GatewayError::authentication(format!("login failed: {e}")));
            }
            Ok(Ok(identity)) => identity,
        };

        if identity.is_anonymous() {
            return Err(GatewayError::authentication(
                "identity provider returned an anonymous identity",
            ));
        }

        let (session, _) = self.install(identity.capped_at(config.max_time_to_live));
        info!(principal = session.principal(), "login succeeded");

        Ok(session)
    }

    /// Swap in the anonymous identity. Revocation runs in the background and
    /// its outcome never reaches the caller.
    pub async fn logout(&self) {
        self.initialize().await;

        let (_, previous) = self.install(Identity::anonymous());
        info!("logged out");

        let Some(previous) = previous.filter(|s| !s.is_anonymous()) else {
            return;
        };

        let provider = self.provider.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.revoke(previous.identity()).await {
                warn!(principal = previous.principal(), "identity revocation failed: {e}");
            }
        });
    }

    /// Synchronous gate for calls that need a signed-in user.
    pub fn ensure_authenticated(&self) -> Result<Arc<Session>, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::authentication("session not initialized"));
        }

        let Some(session) = self.current() else {
            return Err(GatewayError::authentication("no active session"));
        };

        if session.is_anonymous() {
            return Err(GatewayError::authentication("user not authenticated"));
        }

        if session.is_expired(self.clock.now()) {
            return Err(GatewayError::authentication("session expired"));
        }

        Ok(session)
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Bumped on every identity replacement; zero before `initialize`.
    pub fn generation(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |s| s.generation())
    }
}

// -----------------------------------------------------------------------------
// ----- SessionManager: Private -----------------------------------------------

impl SessionManager {
    /// Replace the current session; returns the new one and the one it displaced.
    fn install(&self, identity: Identity) -> (Arc<Session>, Option<Arc<Session>>) {
        let mut current = self.current.write();

        let generation = current.as_ref().map_or(0, |s| s.generation()) + 1;
        let session = Arc::new(Session::new(identity.clone(), self.clock.now(), generation));

        self.agent.replace_identity(identity);
        let previous = current.replace(session.clone());

        (session, previous)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::remote::{RemoteReply, TransportFailure};
    use crate::shared_types::{CanisterId, ManualClock};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use secrecy::SecretString;
    use serde_json::Value;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingAgent {
        principals: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        fn replace_identity(&self, identity: Identity) {
            self.principals.lock().push(identity.principal().to_string());
        }

        async fn invoke(
            &self,
            _canister: &CanisterId,
            _method: &str,
            _args: &[Value],
        ) -> Result<RemoteReply, TransportFailure> {
            Ok(RemoteReply::ok(Value::Null))
        }
    }

    struct FixedProvider {
        ttl: Option<Duration>,
    }

    #[async_trait]
    impl IdentityProvider for FixedProvider {
        async fn challenge(&self, _config: &ProviderConfig) -> Result<Identity, ProviderError> {
            let identity = Identity::authenticated(
                "w7x7r-cok77-xa",
                SecretString::new("k".to_string().into_boxed_str()),
            );
            Ok(match self.ttl {
                Some(ttl) => identity.with_time_to_live(ttl),
                None => identity,
            })
        }
    }

    fn manager(ttl: Option<Duration>) -> (Arc<RecordingAgent>, Arc<ManualClock>, SessionManager) {
        let agent = Arc::new(RecordingAgent::default());
        let clock = Arc::new(ManualClock::new());
        let manager = SessionManager::new(Arc::new(FixedProvider { ttl }), agent.clone(), clock.clone());
        (agent, clock, manager)
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (agent, _clock, manager) = manager(None);
        assert_eq!(manager.generation(), 0);

        manager.initialize().await;
        let first = manager.current().unwrap();

        manager.initialize().await;
        let second = manager.current().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.generation(), 1);
        assert_eq!(agent.principals.lock().len(), 1);
    }

    #[tokio::test]
    async fn gate_before_initialize_and_login() {
        let (_agent, _clock, manager) = manager(None);

        let err = manager.ensure_authenticated().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        manager.initialize().await;
        assert!(manager.ensure_authenticated().is_err());

        manager.login(&ProviderConfig::default()).await.unwrap();
        let session = manager.ensure_authenticated().unwrap();
        assert_eq!(session.principal(), "w7x7r-cok77-xa");
    }

    #[tokio::test]
    async fn login_pushes_identity_to_agent_and_logout_reverts() {
        let (agent, _clock, manager) = manager(None);

        manager.login(&ProviderConfig::default()).await.unwrap();
        manager.logout().await;

        let principals = agent.principals.lock().clone();
        assert_eq!(
            principals,
            vec![
                crate::session::ANONYMOUS_PRINCIPAL.to_string(),
                "w7x7r-cok77-xa".to_string(),
                crate::session::ANONYMOUS_PRINCIPAL.to_string(),
            ]
        );
        assert_eq!(manager.generation(), 3);
        assert!(manager.ensure_authenticated().is_err());
    }

    #[tokio::test]
    async fn expired_sessions_fail_the_gate() {
        let (_agent, clock, manager) = manager(Some(Duration::from_secs(30)));
        manager.login(&ProviderConfig::default()).await.unwrap();

        clock.advance(Duration::from_secs(29));
        assert!(manager.ensure_authenticated().is_ok());

        clock.advance(Duration::from_secs(1));
        let err = manager.ensure_authenticated().unwrap_err();
        assert_eq!(err.message(), "session expired");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
