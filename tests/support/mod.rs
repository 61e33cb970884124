#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::time::sleep;

use crystalgate::gateway::{LedgerCanisters, ledger_operations};
use crystalgate::rate_limit::{RateLimit, RateLimiter};
use crystalgate::remote::{Agent, RemoteFault, RemoteReply, TransportFailure};
use crystalgate::retry::RetryPolicy;
use crystalgate::session::{Identity, IdentityProvider, ProviderConfig, ProviderError, SessionManager};
use crystalgate::shared_types::{CanisterId, ManualClock};
use crystalgate::{Gateway, GatewayOptions};

// -----------------------------------------------------------------------------
// ----- Canisters -------------------------------------------------------------

pub const CRYSTAL_BANK: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";
pub const FUDDY_TRANSFER: &str = "r7inp-6aaaa-aaaaa-aaabq-cai";
pub const HYBRID_WALLET: &str = "rrkah-fqaaa-aaaaa-aaaaq-cai";
pub const FUDDY_CONVERSION: &str = "renrk-eyaaa-aaaaa-aaada-cai";

pub fn canisters() -> LedgerCanisters {
    LedgerCanisters {
        crystal_bank: CRYSTAL_BANK.parse().unwrap(),
        fuddy_transfer: FUDDY_TRANSFER.parse().unwrap(),
        hybrid_wallet: HYBRID_WALLET.parse().unwrap(),
        fuddy_conversion: FUDDY_CONVERSION.parse().unwrap(),
    }
}

// -----------------------------------------------------------------------------
// ----- MockAgent -------------------------------------------------------------

pub type Step = Result<RemoteReply, TransportFailure>;

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub canister: String,
    pub method: String,
    pub args: Vec<Value>,
    pub principal: String,
}

/// Replays scripted replies per method; unscripted calls answer `ok(null)`.
#[derive(Default)]
pub struct MockAgent {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    delay: Mutex<Option<Duration>>,
    principal: Mutex<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, method: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .entry(method.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn reply_ok(&self, method: &str, payload: Value) {
        self.script(method, [Ok(RemoteReply::ok(payload))]);
    }

    /// Every invocation sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn principal(&self) -> String {
        self.principal.lock().clone()
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn replace_identity(&self, identity: Identity) {
        *self.principal.lock() = identity.principal().to_string();
    }

    async fn invoke(
        &self,
        canister: &CanisterId,
        method: &str,
        args: &[Value],
    ) -> Result<RemoteReply, TransportFailure> {
        self.calls.lock().push(RecordedCall {
            canister: canister.to_string(),
            method: method.to_string(),
            args: args.to_vec(),
            principal: self.principal(),
        });

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        let step = self
            .scripts
            .lock()
            .get_mut(method)
            .and_then(|steps| steps.pop_front());

        step.unwrap_or_else(|| Ok(RemoteReply::ok(Value::Null)))
    }
}

pub fn unavailable() -> Step {
    Ok(RemoteReply::Err(
        RemoteFault::new("canister is stopped").with_code("IC0503"),
    ))
}

pub fn unreachable() -> Step {
    Err(TransportFailure::Unreachable("connection refused".to_string()))
}

// -----------------------------------------------------------------------------
// ----- ScriptedProvider ------------------------------------------------------

#[derive(Clone, Debug)]
pub enum Challenge {
    Grant(Identity),
    Cancel,
    Reject(String),
    /// Never answers; the login timeout has to fire.
    Hang,
}

pub struct ScriptedProvider {
    restore: Option<Identity>,
    challenge: Mutex<Challenge>,
    revoked: Mutex<Vec<String>>,
    restores: Mutex<u32>,
}

impl ScriptedProvider {
    pub fn new(challenge: Challenge) -> Arc<Self> {
        Arc::new(Self {
            restore: None,
            challenge: Mutex::new(challenge),
            revoked: Mutex::new(Vec::new()),
            restores: Mutex::new(0),
        })
    }

    pub fn restoring(identity: Identity, challenge: Challenge) -> Arc<Self> {
        Arc::new(Self {
            restore: Some(identity),
            challenge: Mutex::new(challenge),
            revoked: Mutex::new(Vec::new()),
            restores: Mutex::new(0),
        })
    }

    pub fn set_challenge(&self, challenge: Challenge) {
        *self.challenge.lock() = challenge;
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().clone()
    }

    pub fn restores(&self) -> u32 {
        *self.restores.lock()
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn restore(&self) -> Result<Option<Identity>, ProviderError> {
        *self.restores.lock() += 1;
        // Give concurrent initializers a chance to pile up.
        sleep(Duration::from_millis(20)).await;
        Ok(self.restore.clone())
    }

    async fn challenge(&self, config: &ProviderConfig) -> Result<Identity, ProviderError> {
        let challenge = self.challenge.lock().clone();
        match challenge {
            Challenge::Grant(identity) => Ok(identity.capped_at(config.max_time_to_live)),
            Challenge::Cancel => Err(ProviderError::Cancelled),
            Challenge::Reject(reason) => Err(ProviderError::Rejected(reason)),
            Challenge::Hang => std::future::pending().await,
        }
    }

    async fn revoke(&self, identity: &Identity) -> Result<(), ProviderError> {
        self.revoked.lock().push(identity.principal().to_string());
        Ok(())
    }
}

pub fn player(principal: &str) -> Identity {
    Identity::authenticated(principal, SecretString::new("s3cret".to_string().into_boxed_str()))
}

// -----------------------------------------------------------------------------
// ----- Harness ---------------------------------------------------------------

pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub agent: Arc<MockAgent>,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<ManualClock>,
}

/// Retries three times with millisecond delays so tests stay quick.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), 2.0).unwrap()
}

pub fn options() -> GatewayOptions {
    GatewayOptions {
        retry: fast_retry(),
        rate_limit: Some(RateLimit::new(Duration::from_secs(60), 1000)),
        ..GatewayOptions::default()
    }
}

pub fn harness(options: GatewayOptions, provider: Arc<ScriptedProvider>) -> Harness {
    let agent = MockAgent::new();
    let clock = Arc::new(ManualClock::new());

    let registry = ledger_operations(agent.clone(), &canisters()).unwrap();
    let session = SessionManager::new(provider.clone(), agent.clone(), clock.clone());
    let limiter = RateLimiter::new(clock.clone());

    Harness {
        gateway: Arc::new(Gateway::new(registry, session, limiter, options)),
        agent,
        provider,
        clock,
    }
}

/// Initialized and signed in as `principal`.
pub async fn signed_in(options: GatewayOptions, principal: &str) -> Harness {
    let h = harness(options, ScriptedProvider::new(Challenge::Grant(player(principal))));
    h.gateway.initialize().await;
    h.gateway.login(&ProviderConfig::default()).await.unwrap();
    h
}
