use serde_json::Value;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::errors::GatewayError;
use crate::gateway::operation::{Operation, RemoteInvoke};
use crate::gateway::registry::OperationRegistry;
use crate::rate_limit::{RateKey, RateLimit, RateLimiter};
use crate::retry::{CancelSignal, RetryPolicy, run_with_retry};
use crate::session::{ANONYMOUS_PRINCIPAL, ProviderConfig, Session, SessionManager};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Replica reject code for a canister that is stopped or overloaded.
pub const CANISTER_UNAVAILABLE_CODE: &str = "IC0503";

pub const DEFAULT_SWEEP_EVERY: u64 = 1024;

// -----------------------------------------------------------------------------
// ----- GatewayOptions --------------------------------------------------------

/// Knobs that used to be separate client variants: auth gating, rate limiting
/// (off when `rate_limit` is `None`), and retry.
#[derive(Clone, Debug)]
pub struct GatewayOptions {
    pub require_authentication: bool,
    pub rate_limit: Option<RateLimit>,
    pub operation_limits: HashMap<String, RateLimit>,
    pub retry: RetryPolicy,
    pub transient_codes: Vec<String>,
    /// Forget idle rate-limit keys every this many dispatches; 0 never does.
    pub sweep_every: u64,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            require_authentication: true,
            rate_limit: Some(RateLimit::new(std::time::Duration::from_secs(60), 30)),
            operation_limits: HashMap::new(),
            retry: RetryPolicy::default(),
            transient_codes: vec![CANISTER_UNAVAILABLE_CODE.to_string()],
            sweep_every: DEFAULT_SWEEP_EVERY,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

pub struct Gateway {
    registry: OperationRegistry,
    session: SessionManager,
    limiter: RateLimiter,
    options: GatewayOptions,
    dispatched: AtomicU64,
}

// -----------------------------------------------------------------------------
// ----- Gateway: Static -------------------------------------------------------

impl Gateway {
    pub fn new(
        registry: OperationRegistry,
        session: SessionManager,
        limiter: RateLimiter,
        options: GatewayOptions,
    ) -> Self {
        Self {
            registry,
            session,
            limiter,
            options,
            dispatched: AtomicU64::new(0),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway: Public -------------------------------------------------------

impl Gateway {
    pub async fn initialize(&self) {
        self.session.initialize().await;
    }

    pub async fn login(&self, config: &ProviderConfig) -> Result<(), GatewayError> {
        self.session.login(config).await.map(|_| ())
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// Validate, gate, rate-limit, then invoke with retry. Returns the remote
    /// payload untouched.
    pub async fn call(&self, operation: &str, args: Vec<Value>) -> Result<Value, GatewayError> {
        self.dispatch(operation, &args, None).await
    }

    pub async fn call_with_cancel(
        &self,
        operation: &str,
        args: Vec<Value>,
        cancel: &CancelSignal,
    ) -> Result<Value, GatewayError> {
        self.dispatch(operation, &args, Some(cancel)).await
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway: Private ------------------------------------------------------

impl Gateway {
    async fn dispatch(
        &self,
        name: &str,
        args: &[Value],
        cancel: Option<&CancelSignal>,
    ) -> Result<Value, GatewayError> {
        self.sweep_if_due();

        let started = Instant::now();
        let result = self.dispatch_checked(name, args, cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(operation = name, elapsed_ms, "call succeeded"),
            Err(e) => warn!(
                operation = name,
                kind = e.kind().as_str(),
                elapsed_ms,
                "call failed: {e}"
            ),
        }

        result
    }

    async fn dispatch_checked(
        &self,
        name: &str,
        args: &[Value],
        cancel: Option<&CancelSignal>,
    ) -> Result<Value, GatewayError> {
        let operation = self
            .registry
            .get(name)
            .ok_or_else(|| GatewayError::validation(format!("unknown operation '{name}'")))?;

        operation.validate(args)?;

        let session = if self.options.require_authentication {
            Some(self.session.ensure_authenticated()?)
        } else {
            self.session.current()
        };

        if let Some(limit) = self.limit_for(operation) {
            let subject = operation
                .subject(args)
                .or_else(|| session.as_deref().map(Session::principal))
                .unwrap_or(ANONYMOUS_PRINCIPAL);

            self.limiter.check(&RateKey::new(name, subject), limit)?;
        }

        let remote = operation.remote();

        run_with_retry(
            |attempt| self.attempt(name, remote, args, attempt),
            &self.options.retry,
            GatewayError::is_transient,
            cancel,
        )
        .await
    }

    /// Limiter keys carry caller-supplied player ids; sweeping every
    /// `sweep_every` dispatches keeps only keys with live stamps.
    fn sweep_if_due(&self) {
        let every = self.options.sweep_every;
        if every == 0 {
            return;
        }

        let count = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        if count % every != 0 {
            return;
        }

        let removed = self.limiter.sweep();
        debug!(removed, remaining = self.limiter.key_count(), "rate limiter swept");
    }

    /// Config override, then the operation's own limit, then the default.
    fn limit_for(&self, operation: &Operation) -> Option<RateLimit> {
        let default = self.options.rate_limit?;

        let limit = self
            .options
            .operation_limits
            .get(operation.name())
            .copied()
            .or(operation.declared_rate_limit())
            .unwrap_or(default);

        Some(limit)
    }

    async fn attempt(
        &self,
        name: &str,
        remote: &dyn RemoteInvoke,
        args: &[Value],
        attempt: u32,
    ) -> Result<Value, GatewayError> {
        let started = Instant::now();

        let result = match remote.invoke(args).await {
            Ok(reply) => reply.into_result(&self.options.transient_codes),
            Err(failure) => Err(failure.into()),
        };

        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(operation = name, attempt, latency_ms, outcome = "ok", "remote attempt"),
            Err(e) => warn!(
                operation = name,
                attempt,
                latency_ms,
                outcome = e.kind().as_str(),
                error = %e,
                "remote attempt"
            ),
        }

        result
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
