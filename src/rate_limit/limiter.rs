use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::rate_limit::window::RateWindow;
use crate::shared_types::{Clock, SystemClock};

// -----------------------------------------------------------------------------
// ----- RateKey ---------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RateKey {
    operation: String,
    subject: String,
}

impl RateKey {
    pub fn new(operation: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            subject: subject.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.subject)
    }
}

// -----------------------------------------------------------------------------
// ----- RateLimit -------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimit {
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- RateLimiter -----------------------------------------------------------

/// Sliding-window limiter keyed by `(operation, subject)`.
///
/// Each key owns its own lock; the outer map lock is only held long enough to
/// find or create a key's slot, so checks on different keys never wait on
/// each other's check-and-record.
#[derive(Debug)]
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<RateKey, Arc<Mutex<RateWindow>>>>,
}

// -----------------------------------------------------------------------------
// ----- RateLimiter: Static ---------------------------------------------------

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

// -----------------------------------------------------------------------------
// ----- RateLimiter: Public ---------------------------------------------------

impl RateLimiter {
    /// Prune, count, and either reject or record `now`, all under the key's
    /// lock. Rejections carry the window as the retry-after hint.
    pub fn check_and_record(
        &self,
        key: &RateKey,
        window: Duration,
        max_requests: u32,
    ) -> Result<(), GatewayError> {
        let slot = self.slot(key);
        let mut stamps = slot.lock();

        let now = self.clock.now();
        let limit = usize::try_from(max_requests).unwrap_or(usize::MAX);

        if stamps.admit(now, window, limit) {
            debug!(key = %key, in_window = stamps.len(), max_requests, "rate limit admitted");
            return Ok(());
        }

        warn!(key = %key, max_requests, window_ms = window.as_millis() as u64, "rate limit exceeded");
        Err(GatewayError::rate_limited(key, window))
    }

    pub fn check(&self, key: &RateKey, limit: RateLimit) -> Result<(), GatewayError> {
        self.check_and_record(key, limit.window, limit.max_requests)
    }

    /// Stamps currently stored for `key`, after pruning.
    pub fn len(&self, key: &RateKey) -> usize {
        let Some(slot) = self.windows.lock().get(key).cloned() else {
            return 0;
        };

        let mut stamps = slot.lock();
        stamps.prune_expired(self.clock.now());
        stamps.len()
    }

    pub fn key_count(&self) -> usize {
        self.windows.lock().len()
    }

    /// Forget keys whose windows are empty. Slots a caller is holding right
    /// now are left alone so their check-and-record stays exact.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let before = windows.len();

        windows.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let mut stamps = slot.lock();
            stamps.prune_expired(now);
            !stamps.is_empty()
        });

        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "swept idle rate windows");
        }
        removed
    }
}

// -----------------------------------------------------------------------------
// ----- RateLimiter: Private --------------------------------------------------

impl RateLimiter {
    fn slot(&self, key: &RateKey) -> Arc<Mutex<RateWindow>> {
        let mut windows = self.windows.lock();

        if let Some(slot) = windows.get(key) {
            return slot.clone();
        }

        let slot = Arc::new(Mutex::new(RateWindow::default()));
        windows.insert(key.clone(), slot.clone());
        slot
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
