use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

// -----------------------------------------------------------------------------
// ----- RateWindow ------------------------------------------------------------

/// Admission timestamps for one key, oldest first.
#[derive(Debug, Default)]
pub struct RateWindow {
    stamps: VecDeque<Instant>,
    span: Duration,
}

// -----------------------------------------------------------------------------
// ----- RateWindow: Public ----------------------------------------------------

impl RateWindow {
    /// Drop every stamp at least `span` old. Stamps are pushed in clock order,
    /// so expired ones are always at the front.
    pub fn prune(&mut self, now: Instant, span: Duration) {
        self.span = span;

        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) < span {
                break;
            }
            self.stamps.pop_front();
        }
    }

    /// Check-then-record. Returns `false` (and records nothing) when the
    /// window already holds `max_requests` live stamps. Live stamps are never
    /// dropped, so at most the largest limit used within one span is stored.
    pub fn admit(&mut self, now: Instant, span: Duration, max_requests: usize) -> bool {
        self.prune(now, span);

        if self.stamps.len() >= max_requests {
            return false;
        }

        self.stamps.push_back(now);
        true
    }

    /// Prune with the span last used for this window.
    pub fn prune_expired(&mut self, now: Instant) {
        let span = self.span;
        self.prune(now, span);
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
