use secrecy::SecretString;
use std::time::{Duration, Instant};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Textual form of the well-known anonymous principal.
pub const ANONYMOUS_PRINCIPAL: &str = "2vxsx-fae";

// -----------------------------------------------------------------------------
// ----- Identity --------------------------------------------------------------

/// Who the transport signs calls as. The credential never leaves this struct
/// except through [`Identity::credential`].
#[derive(Clone, Debug)]
pub struct Identity {
    principal: String,
    credential: Option<SecretString>,
    time_to_live: Option<Duration>,
}

// -----------------------------------------------------------------------------
// ----- Identity: Static ------------------------------------------------------

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            principal: ANONYMOUS_PRINCIPAL.to_string(),
            credential: None,
            time_to_live: None,
        }
    }

    pub fn authenticated(principal: impl Into<String>, credential: SecretString) -> Self {
        Self {
            principal: principal.into(),
            credential: Some(credential),
            time_to_live: None,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Identity: Builder -----------------------------------------------------

impl Identity {
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Clamp the lifetime to `max`, if any.
    pub fn capped_at(mut self, max: Option<Duration>) -> Self {
        if let Some(max) = max {
            self.time_to_live = Some(self.time_to_live.map_or(max, |ttl| ttl.min(max)));
        }
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Identity: Public ------------------------------------------------------

impl Identity {
    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn credential(&self) -> Option<&SecretString> {
        self.credential.as_ref()
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }

    pub fn is_anonymous(&self) -> bool {
        self.credential.is_none() || self.principal == ANONYMOUS_PRINCIPAL
    }
}

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

/// One installed identity. Replaced wholesale, never mutated.
#[derive(Debug)]
pub struct Session {
    identity: Identity,
    established_at: Instant,
    expires_at: Option<Instant>,
    generation: u64,
}

impl Session {
    pub(crate) fn new(identity: Identity, now: Instant, generation: u64) -> Self {
        let expires_at = identity.time_to_live.and_then(|ttl| now.checked_add(ttl));

        Self {
            identity,
            established_at: now,
            expires_at,
            generation,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn principal(&self) -> &str {
        self.identity.principal()
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity.is_anonymous()
    }

    pub fn established_at(&self) -> Instant {
        self.established_at
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string().into_boxed_str())
    }

    #[test]
    fn anonymous_has_no_credential() {
        let id = Identity::anonymous();
        assert!(id.is_anonymous());
        assert_eq!(id.principal(), ANONYMOUS_PRINCIPAL);
        assert!(id.credential().is_none());
    }

    #[test]
    fn lifetime_is_capped() {
        let id = Identity::authenticated("aaaaa-aa", secret("s"))
            .with_time_to_live(Duration::from_secs(3600))
            .capped_at(Some(Duration::from_secs(60)));
        assert_eq!(id.time_to_live(), Some(Duration::from_secs(60)));

        let id = Identity::authenticated("aaaaa-aa", secret("s")).capped_at(None);
        assert_eq!(id.time_to_live(), None);
    }

    #[test]
    fn session_expiry() {
        let now = Instant::now();
        let id = Identity::authenticated("aaaaa-aa", secret("s"))
            .with_time_to_live(Duration::from_secs(10));
        let session = Session::new(id, now, 1);

        assert!(!session.is_expired(now + Duration::from_secs(9)));
        assert!(session.is_expired(now + Duration::from_secs(10)));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
