use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- ErrorKind -------------------------------------------------------------

/// Stable discriminant a caller (or a UI on the other side of a serialization
/// boundary) can branch on without matching message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    RateLimit,
    Transport,
    Remote,
    RetriesExhausted,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Transport => "transport",
            ErrorKind::Remote => "remote",
            ErrorKind::RetriesExhausted => "retries_exhausted",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[serde(into = "ErrorPayload", try_from = "ErrorPayload")]
pub enum GatewayError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("authentication error: {message}")]
    Authentication { message: String },

    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Duration,
    },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("remote error: {message}")]
    Remote {
        message: String,
        code: Option<String>,
        transient: bool,
    },

    #[error("{message}")]
    RetriesExhausted {
        message: String,
        attempts: u32,
        last: Box<GatewayError>,
    },

    #[error("cancelled: {message}")]
    Cancelled { message: String },
}

// -----------------------------------------------------------------------------
// ----- GatewayError: Static --------------------------------------------------

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        GatewayError::Authentication {
            message: message.into(),
        }
    }

    pub fn rate_limited(key: impl std::fmt::Display, retry_after: Duration) -> Self {
        GatewayError::RateLimit {
            message: format!("too many requests for {key}"),
            retry_after,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        GatewayError::Transport {
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>, code: Option<String>, transient: bool) -> Self {
        GatewayError::Remote {
            message: message.into(),
            code,
            transient,
        }
    }

    pub fn retries_exhausted(attempts: u32, last: GatewayError) -> Self {
        GatewayError::RetriesExhausted {
            message: format!("gave up after {attempts} attempts: {last}"),
            attempts,
            last: Box::new(last),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        GatewayError::Cancelled {
            message: message.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayError: Public --------------------------------------------------

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation { .. } => ErrorKind::Validation,
            GatewayError::Authentication { .. } => ErrorKind::Authentication,
            GatewayError::RateLimit { .. } => ErrorKind::RateLimit,
            GatewayError::Transport { .. } => ErrorKind::Transport,
            GatewayError::Remote { .. } => ErrorKind::Remote,
            GatewayError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            GatewayError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Validation { message }
            | GatewayError::Authentication { message }
            | GatewayError::RateLimit { message, .. }
            | GatewayError::Transport { message }
            | GatewayError::Remote { message, .. }
            | GatewayError::RetriesExhausted { message, .. }
            | GatewayError::Cancelled { message } => message,
        }
    }

    /// Remote-assigned code, when the ledger service supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            GatewayError::Remote { code, .. } => code.as_deref(),
            GatewayError::RetriesExhausted { last, .. } => last.code(),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimit { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Default retryability: transport failures and faults the remote side
    /// tagged as transient. Everything else needs a code-path change first.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport { .. } => true,
            GatewayError::Remote { transient, .. } => *transient,
            _ => false,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::from(self.clone())
    }
}

// -----------------------------------------------------------------------------
// ----- ErrorPayload ----------------------------------------------------------

/// Flat wire shape of a [`GatewayError`], suitable for handing to a UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub transient: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorPayload>>,
}

impl ErrorPayload {
    fn bare(kind: ErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            code: None,
            transient: false,
            retry_after_ms: None,
            attempts: None,
            cause: None,
        }
    }
}

impl From<GatewayError> for ErrorPayload {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        match err {
            GatewayError::Validation { message }
            | GatewayError::Authentication { message }
            | GatewayError::Transport { message }
            | GatewayError::Cancelled { message } => ErrorPayload::bare(kind, message),
            GatewayError::RateLimit {
                message,
                retry_after,
            } => ErrorPayload {
                retry_after_ms: Some(duration_ms(retry_after)),
                ..ErrorPayload::bare(kind, message)
            },
            GatewayError::Remote {
                message,
                code,
                transient,
            } => ErrorPayload {
                code,
                transient,
                ..ErrorPayload::bare(kind, message)
            },
            GatewayError::RetriesExhausted {
                message,
                attempts,
                last,
            } => ErrorPayload {
                attempts: Some(attempts),
                cause: Some(Box::new(ErrorPayload::from(*last))),
                ..ErrorPayload::bare(kind, message)
            },
        }
    }
}

impl TryFrom<ErrorPayload> for GatewayError {
    type Error = PayloadError;

    fn try_from(payload: ErrorPayload) -> Result<Self, Self::Error> {
        let ErrorPayload {
            kind,
            message,
            code,
            transient,
            retry_after_ms,
            attempts,
            cause,
        } = payload;

        let err = match kind {
            ErrorKind::Validation => GatewayError::Validation { message },
            ErrorKind::Authentication => GatewayError::Authentication { message },
            ErrorKind::Transport => GatewayError::Transport { message },
            ErrorKind::Cancelled => GatewayError::Cancelled { message },
            ErrorKind::RateLimit => GatewayError::RateLimit {
                message,
                retry_after: Duration::from_millis(
                    retry_after_ms.ok_or(PayloadError::MissingField("retry_after_ms"))?,
                ),
            },
            ErrorKind::Remote => GatewayError::Remote {
                message,
                code,
                transient,
            },
            ErrorKind::RetriesExhausted => {
                let cause = cause.ok_or(PayloadError::MissingField("cause"))?;
                GatewayError::RetriesExhausted {
                    message,
                    attempts: attempts.ok_or(PayloadError::MissingField("attempts"))?,
                    last: Box::new(GatewayError::try_from(*cause)?),
                }
            }
        };

        Ok(err)
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("error payload is missing field '{0}'")]
    MissingField(&'static str),
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn is_false(v: &bool) -> bool {
    !*v
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn every_kind() -> Vec<GatewayError> {
        vec![
            GatewayError::validation("amount must be greater than zero"),
            GatewayError::authentication("user not authenticated"),
            GatewayError::rate_limited("depositCrystals:player1", Duration::from_secs(60)),
            GatewayError::transport("connection refused"),
            GatewayError::remote("insufficient crystals", Some("E42".into()), false),
            GatewayError::retries_exhausted(3, GatewayError::transport("timeout")),
            GatewayError::cancelled("caller went away"),
        ]
    }

    #[test]
    fn every_kind_survives_json() {
        for err in every_kind() {
            let json = serde_json::to_string(&err).unwrap();
            let back: GatewayError = serde_json::from_str(&json).unwrap();

            assert_eq!(back.kind(), err.kind(), "kind changed for {json}");
            assert_eq!(back.message(), err.message(), "message changed for {json}");
            assert_eq!(back, err);
        }
    }

    #[test]
    fn payload_carries_structured_fields() {
        let err = GatewayError::rate_limited("convert:p1", Duration::from_millis(1500));
        let payload = err.to_payload();
        assert_eq!(payload.kind, ErrorKind::RateLimit);
        assert_eq!(payload.retry_after_ms, Some(1500));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "rate_limit");
        assert!(json.get("code").is_none());
    }

    #[test]
    fn exhausted_keeps_last_error() {
        let err = GatewayError::retries_exhausted(
            2,
            GatewayError::remote("canister busy", Some("IC0503".into()), true),
        );
        assert_eq!(err.code(), Some("IC0503"));

        let GatewayError::RetriesExhausted { attempts, last, .. } = &err else {
            panic!("expected RetriesExhausted");
        };
        assert_eq!(*attempts, 2);
        assert_eq!(last.kind(), ErrorKind::Remote);
    }

    #[test]
    fn transient_classification() {
        assert!(GatewayError::transport("down").is_transient());
        assert!(GatewayError::remote("busy", None, true).is_transient());
        assert!(!GatewayError::remote("no such player", None, false).is_transient());
        assert!(!GatewayError::validation("bad").is_transient());
        assert!(!GatewayError::authentication("nope").is_transient());
        assert!(!GatewayError::rate_limited("k", Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn payload_without_cause_is_rejected() {
        let json = r#"{"kind":"retries_exhausted","message":"gave up","attempts":3}"#;
        assert!(serde_json::from_str::<GatewayError>(json).is_err());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
