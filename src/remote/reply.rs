use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GatewayError;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Code given to faults the ledger service reported without one.
pub const REMOTE_ERROR_CODE: &str = "REMOTE_ERROR";

// -----------------------------------------------------------------------------
// ----- RemoteReply -----------------------------------------------------------

/// What a ledger method hands back: `{"ok": payload}` or `{"err": fault}`.
///
/// Methods that return a bare value (a `bool`, a balance record) are treated
/// as an `ok` with that value; see [`RemoteReply::from_value`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteReply {
    Ok(Value),
    Err(RemoteFault),
}

impl RemoteReply {
    pub fn ok(payload: impl Into<Value>) -> Self {
        RemoteReply::Ok(payload.into())
    }

    pub fn err(message: impl Into<String>) -> Self {
        RemoteReply::Err(RemoteFault::new(message))
    }

    /// Interpret a raw reply value. Only a single-key object named `ok` or
    /// `err` is taken as the tagged shape; anything else is a success payload.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let tagged = value
            .as_object()
            .is_some_and(|map| map.len() == 1 && (map.contains_key("ok") || map.contains_key("err")));

        if tagged {
            serde_json::from_value(value)
        } else {
            Ok(RemoteReply::Ok(value))
        }
    }

    /// Unwrap `ok`, turn `err` into [`GatewayError::Remote`]. A fault counts as
    /// transient when the service says so or its code is in `transient_codes`.
    /// Faults without a code get [`REMOTE_ERROR_CODE`].
    pub fn into_result(self, transient_codes: &[String]) -> Result<Value, GatewayError> {
        match self {
            RemoteReply::Ok(payload) => Ok(payload),
            RemoteReply::Err(fault) => {
                let transient = fault.transient
                    || fault
                        .code
                        .as_deref()
                        .is_some_and(|code| transient_codes.iter().any(|c| c == code));

                let code = fault.code.unwrap_or_else(|| REMOTE_ERROR_CODE.to_string());
                Err(GatewayError::remote(fault.message, Some(code), transient))
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- RemoteFault -----------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "FaultRepr")]
pub struct RemoteFault {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default)]
    pub transient: bool,
}

impl RemoteFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            transient: false,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Accepted fault shapes ---------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum FaultRepr {
    Message(String),
    Detailed {
        message: String,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        transient: bool,
    },
    // Variant-style errors such as {"InsufficientFunds": null}.
    Other(Value),
}

impl From<FaultRepr> for RemoteFault {
    fn from(repr: FaultRepr) -> Self {
        match repr {
            FaultRepr::Message(message) => RemoteFault::new(message),
            FaultRepr::Detailed {
                message,
                code,
                transient,
            } => RemoteFault {
                message,
                code,
                transient,
            },
            FaultRepr::Other(value) => RemoteFault::new(value.to_string()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
