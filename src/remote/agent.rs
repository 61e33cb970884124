use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::errors::GatewayError;
use crate::remote::reply::RemoteReply;
use crate::session::Identity;
use crate::shared_types::CanisterId;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Code attached to replies the transport could not decode.
pub const MALFORMED_REPLY_CODE: &str = "MALFORMED_REPLY";

// -----------------------------------------------------------------------------
// ----- Agent -----------------------------------------------------------------

/// Transport to the actor network. Implementations sign calls with whatever
/// identity was last installed through [`Agent::replace_identity`].
#[async_trait]
pub trait Agent: Send + Sync {
    fn replace_identity(&self, identity: Identity);

    async fn invoke(
        &self,
        canister: &CanisterId,
        method: &str,
        args: &[Value],
    ) -> Result<RemoteReply, TransportFailure>;
}

// -----------------------------------------------------------------------------
// ----- TransportFailure ------------------------------------------------------

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransportFailure {
    #[error("replica unreachable: {0}")]
    Unreachable(String),

    #[error("call timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("malformed reply: {0}")]
    Protocol(String),
}

impl From<TransportFailure> for GatewayError {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Unreachable(_) | TransportFailure::Timeout(_) => {
                GatewayError::transport(failure.to_string())
            }
            TransportFailure::Protocol(reason) => {
                GatewayError::remote(reason, Some(MALFORMED_REPLY_CODE.to_string()), false)
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
