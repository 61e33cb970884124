use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use crate::config::ReplicaConfig;
use crate::remote::agent::{Agent, TransportFailure};
use crate::remote::reply::RemoteReply;
use crate::session::Identity;
use crate::shared_types::CanisterId;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// -----------------------------------------------------------------------------
// ----- TcpAgent --------------------------------------------------------------

/// Line-delimited JSON transport: one request line out, one reply line back,
/// one connection per call.
#[derive(Debug)]
pub struct TcpAgent {
    endpoint: String,
    connect_timeout: Duration,
    call_timeout: Duration,
    identity: RwLock<Identity>,
}

// -----------------------------------------------------------------------------
// ----- TcpAgent: Static ------------------------------------------------------

impl TcpAgent {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("{host}:{port}"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            identity: RwLock::new(Identity::anonymous()),
        }
    }

    pub fn from_config(replica: &ReplicaConfig) -> Self {
        Self::new(&replica.host, replica.port)
            .with_timeouts(replica.connect_timeout, replica.call_timeout)
    }

    pub fn with_timeouts(mut self, connect: Duration, call: Duration) -> Self {
        self.connect_timeout = connect;
        self.call_timeout = call;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- TcpAgent: Agent -------------------------------------------------------

#[async_trait]
impl Agent for TcpAgent {
    fn replace_identity(&self, identity: Identity) {
        *self.identity.write() = identity;
    }

    async fn invoke(
        &self,
        canister: &CanisterId,
        method: &str,
        args: &[Value],
    ) -> Result<RemoteReply, TransportFailure> {
        let id: u64 = rand::rng().random();
        let identity = self.identity.read().clone();

        let request = WireRequest {
            id,
            canister: canister.as_str(),
            method,
            args,
            principal: identity.principal(),
            credential: identity.credential().map(|c| c.expose_secret()),
        };

        let mut frame =
            serde_json::to_vec(&request).map_err(|e| TransportFailure::Protocol(e.to_string()))?;
        frame.push(b'\n');

        debug!(endpoint = %self.endpoint, %canister, method, id, "sending request");

        let line = timeout(self.call_timeout, self.exchange(&frame))
            .await
            .map_err(|_| TransportFailure::Timeout(self.call_timeout))??;

        let response: WireResponse = serde_json::from_str(line.trim_end())
            .map_err(|e| TransportFailure::Protocol(e.to_string()))?;

        if response.id != id {
            return Err(TransportFailure::Protocol(format!(
                "reply id {} does not match request id {id}",
                response.id
            )));
        }

        RemoteReply::from_value(response.reply).map_err(|e| TransportFailure::Protocol(e.to_string()))
    }
}

// -----------------------------------------------------------------------------
// ----- TcpAgent: Private -----------------------------------------------------

impl TcpAgent {
    async fn exchange(&self, frame: &[u8]) -> Result<String, TransportFailure> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| TransportFailure::Timeout(self.connect_timeout))?
            .map_err(|e| TransportFailure::Unreachable(format!("{}: {e}", self.endpoint)))?;

        let _ = stream.set_nodelay(true);

        let (reader, mut writer) = stream.into_split();

        writer
            .write_all(frame)
            .await
            .map_err(|e| TransportFailure::Unreachable(format!("write failed: {e}")))?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| TransportFailure::Unreachable(format!("read failed: {e}")))?;

        if n == 0 {
            return Err(TransportFailure::Unreachable(
                "connection closed before reply".to_string(),
            ));
        }

        Ok(line)
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Wire format -------------------------------------------------

#[derive(Serialize)]
struct WireRequest<'a> {
    id: u64,
    canister: &'a str,
    method: &'a str,
    args: &'a [Value],
    principal: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireResponse {
    id: u64,
    reply: Value,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
