pub mod agent;
pub mod reply;
pub mod tcp_agent;

pub use agent::{Agent, MALFORMED_REPLY_CODE, TransportFailure};
pub use reply::{REMOTE_ERROR_CODE, RemoteFault, RemoteReply};
pub use tcp_agent::TcpAgent;
