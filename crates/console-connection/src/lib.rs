//! Self-healing console connection to a game server daemon.
//!
//! Authenticates a WebSocket with short-lived panel tokens, refreshes the
//! token in place, reconnects with backoff when the socket or token dies,
//! and publishes lifecycle, resource and output updates.

mod dispatch;
pub(crate) mod runner;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;
pub mod types;
pub mod ws_transport;

pub use session::{ConsoleSession, SessionError};
pub use transport::{
    BoxFuture, Connector, FetchReason, FrameReader, FrameWriter, Link, TokenError, TokenSource,
    TransportError,
};
pub use types::{ConnectionState, Credential, ReconnectConfig, SessionConfig, SessionEvent};
pub use ws_transport::WsConnector;
