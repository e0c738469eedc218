//! Transport and token source seams.
//!
//! The session only talks to the network through these traits, so the state
//! machine can be driven by in-memory fakes in tests.

use std::future::Future;
use std::pin::Pin;

use tokio_tungstenite::tungstenite;

use crate::types::Credential;

/// A boxed future returned by transport and token source methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("connection closed")]
    Closed,
}

/// Receiving half of an open transport. Owned exclusively by the session
/// runner.
pub trait FrameReader: Send {
    /// Waits for the next text frame. `Ok(None)` means the peer closed the
    /// connection.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>>;
}

/// Sending half of an open transport.
pub trait FrameWriter: Send {
    /// Writes one text frame.
    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Sends a close frame. Errors are ignored; the transport is discarded
    /// afterwards either way.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// An opened transport split into its two halves.
pub type Link = (Box<dyn FrameReader>, Box<dyn FrameWriter>);

/// Opens transports.
pub trait Connector: Send + Sync + 'static {
    fn connect<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Link, TransportError>>;
}

/// Why the session is asking for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// A new connection attempt.
    Connect,
    /// The daemon reported `token expiring` on a live socket.
    Refresh,
}

/// Error returned by a [`TokenSource`].
#[derive(Debug, thiserror::Error)]
#[error("token source failed: {0}")]
pub struct TokenError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl TokenError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

/// Produces socket credentials.
pub trait TokenSource: Send + Sync + 'static {
    fn fetch(&self, reason: FetchReason) -> BoxFuture<'_, Result<Credential, TokenError>>;
}
