//! Console session handle.
//!
//! A [`ConsoleSession`] owns one background runner that keeps a socket to the
//! daemon alive: it fetches credentials, authenticates, subscribes to logs and
//! stats, refreshes the token in place, and reconnects with backoff whenever
//! the socket or the token dies. The handle exposes the latest published
//! state and accepts outbound commands while authenticated.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::{debug, info, warn};

use pteroconsole_protocol::{PowerAction, ResourceSnapshot, ServerLifecycleState, WireEvent};

use crate::runner::{Runner, SessionContext};
use crate::transport::{Connector, TokenSource, TransportError};
use crate::types::{ConnectionState, SessionConfig, SessionEvent};

/// Errors returned by [`ConsoleSession`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid panel URL {url:?}: {reason}")]
    InvalidPanelUrl { url: String, reason: String },

    #[error("session already started")]
    AlreadyStarted,

    #[error("session has been shut down")]
    Terminated,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

enum RunnerSlot {
    Idle(Runner),
    Running(JoinHandle<()>),
    Stopped,
}

/// A self-healing console connection to one server.
pub struct ConsoleSession {
    ctx: Arc<SessionContext>,
    slot: std::sync::Mutex<RunnerSlot>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    shutdown_grace: Duration,
}

impl ConsoleSession {
    /// Creates an idle session. Nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn new(
        config: SessionConfig,
        token_source: impl TokenSource,
        connector: impl Connector,
    ) -> Result<Self, SessionError> {
        Self::with_shared(config, Arc::new(token_source), Arc::new(connector))
    }

    /// Like [`new`](Self::new) but accepts already shared collaborators.
    pub fn with_shared(
        config: SessionConfig,
        token_source: Arc<dyn TokenSource>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, SessionError> {
        let origin = panel_origin(&config.panel_url)?;
        let (ctx, events_rx) = SessionContext::new();
        let ctx = Arc::new(ctx);

        let runner = Runner {
            ctx: ctx.clone(),
            source: token_source,
            connector,
            origin,
            reconnect: config.reconnect,
            attempt: 0,
        };

        Ok(Self {
            ctx,
            slot: std::sync::Mutex::new(RunnerSlot::Idle(runner)),
            events_rx: Mutex::new(Some(events_rx)),
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Starts the background runner. Must be called from within a Tokio
    /// runtime.
    pub fn connect(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, RunnerSlot::Stopped) {
            RunnerSlot::Idle(runner) => {
                info!("starting console session");
                *slot = RunnerSlot::Running(tokio::spawn(runner.run()));
                Ok(())
            }
            RunnerSlot::Running(handle) => {
                *slot = RunnerSlot::Running(handle);
                Err(SessionError::AlreadyStarted)
            }
            RunnerSlot::Stopped => Err(SessionError::Terminated),
        }
    }

    /// Stops the session and closes the socket.
    ///
    /// Waits up to the configured grace period for the runner to close the
    /// socket itself, then aborts it and closes the socket directly. The
    /// session cannot be restarted afterwards. Calling this more than once
    /// is a no-op.
    pub async fn disconnect(&self) {
        self.ctx.cancel.cancel();
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, RunnerSlot::Stopped)
        };

        let RunnerSlot::Running(mut handle) = previous else {
            return;
        };
        match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
            Ok(_) => debug!("runner stopped"),
            Err(_) => {
                warn!(
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "runner did not stop in time, forcing close"
                );
                handle.abort();
                let _ = handle.await;
                self.ctx.close_writer().await;
                self.ctx.set_connection(ConnectionState::Disconnected);
            }
        }
        info!("console session shut down");
    }

    /// Sends a console command. Returns `Ok(false)` without writing when the
    /// session is not authenticated.
    pub async fn send_command(&self, command: &str) -> Result<bool, SessionError> {
        self.send_authenticated(WireEvent::command(command)).await
    }

    /// Requests a power action. Returns `Ok(false)` without writing when the
    /// session is not authenticated.
    pub async fn set_power_state(&self, action: PowerAction) -> Result<bool, SessionError> {
        self.send_authenticated(WireEvent::power(action)).await
    }

    async fn send_authenticated(&self, event: WireEvent) -> Result<bool, SessionError> {
        self.ctx.write_authenticated(&event).await
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.lock().await.take()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.ctx.connection.borrow()
    }

    pub fn lifecycle_state(&self) -> ServerLifecycleState {
        *self.ctx.lifecycle.borrow()
    }

    /// Latest resource snapshot. All zeros until the first `stats` frame.
    pub fn resources(&self) -> Arc<ResourceSnapshot> {
        self.ctx.resources.borrow().clone()
    }

    /// Watches connection state changes without consuming the event stream.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.ctx.connection.subscribe()
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.ctx.cancel.cancel();
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let RunnerSlot::Running(handle) = slot {
            handle.abort();
        }
    }
}

/// `https://<panel host>`, sent as the socket `Origin`.
fn panel_origin(panel_url: &str) -> Result<String, SessionError> {
    let invalid = |reason: String| SessionError::InvalidPanelUrl {
        url: panel_url.to_string(),
        reason,
    };
    let uri: Uri = panel_url.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    let host = uri
        .host()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host".into()))?;
    Ok(format!("https://{host}"))
}
