//! Background connection loop.
//!
//! The loop is a phase machine: each iteration takes the current [`Phase`]
//! and returns the next one. Shutdown is checked before every step and wins
//! over whatever the loop was about to do.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use pteroconsole_protocol::{InboundEvent, ResourceSnapshot, ServerLifecycleState, WireEvent};

use crate::dispatch::{self, Directive};
use crate::session::SessionError;
use crate::transport::{Connector, FetchReason, FrameReader, FrameWriter, TokenSource};
use crate::types::{ConnectionState, Credential, ReconnectConfig, SessionEvent};

/// Upper bound on sending the close frame during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared between the session handle and its runner.
///
/// Only the runner publishes; the handle reads the watch channels and
/// writes through `writer`.
pub(crate) struct SessionContext {
    pub(crate) writer: Mutex<Option<Box<dyn FrameWriter>>>,
    pub(crate) connection: watch::Sender<ConnectionState>,
    pub(crate) lifecycle: watch::Sender<ServerLifecycleState>,
    pub(crate) resources: watch::Sender<Arc<ResourceSnapshot>>,
    pub(crate) events_tx: mpsc::UnboundedSender<SessionEvent>,
    pub(crate) cancel: CancellationToken,
}

impl SessionContext {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let ctx = Self {
            writer: Mutex::new(None),
            connection: watch::Sender::new(ConnectionState::Disconnected),
            lifecycle: watch::Sender::new(ServerLifecycleState::default()),
            resources: watch::Sender::new(Arc::new(ResourceSnapshot::default())),
            events_tx,
            cancel: CancellationToken::new(),
        };
        (ctx, events_rx)
    }

    /// Stores the new snapshot, then notifies the consumer.
    pub(crate) fn publish(&self, event: SessionEvent) {
        match &event {
            SessionEvent::ConnectionChanged(state) => {
                self.connection.send_replace(*state);
            }
            SessionEvent::LifecycleChanged(state) => {
                self.lifecycle.send_replace(*state);
            }
            SessionEvent::ResourcesChanged(snapshot) => {
                self.resources.send_replace(snapshot.clone());
            }
            SessionEvent::Output(_) | SessionEvent::Diagnostic(_) => {}
        }
        let _ = self.events_tx.send(event);
    }

    /// Publishes a connection state change, skipping no-op transitions.
    pub(crate) fn set_connection(&self, state: ConnectionState) {
        if *self.connection.borrow() != state {
            self.publish(SessionEvent::ConnectionChanged(state));
        }
    }

    fn diagnostic(&self, message: String) {
        self.publish(SessionEvent::Diagnostic(message));
    }

    /// Writes one event through the shared writer. Returns `false` when no
    /// transport is live.
    pub(crate) async fn write(&self, event: &WireEvent) -> Result<bool, SessionError> {
        let frame = event.encode()?;
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => {
                writer.send(frame).await?;
                trace!(event = %event.event, "frame sent");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Like [`write`](Self::write), but only while authenticated. The state
    /// is read under the writer lock, so a socket swapped in by a reconnect
    /// is never written before its own `auth success`.
    pub(crate) async fn write_authenticated(
        &self,
        event: &WireEvent,
    ) -> Result<bool, SessionError> {
        let frame = event.encode()?;
        let mut guard = self.writer.lock().await;
        if *self.connection.borrow() != ConnectionState::Authenticated {
            debug!(event = %event.event, "not authenticated, dropping outbound event");
            return Ok(false);
        }
        match guard.as_mut() {
            Some(writer) => {
                writer.send(frame).await?;
                trace!(event = %event.event, "frame sent");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Takes the writer out of the shared slot and closes it.
    pub(crate) async fn close_writer(&self) {
        let writer = self.writer.lock().await.take();
        let Some(mut writer) = writer else {
            return;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, writer.close())
            .await
            .is_err()
        {
            debug!("close frame timed out");
        }
    }
}

enum Phase {
    /// Fetch credentials for a new attempt.
    Acquire,
    /// Open the socket and send `auth`.
    Open(Credential),
    /// Wait for and interpret the next frame.
    Listen(Box<dyn FrameReader>),
    /// Close and drop the transport.
    Teardown {
        reader: Option<Box<dyn FrameReader>>,
        cause: &'static str,
    },
    /// Wait before the next attempt.
    Backoff,
    Terminated,
}

impl Phase {
    fn shutdown(self) -> Self {
        match self {
            Phase::Listen(reader) => Phase::Teardown {
                reader: Some(reader),
                cause: "shutdown",
            },
            Phase::Acquire | Phase::Open(_) | Phase::Backoff => Phase::Teardown {
                reader: None,
                cause: "shutdown",
            },
            other => other,
        }
    }
}

/// Drives one session until shutdown.
pub(crate) struct Runner {
    pub(crate) ctx: Arc<SessionContext>,
    pub(crate) source: Arc<dyn TokenSource>,
    pub(crate) connector: Arc<dyn Connector>,
    /// `Origin` header value.
    pub(crate) origin: String,
    pub(crate) reconnect: ReconnectConfig,
    /// Attempts since the last successful authentication.
    pub(crate) attempt: u32,
}

impl Runner {
    pub(crate) async fn run(mut self) {
        let mut phase = Phase::Acquire;
        loop {
            if self.ctx.cancel.is_cancelled() {
                phase = phase.shutdown();
            }
            phase = match phase {
                Phase::Acquire => self.acquire().await,
                Phase::Open(credential) => self.open(credential).await,
                Phase::Listen(reader) => self.listen(reader).await,
                Phase::Teardown { reader, cause } => self.teardown(reader, cause).await,
                Phase::Backoff => self.backoff().await,
                Phase::Terminated => break,
            };
        }
        info!("session runner stopped");
    }

    async fn acquire(&mut self) -> Phase {
        self.ctx.set_connection(ConnectionState::Connecting);

        let fetched = tokio::select! {
            _ = self.ctx.cancel.cancelled() => None,
            r = self.source.fetch(FetchReason::Connect) => Some(r),
        };
        match fetched {
            None => Phase::Teardown {
                reader: None,
                cause: "shutdown",
            },
            Some(Ok(credential)) => {
                debug!(socket = %credential.socket_url, "credentials acquired");
                Phase::Open(credential)
            }
            Some(Err(e)) => {
                warn!(error = %e, "credential fetch failed");
                self.ctx.diagnostic(format!("credential fetch failed: {e}"));
                Phase::Teardown {
                    reader: None,
                    cause: "credential fetch failed",
                }
            }
        }
    }

    async fn open(&mut self, credential: Credential) -> Phase {
        let headers = vec![
            ("Origin".to_string(), self.origin.clone()),
            (
                "Authorization".to_string(),
                format!("Bearer {}", credential.token),
            ),
        ];

        let opened = tokio::select! {
            _ = self.ctx.cancel.cancelled() => None,
            r = self.connector.connect(&credential.socket_url, &headers) => Some(r),
        };
        let (reader, writer) = match opened {
            None => {
                return Phase::Teardown {
                    reader: None,
                    cause: "shutdown",
                };
            }
            Some(Err(e)) => {
                warn!(socket = %credential.socket_url, error = %e, "connection failed");
                self.ctx.diagnostic(format!("connection failed: {e}"));
                return Phase::Teardown {
                    reader: None,
                    cause: "connection failed",
                };
            }
            Some(Ok(link)) => link,
        };

        {
            let mut slot = self.ctx.writer.lock().await;
            *slot = Some(writer);
            self.ctx.set_connection(ConnectionState::Authenticating);
        }

        match self.send(&WireEvent::auth(&credential.token)).await {
            Ok(()) => Phase::Listen(reader),
            Err(e) => {
                warn!(error = %e, "failed to send auth");
                Phase::Teardown {
                    reader: Some(reader),
                    cause: "auth send failed",
                }
            }
        }
    }

    async fn listen(&mut self, mut reader: Box<dyn FrameReader>) -> Phase {
        let received = tokio::select! {
            _ = self.ctx.cancel.cancelled() => None,
            r = reader.recv() => Some(r),
        };
        let cause = match received {
            None => Some("shutdown"),
            Some(Ok(Some(frame))) => self.handle_frame(&frame).await,
            Some(Ok(None)) => Some("closed by peer"),
            Some(Err(e)) => {
                warn!(error = %e, "receive failed");
                Some("receive failed")
            }
        };
        match cause {
            None => Phase::Listen(reader),
            Some(cause) => Phase::Teardown {
                reader: Some(reader),
                cause,
            },
        }
    }

    /// Interprets one frame. Returns a cause when the connection must end.
    async fn handle_frame(&mut self, frame: &str) -> Option<&'static str> {
        let event = match InboundEvent::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "ignoring undecodable frame");
                self.ctx.diagnostic(format!("undecodable frame: {e}"));
                return None;
            }
        };
        if let InboundEvent::Unknown(name) = &event {
            trace!(event = %name, "ignoring unhandled event");
        }

        let connection = *self.ctx.connection.borrow();
        let lifecycle = *self.ctx.lifecycle.borrow();
        let reaction = dispatch::interpret(event, connection, lifecycle);
        for update in reaction.updates {
            self.ctx.publish(update);
        }

        match reaction.directive {
            Directive::Continue => None,
            Directive::Subscribe => {
                self.attempt = 0;
                info!("authenticated");
                for intent in WireEvent::subscriptions() {
                    if let Err(e) = self.send(&intent).await {
                        warn!(event = %intent.event, error = %e, "failed to send intent");
                        return Some("subscribe failed");
                    }
                }
                None
            }
            Directive::RefreshToken => self.refresh().await,
            Directive::Reconnect(cause) => {
                info!(cause, "daemon rejected token");
                Some(cause)
            }
        }
    }

    /// Re-authenticates the live socket with a fresh token.
    async fn refresh(&mut self) -> Option<&'static str> {
        let fetched = tokio::select! {
            _ = self.ctx.cancel.cancelled() => None,
            r = self.source.fetch(FetchReason::Refresh) => Some(r),
        };
        match fetched {
            None => Some("shutdown"),
            Some(Ok(credential)) => match self.send(&WireEvent::auth(&credential.token)).await {
                Ok(()) => {
                    debug!("token refreshed");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "failed to send refreshed auth");
                    Some("refresh send failed")
                }
            },
            Some(Err(e)) => {
                warn!(error = %e, "token refresh failed");
                self.ctx.diagnostic(format!("token refresh failed: {e}"));
                Some("token refresh failed")
            }
        }
    }

    async fn teardown(
        &mut self,
        reader: Option<Box<dyn FrameReader>>,
        cause: &'static str,
    ) -> Phase {
        self.ctx.close_writer().await;
        drop(reader);
        self.ctx.set_connection(ConnectionState::Disconnected);
        debug!(cause, "connection closed");

        if self.ctx.cancel.is_cancelled() {
            return Phase::Terminated;
        }
        self.attempt = self.attempt.saturating_add(1);
        Phase::Backoff
    }

    async fn backoff(&mut self) -> Phase {
        let attempt = self.attempt;
        let delay = self.reconnect.delay_for_attempt(attempt);
        self.ctx
            .set_connection(ConnectionState::Reconnecting { attempt });
        info!(
            attempt,
            delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
            "reconnecting"
        );

        tokio::select! {
            _ = self.ctx.cancel.cancelled() => Phase::Teardown {
                reader: None,
                cause: "shutdown",
            },
            _ = tokio::time::sleep(delay) => Phase::Acquire,
        }
    }

    async fn send(&self, event: &WireEvent) -> Result<(), SessionError> {
        let written = tokio::select! {
            _ = self.ctx.cancel.cancelled() => return Err(SessionError::Terminated),
            r = self.ctx.write(event) => r?,
        };
        if written {
            Ok(())
        } else {
            Err(SessionError::Transport(
                crate::transport::TransportError::Closed,
            ))
        }
    }
}
