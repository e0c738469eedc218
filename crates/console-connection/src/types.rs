//! Public types for the console session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pteroconsole_protocol::{ResourceSnapshot, ServerLifecycleState};

/// Transport/authentication phase of the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live socket.
    Disconnected,
    /// Fetching credentials and opening the socket.
    Connecting,
    /// Socket open, `auth` sent, waiting for `auth success`.
    Authenticating,
    /// Authenticated; outbound operations are accepted.
    Authenticated,
    /// Waiting out the backoff before the next attempt.
    Reconnecting { attempt: u32 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
        }
    }
}

/// Notifications emitted by the session, in the order their triggering
/// frames were received.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionChanged(ConnectionState),
    LifecycleChanged(ServerLifecycleState),
    ResourcesChanged(Arc<ResourceSnapshot>),
    /// One line of console, install, or daemon output.
    Output(String),
    /// Human-readable description of an internal failure.
    Diagnostic(String),
}

/// Short-lived socket credentials issued by the panel.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub socket_url: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("socket_url", &self.socket_url)
            .finish()
    }
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.05);
        Duration::from_secs_f64(with_jitter)
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Panel base URL; its host becomes the socket `Origin`.
    pub panel_url: String,
    pub reconnect: ReconnectConfig,
    /// How long `disconnect` waits for the runner to close cooperatively
    /// before forcing the socket shut.
    pub shutdown_grace: Duration,
}

impl SessionConfig {
    pub fn new(panel_url: impl Into<String>) -> Self {
        Self {
            panel_url: panel_url.into(),
            reconnect: ReconnectConfig::default(),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}
