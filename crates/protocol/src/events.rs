//! Typed view of inbound daemon events with per-event arity validation.

use crate::constants::*;
use crate::envelope::{DecodeError, WireEvent};
use crate::stats::ResourceSnapshot;
use crate::types::ServerLifecycleState;

/// Which output stream a batch of lines came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Console,
    Install,
    Daemon,
}

/// An event received from the daemon.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    AuthSuccess,
    /// The token was rejected. Carries the daemon's reason, if any.
    JwtError(Option<String>),
    TokenExpired,
    TokenExpiring,
    Stats(ResourceSnapshot),
    Status(ServerLifecycleState),
    /// One entry per line, in order. `null` elements become empty lines.
    Output {
        source: OutputSource,
        lines: Vec<String>,
    },
    InstallStarted,
    InstallCompleted,
    /// Anything this client does not interpret.
    Unknown(String),
}

impl InboundEvent {
    /// Decodes a text frame into a typed event.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        Self::try_from(WireEvent::decode(frame)?)
    }
}

impl TryFrom<WireEvent> for InboundEvent {
    type Error = DecodeError;

    fn try_from(ev: WireEvent) -> Result<Self, Self::Error> {
        let event = match ev.event.as_str() {
            EVENT_AUTH_SUCCESS => Self::AuthSuccess,
            EVENT_JWT_ERROR => Self::JwtError(ev.args.into_iter().flatten().next()),
            EVENT_TOKEN_EXPIRED => Self::TokenExpired,
            EVENT_TOKEN_EXPIRING => Self::TokenExpiring,
            EVENT_STATS => {
                let raw = ev.arg(0)?;
                let snapshot =
                    serde_json::from_str(raw).map_err(|source| DecodeError::Payload {
                        event: ev.event.clone(),
                        source,
                    })?;
                Self::Stats(snapshot)
            }
            EVENT_STATUS => Self::Status(ServerLifecycleState::from_wire(ev.arg(0)?)),
            EVENT_CONSOLE_OUTPUT => output(OutputSource::Console, ev.args),
            EVENT_INSTALL_OUTPUT => output(OutputSource::Install, ev.args),
            EVENT_DAEMON_MESSAGE => output(OutputSource::Daemon, ev.args),
            EVENT_INSTALL_STARTED => Self::InstallStarted,
            EVENT_INSTALL_COMPLETED => Self::InstallCompleted,
            _ => Self::Unknown(ev.event),
        };
        Ok(event)
    }
}

fn output(source: OutputSource, args: Vec<Option<String>>) -> InboundEvent {
    InboundEvent::Output {
        source,
        lines: args.into_iter().map(Option::unwrap_or_default).collect(),
    }
}
