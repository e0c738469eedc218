//! Maps decoded daemon events to state updates and follow-up actions.
//!
//! Kept free of I/O so ordering rules can be tested without a socket.

use std::sync::Arc;

use pteroconsole_protocol::{InboundEvent, ServerLifecycleState};

use crate::types::{ConnectionState, SessionEvent};

/// What the runner must do after publishing a reaction's updates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Directive {
    /// Keep listening.
    Continue,
    /// Send the `send logs` / `send stats` intents.
    Subscribe,
    /// Fetch a fresh token and re-send `auth` on the same socket.
    RefreshToken,
    /// Close the socket and start over.
    Reconnect(&'static str),
}

/// Updates to publish, in order, followed by a directive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reaction {
    pub(crate) updates: Vec<SessionEvent>,
    pub(crate) directive: Directive,
}

impl Reaction {
    fn publish(updates: Vec<SessionEvent>) -> Self {
        Self {
            updates,
            directive: Directive::Continue,
        }
    }

    fn act(directive: Directive) -> Self {
        Self {
            updates: Vec::new(),
            directive,
        }
    }
}

/// Interprets one inbound event against the last published states.
pub(crate) fn interpret(
    event: InboundEvent,
    connection: ConnectionState,
    lifecycle: ServerLifecycleState,
) -> Reaction {
    match event {
        // A refreshed token is acknowledged the same way; only the state
        // publish is skipped, the intents always follow.
        InboundEvent::AuthSuccess => Reaction {
            updates: (connection != ConnectionState::Authenticated)
                .then_some(SessionEvent::ConnectionChanged(
                    ConnectionState::Authenticated,
                ))
                .into_iter()
                .collect(),
            directive: Directive::Subscribe,
        },
        InboundEvent::JwtError(reason) => Reaction {
            updates: reason
                .map(|r| SessionEvent::Diagnostic(format!("jwt error: {r}")))
                .into_iter()
                .collect(),
            directive: Directive::Reconnect("jwt error"),
        },
        InboundEvent::TokenExpired => Reaction::act(Directive::Reconnect("token expired")),
        InboundEvent::TokenExpiring => Reaction::act(Directive::RefreshToken),
        InboundEvent::Stats(snapshot) => {
            let derived = snapshot.lifecycle();
            let mut updates = Vec::with_capacity(2);
            if derived != lifecycle {
                updates.push(SessionEvent::LifecycleChanged(derived));
            }
            updates.push(SessionEvent::ResourcesChanged(Arc::new(snapshot)));
            Reaction::publish(updates)
        }
        InboundEvent::Status(derived) if derived != lifecycle => {
            Reaction::publish(vec![SessionEvent::LifecycleChanged(derived)])
        }
        InboundEvent::Status(_) => Reaction::publish(Vec::new()),
        InboundEvent::Output { lines, .. } => {
            Reaction::publish(lines.into_iter().map(SessionEvent::Output).collect())
        }
        InboundEvent::InstallStarted => Reaction::publish(vec![SessionEvent::LifecycleChanged(
            ServerLifecycleState::Installing,
        )]),
        InboundEvent::InstallCompleted => Reaction::publish(vec![
            SessionEvent::LifecycleChanged(ServerLifecycleState::Offline),
        ]),
        InboundEvent::Unknown(_) => Reaction::publish(Vec::new()),
    }
}
