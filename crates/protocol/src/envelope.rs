use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    EVENT_AUTH, EVENT_SEND_COMMAND, EVENT_SEND_LOGS, EVENT_SEND_STATS, EVENT_SET_STATE,
};
use crate::types::PowerAction;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event `{event}` expects at least {expected} argument(s), got {got}")]
    Arity {
        event: String,
        expected: usize,
        got: usize,
    },

    #[error("event `{event}` has a null argument at index {index}")]
    NullArgument { event: String, index: usize },

    #[error("invalid `{event}` payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Envelope for all console socket communication.
///
/// `args` elements are optional because the subscription intents are sent
/// with a single `null` argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    #[serde(default, deserialize_with = "nullable_args")]
    pub args: Vec<Option<String>>,
}

/// Treats `"args": null` like a missing `args`.
fn nullable_args<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Option<String>>, D::Error> {
    Ok(Option::<Vec<Option<String>>>::deserialize(d)?.unwrap_or_default())
}

impl WireEvent {
    /// Creates an event with string arguments.
    pub fn new<I, S>(event: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event: event.into(),
            args: args.into_iter().map(|a| Some(a.into())).collect(),
        }
    }

    /// `auth` carrying the bearer token.
    pub fn auth(token: &str) -> Self {
        Self::new(EVENT_AUTH, [token])
    }

    /// A subscription intent with a single `null` argument.
    pub fn intent(event: &str) -> Self {
        Self {
            event: event.to_string(),
            args: vec![None],
        }
    }

    /// The two intents sent right after `auth success`.
    pub fn subscriptions() -> [Self; 2] {
        [Self::intent(EVENT_SEND_LOGS), Self::intent(EVENT_SEND_STATS)]
    }

    /// `send command` with the raw command text.
    pub fn command(text: &str) -> Self {
        Self::new(EVENT_SEND_COMMAND, [text])
    }

    /// `set state` with the power action.
    pub fn power(action: PowerAction) -> Self {
        Self::new(EVENT_SET_STATE, [action.as_str()])
    }

    /// Serializes the event into a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a text frame. Only the envelope shape is checked here; see
    /// [`InboundEvent::decode`](crate::events::InboundEvent::decode) for
    /// per-event validation.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        if frame.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(serde_json::from_str(frame)?)
    }

    /// Returns `args[index]`, failing on a missing or `null` element.
    pub fn arg(&self, index: usize) -> Result<&str, DecodeError> {
        match self.args.get(index) {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(DecodeError::NullArgument {
                event: self.event.clone(),
                index,
            }),
            None => Err(DecodeError::Arity {
                event: self.event.clone(),
                expected: index + 1,
                got: self.args.len(),
            }),
        }
    }
}
