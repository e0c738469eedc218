//! Wire protocol for the daemon console WebSocket.
//!
//! Every frame is a JSON envelope `{"event": "...", "args": [...]}`.
//! Structured payloads (resource stats) travel JSON-encoded inside `args[0]`.

pub mod constants;
pub mod envelope;
pub mod events;
pub mod stats;
pub mod types;

pub use envelope::{DecodeError, WireEvent};
pub use events::{InboundEvent, OutputSource};
pub use stats::{NetworkStats, ResourceSnapshot};
pub use types::{PowerAction, ServerLifecycleState, UnknownPowerAction};
