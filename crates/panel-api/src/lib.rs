//! Panel client API.
//!
//! Exchanges a client API key for the short-lived token and socket URL that
//! open a server console.

pub mod client;
pub mod token_source;
pub mod types;

pub use client::{Client, Error};
pub use token_source::PanelTokenSource;
pub use types::WebsocketCredentials;
