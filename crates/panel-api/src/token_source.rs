//! [`TokenSource`] backed by the panel client API.

use std::sync::Arc;

use tracing::debug;

use pteroconsole_connection::{BoxFuture, Credential, FetchReason, TokenError, TokenSource};

use crate::client::Client;

/// Fetches console credentials for one server.
pub struct PanelTokenSource {
    client: Arc<Client>,
    server_id: String,
}

impl PanelTokenSource {
    pub fn new(client: Arc<Client>, server_id: impl Into<String>) -> Self {
        Self {
            client,
            server_id: server_id.into(),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}

impl TokenSource for PanelTokenSource {
    fn fetch(&self, reason: FetchReason) -> BoxFuture<'_, Result<Credential, TokenError>> {
        Box::pin(async move {
            debug!(server = %self.server_id, ?reason, "fetching console token");
            self.client
                .websocket_credentials(&self.server_id)
                .await
                .map(Credential::from)
                .map_err(TokenError::new)
        })
    }
}
