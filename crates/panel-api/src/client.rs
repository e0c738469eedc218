//! Panel client API.
//!
//! Async HTTP client using `reqwest` with Bearer client-key authentication.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use pteroconsole_protocol::constants::PANEL_ACCEPT;

use crate::types::{ApiResponse, WebsocketCredentials};

/// Characters escaped in a server identifier path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Errors from the panel client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid client API key")]
    InvalidKey,

    #[error("invalid panel URL: {0}")]
    InvalidUrl(String),
}

/// Panel client API client.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a new client for the panel at `panel_url`, authenticating
    /// with a client API key.
    pub fn new(panel_url: &str, client_key: &str) -> Result<Self, Error> {
        let base_url = panel_url.trim().trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(Error::InvalidUrl(format!("{base_url}: missing host")));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {client_key}"))
                .map_err(|_| Error::InvalidKey)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(PANEL_ACCEPT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Panel base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<Vec<u8>, Error> {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Requests a fresh socket token and URL for a server.
    pub async fn websocket_credentials(
        &self,
        server_id: &str,
    ) -> Result<WebsocketCredentials, Error> {
        let encoded = utf8_percent_encode(server_id, SEGMENT).to_string();
        debug!(server = %server_id, "requesting websocket credentials");
        let body = self
            .get(&format!("/api/client/servers/{encoded}/websocket"))
            .await?;
        let resp: ApiResponse<WebsocketCredentials> = serde_json::from_slice(&body)?;
        Ok(resp.data)
    }
}
