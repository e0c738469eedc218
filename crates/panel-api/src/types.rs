//! Response types for the panel client API.

use serde::{Deserialize, Serialize};

use pteroconsole_connection::Credential;

/// Generic `{ "data": ... }` wrapper used by the client API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

/// Body of `GET /api/client/servers/{id}/websocket`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsocketCredentials {
    pub token: String,
    /// Daemon socket URL, `wss://…/api/servers/{uuid}/ws`.
    pub socket: String,
}

impl std::fmt::Debug for WebsocketCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebsocketCredentials")
            .field("token", &"<redacted>")
            .field("socket", &self.socket)
            .finish()
    }
}

impl From<WebsocketCredentials> for Credential {
    fn from(c: WebsocketCredentials) -> Self {
        Credential {
            token: c.token,
            socket_url: c.socket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_websocket_response() {
        let json = r#"{"data":{"token":"eyJ0eXAi","socket":"wss://node.example.com:8080/api/servers/abc/ws"}}"#;
        let resp: ApiResponse<WebsocketCredentials> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.token, "eyJ0eXAi");

        let cred: Credential = resp.data.into();
        assert_eq!(
            cred.socket_url,
            "wss://node.example.com:8080/api/servers/abc/ws"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let creds = WebsocketCredentials {
            token: "secret".into(),
            socket: "wss://node/ws".into(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn missing_socket_is_rejected() {
        let json = r#"{"data":{"token":"t"}}"#;
        assert!(serde_json::from_str::<ApiResponse<WebsocketCredentials>>(json).is_err());
    }
}
