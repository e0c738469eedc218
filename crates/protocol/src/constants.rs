//! Event names and header values used by the daemon console socket.

/// Authenticates the socket with a short-lived bearer token.
pub const EVENT_AUTH: &str = "auth";
/// Acknowledges a successful `auth`.
pub const EVENT_AUTH_SUCCESS: &str = "auth success";
/// The token sent with `auth` was rejected.
pub const EVENT_JWT_ERROR: &str = "jwt error";
/// The token has expired; the socket must be re-established.
pub const EVENT_TOKEN_EXPIRED: &str = "token expired";
/// The token is about to expire and should be refreshed in place.
pub const EVENT_TOKEN_EXPIRING: &str = "token expiring";

/// Requests the console log backlog and live output.
pub const EVENT_SEND_LOGS: &str = "send logs";
/// Requests periodic resource usage updates.
pub const EVENT_SEND_STATS: &str = "send stats";
/// Writes a line to the managed process's stdin.
pub const EVENT_SEND_COMMAND: &str = "send command";
/// Requests a power state change.
pub const EVENT_SET_STATE: &str = "set state";

/// Resource usage snapshot (JSON-encoded in `args[0]`).
pub const EVENT_STATS: &str = "stats";
/// Lifecycle state string in `args[0]`.
pub const EVENT_STATUS: &str = "status";
pub const EVENT_CONSOLE_OUTPUT: &str = "console output";
pub const EVENT_INSTALL_OUTPUT: &str = "install output";
pub const EVENT_DAEMON_MESSAGE: &str = "daemon message";
pub const EVENT_INSTALL_STARTED: &str = "install started";
pub const EVENT_INSTALL_COMPLETED: &str = "install completed";

/// `Accept` header value expected by the panel client API.
pub const PANEL_ACCEPT: &str = "application/vnd.pterodactyl.v1+json";
