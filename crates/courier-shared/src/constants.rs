/// Application name
pub const APP_NAME: &str = "Courier";

/// Default REST backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default realtime endpoint
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:5000/ws";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Maximum attachment size in bytes (50 MiB)
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Key under which the session token is persisted
pub const TOKEN_KEY: &str = "token";

/// REST paths
pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_SIGNUP: &str = "/api/auth/signup";
pub const PATH_USERS: &str = "/api/users";
pub const PATH_MESSAGES: &str = "/api/messages";
pub const PATH_UPLOAD: &str = "/api/messages/upload";

/// Realtime reconnect backoff bounds in milliseconds
pub const RECONNECT_INITIAL_DELAY_MS: u64 = 500;
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;
