//! Client configuration loaded from environment variables.
//!
//! Every setting has a default pointing at a local development backend, so
//! the client starts with zero configuration. Command-line flags are applied
//! on top by `main`.

use std::path::PathBuf;
use std::time::Duration;

use courier_net::{ChannelConfig, ReconnectPolicy};
use courier_shared::constants::{
    DEFAULT_API_URL, DEFAULT_REALTIME_URL, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_UPLOAD_SIZE,
};
use courier_shared::Envelope;

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the REST backend.
    /// Env: `COURIER_API_URL`
    /// Default: `http://localhost:5000`
    pub api_url: String,

    /// WebSocket endpoint of the realtime server.
    /// Env: `COURIER_REALTIME_URL`
    /// Default: `ws://localhost:5000/ws`
    pub realtime_url: String,

    /// Upper bound on every backend call.
    /// Env: `COURIER_REQUEST_TIMEOUT_SECS`
    /// Default: 15 seconds.
    pub request_timeout: Duration,

    /// Whether the realtime channel reconnects after a drop.
    /// Env: `COURIER_RECONNECT` (true/false)
    /// Default: `true`
    pub reconnect: bool,

    /// Location of the SQLite database holding the session token.
    /// Env: `COURIER_DB_PATH`
    /// Default: `None` (platform data directory).
    pub db_path: Option<PathBuf>,

    /// Largest attachment accepted by the composer.
    /// Env: `COURIER_MAX_UPLOAD_BYTES`
    /// Default: 50 MiB.
    pub max_upload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            reconnect: true,
            db_path: None,
            max_upload_size: MAX_UPLOAD_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = var("COURIER_API_URL") {
            config.api_url = url;
        }

        if let Some(url) = var("COURIER_REALTIME_URL") {
            config.realtime_url = url;
        }

        if let Some(val) = var("COURIER_REQUEST_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(
                        value = %val,
                        "Invalid COURIER_REQUEST_TIMEOUT_SECS, using default"
                    );
                }
            }
        }

        if let Some(val) = var("COURIER_RECONNECT") {
            config.reconnect = val != "false" && val != "0";
        }

        if let Some(path) = var("COURIER_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = var("COURIER_MAX_UPLOAD_BYTES") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_upload_size = n;
            } else {
                tracing::warn!(value = %val, "Invalid COURIER_MAX_UPLOAD_BYTES, using default");
            }
        }

        config
    }

    /// Realtime channel settings for one authenticated session.
    pub fn channel_config(&self, token: &str, hello: Option<Envelope>) -> ChannelConfig {
        let mut channel = ChannelConfig::new(self.realtime_url.clone(), token);
        channel.hello = hello;
        channel.connect_timeout = self.request_timeout;
        channel.reconnect = if self.reconnect {
            ReconnectPolicy::default()
        } else {
            ReconnectPolicy::disabled()
        };
        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.reconnect);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = load(&[
            ("COURIER_API_URL", "https://chat.example.org"),
            ("COURIER_REQUEST_TIMEOUT_SECS", "3"),
            ("COURIER_RECONNECT", "false"),
            ("COURIER_DB_PATH", "/tmp/courier.db"),
        ]);
        assert_eq!(config.api_url, "https://chat.example.org");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(!config.reconnect);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/courier.db")));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("COURIER_REQUEST_TIMEOUT_SECS", "soon"),
            ("COURIER_MAX_UPLOAD_BYTES", "-1"),
        ]);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    }

    #[test]
    fn test_channel_config_follows_reconnect_flag() {
        let mut config = ClientConfig::default();
        assert!(config.channel_config("t", None).reconnect.enabled);

        config.reconnect = false;
        let channel = config.channel_config("t", None);
        assert!(!channel.reconnect.enabled);
        assert_eq!(channel.token, "t");
        assert_eq!(channel.url, DEFAULT_REALTIME_URL);
    }
}
