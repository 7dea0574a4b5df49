use std::time::Duration;

use thiserror::Error;

/// Every failure a client operation can report.
///
/// Backend calls are classified into `Auth`, `Network` and `Timeout`.
/// `Validation` covers both client-side form checks and backend rejections
/// of the submitted data.
#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Validation(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CourierError {
    /// The backend rejected our credentials or token.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Network failures and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Short text for an inline form error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(msg) | Self::Validation(msg) => msg.clone(),
            Self::Timeout(_) => "The server did not respond in time".to_string(),
            Self::Network(_) => "Could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CourierError>;
