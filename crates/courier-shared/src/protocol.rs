use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CourierError;
use crate::models::{Message, User};
use crate::types::UserId;

// ---------------------------------------------------------------------------
// REST bodies
// ---------------------------------------------------------------------------

/// `POST /api/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// `POST /api/auth/signup`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
}

/// `POST /api/messages/upload`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_url: String,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Realtime envelope
// ---------------------------------------------------------------------------

/// Announces the local user after every (re)connect. Data: user id string.
pub const EVENT_USER_CONNECTED: &str = "user_connected";
/// Client -> server. Data: the backend-confirmed [`Message`].
pub const EVENT_SEND_MESSAGE: &str = "send_message";
/// Server -> client. Data: a [`Message`] addressed to the local user.
pub const EVENT_RECEIVE_MESSAGE: &str = "receive_message";

/// One realtime frame: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn user_connected(user_id: &UserId) -> Self {
        Self::new(EVENT_USER_CONNECTED, Value::String(user_id.0.clone()))
    }

    pub fn send_message(message: &Message) -> Result<Self, CourierError> {
        Ok(Self::new(EVENT_SEND_MESSAGE, serde_json::to_value(message)?))
    }

    /// Decode the payload of a message-carrying event.
    pub fn message(&self) -> Result<Message, CourierError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            CourierError::Protocol(format!("bad '{}' payload: {e}", self.event))
        })
    }

    pub fn to_text(&self) -> Result<String, CourierError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, CourierError> {
        serde_json::from_str(text)
            .map_err(|e| CourierError::Protocol(format!("malformed realtime frame: {e}")))
    }
}
