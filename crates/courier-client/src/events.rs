use tokio::sync::mpsc;

use courier_shared::{ConnectionState, MessageId, UserId};

pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_UNREAD_CHANGED: &str = "unread-changed";
pub const EVENT_CONNECTION_CHANGED: &str = "connection-changed";
pub const EVENT_SESSION_REJECTED: &str = "session-rejected";
pub const EVENT_INTERNAL_ERROR: &str = "internal-error";

/// Something the front-end should react to, raised outside the input loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    NewMessage { peer: UserId, message_id: MessageId },
    UnreadChanged { peer: UserId, count: usize },
    ConnectionChanged(ConnectionState),
    /// The realtime server refused the token.
    SessionRejected { reason: String },
    InternalError(String),
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => EVENT_NEW_MESSAGE,
            Self::UnreadChanged { .. } => EVENT_UNREAD_CHANGED,
            Self::ConnectionChanged(_) => EVENT_CONNECTION_CHANGED,
            Self::SessionRejected { .. } => EVENT_SESSION_REJECTED,
            Self::InternalError(_) => EVENT_INTERNAL_ERROR,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn deliver(&self, event: UiEvent) -> Result<(), String>;
}

impl EventSink for mpsc::UnboundedSender<UiEvent> {
    fn deliver(&self, event: UiEvent) -> Result<(), String> {
        self.send(event).map_err(|e| e.to_string())
    }
}

pub fn emit_event(sink: &dyn EventSink, event: UiEvent) {
    let name = event.name();
    if let Err(e) = sink.deliver(event) {
        tracing::error!(event = name, error = %e, "Failed to emit event");
    }
}
