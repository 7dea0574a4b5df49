//! Data model exchanged with the backend.
//!
//! Field names follow the backend's JSON (camelCase, `_id` primary keys).
//! Every struct is read-only to the client: users and messages are created
//! by the backend and never edited locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user as listed by the directory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// What a message carries. Text messages use `content`, every other kind
/// uses `file_url`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Document,
}

impl MessageKind {
    /// Classify an attachment by its declared media type.
    pub fn from_media_type(media_type: &str) -> Self {
        let media_type = media_type.trim().to_ascii_lowercase();
        if media_type.starts_with("image/") {
            Self::Image
        } else if media_type.starts_with("video/") {
            Self::Video
        } else {
            Self::Document
        }
    }

    /// Kind for a composed message: text when nothing is attached.
    pub fn for_attachment(attachment: Option<&Attachment>) -> Self {
        attachment
            .map(|a| Self::from_media_type(&a.media_type))
            .unwrap_or(Self::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    pub fn is_file(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A message confirmed by the backend.
///
/// This is also the canonical realtime payload: `send_message` and
/// `receive_message` both carry a full `Message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    pub sender: UserId,
    pub recipient: UserId,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Server-assigned creation time, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// The other participant of this message from `own`'s point of view.
    pub fn counterpart(&self, own: &UserId) -> &UserId {
        if &self.sender == own {
            &self.recipient
        } else {
            &self.sender
        }
    }

    /// Whether this message belongs to the one-to-one thread with `peer`.
    pub fn involves(&self, peer: &UserId) -> bool {
        &self.sender == peer || &self.recipient == peer
    }
}

/// Body of `POST /api/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub recipient_id: UserId,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub file_url: String,
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// A file picked in the composer, held in memory until it is uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_media_type(&self.media_type)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// Keep file contents out of logs.
impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}
