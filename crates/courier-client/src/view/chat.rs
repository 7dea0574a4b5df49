//! View models for the chat route: directory pane, thread pane, composer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use courier_shared::{Message, MessageKind, User, UserId};

use crate::conversation::{Composer, ConversationState};
use crate::directory::Directory;

pub const THREAD_PLACEHOLDER: &str = "Select a user to start chatting";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// One-based, as typed in `/open N`.
    pub number: usize,
    pub name: String,
    pub email: String,
    pub profile_pic: Option<String>,
    pub selected: bool,
    pub unread: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryView {
    pub entries: Vec<DirectoryEntry>,
    pub error: Option<String>,
}

impl DirectoryView {
    pub fn build(
        directory: &Directory,
        selected: Option<&UserId>,
        unread: &HashMap<UserId, usize>,
    ) -> Self {
        let entries = directory
            .users()
            .iter()
            .enumerate()
            .map(|(i, user)| DirectoryEntry {
                number: i + 1,
                name: user.name.clone(),
                email: user.email.clone(),
                profile_pic: user.profile_pic.clone(),
                selected: Some(&user.id) == selected,
                unread: unread.get(&user.id).copied().unwrap_or(0),
            })
            .collect();

        Self {
            entries,
            error: directory.last_error().map(str::to_string),
        }
    }
}

/// What a thread line shows. File kinds carry only the file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Image(String),
    Video(String),
    Document(String),
}

impl MessageBody {
    pub fn from_message(message: &Message) -> Self {
        if !message.kind.is_file() {
            return Self::Text(message.content.clone().unwrap_or_default());
        }
        let file = message.file_url.clone().unwrap_or_default();
        match message.kind {
            MessageKind::Image => Self::Image(file),
            MessageKind::Video => Self::Video(file),
            _ => Self::Document(file),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLine {
    pub own: bool,
    pub body: MessageBody,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    /// "Chat with {name}", or `None` with no peer selected.
    pub header: Option<String>,
    pub lines: Vec<ThreadLine>,
    pub loading: bool,
}

impl ThreadView {
    pub fn build(conversation: &ConversationState, own_id: Option<&UserId>) -> Self {
        let Some(peer) = conversation.peer() else {
            return Self {
                header: None,
                lines: Vec::new(),
                loading: false,
            };
        };

        let lines = conversation
            .thread()
            .messages()
            .iter()
            .map(|m| ThreadLine {
                own: is_own(m, peer, own_id),
                body: MessageBody::from_message(m),
                sent_at: m.created_at,
            })
            .collect();

        Self {
            header: Some(format!("Chat with {}", peer.name)),
            lines,
            loading: conversation.is_loading(),
        }
    }
}

fn is_own(message: &Message, peer: &User, own_id: Option<&UserId>) -> bool {
    match own_id {
        Some(own) => &message.sender == own,
        None => message.sender != peer.id,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerView {
    pub text: String,
    pub attachment: Option<String>,
    pub can_submit: bool,
}

impl ComposerView {
    pub fn build(composer: &Composer, peer_selected: bool) -> Self {
        Self {
            text: composer.text.clone(),
            attachment: composer.attachment.as_ref().map(|a| {
                format!("{} ({}, {} bytes)", a.file_name, a.kind().as_str(), a.size())
            }),
            can_submit: peer_selected && !composer.is_blank(),
        }
    }
}
