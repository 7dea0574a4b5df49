//! Conversation state: the selected peer, its message thread, per-peer
//! unread counters, and the composer draft.
//!
//! History fetches are tagged with a [`HistoryTicket`]. Selecting another
//! peer bumps the generation, so a response for an earlier selection can
//! never overwrite the current thread.

use std::collections::HashMap;

use tracing::debug;

use courier_shared::{Attachment, Message, MessageId, User, UserId};

// ---------------------------------------------------------------------------
// Thread
// ---------------------------------------------------------------------------

/// Messages of one conversation, unique by id.
///
/// Timestamped messages are kept in `created_at` order. Ties, and messages
/// the backend did not timestamp, keep arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thread {
    messages: Vec<Message>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut thread = Self::new();
        for message in messages {
            thread.insert(message);
        }
        thread
    }

    /// Insert a message. Returns `false` if its id is already present.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }

        let position = match message.created_at {
            None => self.messages.len(),
            Some(ts) => {
                let mut pos = self.messages.len();
                while pos > 0 {
                    match self.messages[pos - 1].created_at {
                        Some(prev) if prev > ts => pos -= 1,
                        _ => break,
                    }
                }
                pos
            }
        };

        self.messages.insert(position, message);
        true
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Conversation state
// ---------------------------------------------------------------------------

/// Identifies one history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTicket {
    pub peer_id: UserId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// The thread now holds this many messages.
    Applied(usize),
    /// The selection changed while the request was in flight.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingOutcome {
    Appended,
    Duplicate,
    /// Belongs to another conversation; `count` is the new unread total.
    Unread { from: UserId, count: usize },
    /// The local user's own message to a peer that is not open.
    Ignored,
}

#[derive(Debug, Default)]
pub struct ConversationState {
    peer: Option<User>,
    thread: Thread,
    unread: HashMap<UserId, usize>,
    generation: u64,
    pending: Option<HistoryTicket>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `peer` the active conversation and issue the ticket its history
    /// response must present.
    pub fn begin_select(&mut self, peer: User) -> HistoryTicket {
        self.generation += 1;
        let ticket = HistoryTicket {
            peer_id: peer.id.clone(),
            generation: self.generation,
        };

        self.unread.remove(&peer.id);
        self.thread = Thread::new();
        self.peer = Some(peer);
        self.pending = Some(ticket.clone());
        ticket
    }

    fn is_current(&self, ticket: &HistoryTicket) -> bool {
        self.pending.as_ref() == Some(ticket)
    }

    /// Replace the thread with fetched history if `ticket` is still current.
    ///
    /// Messages that arrived over the realtime channel while the request was
    /// in flight are merged rather than dropped.
    pub fn apply_history(&mut self, ticket: &HistoryTicket, messages: Vec<Message>) -> HistoryOutcome {
        if !self.is_current(ticket) {
            debug!(peer = %ticket.peer_id, generation = ticket.generation, "Discarding stale history");
            return HistoryOutcome::Stale;
        }

        let live = std::mem::take(&mut self.thread);
        let mut thread = Thread::from_messages(messages);
        for message in live.messages {
            thread.insert(message);
        }
        self.thread = thread;
        self.pending = None;
        HistoryOutcome::Applied(self.thread.len())
    }

    /// Clear the loading flag after a failed fetch. Returns `false` if the
    /// ticket was already superseded.
    pub fn fail_history(&mut self, ticket: &HistoryTicket) -> bool {
        if self.is_current(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Route a realtime message to the open thread or to an unread counter.
    pub fn on_incoming(&mut self, message: Message, own_id: Option<&UserId>) -> IncomingOutcome {
        if let Some(peer) = &self.peer {
            if message.involves(&peer.id) {
                return if self.thread.insert(message) {
                    IncomingOutcome::Appended
                } else {
                    IncomingOutcome::Duplicate
                };
            }
        }

        if own_id == Some(&message.sender) {
            return IncomingOutcome::Ignored;
        }

        let count = self.unread.entry(message.sender.clone()).or_insert(0);
        *count += 1;
        IncomingOutcome::Unread {
            from: message.sender,
            count: *count,
        }
    }

    /// Append a message the backend confirmed for the open thread.
    pub fn record_sent(&mut self, message: Message) -> bool {
        match &self.peer {
            Some(peer) if message.involves(&peer.id) => self.thread.insert(message),
            _ => false,
        }
    }

    pub fn peer(&self) -> Option<&User> {
        self.peer.as_ref()
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn unread(&self) -> &HashMap<UserId, usize> {
        &self.unread
    }

    pub fn unread_for(&self, id: &UserId) -> usize {
        self.unread.get(id).copied().unwrap_or(0)
    }

    /// Forget everything, e.g. on logout.
    pub fn reset(&mut self) {
        let generation = self.generation;
        *self = Self::default();
        self.generation = generation;
    }
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

/// Unsent text and attachment.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl Composer {
    /// Nothing to send: blank text and no file.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachment = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use courier_shared::MessageKind;

    fn user(id: &str) -> User {
        User {
            id: UserId::new(id),
            name: id.to_uppercase(),
            email: format!("{id}@example.org"),
            profile_pic: None,
        }
    }

    fn msg(id: &str, from: &str, to: &str, secs: Option<i64>) -> Message {
        Message {
            id: MessageId::new(id),
            sender: UserId::new(from),
            recipient: UserId::new(to),
            kind: MessageKind::Text,
            content: Some(format!("body {id}")),
            file_url: None,
            created_at: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    fn ids(thread: &Thread) -> Vec<&str> {
        thread.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_thread_dedup_and_order() {
        let mut thread = Thread::new();
        assert!(thread.insert(msg("m2", "a", "me", Some(20))));
        assert!(thread.insert(msg("m1", "me", "a", Some(10))));
        assert!(thread.insert(msg("m3", "a", "me", Some(20))));
        assert!(thread.insert(msg("m4", "a", "me", None)));
        assert!(!thread.insert(msg("m2", "a", "me", Some(20))));

        assert_eq!(ids(&thread), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_stale_history_is_discarded() {
        let mut state = ConversationState::new();
        let ticket_a = state.begin_select(user("a"));
        let ticket_b = state.begin_select(user("b"));

        let outcome = state.apply_history(&ticket_a, vec![msg("a1", "a", "me", Some(1))]);
        assert_eq!(outcome, HistoryOutcome::Stale);
        assert!(state.thread().is_empty());
        assert!(state.is_loading());

        let outcome = state.apply_history(&ticket_b, vec![msg("b1", "b", "me", Some(1))]);
        assert_eq!(outcome, HistoryOutcome::Applied(1));
        assert_eq!(ids(state.thread()), vec!["b1"]);
        assert!(!state.is_loading());
    }

    #[test]
    fn test_reselecting_same_peer_invalidates_older_ticket() {
        let mut state = ConversationState::new();
        let first = state.begin_select(user("a"));
        let second = state.begin_select(user("a"));
        assert_ne!(first, second);
        assert_eq!(state.apply_history(&first, vec![]), HistoryOutcome::Stale);
        assert!(!state.fail_history(&first));
        assert!(state.fail_history(&second));
    }

    #[test]
    fn test_history_keeps_live_messages() {
        let mut state = ConversationState::new();
        let ticket = state.begin_select(user("a"));
        state.on_incoming(msg("live", "a", "me", Some(30)), None);

        state.apply_history(
            &ticket,
            vec![msg("h1", "a", "me", Some(10)), msg("live", "a", "me", Some(30))],
        );
        assert_eq!(ids(state.thread()), vec!["h1", "live"]);
    }

    #[test]
    fn test_incoming_for_other_peer_counts_unread() {
        let mut state = ConversationState::new();
        state.begin_select(user("a"));

        let outcome = state.on_incoming(msg("x1", "b", "me", None), Some(&UserId::new("me")));
        assert_eq!(
            outcome,
            IncomingOutcome::Unread {
                from: UserId::new("b"),
                count: 1
            }
        );
        state.on_incoming(msg("x2", "b", "me", None), Some(&UserId::new("me")));
        assert_eq!(state.unread_for(&UserId::new("b")), 2);
        assert!(state.thread().is_empty());

        state.begin_select(user("b"));
        assert_eq!(state.unread_for(&UserId::new("b")), 0);
    }

    #[test]
    fn test_incoming_duplicate_and_own_echo() {
        let mut state = ConversationState::new();
        state.begin_select(user("a"));
        let me = UserId::new("me");

        assert_eq!(state.on_incoming(msg("m1", "a", "me", None), Some(&me)), IncomingOutcome::Appended);
        assert_eq!(state.on_incoming(msg("m1", "a", "me", None), Some(&me)), IncomingOutcome::Duplicate);
        assert_eq!(state.on_incoming(msg("m2", "me", "c", None), Some(&me)), IncomingOutcome::Ignored);
        assert!(state.unread().is_empty());
    }

    #[test]
    fn test_record_sent_requires_open_thread() {
        let mut state = ConversationState::new();
        assert!(!state.record_sent(msg("m1", "me", "a", None)));

        state.begin_select(user("a"));
        assert!(state.record_sent(msg("m1", "me", "a", None)));
        assert!(!state.record_sent(msg("m1", "me", "a", None)));
        assert!(!state.record_sent(msg("m2", "me", "b", None)));
    }

    #[test]
    fn test_reset_keeps_generation_monotonic() {
        let mut state = ConversationState::new();
        let old = state.begin_select(user("a"));
        state.reset();
        assert!(state.peer().is_none());
        let new = state.begin_select(user("a"));
        assert!(new.generation > old.generation);
    }

    #[test]
    fn test_composer_blank() {
        let mut composer = Composer::default();
        assert!(composer.is_blank());
        composer.text = "   ".into();
        assert!(composer.is_blank());
        composer.attachment = Some(Attachment::new("a.png", "image/png", vec![1]));
        assert!(!composer.is_blank());
        composer.clear();
        assert!(composer.is_blank());
    }
}
