//! Scripted fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use courier_net::Backend;
use courier_shared::protocol::{LoginRequest, LoginResponse, SignupRequest};
use courier_shared::{
    Attachment, ConnectionState, CourierError, Envelope, Message, MessageId, MessageKind,
    NewMessage, Result, User, UserId,
};

use crate::config::ClientConfig;
use crate::events::{EventSink, UiEvent};
use crate::realtime_bridge::{Inbound, RealtimeConnector, RealtimeLink};
use crate::session::MemoryTokenStore;
use crate::state::AppState;

pub fn user(id: &str) -> User {
    User {
        id: UserId::new(id),
        name: id.to_uppercase(),
        email: format!("{id}@example.org"),
        profile_pic: None,
    }
}

pub fn message(id: &str, from: &str, to: &str) -> Message {
    Message {
        id: MessageId::new(id),
        sender: UserId::new(from),
        recipient: UserId::new(to),
        kind: MessageKind::Text,
        content: Some(format!("body {id}")),
        file_url: None,
        created_at: None,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Auth(&'static str),
    Network,
}

impl Failure {
    fn to_error(self) -> CourierError {
        match self {
            Self::Auth(msg) => CourierError::Auth(msg.to_string()),
            Self::Network => CourierError::Network("connection refused".into()),
        }
    }
}

/// In-memory backend. The local user is always `me`.
#[derive(Default)]
pub struct FakeBackend {
    users: Mutex<Vec<User>>,
    history: Mutex<HashMap<UserId, Vec<Message>>>,
    gates: Mutex<HashMap<UserId, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<Failure>>,
    hang: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeBackend {
    pub fn set_users(&self, users: Vec<User>) {
        *self.users.lock().unwrap() = users;
    }

    pub fn set_history(&self, peer: &str, messages: Vec<Message>) {
        self.history
            .lock()
            .unwrap()
            .insert(UserId::new(peer), messages);
    }

    /// History for `peer` is held back until the returned gate is notified.
    pub fn gate(&self, peer: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(UserId::new(peer), gate.clone());
        gate
    }

    /// Every following call fails.
    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    /// Every following call never completes.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match *self.failure.lock().unwrap() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse> {
        self.enter("login".into()).await?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(LoginResponse {
            user: user("me"),
            token: format!("tok-{n}"),
        })
    }

    async fn signup(&self, _request: &SignupRequest) -> Result<()> {
        self.enter("signup".into()).await
    }

    async fn list_users(&self, _token: &str) -> Result<Vec<User>> {
        self.enter("users".into()).await?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn fetch_history(&self, _token: &str, peer: &UserId) -> Result<Vec<Message>> {
        self.enter(format!("history:{peer}")).await?;
        let gate = self.gates.lock().unwrap().get(peer).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_file(&self, _token: &str, attachment: &Attachment) -> Result<String> {
        self.enter(format!("upload:{}", attachment.file_name)).await?;
        Ok(format!("https://files.example/{}", attachment.file_name))
    }

    async fn create_message(&self, _token: &str, request: &NewMessage) -> Result<Message> {
        self.enter("create".into()).await?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            id: MessageId::new(format!("srv-{n}")),
            sender: UserId::new("me"),
            recipient: request.recipient_id.clone(),
            kind: request.kind,
            content: Some(request.content.clone()).filter(|c| !c.is_empty()),
            file_url: Some(request.file_url.clone()).filter(|u| !u.is_empty()),
            created_at: Some(Utc::now()),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: UiEvent) -> std::result::Result<(), String> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

struct RecordingLink {
    published: Arc<Mutex<Vec<Envelope>>>,
    closed: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl RealtimeLink for RecordingLink {
    fn publish(&self, envelope: Envelope) -> bool {
        self.published.lock().unwrap().push(envelope);
        true
    }

    fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out recording links and remembers how it was called.
#[derive(Default)]
pub struct FakeConnector {
    connects: AtomicUsize,
    published: Arc<Mutex<Vec<Envelope>>>,
    closed: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
    tokens: Mutex<Vec<String>>,
    inbound: Mutex<Option<Inbound>>,
}

impl FakeConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Envelope> {
        self.published.lock().unwrap().clone()
    }

    pub fn link_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// How many links have been closed so far.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Tokens passed to `connect`, oldest first.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn inbound(&self) -> Option<Inbound> {
        self.inbound.lock().unwrap().clone()
    }

    pub fn last_own_id(&self) -> Option<UserId> {
        self.inbound().and_then(|i| i.own_id)
    }
}

impl RealtimeConnector for FakeConnector {
    fn connect(&self, token: &str, inbound: Inbound) -> Result<Box<dyn RealtimeLink>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());
        self.closed.store(false, Ordering::SeqCst);
        *self.inbound.lock().unwrap() = Some(inbound);
        Ok(Box::new(RecordingLink {
            published: self.published.clone(),
            closed: self.closed.clone(),
            closes: self.closes.clone(),
        }))
    }
}

pub struct Harness {
    pub state: AppState,
    pub backend: Arc<FakeBackend>,
    pub connector: Arc<FakeConnector>,
    pub tokens: MemoryTokenStore,
    pub sink: Arc<RecordingSink>,
}

/// App state wired to fakes, optionally starting from a stored token.
pub fn harness(stored_token: Option<&str>) -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let connector = Arc::new(FakeConnector::default());
    let sink = Arc::new(RecordingSink::default());
    let tokens = match stored_token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::default(),
    };

    let state = AppState::new(
        ClientConfig::default(),
        backend.clone(),
        connector.clone(),
        Box::new(tokens.clone()),
        sink.clone(),
    )
    .unwrap();

    Harness {
        state,
        backend,
        connector,
        tokens,
        sink,
    }
}
