//! Application state shared by every command.
//!
//! [`AppState`] is built once in `run()` and passed by reference. Each field
//! carries its own lock so a command only holds what it touches, and no lock
//! is ever held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use courier_net::Backend;
use courier_shared::{ConnectionState, CourierError, Envelope, Result, UserId};

use crate::config::ClientConfig;
use crate::conversation::{Composer, ConversationState};
use crate::directory::Directory;
use crate::events::EventSink;
use crate::realtime_bridge::{Inbound, RealtimeConnector, RealtimeLink};
use crate::session::{SessionStore, TokenStore};

/// Central application state.
pub struct AppState {
    pub config: ClientConfig,

    /// REST backend. Swapped for a scripted fake in tests.
    pub backend: Arc<dyn Backend>,

    /// Opens the realtime link after authentication.
    pub connector: Arc<dyn RealtimeConnector>,

    pub session: Mutex<SessionStore>,

    /// Shared with the realtime dispatch task.
    pub conversation: Arc<Mutex<ConversationState>>,

    pub directory: Mutex<Directory>,

    pub composer: Mutex<Composer>,

    /// `None` while signed out. Taken out of the slot before it is closed.
    pub realtime: Mutex<Option<Box<dyn RealtimeLink>>>,

    /// Where background tasks report to the front-end.
    pub events: Arc<dyn EventSink>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| CourierError::Storage(format!("Lock poisoned: {e}")))
}

impl AppState {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        connector: Arc<dyn RealtimeConnector>,
        tokens: Box<dyn TokenStore>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            backend,
            connector,
            session: Mutex::new(SessionStore::open(tokens)?),
            conversation: Arc::new(Mutex::new(ConversationState::new())),
            directory: Mutex::new(Directory::new()),
            composer: Mutex::new(Composer::default()),
            realtime: Mutex::new(None),
            events,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.session)
            .map(|s| s.is_authenticated())
            .unwrap_or(false)
    }

    /// The session token, or an auth error when signed out.
    pub fn token(&self) -> Result<String> {
        lock(&self.session)?
            .token()
            .map(str::to_string)
            .ok_or_else(|| CourierError::Auth("Not signed in".into()))
    }

    pub fn own_id(&self) -> Option<UserId> {
        lock(&self.session).ok()?.own_id().cloned()
    }

    pub fn inbound(&self) -> Inbound {
        Inbound {
            conversation: self.conversation.clone(),
            events: self.events.clone(),
            own_id: self.own_id(),
        }
    }

    /// Publish on the realtime link if one is open.
    pub fn publish(&self, envelope: Envelope) -> bool {
        match lock(&self.realtime) {
            Ok(slot) => match slot.as_ref() {
                Some(link) => link.publish(envelope),
                None => {
                    tracing::warn!(event = %envelope.event, "No realtime link, dropping publish");
                    false
                }
            },
            Err(_) => false,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.realtime)
            .ok()
            .and_then(|slot| slot.as_ref().map(|link| link.state()))
            .unwrap_or(ConnectionState::Disconnected)
    }
}
