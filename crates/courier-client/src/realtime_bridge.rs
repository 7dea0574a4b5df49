//! Bridges the realtime channel task to the rest of the client.
//!
//! [`RealtimeHandle`] owns the channel and a dispatch task. The dispatch
//! task invokes the handlers registered with [`RealtimeHandle::subscribe`]
//! for every inbound envelope, and turns connection changes into
//! [`UiEvent`]s.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use courier_net::{spawn_channel, ChannelConfig, ChannelHandle, ChannelNotification};
use courier_shared::protocol::EVENT_RECEIVE_MESSAGE;
use courier_shared::{ConnectionState, Envelope, Message, Result, UserId};

use crate::config::ClientConfig;
use crate::conversation::{ConversationState, IncomingOutcome};
use crate::events::{emit_event, EventSink, UiEvent};

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;
type Handlers = Arc<Mutex<HashMap<String, Vec<Handler>>>>;

/// The operations the rest of the client needs from an open channel.
#[async_trait]
pub trait RealtimeLink: Send + Sync {
    /// Fire-and-forget. Returns `false` if the envelope was dropped.
    fn publish(&self, envelope: Envelope) -> bool;
    fn state(&self) -> ConnectionState;
    /// Close the channel. Later calls do nothing.
    async fn close(&mut self);
}

/// Opens one realtime link per authenticated session.
pub trait RealtimeConnector: Send + Sync {
    fn connect(&self, token: &str, inbound: Inbound) -> Result<Box<dyn RealtimeLink>>;
}

/// Where inbound messages go.
#[derive(Clone)]
pub struct Inbound {
    pub conversation: Arc<Mutex<ConversationState>>,
    pub events: Arc<dyn EventSink>,
    pub own_id: Option<UserId>,
}

/// Apply one `receive_message` payload to the conversation state.
pub fn handle_incoming(inbound: &Inbound, data: &Value) {
    let message: Message = match serde_json::from_value(data.clone()) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed incoming message");
            return;
        }
    };

    let message_id = message.id.clone();
    let peer = match &inbound.own_id {
        Some(own) => message.counterpart(own).clone(),
        None => message.sender.clone(),
    };

    // Panics are caught with the guard held, so the lock is never poisoned.
    let applied = {
        let mut conversation = inbound
            .conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        catch_unwind(AssertUnwindSafe(|| {
            conversation.on_incoming(message, inbound.own_id.as_ref())
        }))
    };
    let outcome = match applied {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(msg_id = %message_id, "Failed to apply incoming message");
            emit_event(
                inbound.events.as_ref(),
                UiEvent::InternalError(format!("Failed to apply message {message_id}")),
            );
            return;
        }
    };

    match outcome {
        IncomingOutcome::Appended => {
            debug!(peer = %peer, msg_id = %message_id, "Incoming message appended");
            emit_event(
                inbound.events.as_ref(),
                UiEvent::NewMessage { peer, message_id },
            );
        }
        IncomingOutcome::Unread { from, count } => {
            info!(peer = %from, count, "Unread message from another conversation");
            emit_event(
                inbound.events.as_ref(),
                UiEvent::UnreadChanged { peer: from, count },
            );
        }
        IncomingOutcome::Duplicate => {
            debug!(msg_id = %message_id, "Duplicate incoming message ignored");
        }
        IncomingOutcome::Ignored => {
            debug!(msg_id = %message_id, "Own message for a closed conversation ignored");
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

pub struct RealtimeHandle {
    channel: Option<ChannelHandle>,
    handlers: Handlers,
    dispatch: Option<JoinHandle<()>>,
}

impl RealtimeHandle {
    /// Spawn the channel and its dispatch task.
    pub fn open(config: ChannelConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        let (channel, notif_rx) = spawn_channel(config)?;
        let handlers: Handlers = Arc::new(Mutex::new(HashMap::new()));

        let dispatch = tokio::spawn(dispatch_loop(
            notif_rx,
            channel.watch_state(),
            handlers.clone(),
            events,
        ));

        Ok(Self {
            channel: Some(channel),
            handlers,
            dispatch: Some(dispatch),
        })
    }

    /// Register `handler` for inbound envelopes named `event`.
    pub fn subscribe(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) {
        match self.handlers.lock() {
            Ok(mut handlers) => handlers
                .entry(event.to_string())
                .or_default()
                .push(Arc::new(handler)),
            Err(e) => error!(error = %e, "Handler registry poisoned"),
        }
    }

    pub fn watch_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.channel.as_ref().map(ChannelHandle::watch_state)
    }
}

#[async_trait]
impl RealtimeLink for RealtimeHandle {
    fn publish(&self, envelope: Envelope) -> bool {
        match &self.channel {
            Some(channel) => channel.publish(envelope),
            None => {
                warn!(event = %envelope.event, "Publish on a closed realtime handle");
                false
            }
        }
    }

    fn state(&self) -> ConnectionState {
        self.channel
            .as_ref()
            .map(ChannelHandle::state)
            .unwrap_or(ConnectionState::Closed)
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        if let Some(dispatch) = self.dispatch.take() {
            if let Err(e) = dispatch.await {
                error!(error = %e, "Realtime dispatch task failed");
            }
        }
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
    }
}

async fn dispatch_loop(
    mut notif_rx: mpsc::Receiver<ChannelNotification>,
    mut state_rx: watch::Receiver<ConnectionState>,
    handlers: Handlers,
    events: Arc<dyn EventSink>,
) {
    info!("Realtime dispatch started");
    let mut watching = true;

    loop {
        tokio::select! {
            notification = notif_rx.recv() => match notification {
                Some(notification) => on_notification(notification, &handlers, events.as_ref()),
                None => break,
            },
            changed = state_rx.changed(), if watching => match changed {
                Ok(()) => {
                    let state = *state_rx.borrow_and_update();
                    emit_event(events.as_ref(), UiEvent::ConnectionChanged(state));
                }
                Err(_) => watching = false,
            },
        }
    }

    debug!("Realtime dispatch loop ended");
}

fn on_notification(notification: ChannelNotification, handlers: &Handlers, events: &dyn EventSink) {
    match notification {
        ChannelNotification::Event(envelope) => {
            let registered: Vec<Handler> = match handlers.lock() {
                Ok(map) => map.get(&envelope.event).cloned().unwrap_or_default(),
                Err(e) => {
                    error!(error = %e, "Handler registry poisoned");
                    return;
                }
            };

            if registered.is_empty() {
                debug!(event = %envelope.event, "No handler for realtime event");
            }

            for handler in registered {
                if catch_unwind(AssertUnwindSafe(|| handler(&envelope.data))).is_err() {
                    error!(event = %envelope.event, "Realtime handler panicked");
                    emit_event(
                        events,
                        UiEvent::InternalError(format!("Failed to handle '{}'", envelope.event)),
                    );
                }
            }
        }
        ChannelNotification::Connected => debug!("Realtime connected (bridge)"),
        ChannelNotification::Disconnected { reason } => {
            debug!(reason = %reason, "Realtime disconnected (bridge)");
        }
        ChannelNotification::AuthRejected { reason } => {
            emit_event(events, UiEvent::SessionRejected { reason });
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens WebSocket links to the configured realtime endpoint.
pub struct WsConnector {
    config: ClientConfig,
}

impl WsConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl RealtimeConnector for WsConnector {
    fn connect(&self, token: &str, inbound: Inbound) -> Result<Box<dyn RealtimeLink>> {
        // Unknown identity (restored session): nothing to announce.
        let hello = inbound.own_id.as_ref().map(Envelope::user_connected);
        let handle = RealtimeHandle::open(
            self.config.channel_config(token, hello),
            inbound.events.clone(),
        )?;

        handle.subscribe(EVENT_RECEIVE_MESSAGE, move |data| handle_incoming(&inbound, data));
        info!(url = %self.config.realtime_url, "Realtime channel opening");
        Ok(Box::new(handle))
    }
}
