//! Realtime channel over a WebSocket.
//!
//! The connection runs in a dedicated tokio task. Callers talk to it through
//! a [`ChannelHandle`] (commands in) and an `mpsc` receiver of
//! [`ChannelNotification`]s (events out), so nothing outside this module
//! touches the socket directly.
//!
//! Each text frame carries one JSON [`Envelope`]. The session token is
//! presented as a bearer credential on the opening handshake. After every
//! successful (re)connect the optional `hello` envelope is sent first.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use courier_shared::constants::{RECONNECT_INITIAL_DELAY_MS, RECONNECT_MAX_DELAY_MS};
use courier_shared::{ConnectionState, CourierError, Envelope, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the channel task.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Send one envelope. Dropped with a warning while disconnected.
    Publish(Envelope),
    /// Close the socket and stop the task.
    Shutdown,
}

/// Notifications sent *from* the channel task.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotification {
    /// The handshake succeeded (initially or after a reconnect).
    Connected,
    /// The connection dropped or could not be established.
    Disconnected { reason: String },
    /// The server refused the token. The task stops without retrying.
    AuthRejected { reason: String },
    /// An inbound envelope.
    Event(Envelope),
}

/// How the channel behaves after losing its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(RECONNECT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Exponential backoff for the given 1-based attempt, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Up to 25% random jitter on top of a backoff delay.
fn jittered(delay: Duration) -> Duration {
    let spread = (delay.as_millis() / 4) as u64;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

/// Configuration for spawning the channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Session token presented on the handshake.
    pub token: String,
    /// Envelope sent after every successful connect.
    pub hello: Option<Envelope>,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            hello: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owning handle to a running channel task.
///
/// [`ChannelHandle::close`] consumes the handle, so a channel can only be
/// closed once. Dropping an unclosed handle aborts the task.
#[derive(Debug)]
pub struct ChannelHandle {
    cmd_tx: mpsc::Sender<ChannelCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Queue an envelope for sending. Fire-and-forget: returns `false` when
    /// the task is gone or its queue is full.
    pub fn publish(&self, envelope: Envelope) -> bool {
        let event = envelope.event.clone();
        match self.cmd_tx.try_send(ChannelCommand::Publish(envelope)) {
            Ok(()) => true,
            Err(e) => {
                warn!(event = %event, error = %e, "Dropping realtime publish");
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Close the socket and wait for the task to finish.
    pub async fn close(mut self) {
        let _ = self.cmd_tx.send(ChannelCommand::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Realtime task ended abnormally");
            }
        }
        info!("Realtime channel closed");
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Realtime handle dropped without close, aborting task");
            task.abort();
        }
    }
}

/// Spawn the channel task.
///
/// Returns as soon as the task is running; the first `Connected` (or
/// `Disconnected`/`AuthRejected`) notification reports the handshake result.
pub fn spawn_channel(
    config: ChannelConfig,
) -> Result<(ChannelHandle, mpsc::Receiver<ChannelNotification>)> {
    let url = Url::parse(&config.url).map_err(|e| {
        CourierError::Validation(format!("Invalid realtime URL '{}': {e}", config.url))
    })?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(CourierError::Validation(format!(
            "Realtime URL must use ws:// or wss://, got '{}'",
            url.scheme()
        )));
    }
    HeaderValue::from_str(&bearer(&config.token))
        .map_err(|_| CourierError::Auth("Token contains invalid characters".into()))?;

    let (cmd_tx, cmd_rx) = mpsc::channel::<ChannelCommand>(256);
    let (notif_tx, notif_rx) = mpsc::channel::<ChannelNotification>(256);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    let task = tokio::spawn(run_channel(config, cmd_rx, notif_tx, state_tx));

    Ok((
        ChannelHandle {
            cmd_tx,
            state_rx,
            task: Some(task),
        },
        notif_rx,
    ))
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

enum ConnectError {
    Rejected(String),
    Failed(String),
}

enum SessionEnd {
    Shutdown,
    Dropped(String),
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

async fn connect(config: &ChannelConfig) -> std::result::Result<WsStream, ConnectError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ConnectError::Failed(e.to_string()))?;
    let auth = HeaderValue::from_str(&bearer(&config.token))
        .map_err(|e| ConnectError::Rejected(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, auth);

    match tokio::time::timeout(config.connect_timeout, connect_async(request)).await {
        Err(_) => Err(ConnectError::Failed(format!(
            "handshake timed out after {}s",
            config.connect_timeout.as_secs()
        ))),
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(WsError::Http(response)))
            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
        {
            Err(ConnectError::Rejected(format!(
                "handshake rejected with {}",
                response.status()
            )))
        }
        Ok(Err(e)) => Err(ConnectError::Failed(e.to_string())),
    }
}

/// Drain commands while offline. Returns once shutdown is requested.
async fn wait_for_shutdown(cmd_rx: &mut mpsc::Receiver<ChannelCommand>) {
    loop {
        match cmd_rx.recv().await {
            Some(ChannelCommand::Publish(envelope)) => {
                warn!(event = %envelope.event, "Realtime channel offline, dropping publish");
            }
            Some(ChannelCommand::Shutdown) | None => return,
        }
    }
}

async fn run_channel(
    config: ChannelConfig,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    notif_tx: mpsc::Sender<ChannelNotification>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let mut attempt: u32 = 0;

    loop {
        let connected = tokio::select! {
            result = connect(&config) => result,
            _ = wait_for_shutdown(&mut cmd_rx) => break,
        };

        let reason = match connected {
            Ok(stream) => {
                attempt = 0;
                info!(url = %config.url, "Realtime channel connected");
                let _ = state_tx.send(ConnectionState::Connected);
                if notif_tx.send(ChannelNotification::Connected).await.is_err() {
                    break;
                }
                match run_session(stream, &config, &mut cmd_rx, &notif_tx).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Dropped(reason) => reason,
                }
            }
            Err(ConnectError::Rejected(reason)) => {
                warn!(reason = %reason, "Realtime handshake rejected");
                let _ = state_tx.send(ConnectionState::Disconnected);
                let _ = notif_tx
                    .send(ChannelNotification::AuthRejected { reason })
                    .await;
                return;
            }
            Err(ConnectError::Failed(reason)) => reason,
        };

        warn!(reason = %reason, "Realtime channel disconnected");
        if notif_tx
            .send(ChannelNotification::Disconnected { reason })
            .await
            .is_err()
        {
            break;
        }

        attempt = attempt.saturating_add(1);
        if !config.reconnect.allows(attempt) {
            info!(attempt, "Not reconnecting realtime channel");
            let _ = state_tx.send(ConnectionState::Disconnected);
            // Keep the task alive until the owner closes it so that
            // publishes are drained and logged rather than erroring.
            wait_for_shutdown(&mut cmd_rx).await;
            break;
        }

        let delay = jittered(config.reconnect.backoff(attempt));
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling realtime reconnect");
        let _ = state_tx.send(ConnectionState::Reconnecting { attempt });

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_shutdown(&mut cmd_rx) => break,
        }
    }

    let _ = state_tx.send(ConnectionState::Closed);
    debug!("Realtime task terminated");
}

async fn run_session(
    stream: WsStream,
    config: &ChannelConfig,
    cmd_rx: &mut mpsc::Receiver<ChannelCommand>,
    notif_tx: &mpsc::Sender<ChannelNotification>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    if let Some(hello) = &config.hello {
        match hello.to_text() {
            Ok(text) => {
                if let Err(e) = write.send(WsMessage::Text(text)).await {
                    return SessionEnd::Dropped(e.to_string());
                }
                debug!(event = %hello.event, "Sent realtime hello");
            }
            Err(e) => warn!(error = %e, "Failed to encode realtime hello"),
        }
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(ChannelCommand::Publish(envelope)) => {
                    let text = match envelope.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(event = %envelope.event, error = %e, "Failed to encode envelope");
                            continue;
                        }
                    };
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        return SessionEnd::Dropped(e.to_string());
                    }
                    debug!(event = %envelope.event, "Published realtime event");
                }
                Some(ChannelCommand::Shutdown) | None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    let _ = write.close().await;
                    return SessionEnd::Shutdown;
                }
            },

            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match Envelope::from_text(&text) {
                    Ok(envelope) => {
                        debug!(event = %envelope.event, "Realtime event received");
                        if notif_tx.send(ChannelNotification::Event(envelope)).await.is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring malformed realtime frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return SessionEnd::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                None => return SessionEnd::Dropped("stream ended".to_string()),
            },
        }
    }
}
