//! The realtime channel handle and its connection task.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::{ServerConfig, SyncConfig};
use crate::error::{Error, Result};

use super::events::{
    decode_event, decode_frame, encode_event, EventKind, Frame, Lifecycle, Packet, PushEvent,
    NAMESPACE_CONNECT, PONG,
};

/// Callback invoked for each event of the kind it was registered for.
pub type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Identifies one registration so it can be removed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Lock a std mutex, recovering the data if a handler panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct Shared {
    handlers: Mutex<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
    rooms: Mutex<BTreeSet<String>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    connected: AtomicBool,
    next_id: AtomicU64,
}

impl Shared {
    fn dispatch(&self, event: &PushEvent) {
        // Snapshot so handlers may (un)subscribe while being called
        let handlers: Vec<Handler> = lock(&self.handlers)
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(event);
        }
    }

    fn send(&self, frame: String) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = lock(&self.outbound).as_ref() {
            let _ = tx.send(frame);
        }
    }
}

/// Cloneable handle to the single push connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    url: String,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    shared: Arc<Shared>,
}

impl RealtimeChannel {
    pub fn new(url: impl Into<String>, reconnect_attempts: u32, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_attempts,
            reconnect_delay,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn from_config(server: &ServerConfig, sync: &SyncConfig) -> Self {
        Self::new(
            server.realtime_url.clone(),
            sync.reconnect_attempts,
            sync.reconnect_delay(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection task, or keep the one already running.
    pub fn connect(&self) -> Result<()> {
        let mut task = lock(&self.shared.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let url = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid realtime url {}: {}", self.url, e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.outbound) = Some(tx);

        tracing::info!(url = %url, "Starting realtime connection");
        *task = Some(tokio::spawn(connection_loop(
            self.shared.clone(),
            url,
            self.reconnect_attempts,
            self.reconnect_delay,
            rx,
        )));
        Ok(())
    }

    /// Whether the namespace handshake has completed on a live socket.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Join a conversation's room. Remembered across reconnects.
    pub fn join_room(&self, conversation_id: &str) {
        if lock(&self.shared.rooms).insert(conversation_id.to_string()) {
            tracing::debug!(conversation_id = %conversation_id, "Joining room");
            self.shared.send(join_frame(conversation_id));
        }
    }

    /// Leave a conversation's room.
    pub fn leave_room(&self, conversation_id: &str) {
        if lock(&self.shared.rooms).remove(conversation_id) {
            tracing::debug!(conversation_id = %conversation_id, "Leaving room");
            self.shared.send(leave_frame(conversation_id));
        }
    }

    pub fn joined_rooms(&self) -> Vec<String> {
        lock(&self.shared.rooms).iter().cloned().collect()
    }

    /// Register a handler for one event kind.
    pub fn subscribe(&self, kind: EventKind, handler: Handler) -> HandlerId {
        let id = HandlerId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.shared.handlers)
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one registration. Other handlers for the same kind stay.
    ///
    /// Returns whether the handler was registered.
    pub fn unsubscribe(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut handlers = lock(&self.shared.handlers);
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    pub fn is_subscribed(&self, id: HandlerId) -> bool {
        lock(&self.shared.handlers)
            .values()
            .any(|list| list.iter().any(|(existing, _)| *existing == id))
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.shared.handlers)
            .get(&kind)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// Deliver an already-decoded event to the registered handlers.
    pub fn dispatch(&self, event: &PushEvent) {
        self.shared.dispatch(event);
    }

    /// Stop the connection and drop every registration and room.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.shared.task).take() {
            task.abort();
        }
        *lock(&self.shared.outbound) = None;
        self.shared.connected.store(false, Ordering::SeqCst);
        lock(&self.shared.handlers).clear();
        lock(&self.shared.rooms).clear();
        tracing::info!("Realtime channel shut down");
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .field("rooms", &self.joined_rooms())
            .finish()
    }
}

fn join_frame(conversation_id: &str) -> String {
    encode_event("join_conversation", &json!({ "conversation_id": conversation_id }))
}

fn leave_frame(conversation_id: &str) -> String {
    encode_event("leave_conversation", &json!({ "conversation_id": conversation_id }))
}

async fn open_socket(url: &Url) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::Realtime(format!("connect to {} failed: {}", url, e)))?;
    Ok(ws)
}

/// Connect, run, and reconnect with a fixed delay until attempts run out.
async fn connection_loop(
    shared: Arc<Shared>,
    url: Url,
    attempts: u32,
    delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let mut failures = 0u32;
    loop {
        match open_socket(&url).await {
            Ok(ws) => {
                failures = 0;
                let reason = run_connection(ws, &shared, &mut outbound).await;
                shared.connected.store(false, Ordering::SeqCst);
                tracing::warn!(reason = %reason, "Realtime connection lost");
                shared.dispatch(&PushEvent::Lifecycle(Lifecycle::Disconnected { reason }));
            }
            Err(err) => {
                tracing::warn!(error = %err, "Realtime connect failed");
            }
        }

        failures += 1;
        if failures > attempts {
            tracing::error!(attempts, "Realtime reconnect attempts exhausted");
            shared.dispatch(&PushEvent::Lifecycle(Lifecycle::Disconnected {
                reason: "reconnect attempts exhausted".to_string(),
            }));
            break;
        }

        tracing::warn!(
            "Reconnecting (attempt {}/{}), waiting {:?}",
            failures,
            attempts,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// Drive one live socket until it closes; returns why it ended.
async fn run_connection<S>(
    ws: WebSocketStream<S>,
    shared: &Shared,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> String
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => return "socket closed".to_string(),
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return err.to_string(),
                };

                let frame = match decode_frame(&text) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(error = %err, "Dropping undecodable frame");
                        continue;
                    }
                };

                match frame {
                    Frame::Open { sid, ping_interval_ms } => {
                        tracing::debug!(
                            sid = ?sid,
                            ping_interval_ms = ?ping_interval_ms,
                            "Engine open"
                        );
                        let reply = WsMessage::Text(NAMESPACE_CONNECT.to_string());
                        if sink.send(reply).await.is_err() {
                            return "send failed".to_string();
                        }
                    }
                    Frame::Ping => {
                        if sink.send(WsMessage::Text(PONG.to_string())).await.is_err() {
                            return "send failed".to_string();
                        }
                    }
                    Frame::Close => return "server closed".to_string(),
                    Frame::Packet(Packet::Connect) => {
                        shared.connected.store(true, Ordering::SeqCst);
                        let rooms: Vec<String> = lock(&shared.rooms).iter().cloned().collect();
                        for room in rooms {
                            if sink.send(WsMessage::Text(join_frame(&room))).await.is_err() {
                                return "send failed".to_string();
                            }
                        }
                        tracing::info!("Realtime connected");
                        shared.dispatch(&PushEvent::Lifecycle(Lifecycle::Connected));
                    }
                    Frame::Packet(Packet::Disconnect) => {
                        return "namespace disconnect".to_string();
                    }
                    Frame::Packet(Packet::ConnectError(detail)) => {
                        return format!("connect error: {}", detail);
                    }
                    Frame::Packet(Packet::Event { name, payload }) => {
                        match decode_event(&name, payload) {
                            Ok(Some(event)) => shared.dispatch(&event),
                            Ok(None) => {
                                tracing::debug!(event = %name, "Ignoring unhandled event")
                            }
                            Err(err) => tracing::warn!(
                                event = %name,
                                error = %err,
                                "Malformed push event ignored"
                            ),
                        }
                    }
                    Frame::Packet(Packet::Unsupported(kind)) => {
                        tracing::debug!(packet_type = %kind, "Ignoring unsupported packet");
                    }
                    Frame::Pong | Frame::Other => {}
                }
            }
            out = outbound.recv() => {
                let Some(frame) = out else {
                    return "channel closed".to_string();
                };
                if sink.send(WsMessage::Text(frame)).await.is_err() {
                    return "send failed".to_string();
                }
            }
        }
    }
}
