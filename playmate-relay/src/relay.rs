//! Relay server core: shared state, WebSocket handler, and event dispatch.
//!
//! The relay accepts WebSocket connections on a single endpoint, registers
//! each one in the [`Hub`] under a fresh [`ConnectionId`], and turns client
//! events into membership changes or room broadcasts. Nothing is persisted:
//! a reconnecting client gets a new identifier and must re-join its rooms.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use playmate_proto::codec;
use playmate_proto::connection::ConnectionId;
use playmate_proto::event::{ClientEvent, Connected, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::config::RelayConfig;
use crate::hub::{Delivery, Hub};
use crate::publish::Publisher;

/// How long shutdown waits for writer tasks to flush close frames.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Shared relay state: the hub plus the settings every connection needs.
///
/// Constructed once by the process entry point and shared behind an `Arc`
/// with the router and with the application layer (via [`Publisher`]).
pub struct RelayState {
    /// Connection registry and room membership.
    pub hub: Hub,
    config: RelayConfig,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates relay state with default settings and an open join policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Creates relay state from a resolved configuration.
    #[must_use]
    pub fn with_config(config: RelayConfig) -> Self {
        Self::with_hub(config, Hub::new())
    }

    /// Creates relay state around a pre-built hub, e.g. one with a custom
    /// [`crate::hub::JoinPolicy`].
    #[must_use]
    pub const fn with_hub(config: RelayConfig, hub: Hub) -> Self {
        Self { hub, config }
    }

    /// Settings this relay was built with.
    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Returns a handle the application layer uses for server-initiated
    /// broadcasts.
    #[must_use]
    pub fn publisher(self: &Arc<Self>) -> Publisher {
        Publisher::new(Arc::clone(self))
    }
}

/// Ties a registered connection to its socket tasks.
///
/// Dropping the guard aborts the tasks and unregisters the connection, so
/// cleanup also runs when the handler future is cancelled.
struct ConnectionGuard {
    state: Arc<RelayState>,
    connection_id: ConnectionId,
    tasks: Vec<AbortHandle>,
}

impl ConnectionGuard {
    const fn new(state: Arc<RelayState>, connection_id: ConnectionId) -> Self {
        Self {
            state,
            connection_id,
            tasks: Vec::new(),
        }
    }

    fn watch<T>(&mut self, task: &tokio::task::JoinHandle<T>) {
        self.tasks.push(task.abort_handle());
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(rooms) = self.state.hub.disconnect(self.connection_id) {
            tracing::info!(
                connection_id = %self.connection_id,
                rooms = rooms.len(),
                "client disconnected"
            );
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Register with the hub and greet the client with `connected`.
/// 2. Spawn a writer task draining the connection's outbox and pinging.
/// 3. Read client events until close, error, or idle timeout.
/// 4. Unregister, which removes the connection from every room.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = state.hub.connect(tx);
    let mut guard = ConnectionGuard::new(Arc::clone(&state), connection_id);
    tracing::info!(connection_id = %connection_id, "client connected");

    state.hub.send_to(
        connection_id,
        &ServerEvent::Connected(Connected { connection_id }),
    );

    let ping_interval = state.config.ping_interval;
    let idle_timeout = state.config.idle_timeout;

    let mut write_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + ping_interval,
            ping_interval,
        );
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    let closing = matches!(msg, Message::Close(_));
                    if ws_sender.send(msg).await.is_err() {
                        tracing::warn!(connection_id = %connection_id, "WebSocket write failed");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        loop {
            let msg = match tokio::time::timeout(idle_timeout, ws_receiver.next()).await {
                Err(_) => {
                    tracing::info!(connection_id = %connection_id, "idle timeout");
                    break;
                }
                Ok(None | Some(Err(_))) => break,
                Ok(Some(Ok(msg))) => msg,
            };
            match msg {
                Message::Text(text) => {
                    handle_text_message(connection_id, text.as_str(), &reader_state);
                }
                Message::Close(_) => {
                    tracing::info!(connection_id = %connection_id, "received close frame");
                    break;
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        len = data.len(),
                        "ignoring binary frame"
                    );
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Only refresh the idle timer.
                }
            }
        }
    });

    guard.watch(&write_task);
    guard.watch(&read_task);

    // Wait for either task to finish; the guard stops the other.
    tokio::select! {
        _ = &mut read_task => {}
        _ = &mut write_task => {}
    }
    drop(guard);
}

/// Decodes one text frame and applies it on behalf of `connection_id`.
///
/// Only frames without a known `{event, data}` envelope or without a routable
/// room are dropped (and logged); payloads are otherwise relayed as sent. The
/// relay never reports errors back to the client.
pub fn handle_text_message(connection_id: ConnectionId, text: &str, state: &RelayState) {
    let event = match codec::decode::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                "dropping undecodable frame"
            );
            return;
        }
    };
    tracing::trace!(connection_id = %connection_id, event = event.name(), "client event");
    dispatch(connection_id, event, &state.hub);
}

/// Applies a decoded client event.
fn dispatch(connection_id: ConnectionId, event: ClientEvent, hub: &Hub) {
    match event {
        ClientEvent::JoinRoom(room) => {
            if hub.join(connection_id, &room) {
                tracing::info!(connection_id = %connection_id, room = %room, "joined room");
            }
        }
        ClientEvent::LeaveRoom(room) => {
            if hub.leave(connection_id, &room) {
                tracing::info!(connection_id = %connection_id, room = %room, "left room");
            }
        }
        ClientEvent::SendMessage(message) => {
            let room = message.room();
            let delivered =
                hub.broadcast(&room, &ServerEvent::NewMessage(message), Delivery::Everyone);
            tracing::debug!(
                connection_id = %connection_id,
                room = %room,
                delivered,
                "relayed chat message"
            );
        }
        ClientEvent::FormationUpdate(update) => {
            let room = update.room();
            let delivered = hub.broadcast(
                &room,
                &ServerEvent::FormationUpdate(update),
                Delivery::ExceptSender(connection_id),
            );
            tracing::debug!(
                connection_id = %connection_id,
                room = %room,
                delivered,
                "relayed formation update"
            );
        }
    }
}

/// Paths the WebSocket endpoint is mounted on.
///
/// With `normalize` set, both the bare path and its trailing-slash variant
/// are accepted. The root path is only ever mounted once.
#[must_use]
pub fn endpoint_paths(path: &str, normalize: bool) -> Vec<String> {
    if !normalize || path == "/" {
        return vec![path.to_string()];
    }
    let base = path.trim_end_matches('/');
    if base.is_empty() {
        return vec!["/".to_string()];
    }
    vec![base.to_string(), format!("{base}/")]
}

/// Builds the axum router serving the WebSocket endpoint.
pub fn router(state: Arc<RelayState>) -> axum::Router {
    let paths = endpoint_paths(&state.config.path, state.config.normalize_path);
    let mut app = axum::Router::new();
    for path in paths {
        app = app.route(&path, axum::routing::get(ws_handler));
    }
    app.with_state(state)
}

/// Starts the relay server on the given address with default settings and
/// returns the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    let max_frame_size = state.config.max_frame_size;
    ws.max_message_size(max_frame_size)
        .max_frame_size(max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}
