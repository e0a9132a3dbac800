//! A single client's realtime session.
//!
//! Each accepted WebSocket gets one [`Connection`] and two Tokio tasks:
//!
//! - the **read pump** decodes inbound frames, stamps them with the
//!   sender's user/room IDs, and forwards them to the hub inbox;
//! - the **write pump** drains the bounded outbound queue and emits
//!   periodic pings.
//!
//! Liveness is deadline-based: the read pump gives up if nothing (data
//! or pong) arrives within `pong_wait`, and every write carries a
//! `write_wait` deadline. [`Connection::send`] never blocks — a full
//! queue marks the connection dead and schedules its disconnect, which
//! keeps one slow consumer from stalling a broadcast.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use easel_game::SharedPlayer;
use easel_protocol::{Codec, Envelope, ErrorCode, ErrorData, JsonCodec, MessageKind, ProtocolError, RoomId, UserId};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio_tungstenite::tungstenite::{Bytes, Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::hub::{HubEvent, InboundMessage};
use crate::HubError;

/// An encoded outbound frame. Cheap to clone, so one broadcast encodes
/// once and shares the bytes across every target queue.
pub type Frame = Utf8Bytes;

/// Outbound queue capacity per connection.
const OUTBOUND_QUEUE: usize = 256;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Encodes an envelope into a sendable [`Frame`].
pub fn frame(envelope: &Envelope) -> Result<Frame, ProtocolError> {
    let text = serde_json::to_string(envelope).map_err(ProtocolError::Encode)?;
    Ok(Utf8Bytes::from(text))
}

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Heartbeat and write deadlines.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    /// Read deadline: the connection dies if nothing arrives in time.
    pub pong_wait: Duration,
    /// Ping cadence. Must be shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Per-frame write deadline.
    pub write_wait: Duration,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// Shared handle to a connection. The hub, the pumps, and the session
/// layer all hold one of these.
pub type SharedConnection = Arc<Connection>;

/// One client's realtime session.
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    player: SharedPlayer,
    room: RwLock<Option<RoomId>>,
    outbound: mpsc::Sender<Frame>,
    connected: AtomicBool,
    hub_tx: mpsc::Sender<HubEvent>,
    shutdown: Notify,
}

impl Connection {
    fn new(
        user_id: UserId,
        player: SharedPlayer,
        hub_tx: mpsc::Sender<HubEvent>,
        outbound: mpsc::Sender<Frame>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            user_id,
            player,
            room: RwLock::new(None),
            outbound,
            connected: AtomicBool::new(true),
            hub_tx,
            shutdown: Notify::new(),
        })
    }

    /// Builds a connection without pumps, for exercising the hub in
    /// tests. Returns the receiving end of the outbound queue so tests
    /// can observe delivered frames.
    #[cfg(test)]
    pub(crate) async fn detached(
        player: SharedPlayer,
        hub_tx: mpsc::Sender<HubEvent>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let user_id = player.read().await.id.clone();
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(user_id, player, hub_tx, tx), rx)
    }

    /// Takes ownership of an accepted WebSocket and spawns its pumps.
    ///
    /// The maximum inbound frame size is enforced by the stream's accept
    /// configuration; an oversized frame surfaces as a read error and
    /// closes the connection.
    pub async fn spawn(
        stream: WsStream,
        player: SharedPlayer,
        hub: &crate::HubHandle,
        liveness: Liveness,
    ) -> SharedConnection {
        let user_id = player.read().await.id.clone();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let conn = Self::new(user_id, player, hub.sender(), outbound_tx);

        let (sink, source) = stream.split();
        tokio::spawn(read_pump(Arc::clone(&conn), source, liveness));
        tokio::spawn(write_pump(Arc::clone(&conn), sink, outbound_rx, liveness));

        tracing::debug!(conn_id = %conn.id, user_id = %conn.user_id, "connection established");
        conn
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn player(&self) -> &SharedPlayer {
        &self.player
    }

    pub async fn room(&self) -> Option<RoomId> {
        self.room.read().await.clone()
    }

    pub(crate) async fn set_room(&self, room: Option<RoomId>) {
        *self.room.write().await = room;
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Enqueues a frame without blocking.
    ///
    /// A full queue means the client cannot keep up; the connection is
    /// marked dead and disconnected asynchronously.
    pub fn send(self: &Arc<Self>, frame: Frame) -> Result<(), HubError> {
        if !self.is_connected() {
            return Err(HubError::ConnectionClosed);
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    user_id = %self.user_id,
                    "outbound queue full, disconnecting slow client"
                );
                self.schedule_disconnect();
                Err(HubError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(HubError::ConnectionClosed),
        }
    }

    /// Builds and enqueues an `error` frame.
    pub fn send_error(self: &Arc<Self>, code: ErrorCode, message: &str) {
        let envelope = match Envelope::new(
            MessageKind::Error,
            &ErrorData {
                message: message.to_owned(),
                code,
            },
        ) {
            Ok(env) => env,
            Err(e) => {
                tracing::error!(error = %e, "failed to build error frame");
                return;
            }
        };
        match frame(&envelope) {
            Ok(f) => {
                let _ = self.send(f);
            }
            Err(e) => tracing::error!(error = %e, "failed to encode error frame"),
        }
    }

    /// Spawns the disconnect on a fresh task, for callers that must not
    /// await (fan-out paths).
    pub fn schedule_disconnect(self: &Arc<Self>) {
        let conn = Arc::clone(self);
        tokio::spawn(async move {
            conn.disconnect().await;
        });
    }

    /// Tears the connection down. Idempotent: the first call flips the
    /// liveness flag, marks the player disconnected, wakes both pumps,
    /// and notifies the hub; later calls are no-ops.
    pub async fn disconnect(self: &Arc<Self>) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        self.player.write().await.set_connected(false);
        self.shutdown.notify_waiters();

        if self
            .hub_tx
            .try_send(HubEvent::Unregister(Arc::clone(self)))
            .is_err()
        {
            tracing::warn!(conn_id = %self.id, "hub inbox unavailable during unregister");
        }

        tracing::info!(conn_id = %self.id, user_id = %self.user_id, "connection closed");
    }
}

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

async fn read_pump(
    conn: SharedConnection,
    mut source: SplitStream<WsStream>,
    liveness: Liveness,
) {
    let shutdown = conn.shutdown.notified();
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => break,
            next = tokio::time::timeout(liveness.pong_wait, source.next()) => next,
        };

        let message = match next {
            Err(_) => {
                tracing::info!(conn_id = %conn.id, "read deadline expired (heartbeat missed)");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(conn_id = %conn.id, error = %e, "read error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => handle_inbound(&conn, text.as_bytes()).await,
            Message::Binary(data) => handle_inbound(&conn, &data).await,
            Message::Close(_) => break,
            // Pings are answered by the stream itself; pongs matter only
            // because arriving at all reset the read deadline above.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    conn.disconnect().await;
}

async fn handle_inbound(conn: &SharedConnection, data: &[u8]) {
    let mut envelope: Envelope = match JsonCodec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(conn_id = %conn.id, error = %e, "undecodable frame");
            conn.send_error(ErrorCode::InvalidMessage, "invalid message format");
            return;
        }
    };

    // Stamp sender context; whatever the client claimed is overwritten.
    envelope.user_id = Some(conn.user_id.clone());
    envelope.room_id = conn.room().await;

    conn.player.write().await.touch();

    let inbound = HubEvent::Inbound(InboundMessage {
        conn: Arc::clone(conn),
        envelope,
    });
    if conn.hub_tx.try_send(inbound).is_err() {
        tracing::warn!(conn_id = %conn.id, "hub inbox full, dropping inbound frame");
    }
}

async fn write_pump(
    conn: SharedConnection,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<Frame>,
    liveness: Liveness,
) {
    let start = tokio::time::Instant::now() + liveness.ping_period;
    let mut ping = tokio::time::interval_at(start, liveness.ping_period);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = conn.shutdown.notified();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    let write = sink.send(Message::Text(frame));
                    match tokio::time::timeout(liveness.write_wait, write).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(conn_id = %conn.id, error = %e, "write failed");
                            break;
                        }
                        Err(_) => {
                            tracing::debug!(conn_id = %conn.id, "write deadline expired");
                            break;
                        }
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                let write = sink.send(Message::Ping(Bytes::new()));
                match tokio::time::timeout(liveness.write_wait, write).await {
                    Ok(Ok(())) => {}
                    _ => {
                        tracing::debug!(conn_id = %conn.id, "ping write failed");
                        break;
                    }
                }
            }
        }
    }

    conn.disconnect().await;
}
