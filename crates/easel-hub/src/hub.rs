//! The hub: central connection registry and fan-out router.
//!
//! The hub is one Tokio task that exclusively owns three indexes —
//! every connection, `user_id → connection`, and `room_id → connections`
//! — so index mutations need no locking at all. Everything arrives
//! through a bounded inbox via non-blocking sends; the event loop is the
//! single serialization point, which gives every client a coherent
//! ordering of control events.
//!
//! Inbound game messages are handed to the pluggable [`InboundHandler`].
//! The handler mutates room state and calls back into the [`HubHandle`]
//! fan-out primitives, which enqueue further events behind the one being
//! processed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use easel_protocol::{Envelope, RoomId, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::connection::{ConnectionId, Frame, SharedConnection};

/// Hub inbox capacity. Senders drop (and log) rather than block when
/// it fills.
const INBOX_CAPACITY: usize = 1024;

/// How often the hub sweeps its indexes for dead connections.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// An inbound frame paired with the connection that produced it.
pub struct InboundMessage {
    pub conn: SharedConnection,
    pub envelope: Envelope,
}

/// Who to skip during a room broadcast.
#[derive(Debug, Clone)]
pub enum Exclusion {
    None,
    Connection(ConnectionId),
    User(UserId),
}

impl Exclusion {
    fn excludes(&self, conn: &SharedConnection) -> bool {
        match self {
            Self::None => false,
            Self::Connection(id) => conn.id() == *id,
            Self::User(user) => conn.user_id() == user,
        }
    }
}

/// Events carried by the hub inbox.
pub enum HubEvent {
    Register(SharedConnection),
    Unregister(SharedConnection),
    Inbound(InboundMessage),
    JoinRoom {
        conn: SharedConnection,
        room: RoomId,
    },
    LeaveRoom {
        conn: SharedConnection,
        room: RoomId,
    },
    BroadcastAll(Frame),
    BroadcastRoom {
        room: RoomId,
        frame: Frame,
        exclude: Exclusion,
    },
    SendUser {
        user: UserId,
        frame: Frame,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    Shutdown,
}

/// A point-in-time view of hub state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
    pub messages_handled: u64,
}

/// Processes inbound messages on behalf of the hub's event loop.
pub trait InboundHandler: Send + Sync + 'static {
    async fn handle(&self, hub: &HubHandle, message: InboundMessage);
}

/// Cheap-to-clone handle for submitting events to the hub.
///
/// Every method is non-blocking: a full inbox drops the event with a
/// warning instead of stalling the caller.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub fn register(&self, conn: SharedConnection) {
        if self
            .tx
            .try_send(HubEvent::Register(Arc::clone(&conn)))
            .is_err()
        {
            tracing::warn!(conn_id = %conn.id(), "hub inbox unavailable, rejecting registration");
            conn.schedule_disconnect();
        }
    }

    pub fn join_room(&self, conn: SharedConnection, room: RoomId) {
        self.submit(HubEvent::JoinRoom { conn, room });
    }

    pub fn leave_room(&self, conn: SharedConnection, room: RoomId) {
        self.submit(HubEvent::LeaveRoom { conn, room });
    }

    pub fn broadcast_all(&self, frame: Frame) {
        self.submit(HubEvent::BroadcastAll(frame));
    }

    pub fn broadcast_room(&self, room: RoomId, frame: Frame, exclude: Exclusion) {
        self.submit(HubEvent::BroadcastRoom {
            room,
            frame,
            exclude,
        });
    }

    pub fn send_to_user(&self, user: UserId, frame: Frame) {
        self.submit(HubEvent::SendUser { user, frame });
    }

    /// Requests hub statistics. `None` if the hub has shut down.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubEvent::Stats { reply });
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        self.submit(HubEvent::Shutdown);
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<HubEvent> {
        self.tx.clone()
    }

    fn submit(&self, event: HubEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::warn!("hub inbox full, dropping event");
        }
    }
}

/// The connection registry and its event loop.
pub struct Hub<H: InboundHandler> {
    handler: H,
    handle: HubHandle,
    inbox: mpsc::Receiver<HubEvent>,
    connections: HashMap<ConnectionId, SharedConnection>,
    by_user: HashMap<UserId, SharedConnection>,
    by_room: HashMap<RoomId, HashSet<ConnectionId>>,
    messages_handled: u64,
}

impl<H: InboundHandler> Hub<H> {
    pub fn new(handler: H) -> (Self, HubHandle) {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = HubHandle { tx };
        let hub = Self {
            handler,
            handle: handle.clone(),
            inbox,
            connections: HashMap::new(),
            by_user: HashMap::new(),
            by_room: HashMap::new(),
            messages_handled: 0,
        };
        (hub, handle)
    }

    /// The hub's own handle (for wiring connections to the inbox).
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Runs the event loop until shutdown.
    pub async fn run(mut self) {
        tracing::info!("hub started");
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.inbox.recv() => match event {
                    None => break,
                    Some(HubEvent::Shutdown) => {
                        self.shutdown_all().await;
                        break;
                    }
                    Some(event) => self.dispatch(event).await,
                },
                _ = sweep.tick() => self.sweep().await,
            }
        }
        tracing::info!("hub stopped");
    }

    async fn dispatch(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(conn) => self.register(conn),
            HubEvent::Unregister(conn) => self.unregister(conn).await,
            HubEvent::Inbound(message) => {
                self.messages_handled += 1;
                self.handler.handle(&self.handle, message).await;
            }
            HubEvent::JoinRoom { conn, room } => {
                self.by_room
                    .entry(room.clone())
                    .or_default()
                    .insert(conn.id());
                conn.set_room(Some(room)).await;
            }
            HubEvent::LeaveRoom { conn, room } => {
                self.remove_from_room(conn.id(), &room);
                conn.set_room(None).await;
            }
            HubEvent::BroadcastAll(frame) => {
                for conn in self.connections.values() {
                    if conn.is_connected() {
                        let _ = conn.send(frame.clone());
                    }
                }
            }
            HubEvent::BroadcastRoom {
                room,
                frame,
                exclude,
            } => {
                let Some(members) = self.by_room.get(&room) else {
                    return;
                };
                for id in members {
                    let Some(conn) = self.connections.get(id) else {
                        continue;
                    };
                    if exclude.excludes(conn) || !conn.is_connected() {
                        continue;
                    }
                    // A full queue already schedules the target's
                    // disconnect inside send(); nothing to do here.
                    let _ = conn.send(frame.clone());
                }
            }
            HubEvent::SendUser { user, frame } => {
                if let Some(conn) = self.by_user.get(&user) {
                    if conn.is_connected() {
                        let _ = conn.send(frame);
                    }
                }
            }
            HubEvent::Stats { reply } => {
                let _ = reply.send(HubStats {
                    connections: self.connections.len(),
                    rooms: self.by_room.len(),
                    messages_handled: self.messages_handled,
                });
            }
            HubEvent::Shutdown => unreachable!("handled by run()"),
        }
    }

    fn register(&mut self, conn: SharedConnection) {
        // Last writer wins on user identity: a fresh connection for a
        // known user displaces the old one.
        if let Some(previous) = self.by_user.get(conn.user_id()) {
            tracing::info!(
                user_id = %conn.user_id(),
                old = %previous.id(),
                new = %conn.id(),
                "user reconnected, displacing previous connection"
            );
            let previous = Arc::clone(previous);
            self.connections.remove(&previous.id());
            previous.schedule_disconnect();
        }

        self.by_user.insert(conn.user_id().clone(), Arc::clone(&conn));
        self.connections.insert(conn.id(), conn);
        tracing::debug!(total = self.connections.len(), "connection registered");
    }

    async fn unregister(&mut self, conn: SharedConnection) {
        let id = conn.id();
        if self.connections.remove(&id).is_none() {
            // Already displaced by a reconnect or swept.
            self.forget_user_mapping(&conn);
            return;
        }
        self.forget_user_mapping(&conn);
        if let Some(room) = conn.room().await {
            self.remove_from_room(id, &room);
        }
        tracing::debug!(total = self.connections.len(), "connection unregistered");
    }

    /// Drops the `by_user` entry only if it still points at this
    /// connection — a reconnect may have replaced it already.
    fn forget_user_mapping(&mut self, conn: &SharedConnection) {
        if let Some(current) = self.by_user.get(conn.user_id()) {
            if current.id() == conn.id() {
                self.by_user.remove(conn.user_id());
            }
        }
    }

    fn remove_from_room(&mut self, id: ConnectionId, room: &RoomId) {
        if let Some(members) = self.by_room.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                self.by_room.remove(room);
            }
        }
    }

    /// Removes index entries for connections that died without a clean
    /// unregister.
    async fn sweep(&mut self) {
        let dead: Vec<SharedConnection> = self
            .connections
            .values()
            .filter(|conn| !conn.is_connected())
            .cloned()
            .collect();

        for conn in &dead {
            self.connections.remove(&conn.id());
            self.forget_user_mapping(conn);
            if let Some(room) = conn.room().await {
                self.remove_from_room(conn.id(), &room);
            }
        }

        if !dead.is_empty() {
            tracing::info!(count = dead.len(), "swept dead connections");
        }
    }

    async fn shutdown_all(&mut self) {
        tracing::info!(
            connections = self.connections.len(),
            "hub shutting down, disconnecting all clients"
        );
        for conn in self.connections.values() {
            conn.schedule_disconnect();
        }
        self.connections.clear();
        self.by_user.clear();
        self.by_room.clear();
    }
}

// =========================================================================
// Tests
// =========================================================================
