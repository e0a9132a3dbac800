//! `EaselServer` builder and accept loop.
//!
//! Ties the layers together: TCP accept → WebSocket upgrade → guest
//! identity → connection pumps → hub registration. Also exposes the
//! room operations the out-of-process HTTP front door consumes
//! (listings, room views, REST room creation).

use std::sync::Arc;

use easel_game::{Player, RoomRegistry, RoomSettings, WordBank};
use easel_hub::{Connection, Hub, HubHandle};
use easel_protocol::{ident, CreateRoomData, Difficulty, RoomId, RoomSnapshot};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::{Config, EaselError, SessionCoordinator};

/// Builder for configuring and starting a server.
pub struct EaselServerBuilder {
    bind_addr: String,
    config: Config,
}

impl EaselServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            config: Config::default(),
        }
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_owned();
        self
    }

    /// Sets the full configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration, loads the word bank, and binds the
    /// listener.
    pub async fn build(self) -> Result<EaselServer, EaselError> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let words = match WordBank::from_files(&config.word_files()) {
            Ok(bank) => bank,
            Err(e) => {
                tracing::warn!(error = %e, "word files unavailable, using built-in lists");
                WordBank::builtin()
            }
        };

        let registry = Arc::new(RoomRegistry::new());
        let coordinator = SessionCoordinator::new(
            Arc::clone(&registry),
            Arc::new(words),
            Arc::clone(&config),
        );
        let (hub, handle) = Hub::new(coordinator);

        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listener bound");

        Ok(EaselServer {
            listener,
            hub,
            handle,
            registry,
            config,
        })
    }
}

impl Default for EaselServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built server, ready to run.
pub struct EaselServer {
    listener: TcpListener,
    hub: Hub<SessionCoordinator>,
    handle: HubHandle,
    registry: Arc<RoomRegistry>,
    config: Arc<Config>,
}

impl EaselServer {
    pub fn builder() -> EaselServerBuilder {
        EaselServerBuilder::new()
    }

    /// The bound local address (useful with port 0 in tests).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle to the hub, e.g. for triggering shutdown.
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    // -----------------------------------------------------------------
    // Surface consumed by the HTTP front door
    // -----------------------------------------------------------------

    /// Public views of the active public rooms (`GET /api/rooms/public`).
    pub async fn public_rooms(&self) -> Vec<RoomSnapshot> {
        self.registry
            .list_public(self.config.inactive_room_timeout())
            .await
    }

    /// Public view of one room (`GET /api/rooms/{roomID}`).
    pub async fn room_view(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        let room = self.registry.get(room_id).await?;
        let snapshot = room.read().await.snapshot().await;
        Some(snapshot)
    }

    /// Matchmaking: the best public lobby to drop a player into, if any.
    /// The caller joins it over the socket with the returned code.
    pub async fn find_public_room(
        &self,
        max_players: usize,
        difficulty: Option<Difficulty>,
    ) -> Option<RoomSnapshot> {
        let room = self
            .registry
            .find_best_public(
                max_players,
                difficulty,
                self.config.inactive_room_timeout(),
            )
            .await?;
        let snapshot = room.read().await.snapshot().await;
        Some(snapshot)
    }

    /// Creates a room on behalf of a freshly generated guest host
    /// (`POST /api/rooms`). The guest claims the host seat when they
    /// connect over the socket and join by code.
    pub async fn create_room_with_guest_host(
        &self,
        data: CreateRoomData,
    ) -> Result<RoomSnapshot, EaselError> {
        let name = ident::sanitize(&data.room_name);
        if name.len() < 3 || name.len() > 30 {
            return Err(easel_game::GameError::InvalidState("invalid room name".into()).into());
        }
        if data.max_players < 2 || data.round_time == 0 || data.max_rounds == 0 {
            return Err(
                easel_game::GameError::InvalidState("invalid room settings".into()).into(),
            );
        }

        let host = Player::guest();
        let host_id = host.id.clone();
        let settings = RoomSettings {
            max_players: data.max_players,
            min_players: self.config.game.min_players_to_start,
            round_seconds: data.round_time,
            max_rounds: data.max_rounds,
            difficulty: data.difficulty,
            custom_words: data.custom_words,
        };

        let room = self
            .registry
            .create(host_id, data.room_type, name, settings)
            .await;
        let snapshot = {
            let mut r = room.write().await;
            r.add_player(host.shared()).await?;
            r.snapshot().await
        };
        Ok(snapshot)
    }

    // -----------------------------------------------------------------
    // Accept loop
    // -----------------------------------------------------------------

    /// Runs the server: spawns the hub event loop and the room cleanup
    /// task, then accepts connections until the process ends or the hub
    /// is shut down through [`handle()`](Self::handle).
    pub async fn run(self) -> Result<(), EaselError> {
        let Self {
            listener,
            hub,
            handle,
            registry,
            config,
        } = self;

        tokio::spawn(hub.run());
        registry.spawn_cleanup(
            config.room_cleanup_interval(),
            config.inactive_room_timeout(),
        );

        let ws_config = WebSocketConfig::default()
            .read_buffer_size(config.websocket.read_buffer_size)
            .write_buffer_size(config.websocket.write_buffer_size)
            .max_message_size(Some(config.websocket.max_message_size))
            .max_frame_size(Some(config.websocket.max_message_size));
        let liveness = config.liveness();

        tracing::info!("easel server running");
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    continue;
                }
            };

            let handle = handle.clone();
            tokio::spawn(async move {
                let ws = match tokio_tungstenite::accept_async_with_config(
                    stream,
                    Some(ws_config),
                )
                .await
                {
                    Ok(ws) => ws,
                    Err(e) => {
                        tracing::debug!(%addr, error = %e, "websocket upgrade failed");
                        return;
                    }
                };

                // Every connection starts as an anonymous guest; a
                // `connect` message may upgrade the identity later.
                let player = Player::guest().shared();
                let conn = Connection::spawn(ws, player, &handle, liveness).await;
                handle.register(conn);
            });
        }
    }
}
