//! The session coordinator: inbound message dispatch.
//!
//! Invoked by the hub's event loop for every decoded inbound frame. Each
//! handler validates, mutates the relevant room under its lock, releases
//! the lock, and then emits frames through the hub's fan-out primitives.
//!
//! Error policy: anything wrong with a *message* is answered with an
//! `error` frame to the originating connection only and never terminates
//! it; transport failures are the hub's problem; a room inconsistency
//! mid-round (e.g. the drawer vanished) is recovered by ending the round.

use std::sync::Arc;

use chrono::Utc;
use easel_game::{scoring, DrawCommand, RoomRegistry, RoomSettings, SharedRoom, WordBank};
use easel_hub::{
    frame, Exclusion, Frame, HubHandle, InboundHandler, InboundMessage, SharedConnection,
};
use easel_protocol::{
    ident, ChatMessageData, ConnectData, CreateRoomData, DrawDataPayload, DrawEndData,
    DrawKind, DrawMoveData, DrawStartData, Envelope, ErrorCode, GamePhase, GameState,
    GuessData, GuessResultData, JoinRoomData, LeaderboardData, MessageKind,
    PlayerReadyData, PointsAwardedData, PublicRoomsListData, RoomId, UserId,
};
use serde::Serialize;

use crate::{rounds, Config};

/// Translates inbound messages into room and hub effects.
///
/// Cheap to clone: all state is behind `Arc`s. Round timer tasks hold a
/// clone so they can drive round-end independently of any connection.
#[derive(Clone)]
pub struct SessionCoordinator {
    pub(crate) registry: Arc<RoomRegistry>,
    pub(crate) words: Arc<WordBank>,
    pub(crate) config: Arc<Config>,
}

impl SessionCoordinator {
    pub fn new(registry: Arc<RoomRegistry>, words: Arc<WordBank>, config: Arc<Config>) -> Self {
        Self {
            registry,
            words,
            config,
        }
    }
}

impl InboundHandler for SessionCoordinator {
    async fn handle(&self, hub: &HubHandle, message: InboundMessage) {
        let InboundMessage { conn, envelope } = message;
        tracing::trace!(kind = %envelope.kind, user_id = %conn.user_id(), "inbound message");

        match envelope.kind {
            MessageKind::Connect => self.handle_connect(&conn, &envelope).await,
            MessageKind::CreateRoom => self.handle_create_room(hub, &conn, &envelope).await,
            MessageKind::JoinRoom => self.handle_join_room(hub, &conn, &envelope).await,
            MessageKind::LeaveRoom => self.handle_leave_room(hub, &conn).await,
            MessageKind::PlayerReady => self.handle_player_ready(hub, &conn, &envelope).await,
            MessageKind::StartGame => self.handle_start_game(hub, &conn).await,
            MessageKind::DrawStart => {
                self.handle_draw(hub, &conn, &envelope, DrawKind::Start).await
            }
            MessageKind::DrawMove => {
                self.handle_draw(hub, &conn, &envelope, DrawKind::Move).await
            }
            MessageKind::DrawEnd => self.handle_draw(hub, &conn, &envelope, DrawKind::End).await,
            MessageKind::SendGuess => self.handle_send_guess(hub, &conn, &envelope).await,
            MessageKind::ListPublicRooms => self.handle_list_public_rooms(&conn).await,
            _ => {
                conn.send_error(ErrorCode::UnknownMessageType, "unknown message type");
            }
        }
    }
}

impl SessionCoordinator {
    // -----------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------

    async fn handle_connect(&self, conn: &SharedConnection, envelope: &Envelope) {
        let Ok(data) = envelope.parse_data::<ConnectData>() else {
            conn.send_error(ErrorCode::InvalidData, "invalid connect data");
            return;
        };

        if !ident::is_valid_username(&data.username) {
            conn.send_error(ErrorCode::InvalidUsername, "invalid username");
            return;
        }
        let username = ident::sanitize(&data.username);
        let avatar = ident::sanitize(&data.avatar);

        {
            let mut player = conn.player().write().await;
            player.username = username.clone();
            if !avatar.is_empty() {
                player.avatar = avatar;
            }
            player.guest = false;
            player.touch();
        }

        tracing::info!(user_id = %conn.user_id(), %username, "identity upgraded");
        if let Some(f) = system_chat("Successfully connected to the server") {
            let _ = conn.send(f);
        }
    }

    // -----------------------------------------------------------------
    // Room membership
    // -----------------------------------------------------------------

    async fn handle_create_room(
        &self,
        hub: &HubHandle,
        conn: &SharedConnection,
        envelope: &Envelope,
    ) {
        let Ok(data) = envelope.parse_data::<CreateRoomData>() else {
            conn.send_error(ErrorCode::InvalidData, "invalid room creation data");
            return;
        };

        let name = ident::sanitize(&data.room_name);
        if name.len() < 3 || name.len() > 30 {
            conn.send_error(ErrorCode::InvalidRoomName, "invalid room name");
            return;
        }
        if data.max_players < 2 || data.round_time == 0 || data.max_rounds == 0 {
            conn.send_error(ErrorCode::InvalidData, "invalid room settings");
            return;
        }

        let custom_words: Vec<String> = data
            .custom_words
            .iter()
            .map(|w| ident::sanitize(w))
            .filter(|w| !w.is_empty())
            .collect();

        let settings = RoomSettings {
            max_players: data.max_players,
            min_players: self.config.game.min_players_to_start,
            round_seconds: data.round_time,
            max_rounds: data.max_rounds,
            difficulty: data.difficulty,
            custom_words,
        };

        let room = self
            .registry
            .create(conn.user_id().clone(), data.room_type, name, settings)
            .await;

        let snapshot = {
            let mut r = room.write().await;
            if let Err(e) = r.add_player(Arc::clone(conn.player())).await {
                tracing::error!(error = %e, "host could not enter freshly created room");
                conn.send_error(ErrorCode::RoomCreationFailed, "failed to create room");
                return;
            }
            r.snapshot().await
        };

        hub.join_room(Arc::clone(conn), snapshot.id.clone());
        reply(conn, MessageKind::RoomCreated, &snapshot);

        // A new public room changes the lobby list for everyone.
        if snapshot.kind == easel_protocol::RoomKind::Public {
            self.broadcast_public_rooms(hub).await;
        }
    }

    async fn handle_join_room(
        &self,
        hub: &HubHandle,
        conn: &SharedConnection,
        envelope: &Envelope,
    ) {
        let Ok(data) = envelope.parse_data::<JoinRoomData>() else {
            conn.send_error(ErrorCode::InvalidData, "invalid join room data");
            return;
        };

        let code = ident::normalize_room_code(&data.room_code);
        if !ident::is_valid_room_code(&code) {
            conn.send_error(ErrorCode::InvalidRoomCode, "invalid room code");
            return;
        }

        let Some(room) = self.registry.get_by_code(&code).await else {
            conn.send_error(ErrorCode::RoomNotFound, "room not found");
            return;
        };

        let snapshot = {
            let mut r = room.write().await;
            match r.add_player(Arc::clone(conn.player())).await {
                Ok(_) => r.snapshot().await,
                Err(e) => {
                    conn.send_error(e.code(), &e.to_string());
                    return;
                }
            }
        };

        hub.join_room(Arc::clone(conn), snapshot.id.clone());
        reply(conn, MessageKind::RoomJoined, &snapshot);

        let joined = conn.player().read().await.to_public();
        if let Some(f) = encode(MessageKind::PlayerJoined, &joined) {
            hub.broadcast_room(snapshot.id.clone(), f, Exclusion::Connection(conn.id()));
        }
    }

    async fn handle_leave_room(&self, hub: &HubHandle, conn: &SharedConnection) {
        let Some(room_id) = conn.room().await else {
            conn.send_error(ErrorCode::NotInRoom, "not in a room");
            return;
        };

        let outcome = match self.registry.leave(&room_id, conn.user_id()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                conn.send_error(e.code(), &e.to_string());
                return;
            }
        };

        hub.leave_room(Arc::clone(conn), room_id.clone());

        let left = outcome.removed.read().await.to_public();
        if let Some(f) = encode(MessageKind::PlayerLeft, &left) {
            hub.broadcast_room(room_id.clone(), f, Exclusion::None);
        }
        if let Some(f) = system_chat("You have left the room") {
            let _ = conn.send(f);
        }

        // A departing drawer ends the round on the spot (and gets no
        // drawer points, since they are no longer in the room).
        if outcome.was_drawer && !outcome.now_empty {
            if let Some(room) = self.registry.get(&room_id).await {
                let serial = room.read().await.round_serial;
                rounds::end_round(self, hub, &room, serial).await;
            }
        }
    }

    async fn handle_player_ready(
        &self,
        hub: &HubHandle,
        conn: &SharedConnection,
        envelope: &Envelope,
    ) {
        let Ok(data) = envelope.parse_data::<PlayerReadyData>() else {
            conn.send_error(ErrorCode::InvalidData, "invalid ready data");
            return;
        };
        let Some((_, room)) = self.current_room(conn).await else {
            conn.send_error(ErrorCode::NotInRoom, "not in a room");
            return;
        };

        conn.player().write().await.set_ready(data.ready);
        let public = conn.player().read().await.to_public();
        let room_id = {
            let mut r = room.write().await;
            r.touch();
            r.id.clone()
        };

        if let Some(f) = encode(MessageKind::PlayerReady, &public) {
            hub.broadcast_room(room_id, f, Exclusion::None);
        }
    }

    // -----------------------------------------------------------------
    // Game flow
    // -----------------------------------------------------------------

    async fn handle_start_game(&self, hub: &HubHandle, conn: &SharedConnection) {
        let Some((_, room)) = self.current_room(conn).await else {
            conn.send_error(ErrorCode::NotInRoom, "not in a room");
            return;
        };

        {
            let r = room.read().await;
            if &r.host_id != conn.user_id() {
                conn.send_error(ErrorCode::NotHost, "only the host can start the game");
                return;
            }
            if !r.can_start().await {
                conn.send_error(
                    ErrorCode::CannotStart,
                    "not enough players or not all ready",
                );
                return;
            }
        }

        rounds::start_game(self, hub, room).await;
    }

    async fn handle_draw(
        &self,
        hub: &HubHandle,
        conn: &SharedConnection,
        envelope: &Envelope,
        kind: DrawKind,
    ) {
        let Some((room_id, room)) = self.current_room(conn).await else {
            conn.send_error(ErrorCode::NotInRoom, "not in a room");
            return;
        };

        if room.read().await.current_drawer.as_ref() != Some(conn.user_id()) {
            conn.send_error(ErrorCode::NotDrawer, "not your turn to draw");
            return;
        }

        let (x, y, color, size) = match kind {
            DrawKind::Start => match envelope.parse_data::<DrawStartData>() {
                Ok(d) => (d.x, d.y, Some(d.color), Some(d.size)),
                Err(_) => {
                    conn.send_error(ErrorCode::InvalidData, "invalid draw data");
                    return;
                }
            },
            DrawKind::Move => match envelope.parse_data::<DrawMoveData>() {
                Ok(d) => (d.x, d.y, None, None),
                Err(_) => {
                    conn.send_error(ErrorCode::InvalidData, "invalid draw data");
                    return;
                }
            },
            DrawKind::End | DrawKind::Clear => match envelope.parse_data::<DrawEndData>() {
                Ok(d) => (d.x, d.y, None, None),
                Err(_) => {
                    conn.send_error(ErrorCode::InvalidData, "invalid draw data");
                    return;
                }
            },
        };

        {
            let mut r = room.write().await;
            if kind == DrawKind::Clear {
                r.clear_drawing();
            }
            r.add_draw_command(DrawCommand {
                kind,
                x,
                y,
                color: color.clone(),
                size,
                timestamp: Utc::now(),
            });
        }

        let payload = DrawDataPayload {
            kind,
            x,
            y,
            color,
            size,
            user_id: conn.user_id().clone(),
        };
        if let Some(f) = encode(MessageKind::DrawData, &payload) {
            hub.broadcast_room(room_id, f, Exclusion::Connection(conn.id()));
        }
    }

    async fn handle_send_guess(
        &self,
        hub: &HubHandle,
        conn: &SharedConnection,
        envelope: &Envelope,
    ) {
        let Some((room_id, room)) = self.current_room(conn).await else {
            conn.send_error(ErrorCode::NotInRoom, "not in a room");
            return;
        };
        let Ok(data) = envelope.parse_data::<GuessData>() else {
            conn.send_error(ErrorCode::InvalidData, "invalid guess data");
            return;
        };
        let guess = ident::sanitize(&data.guess);

        let verdict = self.evaluate_guess(&room, conn.user_id(), &guess).await;
        match verdict {
            GuessVerdict::NotPlaying => {
                conn.send_error(ErrorCode::InvalidState, "game not in progress");
            }
            GuessVerdict::NotInRoom => {
                conn.send_error(ErrorCode::NotInRoom, "not in a room");
            }
            // Only the secret word itself is suppressed: a matching
            // submission from the drawer or a repeat guesser must never
            // reach the room as chat before the round ends.
            GuessVerdict::Ineligible => {}
            GuessVerdict::Incorrect { username } => {
                let chat = ChatMessageData {
                    message: guess,
                    username,
                    is_system: false,
                };
                if let Some(f) = encode(MessageKind::ChatMessage, &chat) {
                    hub.broadcast_room(room_id, f, Exclusion::None);
                }
            }
            GuessVerdict::Correct {
                result,
                username,
                leaderboard,
                round_serial,
            } => {
                let round_ending = result.round_ending;
                let points = result.points;
                let total_score = result.total_score;

                reply(conn, MessageKind::GuessResult, &result);

                let awarded = PointsAwardedData {
                    user_id: conn.user_id().clone(),
                    username,
                    points,
                    total_score,
                    reason: "Correct guess".to_owned(),
                };
                if let Some(f) = encode(MessageKind::PointsAwarded, &awarded) {
                    hub.broadcast_room(room_id.clone(), f, Exclusion::None);
                }
                if let Some(f) = encode(MessageKind::Leaderboard, &leaderboard) {
                    hub.broadcast_room(room_id.clone(), f, Exclusion::None);
                }

                if round_ending {
                    rounds::end_round(self, hub, &room, round_serial).await;
                }
            }
        }
    }

    async fn handle_list_public_rooms(&self, conn: &SharedConnection) {
        let rooms = self
            .registry
            .list_public(self.config.inactive_room_timeout())
            .await;
        let data = PublicRoomsListData {
            total: rooms.len(),
            rooms,
        };
        match encode(MessageKind::PublicRoomsList, &data) {
            Some(f) => {
                let _ = conn.send(f);
            }
            None => conn.send_error(ErrorCode::ListRoomsFailed, "failed to list rooms"),
        }
    }

    // -----------------------------------------------------------------
    // Guess validation
    // -----------------------------------------------------------------

    /// Runs the whole guess under one room write lock and reports what
    /// to emit. No frames are sent while the lock is held.
    async fn evaluate_guess(
        &self,
        room: &SharedRoom,
        user_id: &UserId,
        guess: &str,
    ) -> GuessVerdict {
        let mut r = room.write().await;

        if r.state != GameState::Playing || r.phase != GamePhase::Drawing {
            return GuessVerdict::NotPlaying;
        }
        let Some(word) = r.current_word.clone() else {
            return GuessVerdict::NotPlaying;
        };
        let Some(player) = r.player(user_id) else {
            return GuessVerdict::NotInRoom;
        };

        let matches = guess.trim().to_lowercase() == word.trim().to_lowercase();
        let is_drawer = r.current_drawer.as_ref() == Some(user_id);
        let already_guessed = player.read().await.has_guessed_this_round;

        // Any non-matching text reads as chat for the whole room, the
        // drawer's banter included. Only eligible guessers take the
        // failed attempt on their stats.
        if !matches {
            let username = if is_drawer || already_guessed {
                player.read().await.username.clone()
            } else {
                let mut p = player.write().await;
                p.record_guess(false, None);
                p.username.clone()
            };
            return GuessVerdict::Incorrect { username };
        }

        if is_drawer || already_guessed {
            return GuessVerdict::Ineligible;
        }

        // Correct guess: order is assigned at validation time, before
        // the insert, so the first guesser is order 1.
        let order = r.guessed_players.len() as u32 + 1;
        let elapsed = r
            .round_start
            .map(|start| Utc::now().signed_duration_since(start).num_seconds().max(0) as u64)
            .unwrap_or(0);
        let score = scoring::score_guess(
            &self.config.points,
            order,
            order,
            elapsed,
            r.settings.round_seconds,
            r.player_count() as u32,
            r.settings.difficulty,
        );

        let (username, total_score) = {
            let mut p = player.write().await;
            p.record_guess(true, Some(order));
            p.add_score(score.total);
            (p.username.clone(), p.score)
        };
        r.add_guess(user_id);

        let round_ending =
            r.guessed_players.len() == r.player_count().saturating_sub(1) || r.time_left() == 0;

        let leaderboard = LeaderboardData {
            players: r.leaderboard().await,
            current_round: r.current_round,
            max_rounds: r.settings.max_rounds,
        };

        GuessVerdict::Correct {
            result: GuessResultData {
                correct: true,
                word: Some(word),
                points: score.total,
                total_score,
                guess_order: Some(order),
                bonus: Some(score.difficulty_bonus),
                time_bonus: Some(score.time_bonus),
                order_bonus: Some(score.order_bonus),
                round_ending,
            },
            username,
            leaderboard,
            round_serial: r.round_serial,
        }
    }

    // -----------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------

    async fn current_room(&self, conn: &SharedConnection) -> Option<(RoomId, SharedRoom)> {
        let room_id = conn.room().await?;
        let room = self.registry.get(&room_id).await?;
        Some((room_id, room))
    }

    pub(crate) async fn broadcast_public_rooms(&self, hub: &HubHandle) {
        let rooms = self
            .registry
            .list_public(self.config.inactive_room_timeout())
            .await;
        let data = PublicRoomsListData {
            total: rooms.len(),
            rooms,
        };
        if let Some(f) = encode(MessageKind::PublicRoomsList, &data) {
            hub.broadcast_all(f);
        }
    }
}

enum GuessVerdict {
    NotPlaying,
    NotInRoom,
    Ineligible,
    Incorrect {
        username: String,
    },
    Correct {
        result: GuessResultData,
        username: String,
        leaderboard: LeaderboardData,
        round_serial: u64,
    },
}

/// Encodes a payload into a frame, logging (not propagating) failures —
/// an unencodable broadcast should never take down the event loop.
pub(crate) fn encode<T: Serialize>(kind: MessageKind, data: &T) -> Option<Frame> {
    let envelope = match Envelope::new(kind, data) {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(%kind, error = %e, "failed to build envelope");
            return None;
        }
    };
    match frame(&envelope) {
        Ok(f) => Some(f),
        Err(e) => {
            tracing::error!(%kind, error = %e, "failed to encode frame");
            None
        }
    }
}

/// Sends a payload to one connection, reporting encode failures to it.
pub(crate) fn reply<T: Serialize>(conn: &SharedConnection, kind: MessageKind, data: &T) {
    match encode(kind, data) {
        Some(f) => {
            let _ = conn.send(f);
        }
        None => conn.send_error(ErrorCode::MessageCreationFailed, "failed to create message"),
    }
}

/// A system chat line.
pub(crate) fn system_chat(text: &str) -> Option<Frame> {
    encode(
        MessageKind::ChatMessage,
        &ChatMessageData {
            message: text.to_owned(),
            username: "System".to_owned(),
            is_system: true,
        },
    )
}
