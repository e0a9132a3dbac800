//! The room: authoritative state for a single game session.
//!
//! A room holds its players, the turn order, the current round's secret
//! word and drawing log, and the lifecycle state machine:
//!
//! ```text
//! state:  Lobby → Starting → Playing → Ended
//!           ↑__________________|  (end of game resets to Lobby)
//! phase:  Waiting → Drawing → Results   (within Playing, per round)
//! ```
//!
//! Rooms never talk to clients. Every method mutates state and returns an
//! outcome; the session coordinator turns outcomes into frames. Callers
//! hold the room's lock (see [`SharedRoom`](crate::SharedRoom)) for the
//! duration of a call and must drop it before any network send.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use easel_protocol::{
    DrawKind, Difficulty, GamePhase, GameState, PublicPlayer, RoomId, RoomKind,
    RoomSnapshot, UserId,
};
use serde::Serialize;

use crate::{GameError, SharedPlayer};

/// Upper bound on the retained drawing log. Oldest commands are dropped
/// first; the log only needs to reconstruct the current canvas.
pub const MAX_DRAW_LOG: usize = 10_000;

/// A single drawing command in the room's log.
#[derive(Debug, Clone, Serialize)]
pub struct DrawCommand {
    #[serde(rename = "type")]
    pub kind: DrawKind,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Per-room settings, fixed at creation.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub max_players: usize,
    pub min_players: usize,
    /// Round length in seconds.
    pub round_seconds: u64,
    pub max_rounds: u32,
    pub difficulty: Difficulty,
    /// Extra words for this room's picks only.
    pub custom_words: Vec<String>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 8,
            min_players: 2,
            round_seconds: 60,
            max_rounds: 5,
            difficulty: Difficulty::Easy,
            custom_words: Vec::new(),
        }
    }
}

/// What `remove_player` observed, so the coordinator can react.
#[derive(Debug)]
pub struct RemovalOutcome {
    pub removed: SharedPlayer,
    /// Set when the departing player was host and a new one was seated.
    pub new_host: Option<UserId>,
    /// The departing player was the current drawer of a live round.
    pub was_drawer: bool,
    pub now_empty: bool,
}

/// Authoritative state for one game session.
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub name: String,
    pub kind: RoomKind,
    pub host_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub settings: RoomSettings,

    pub state: GameState,
    pub phase: GamePhase,
    pub current_round: u32,
    /// Bumped on every round start and game end. Round timer tasks carry
    /// the serial they were spawned with; a stale serial means the timer
    /// belongs to a round that no longer exists.
    pub round_serial: u64,
    pub round_start: Option<DateTime<Utc>>,
    pub round_end: Option<DateTime<Utc>>,
    pub current_drawer: Option<UserId>,
    pub current_word: Option<String>,
    pub word_hint: Option<String>,
    /// Correct guessers of the current round, in guess order.
    pub guessed_players: Vec<UserId>,

    players: HashMap<UserId, SharedPlayer>,
    /// Join order; drives drawer rotation and host reassignment.
    player_order: Vec<UserId>,
    draw_log: VecDeque<DrawCommand>,
}

impl Room {
    pub fn new(
        id: RoomId,
        code: String,
        host_id: UserId,
        kind: RoomKind,
        name: String,
        settings: RoomSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            code,
            name,
            kind,
            host_id,
            created_at: now,
            last_activity: now,
            settings,
            state: GameState::Lobby,
            phase: GamePhase::Waiting,
            current_round: 0,
            round_serial: 0,
            round_start: None,
            round_end: None,
            current_drawer: None,
            current_word: None,
            word_hint: None,
            guessed_players: Vec::new(),
            players: HashMap::new(),
            player_order: Vec::new(),
            draw_log: VecDeque::new(),
        }
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Adds a player. Fails if the room is full or the player is already
    /// present.
    pub async fn add_player(&mut self, player: SharedPlayer) -> Result<UserId, GameError> {
        let user_id = player.read().await.id.clone();

        if self.players.len() >= self.settings.max_players {
            return Err(GameError::RoomFull(self.id.clone()));
        }
        if self.players.contains_key(&user_id) {
            return Err(GameError::AlreadyInRoom(user_id, self.id.clone()));
        }

        self.players.insert(user_id.clone(), player);
        self.player_order.push(user_id.clone());
        self.touch();

        tracing::debug!(room_id = %self.id, user_id = %user_id, players = self.players.len(), "player joined room");
        Ok(user_id)
    }

    /// Removes a player, preserving the relative join order of the rest.
    ///
    /// Reassigns the host (first remaining player in join order) when the
    /// host leaves, and reports whether the departed player was the
    /// drawer of a live round — the coordinator ends the round in that
    /// case.
    pub fn remove_player(&mut self, user_id: &UserId) -> Result<RemovalOutcome, GameError> {
        let removed = self
            .players
            .remove(user_id)
            .ok_or_else(|| GameError::NotInRoom(user_id.clone(), self.id.clone()))?;

        self.player_order.retain(|id| id != user_id);
        self.guessed_players.retain(|id| id != user_id);

        let mut new_host = None;
        if &self.host_id == user_id {
            if let Some(next) = self.player_order.first() {
                self.host_id = next.clone();
                new_host = Some(next.clone());
            }
        }

        let was_drawer = self.state == GameState::Playing
            && self.current_drawer.as_ref() == Some(user_id);

        self.touch();
        tracing::debug!(room_id = %self.id, user_id = %user_id, players = self.players.len(), "player left room");

        Ok(RemovalOutcome {
            removed,
            new_host,
            was_drawer,
            now_empty: self.players.is_empty(),
        })
    }

    pub fn player(&self, user_id: &UserId) -> Option<SharedPlayer> {
        self.players.get(user_id).cloned()
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.players.contains_key(user_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }

    pub fn can_join(&self) -> bool {
        self.state == GameState::Lobby && !self.is_full()
    }

    /// Player IDs in join order.
    pub fn player_order(&self) -> &[UserId] {
        &self.player_order
    }

    /// All players in join order.
    pub fn players(&self) -> impl Iterator<Item = (&UserId, &SharedPlayer)> {
        self.player_order
            .iter()
            .filter_map(|id| self.players.get(id).map(|p| (id, p)))
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Whether the game can start: still in the lobby, enough players,
    /// everyone ready.
    pub async fn can_start(&self) -> bool {
        if self.state != GameState::Lobby {
            return false;
        }
        if self.players.len() < self.settings.min_players {
            return false;
        }
        for player in self.players.values() {
            if !player.read().await.is_ready {
                return false;
            }
        }
        true
    }

    /// Transitions the lobby into a fresh game.
    ///
    /// Seats the first player in join order as round 1's drawer; the
    /// round counter itself is advanced by [`start_new_round`](Self::start_new_round).
    pub async fn start_game(&mut self) {
        self.state = GameState::Playing;
        self.phase = GamePhase::Drawing;
        self.current_round = 0;

        for player in self.players.values() {
            player.write().await.reset_game_data();
        }

        self.current_drawer = self.player_order.first().cloned();
        self.touch();
        tracing::info!(room_id = %self.id, players = self.players.len(), "game started");
    }

    /// Begins the next round with the given secret word and hint.
    ///
    /// Rotates the drawer one seat down the join order (wrapping) for
    /// every round after the first — round 1 keeps the seat assigned by
    /// [`start_game`](Self::start_game).
    pub async fn start_new_round(&mut self, word: String, hint: String) {
        if self.current_round >= 1 {
            self.advance_drawer();
        }
        self.current_round += 1;
        self.round_serial += 1;
        self.phase = GamePhase::Drawing;
        self.current_word = Some(word);
        self.word_hint = Some(hint);

        let now = Utc::now();
        self.round_start = Some(now);
        self.round_end =
            Some(now + ChronoDuration::seconds(self.settings.round_seconds as i64));

        self.guessed_players.clear();
        self.draw_log.clear();
        for player in self.players.values() {
            player.write().await.reset_round_data();
        }
        self.touch();

        tracing::info!(
            room_id = %self.id,
            round = self.current_round,
            drawer = ?self.current_drawer,
            "round started"
        );
    }

    /// Moves the round into its results phase.
    pub fn end_round(&mut self) {
        self.phase = GamePhase::Results;
        self.touch();
    }

    /// Resets the room to a fresh lobby after the final round.
    pub async fn end_game(&mut self) {
        self.state = GameState::Lobby;
        self.phase = GamePhase::Waiting;
        self.current_round = 0;
        self.round_serial += 1;
        self.round_start = None;
        self.round_end = None;
        self.current_drawer = None;
        self.current_word = None;
        self.word_hint = None;
        self.guessed_players.clear();
        self.draw_log.clear();

        for player in self.players.values() {
            player.write().await.reset_round_data();
        }
        self.touch();
        tracing::info!(room_id = %self.id, "game ended, room back to lobby");
    }

    /// Records a correct guess. Returns `true` only the first time a
    /// given player is recorded this round; the drawer is never recorded.
    pub fn add_guess(&mut self, user_id: &UserId) -> bool {
        if self.current_drawer.as_ref() == Some(user_id) {
            return false;
        }
        if !self.players.contains_key(user_id) {
            return false;
        }
        if self.guessed_players.contains(user_id) {
            return false;
        }
        self.guessed_players.push(user_id.clone());
        self.touch();
        true
    }

    /// Seconds left in the current round; 0 outside a round.
    pub fn time_left(&self) -> u64 {
        match self.round_end {
            Some(end) => {
                let left = end.signed_duration_since(Utc::now()).num_seconds();
                left.max(0) as u64
            }
            None => 0,
        }
    }

    // -----------------------------------------------------------------
    // Drawing log
    // -----------------------------------------------------------------

    /// Appends a drawing command, stamping it with the server clock.
    pub fn add_draw_command(&mut self, mut cmd: DrawCommand) {
        cmd.timestamp = Utc::now();
        if self.draw_log.len() >= MAX_DRAW_LOG {
            self.draw_log.pop_front();
        }
        self.draw_log.push_back(cmd);
        self.touch();
    }

    pub fn clear_drawing(&mut self) {
        self.draw_log.clear();
        self.touch();
    }

    pub fn draw_log(&self) -> impl Iterator<Item = &DrawCommand> {
        self.draw_log.iter()
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    /// The sanitized projection shared with clients and room listings.
    /// Never contains the secret word.
    pub async fn snapshot(&self) -> RoomSnapshot {
        let mut players = Vec::with_capacity(self.player_order.len());
        for (_, player) in self.players() {
            players.push(player.read().await.to_public());
        }

        RoomSnapshot {
            id: self.id.clone(),
            code: self.code.clone(),
            name: self.name.clone(),
            kind: self.kind,
            player_count: players.len(),
            max_players: self.settings.max_players,
            state: self.state,
            phase: self.phase,
            current_round: self.current_round,
            max_rounds: self.settings.max_rounds,
            round_time: self.settings.round_seconds,
            difficulty: self.settings.difficulty,
            players,
            time_left: self.time_left(),
            can_join: self.can_join(),
        }
    }

    /// Players sorted by score descending; ties broken by earlier join.
    pub async fn leaderboard(&self) -> Vec<PublicPlayer> {
        let mut entries = Vec::with_capacity(self.players.len());
        for player in self.players.values() {
            let p = player.read().await;
            entries.push((p.joined_at, p.to_public()));
        }
        entries.sort_by(|(joined_a, a), (joined_b, b)| {
            b.score.cmp(&a.score).then(joined_a.cmp(joined_b))
        });
        entries.into_iter().map(|(_, public)| public).collect()
    }

    /// Whether the room has seen activity within `timeout`.
    pub fn is_active(&self, timeout: std::time::Duration) -> bool {
        let timeout = ChronoDuration::from_std(timeout)
            .unwrap_or_else(|_| ChronoDuration::MAX);
        Utc::now().signed_duration_since(self.last_activity) <= timeout
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    fn advance_drawer(&mut self) {
        if self.player_order.is_empty() {
            self.current_drawer = None;
            return;
        }
        let current_index = self
            .current_drawer
            .as_ref()
            .and_then(|drawer| self.player_order.iter().position(|id| id == drawer));
        let next_index = match current_index {
            Some(i) => (i + 1) % self.player_order.len(),
            // Drawer left mid-game: restart rotation from the top.
            None => 0,
        };
        self.current_drawer = Some(self.player_order[next_index].clone());
    }
}
