//! Core protocol types for easel's wire format.
//!
//! Every message on the wire is an [`Envelope`]: a `type` tag, an opaque
//! `data` object whose schema depends on the tag, an RFC 3339 timestamp,
//! and optional sender context (`user_id`, `room_id`) stamped by the
//! server when a frame arrives.
//!
//! The payload structs in this module are the per-type schemas. Their
//! serde attributes are load-bearing: clients parse these exact field
//! names, so the unit tests at the bottom assert the JSON shape of every
//! type that crosses the wire.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque, stable identifier for a player session.
///
/// Serialized as a plain JSON string (`#[serde(transparent)]`), e.g.
/// `"user_k3j2h4g5l6m7"`. Generated server-side; clients never mint these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, stable identifier for a room.
///
/// Distinct from the human-typable room *code*: the ID is what the server
/// indexes by, the code is what players share with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Shared wire enums
// ---------------------------------------------------------------------------

/// Room visibility: public rooms appear in listings and matchmaking,
/// private rooms are joinable by code only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Public,
    Private,
}

/// Word difficulty level. Also selects the hint style and the scoring
/// multiplier (both applied elsewhere — on the wire this is just a tag).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Top-level lifecycle state of a room.
///
/// ```text
/// Lobby → Starting → Playing → Ended
///   ↑________________________|   (end of game resets to Lobby)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Lobby,
    Starting,
    Playing,
    Ended,
}

/// Sub-state within a round while the room is `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Waiting,
    Drawing,
    Guessing,
    Results,
}

/// The kind of a single drawing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawKind {
    Start,
    Move,
    End,
    Clear,
}

// ---------------------------------------------------------------------------
// MessageKind — the envelope's `type` tag
// ---------------------------------------------------------------------------

/// Every message type in the protocol, client→server and server→client.
///
/// Serialized as `snake_case` strings (`"create_room"`, `"round_ended"`).
/// An unrecognized tag deserializes to [`MessageKind::Unknown`] rather
/// than failing the whole envelope, so the server can answer with an
/// `UNKNOWN_MESSAGE_TYPE` error instead of dropping the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // -- Client → Server --
    Connect,
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    PlayerReady,
    StartGame,
    DrawStart,
    DrawMove,
    DrawEnd,
    SendGuess,
    ListPublicRooms,

    // -- Server → Client --
    RoomCreated,
    RoomJoined,
    PlayerJoined,
    PlayerLeft,
    PublicRoomsList,
    GameStarted,
    NewRound,
    RoundEnded,
    GameEnded,
    DrawData,
    ChatMessage,
    GuessResult,
    PointsAwarded,
    Leaderboard,
    Timer,
    Error,

    /// Catch-all for tags this server version does not know.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the serde name so logs match the wire.
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_owned());
        f.write_str(&name)
    }
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every frame on the wire is an Envelope.
///
/// `data` is deliberately untyped here ([`serde_json::Value`]): its schema
/// is per-`type`, and the dispatcher decodes it with [`Envelope::parse_data`]
/// once it knows which payload struct to expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The message type tag.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// The payload. Schema depends on `kind`; absent for data-less types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// When the frame was produced (RFC 3339, UTC). Stamped with the
    /// server clock when a client omits it.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Sender's user ID. Stamped by the server on inbound frames —
    /// anything a client puts here is overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Sender's current room ID, stamped like `user_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

impl Envelope {
    /// Creates an envelope with a serialized payload and a fresh timestamp.
    pub fn new<T: Serialize>(kind: MessageKind, data: &T) -> Result<Self, ProtocolError> {
        let data = serde_json::to_value(data).map_err(ProtocolError::Encode)?;
        Ok(Self {
            kind,
            data: Some(data),
            timestamp: Utc::now(),
            user_id: None,
            room_id: None,
        })
    }

    /// Creates an envelope with no payload.
    pub fn bare(kind: MessageKind) -> Self {
        Self {
            kind,
            data: None,
            timestamp: Utc::now(),
            user_id: None,
            room_id: None,
        }
    }

    /// Decodes the payload into the schema expected for this message type.
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match &self.data {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(ProtocolError::Decode)
            }
            None => Err(ProtocolError::InvalidMessage(format!(
                "message of type {} carries no data",
                self.kind
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server payloads
// ---------------------------------------------------------------------------

/// `connect` — upgrades the auto-generated guest identity with a chosen
/// username and avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectData {
    pub username: String,
    #[serde(default)]
    pub avatar: String,
}

/// `create_room` — settings for a new room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomData {
    pub room_name: String,
    pub room_type: RoomKind,
    pub max_players: usize,
    /// Round length in seconds.
    pub round_time: u64,
    pub max_rounds: u32,
    pub difficulty: Difficulty,
    /// Extra words mixed into this room's word pool only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_words: Vec<String>,
}

/// `join_room` — join by short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomData {
    pub room_code: String,
}

/// `player_ready` — toggle readiness in the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReadyData {
    pub ready: bool,
}

/// `draw_start` — pen down. Carries the stroke's color and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawStartData {
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub size: f64,
}

/// `draw_move` — pen drag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawMoveData {
    pub x: f64,
    pub y: f64,
}

/// `draw_end` — pen up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawEndData {
    pub x: f64,
    pub y: f64,
}

/// `send_guess` — a guess at the current word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessData {
    pub guess: String,
}

// ---------------------------------------------------------------------------
// Server → Client payloads
// ---------------------------------------------------------------------------

/// Sanitized projection of a player, safe to show to other players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
    pub score: u32,
    pub is_ready: bool,
    pub is_connected: bool,
    pub has_guessed_this_round: bool,
    pub rounds_won: u32,
    /// Correct guesses as a percentage of total guesses.
    pub accuracy: f64,
}

/// Sanitized projection of a room. Never contains the secret word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RoomKind,
    pub player_count: usize,
    pub max_players: usize,
    pub state: GameState,
    pub phase: GamePhase,
    pub current_round: u32,
    pub max_rounds: u32,
    /// Round length in seconds.
    pub round_time: u64,
    pub difficulty: Difficulty,
    pub players: Vec<PublicPlayer>,
    /// Seconds remaining in the current round (0 outside a round).
    pub time_left: u64,
    pub can_join: bool,
}

/// `chat_message` — a chat line; guesses are relayed through this too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageData {
    pub message: String,
    pub username: String,
    pub is_system: bool,
}

/// `points_awarded` — broadcast whenever a player scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAwardedData {
    pub user_id: UserId,
    pub username: String,
    pub points: u32,
    pub total_score: u32,
    pub reason: String,
}

/// `timer` — once-per-second countdown during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerData {
    pub time_left: u64,
    pub phase: GamePhase,
}

/// `error` — a message-level failure, sent only to the offending sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
    pub code: crate::ErrorCode,
}

/// `new_round` — round start announcement.
///
/// Two variants of this frame are emitted per round: the drawer's copy
/// carries `word`, everyone else's omits it. Building both from one
/// struct keeps the schemas aligned; the emitter controls visibility
/// by setting `word` to `None` for guessers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoundData {
    pub round: u32,
    pub max_rounds: u32,
    pub drawer_id: UserId,
    pub drawer_name: String,
    pub word_hint: String,
    /// Round length in seconds.
    pub time_limit: u64,
    /// The secret word. Present only in the frame sent to the drawer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

/// `guess_result` — the private verdict on a guess, sent to the guesser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResultData {
    pub correct: bool,
    /// The word, revealed only on a correct guess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    pub points: u32,
    pub total_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_bonus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_bonus: Option<u32>,
    pub round_ending: bool,
}

/// One row of the `round_ended` results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuesserResult {
    pub user_id: UserId,
    pub username: String,
    pub guessed: bool,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess_order: Option<u32>,
    /// Seconds from round start to the correct guess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess_time: Option<u64>,
}

/// `round_ended` — results of the round that just finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEndData {
    pub word: String,
    pub drawer_id: UserId,
    pub drawer_name: String,
    pub drawer_points: u32,
    pub guessers: Vec<GuesserResult>,
    pub leaderboard: Vec<PublicPlayer>,
    /// The upcoming round number; `0` means the game is ending.
    pub next_round: u32,
}

/// Per-player statistics in the `game_ended` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub correct_guesses: u32,
    pub total_guesses: u32,
    pub accuracy: f64,
    pub times_drawer: u32,
    pub average_points: f64,
}

/// Aggregate statistics for a completed game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub total_rounds: u32,
    pub total_players: usize,
    pub average_score: f64,
    pub highest_score: u32,
    pub player_stats: HashMap<UserId, PlayerStats>,
}

/// `game_ended` — final standings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndData {
    /// Highest score; ties broken by earliest join. `None` only if the
    /// room emptied before the game finished.
    pub winner: Option<PublicPlayer>,
    pub leaderboard: Vec<PublicPlayer>,
    pub game_stats: GameStats,
}

/// `leaderboard` — live standings, broadcast after every score change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardData {
    pub players: Vec<PublicPlayer>,
    pub current_round: u32,
    pub max_rounds: u32,
}

/// `public_rooms_list` — snapshot of joinable public rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicRoomsListData {
    pub rooms: Vec<RoomSnapshot>,
    pub total: usize,
}

/// `draw_data` — a drawing command relayed to the rest of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawDataPayload {
    #[serde(rename = "type")]
    pub kind: DrawKind,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    pub user_id: UserId,
}

// =========================================================================
// Tests
// =========================================================================
