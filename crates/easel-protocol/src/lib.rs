//! Wire protocol for easel.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Envelope`], [`MessageKind`], the payload structs) — the
//!   message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Identity** ([`ident`]) — room codes, usernames, opaque IDs, and the
//!   sanitization rules applied to everything a client types.
//! - **Errors** ([`ProtocolError`], [`ErrorCode`]) — decode failures and
//!   the stable error codes surfaced to clients.
//!
//! The protocol layer sits below everything else. It doesn't know about
//! connections or rooms — it only knows how messages look on the wire.

mod codec;
mod error;
pub mod ident;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::{ErrorCode, ProtocolError};
pub use types::{
    ChatMessageData, ConnectData, CreateRoomData, Difficulty, DrawDataPayload,
    DrawEndData, DrawKind, DrawMoveData, DrawStartData, Envelope, ErrorData,
    GameEndData, GamePhase, GameState, GameStats, GuessData, GuessResultData,
    GuesserResult, JoinRoomData, LeaderboardData, MessageKind, NewRoundData,
    PlayerReadyData, PlayerStats, PointsAwardedData, PublicPlayer,
    PublicRoomsListData, RoomId, RoomKind, RoomSnapshot, RoundEndData,
    TimerData, UserId,
};
