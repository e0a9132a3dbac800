//! Authoritative game state for easel: players, rooms, the room registry,
//! scoring, and the word bank.
//!
//! Nothing in this crate performs I/O toward clients. Rooms mutate state
//! and report outcomes; the session layer above decides what to send and
//! to whom. Rooms and players are shared behind `tokio::sync::RwLock` —
//! the locking conventions are documented on [`SharedRoom`] and
//! [`SharedPlayer`].

mod error;
mod player;
mod registry;
mod room;
pub mod scoring;
mod words;

pub use error::GameError;
pub use player::{Player, SharedPlayer};
pub use registry::{RoomRegistry, SharedRoom};
pub use room::{DrawCommand, RemovalOutcome, Room, RoomSettings, MAX_DRAW_LOG};
pub use scoring::{GuessScore, PointsConfig};
pub use words::WordBank;
