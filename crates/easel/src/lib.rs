//! # Easel
//!
//! Realtime backend for a turn-based multiplayer drawing-and-guessing
//! game. Players connect over WebSockets, gather in rooms, and play timed
//! rounds in which one player draws a secret word while the rest guess.
//!
//! This meta crate ties the layers together:
//!
//! - [`Config`] — the full configuration tree with defaults and validation;
//! - [`SessionCoordinator`] — turns decoded inbound messages into room
//!   mutations and hub fan-out, and drives the round lifecycle;
//! - [`EaselServer`] — the accept loop, guest identity creation, and the
//!   surface consumed by the HTTP front door.
//!
//! ```rust,no_run
//! use easel::prelude::*;
//!
//! # async fn run() -> Result<(), EaselError> {
//! let server = EaselServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod rounds;
mod server;

pub use config::{Config, ConfigError};
pub use coordinator::SessionCoordinator;
pub use error::EaselError;
pub use server::{EaselServer, EaselServerBuilder};

/// Re-exports everything needed to embed or drive the server.
pub mod prelude {
    pub use crate::{Config, EaselError, EaselServer, EaselServerBuilder, SessionCoordinator};

    pub use easel_protocol::{
        Codec, Difficulty, Envelope, ErrorCode, GamePhase, GameState, JsonCodec,
        MessageKind, ProtocolError, RoomId, RoomKind, RoomSnapshot, UserId,
    };

    pub use easel_game::{
        GameError, Player, PointsConfig, Room, RoomRegistry, RoomSettings, WordBank,
    };

    pub use easel_hub::{
        Connection, ConnectionId, Hub, HubError, HubHandle, InboundHandler, Liveness,
    };
}
