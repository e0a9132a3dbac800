//! Unified error type for the easel server.

use easel_game::GameError;
use easel_hub::HubError;
use easel_protocol::ProtocolError;

use crate::ConfigError;

/// Top-level error wrapping every layer's failures.
#[derive(Debug, thiserror::Error)]
pub enum EaselError {
    /// Encoding or decoding a frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room, registry, or word-bank operation failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A connection or hub operation failed.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Binding or accepting connections failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
