//! Protocol-level errors and the stable error-code taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (malformed JSON, missing fields, wrong types).
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame parsed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Stable error codes surfaced to clients in `error` frames.
///
/// These strings are part of the wire contract — clients switch on them —
/// so variants serialize as `SCREAMING_SNAKE_CASE` and must never be
/// renamed once shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Input errors --
    InvalidData,
    InvalidUsername,
    InvalidRoomName,
    InvalidRoomCode,

    // -- State errors --
    NotInRoom,
    RoomNotFound,
    RoomCreationFailed,
    JoinFailed,
    NotHost,
    CannotStart,
    NotDrawer,
    InvalidState,

    // -- Protocol errors --
    UnknownMessageType,
    InvalidMessage,
    MessageCreationFailed,

    // -- System errors --
    ListRoomsFailed,
}

impl ErrorCode {
    /// The wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidData => "INVALID_DATA",
            Self::InvalidUsername => "INVALID_USERNAME",
            Self::InvalidRoomName => "INVALID_ROOM_NAME",
            Self::InvalidRoomCode => "INVALID_ROOM_CODE",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomCreationFailed => "ROOM_CREATION_FAILED",
            Self::JoinFailed => "JOIN_FAILED",
            Self::NotHost => "NOT_HOST",
            Self::CannotStart => "CANNOT_START",
            Self::NotDrawer => "NOT_DRAWER",
            Self::InvalidState => "INVALID_STATE",
            Self::UnknownMessageType => "UNKNOWN_MESSAGE_TYPE",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::MessageCreationFailed => "MESSAGE_CREATION_FAILED",
            Self::ListRoomsFailed => "LIST_ROOMS_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_to_stable_strings() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::InvalidRoomCode).unwrap(),
            "\"INVALID_ROOM_CODE\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::UnknownMessageType).unwrap(),
            "\"UNKNOWN_MESSAGE_TYPE\""
        );
    }

    #[test]
    fn test_error_code_as_str_matches_serde() {
        for code in [
            ErrorCode::InvalidData,
            ErrorCode::NotHost,
            ErrorCode::CannotStart,
            ErrorCode::ListRoomsFailed,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }
}
