//! Error types for the game layer.

use easel_protocol::{ErrorCode, RoomId, UserId};

/// Errors that can occur during room and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The room does not exist.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// No live room carries this code.
    #[error("no room with code {0}")]
    CodeNotFound(String),

    /// The room has no free player slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is already in the room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(UserId, RoomId),

    /// The player is not in the room.
    #[error("player {0} not in room {1}")]
    NotInRoom(UserId, RoomId),

    /// Only the host may perform this operation.
    #[error("player {0} is not the host")]
    NotHost(UserId),

    /// The start conditions are not met (player count, readiness).
    #[error("game cannot start")]
    CannotStart,

    /// Only the current drawer may perform this operation.
    #[error("player {0} is not the drawer")]
    NotDrawer(UserId),

    /// The room is in a state that doesn't allow this operation.
    #[error("invalid room state: {0}")]
    InvalidState(String),

    /// Loading or parsing word lists failed.
    #[error("word bank: {0}")]
    WordBank(String),
}

impl GameError {
    /// The stable wire code surfaced to clients for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) | Self::CodeNotFound(_) => ErrorCode::RoomNotFound,
            Self::RoomFull(_) | Self::AlreadyInRoom(..) => ErrorCode::JoinFailed,
            Self::NotInRoom(..) => ErrorCode::NotInRoom,
            Self::NotHost(_) => ErrorCode::NotHost,
            Self::CannotStart => ErrorCode::CannotStart,
            Self::NotDrawer(_) => ErrorCode::NotDrawer,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::WordBank(_) => ErrorCode::InvalidState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_wire_taxonomy() {
        let room = RoomId("room_1".into());
        let user = UserId("user_1".into());

        assert_eq!(
            GameError::RoomNotFound(room.clone()).code(),
            ErrorCode::RoomNotFound
        );
        assert_eq!(GameError::RoomFull(room.clone()).code(), ErrorCode::JoinFailed);
        assert_eq!(
            GameError::AlreadyInRoom(user.clone(), room.clone()).code(),
            ErrorCode::JoinFailed
        );
        assert_eq!(GameError::NotHost(user.clone()).code(), ErrorCode::NotHost);
        assert_eq!(GameError::CannotStart.code(), ErrorCode::CannotStart);
        assert_eq!(GameError::NotDrawer(user).code(), ErrorCode::NotDrawer);
    }
}
