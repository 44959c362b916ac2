//! Error taxonomy for room operations.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{Cell, FleetError};
use crate::domain::{RoomId, RoomStatus};
use crate::store::StoreError;

/// Malformed input; the caller corrects it and tries again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    Fleet(FleetError),
    CoordinateOutOfRange { x: u8, y: u8 },
    RoomName { len: usize },
}

/// The request is well formed but the room is not in a state that allows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conflict {
    RoomFull,
    WrongStatus { expected: RoomStatus, actual: RoomStatus },
    NotYourTurn,
    AlreadyFired(Cell),
    OpponentMissing,
    OpponentFleetMissing,
    FleetLocked(RoomStatus),
}

/// The caller may not act on this room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unauthorized {
    NotParticipant,
    BadCredential,
}

/// Error returned by every room operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchError {
    Validation(ValidationError),
    Conflict(Conflict),
    Unauthorized(Unauthorized),
    NotFound(RoomId),
    /// Persistence failed; the room state was rolled back.
    Internal(String),
}

impl MatchError {
    /// Conflicts may succeed later without any change to the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Conflict(_))
    }
}

impl From<FleetError> for MatchError {
    fn from(err: FleetError) -> Self {
        MatchError::Validation(ValidationError::Fleet(err))
    }
}

impl From<Conflict> for MatchError {
    fn from(err: Conflict) -> Self {
        MatchError::Conflict(err)
    }
}

impl From<Unauthorized> for MatchError {
    fn from(err: Unauthorized) -> Self {
        MatchError::Unauthorized(err)
    }
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateShot { cell, .. } => {
                MatchError::Conflict(Conflict::AlreadyFired(cell))
            }
            other => MatchError::Internal(other.to_string()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Fleet(e) => write!(f, "invalid fleet: {}", e),
            ValidationError::CoordinateOutOfRange { x, y } => {
                write!(f, "coordinate ({}, {}) is outside the board", x, y)
            }
            ValidationError::RoomName { len } => {
                write!(f, "room name must be 3 to 50 characters, got {}", len)
            }
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::RoomFull => write!(f, "room is full"),
            Conflict::WrongStatus { expected, actual } => {
                write!(f, "room is {}, expected {}", actual, expected)
            }
            Conflict::NotYourTurn => write!(f, "not your turn"),
            Conflict::AlreadyFired(cell) => write!(f, "already fired at this cell {}", cell),
            Conflict::OpponentMissing => write!(f, "no opponent in the room"),
            Conflict::OpponentFleetMissing => write!(f, "opponent has not placed ships yet"),
            Conflict::FleetLocked(status) => {
                write!(f, "fleet cannot be changed while the room is {}", status)
            }
        }
    }
}

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unauthorized::NotParticipant => write!(f, "caller is not a participant of this room"),
            Unauthorized::BadCredential => write!(f, "wrong room password"),
        }
    }
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::Validation(e) => write!(f, "validation error: {}", e),
            MatchError::Conflict(e) => write!(f, "state conflict: {}", e),
            MatchError::Unauthorized(e) => write!(f, "unauthorized: {}", e),
            MatchError::NotFound(id) => write!(f, "{} not found", id),
            MatchError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for MatchError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlayerId;

    #[test]
    fn duplicate_shot_in_store_is_a_conflict() {
        let err: MatchError = StoreError::DuplicateShot {
            room: RoomId(1),
            shooter: PlayerId::from("a"),
            cell: Cell::new(2, 2),
        }
        .into();
        assert_eq!(err, MatchError::Conflict(Conflict::AlreadyFired(Cell::new(2, 2))));
        assert!(err.is_retryable());
    }

    #[test]
    fn other_store_failures_are_internal() {
        let err: MatchError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, MatchError::Internal(ref msg) if msg.contains("down")));
    }

    #[test]
    fn messages_read_naturally() {
        let err = MatchError::from(Conflict::OpponentFleetMissing);
        assert_eq!(err.to_string(), "state conflict: opponent has not placed ships yet");
    }
}
