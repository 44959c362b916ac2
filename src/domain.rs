//! Serializable data model shared by the engine, the store and the wire.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Cell, ShotResult};
use crate::config::MAX_PLAYERS;

/// Identity of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Verified player identity, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Fewer than two participants, or no fleet submitted yet.
    Waiting,
    /// At least one fleet submitted, not both.
    Placing,
    /// Both fleets in place; shots are accepted.
    Playing,
    /// A fleet was fully sunk.
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Placing => "placing",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Snapshot of a match as seen by its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub max_players: u8,
    /// Join order; the first entry always opens fire.
    pub participants: Vec<PlayerId>,
    pub current_turn: Option<PlayerId>,
    pub winner: Option<PlayerId>,
    /// Whether joining requires a credential.
    pub locked: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: RoomId, name: String, creator: PlayerId, locked: bool, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            status: RoomStatus::Waiting,
            max_players: MAX_PLAYERS as u8,
            participants: vec![creator],
            current_turn: None,
            winner: None,
            locked,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, player: &PlayerId) -> bool {
        self.participants.iter().any(|p| p == player)
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_PLAYERS
    }

    /// The other participant, if one has joined.
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        self.participants.iter().find(|p| *p != player)
    }
}

/// A recorded shot. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    pub shooter: PlayerId,
    pub room: RoomId,
    pub x: u8,
    pub y: u8,
    pub result: ShotResult,
    pub timestamp: DateTime<Utc>,
}

impl Shot {
    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }
}

/// State change published to room subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Monotonic per room; consumers de-duplicate on it.
    pub id: u64,
    pub room: RoomId,
    pub kind: RoomEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomEventKind {
    RoomUpdated(Room),
    ShotFired(Shot),
}
