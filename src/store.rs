//! Durable store collaborator.
//!
//! The room actor is the only writer for its room. Every mutation ends in
//! exactly one store call, and `commit_shot` enforces the
//! `(room, shooter, cell)` uniqueness constraint in the same step that
//! records the shot.

use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::common::Cell;
use crate::domain::{PlayerId, Room, RoomId, Shot};
use crate::ship::ShipPlacement;

/// Everything persisted for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub room: Room,
    pub password: Option<String>,
    pub ships: Vec<ShipPlacement>,
    pub shots: Vec<Shot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A shot at this cell by this shooter already exists.
    DuplicateShot { room: RoomId, shooter: PlayerId, cell: Cell },
    /// No record exists for the room.
    MissingRoom(RoomId),
    /// The backing store could not be reached or is corrupt.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateShot { room, shooter, cell } => {
                write!(f, "duplicate shot by {} at {} in {}", shooter, cell, room)
            }
            StoreError::MissingRoom(id) => write!(f, "no stored record for {}", id),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait::async_trait]
pub trait MatchStore: Send + Sync {
    /// Reserve a fresh room identity.
    async fn next_room_id(&self) -> Result<RoomId, StoreError>;

    /// Create or overwrite the room row.
    async fn save_room(&self, room: &Room, password: Option<&str>) -> Result<(), StoreError>;

    /// Atomically replace `owner`'s fleet and update the room row.
    async fn commit_fleet(
        &self,
        room: &Room,
        owner: &PlayerId,
        ships: &[ShipPlacement],
    ) -> Result<(), StoreError>;

    /// Atomically insert `shot`, overwrite the target fleet and update the
    /// room row. Fails with `DuplicateShot` without writing anything when the
    /// shooter already fired at that cell.
    async fn commit_shot(
        &self,
        room: &Room,
        shot: &Shot,
        target: &PlayerId,
        target_fleet: &[ShipPlacement],
    ) -> Result<(), StoreError>;

    async fn load(&self, id: RoomId) -> Result<Option<MatchRecord>, StoreError>;
}

/// Process-local store, used by tests, the simulator and the dev server.
#[derive(Default)]
pub struct InMemoryStore {
    next_id: AtomicU64,
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    records: HashMap<RoomId, MatchRecord>,
    shot_index: HashSet<(RoomId, PlayerId, Cell)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut tables = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        f(&mut tables)
    }
}

fn replace_owner_fleet(record: &mut MatchRecord, owner: &PlayerId, ships: &[ShipPlacement]) {
    record.ships.retain(|s| &s.owner != owner);
    record.ships.extend_from_slice(ships);
}

#[async_trait::async_trait]
impl MatchStore for InMemoryStore {
    async fn next_room_id(&self) -> Result<RoomId, StoreError> {
        Ok(RoomId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn save_room(&self, room: &Room, password: Option<&str>) -> Result<(), StoreError> {
        self.with_tables(|t| {
            let record = t.records.entry(room.id).or_insert_with(|| MatchRecord {
                room: room.clone(),
                password: None,
                ships: Vec::new(),
                shots: Vec::new(),
            });
            record.room = room.clone();
            record.password = password.map(str::to_string);
            Ok(())
        })
    }

    async fn commit_fleet(
        &self,
        room: &Room,
        owner: &PlayerId,
        ships: &[ShipPlacement],
    ) -> Result<(), StoreError> {
        self.with_tables(|t| {
            let record = t
                .records
                .get_mut(&room.id)
                .ok_or(StoreError::MissingRoom(room.id))?;
            replace_owner_fleet(record, owner, ships);
            record.room = room.clone();
            Ok(())
        })
    }

    async fn commit_shot(
        &self,
        room: &Room,
        shot: &Shot,
        target: &PlayerId,
        target_fleet: &[ShipPlacement],
    ) -> Result<(), StoreError> {
        self.with_tables(|t| {
            let key = (room.id, shot.shooter.clone(), shot.cell());
            if t.shot_index.contains(&key) {
                return Err(StoreError::DuplicateShot {
                    room: room.id,
                    shooter: shot.shooter.clone(),
                    cell: shot.cell(),
                });
            }
            let record = t
                .records
                .get_mut(&room.id)
                .ok_or(StoreError::MissingRoom(room.id))?;
            record.shots.push(shot.clone());
            replace_owner_fleet(record, target, target_fleet);
            record.room = room.clone();
            t.shot_index.insert(key);
            Ok(())
        })
    }

    async fn load(&self, id: RoomId) -> Result<Option<MatchRecord>, StoreError> {
        self.with_tables(|t| Ok(t.records.get(&id).cloned()))
    }
}
