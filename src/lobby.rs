//! Room directory: creation, lookup and rehydration of room actors.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use tokio::sync::Mutex;

use crate::broadcast::Subscription;
use crate::config::EngineConfig;
use crate::domain::{PlayerId, Room, RoomId, Shot};
use crate::error::MatchError;
use crate::game::Match;
use crate::protocol::RoomApi;
use crate::room::{RoomActor, RoomHandle};
use crate::ship::{ShipPlacement, ShipSpec};
use crate::store::{MatchRecord, MatchStore};

/// Entry point for every room operation. Each room is served by its own
/// actor; rooms not currently running are reloaded from the store on first
/// use.
///
/// Every known room has a slot guarded by its own lock. The directory lock
/// is only held to find or insert a slot, so a slow store read blocks
/// lookups of that one room and nothing else.
pub struct Lobby {
    store: Arc<dyn MatchStore>,
    config: EngineConfig,
    rooms: Mutex<HashMap<RoomId, Slot>>,
}

type Slot = Arc<Mutex<Option<RoomHandle>>>;

impl Lobby {
    pub fn new(store: Arc<dyn MatchStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Handle to the running actor for `id`, starting one from the stored
    /// record if necessary.
    pub async fn room(&self, id: RoomId) -> Result<RoomHandle, MatchError> {
        let slot = match self.slot(id).await {
            Some(slot) => slot,
            None => {
                // unknown ids must not leave empty slots behind
                self.load_live(id).await?;
                self.rooms.lock().await.entry(id).or_default().clone()
            }
        };
        let mut slot = slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.is_running() {
                return Ok(handle.clone());
            }
        }
        *slot = None;
        let record = self.load_live(id).await?;
        info!("{} reloaded from store", id);
        let game = Match::from_record(record, Utc::now());
        let handle = RoomActor::spawn(game, self.store.clone(), self.config.command_buffer);
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Number of rooms with a running actor.
    pub async fn active_rooms(&self) -> usize {
        let slots: Vec<Slot> = self.rooms.lock().await.values().cloned().collect();
        let mut running = 0;
        for slot in slots {
            if slot.lock().await.as_ref().is_some_and(RoomHandle::is_running) {
                running += 1;
            }
        }
        running
    }

    async fn slot(&self, id: RoomId) -> Option<Slot> {
        self.rooms.lock().await.get(&id).cloned()
    }

    async fn load_live(&self, id: RoomId) -> Result<MatchRecord, MatchError> {
        match self.store.load(id).await? {
            Some(record) if !record.room.deleted => Ok(record),
            _ => Err(MatchError::NotFound(id)),
        }
    }
}

#[async_trait::async_trait]
impl RoomApi for Lobby {
    async fn create_room(
        &self,
        caller: &PlayerId,
        name: &str,
        password: Option<String>,
    ) -> Result<Room, MatchError> {
        let id = self.store.next_room_id().await?;
        let game = Match::create(id, name, caller.clone(), password, Utc::now())?;
        let room = game.room().clone();
        self.store.save_room(&room, game.password()).await?;
        info!("{} \"{}\" opened by {}", room.id, room.name, caller);
        let handle = RoomActor::spawn(game, self.store.clone(), self.config.command_buffer);
        self.rooms
            .lock()
            .await
            .insert(id, Arc::new(Mutex::new(Some(handle))));
        Ok(room)
    }

    async fn join_room(
        &self,
        room: RoomId,
        caller: &PlayerId,
        credential: Option<String>,
    ) -> Result<Room, MatchError> {
        self.room(room).await?.join(caller.clone(), credential).await
    }

    async fn leave_room(&self, room: RoomId, caller: &PlayerId) -> Result<Room, MatchError> {
        self.room(room).await?.leave(caller.clone()).await
    }

    async fn submit_fleet(
        &self,
        room: RoomId,
        caller: &PlayerId,
        ships: Vec<ShipSpec>,
    ) -> Result<Vec<ShipPlacement>, MatchError> {
        self.room(room).await?.submit_fleet(caller.clone(), ships).await
    }

    async fn fire_shot(
        &self,
        room: RoomId,
        caller: &PlayerId,
        x: u8,
        y: u8,
    ) -> Result<Shot, MatchError> {
        self.room(room).await?.fire_shot(caller.clone(), x, y).await
    }

    async fn room_state(&self, room: RoomId, caller: &PlayerId) -> Result<Room, MatchError> {
        self.room(room).await?.snapshot(caller.clone()).await
    }

    async fn my_ships(
        &self,
        room: RoomId,
        caller: &PlayerId,
    ) -> Result<Vec<ShipPlacement>, MatchError> {
        self.room(room).await?.my_ships(caller.clone()).await
    }

    async fn shots(&self, room: RoomId, caller: &PlayerId) -> Result<Vec<Shot>, MatchError> {
        self.room(room).await?.shots(caller.clone()).await
    }

    async fn archive_room(&self, room: RoomId, caller: &PlayerId) -> Result<(), MatchError> {
        self.room(room).await?.archive(caller.clone()).await?;
        self.rooms.lock().await.remove(&room);
        Ok(())
    }

    async fn subscribe(&self, room: RoomId, caller: &PlayerId) -> Result<Subscription, MatchError> {
        self.room(room).await?.subscribe(caller.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, StoreError};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};

    /// Holds every `load` of one room until the test releases it.
    struct GatedStore {
        inner: InMemoryStore,
        gated: AtomicU64,
        entered: Notify,
        gate: Semaphore,
    }

    #[async_trait::async_trait]
    impl MatchStore for GatedStore {
        async fn next_room_id(&self) -> Result<RoomId, StoreError> {
            self.inner.next_room_id().await
        }

        async fn save_room(&self, room: &Room, password: Option<&str>) -> Result<(), StoreError> {
            self.inner.save_room(room, password).await
        }

        async fn commit_fleet(
            &self,
            room: &Room,
            owner: &PlayerId,
            ships: &[ShipPlacement],
        ) -> Result<(), StoreError> {
            self.inner.commit_fleet(room, owner, ships).await
        }

        async fn commit_shot(
            &self,
            room: &Room,
            shot: &Shot,
            target: &PlayerId,
            target_fleet: &[ShipPlacement],
        ) -> Result<(), StoreError> {
            self.inner.commit_shot(room, shot, target, target_fleet).await
        }

        async fn load(&self, id: RoomId) -> Result<Option<MatchRecord>, StoreError> {
            if id.0 == self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                let permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                permit.forget();
            }
            self.inner.load(id).await
        }
    }

    fn lobby() -> Lobby {
        Lobby::new(Arc::new(InMemoryStore::new()), EngineConfig::default())
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let lobby = lobby();
        let err = lobby.room_state(RoomId(42), &PlayerId::from("a")).await.unwrap_err();
        assert_eq!(err, MatchError::NotFound(RoomId(42)));
    }

    #[tokio::test]
    async fn archived_room_disappears() {
        let lobby = lobby();
        let a = PlayerId::from("a");
        let room = lobby.create_room(&a, "harbour", None).await.unwrap();
        lobby.archive_room(room.id, &a).await.unwrap();
        assert_eq!(
            lobby.join_room(room.id, &PlayerId::from("b"), None).await.unwrap_err(),
            MatchError::NotFound(room.id)
        );
        assert_eq!(lobby.active_rooms().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_load_only_blocks_its_own_room() {
        let store = Arc::new(GatedStore {
            inner: InMemoryStore::new(),
            gated: AtomicU64::new(u64::MAX),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        });
        let a = PlayerId::from("a");
        let (quick, slow) = {
            let first = Lobby::new(store.clone(), EngineConfig::default());
            let quick = first.create_room(&a, "quick", None).await.unwrap();
            let slow = first.create_room(&a, "slow", None).await.unwrap();
            (quick.id, slow.id)
        };

        let lobby = Arc::new(Lobby::new(store.clone(), EngineConfig::default()));
        lobby.room_state(quick, &a).await.unwrap();
        store.gated.store(slow.0, Ordering::SeqCst);
        let pending = {
            let lobby = lobby.clone();
            let a = a.clone();
            tokio::spawn(async move { lobby.room_state(slow, &a).await })
        };
        store.entered.notified().await;

        let room = tokio::time::timeout(Duration::from_secs(5), lobby.room_state(quick, &a))
            .await
            .expect("lookup of a loaded room waited on another room's load")
            .unwrap();
        assert_eq!(room.name, "quick");

        store.gate.add_permits(2);
        assert_eq!(pending.await.unwrap().unwrap().name, "slow");
        assert_eq!(lobby.active_rooms().await, 2);
    }

    #[tokio::test]
    async fn room_reloads_after_actor_restart() {
        let store: Arc<dyn MatchStore> = Arc::new(InMemoryStore::new());
        let a = PlayerId::from("a");
        let id = {
            let first = Lobby::new(store.clone(), EngineConfig::default());
            let room = first.create_room(&a, "harbour", Some("pw".into())).await.unwrap();
            first.join_room(room.id, &PlayerId::from("b"), Some("pw".into())).await.unwrap();
            room.id
        };
        let second = Lobby::new(store, EngineConfig::default());
        let room = second.room_state(id, &a).await.unwrap();
        assert_eq!(room.participants.len(), 2);
        assert!(room.locked);
    }
}
