//! Match state machine for a single room.
//!
//! `Match` owns the authoritative state of one room: the `Room` row, each
//! participant's fleet and the shot log. Every operation validates its
//! preconditions before touching state, so a returned error never leaves a
//! partial mutation behind. Successful operations queue [`RoomEvent`]s that
//! the owner drains with [`Match::take_events`] and hands to the broadcaster.
//!
//! ```text
//! waiting --submit--> placing --both fleets--> playing --fleet sunk--> finished
//!    ^                                                                    |
//!    +---------------------- last participant leaves ---------------------+
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::info;

use crate::combat::{check_win, resolve_shot};
use crate::common::Cell;
use crate::config::{MAX_PLAYERS, ROOM_NAME_LEN, TOTAL_SHIPS};
use crate::domain::{PlayerId, Room, RoomEvent, RoomEventKind, RoomId, RoomStatus, Shot};
use crate::error::{Conflict, MatchError, Unauthorized, ValidationError};
use crate::fleet::validate_fleet;
use crate::ship::{ShipPlacement, ShipSpec};
use crate::store::MatchRecord;

#[derive(Debug, Clone)]
pub struct Match {
    room: Room,
    password: Option<String>,
    fleets: HashMap<PlayerId, Vec<ShipPlacement>>,
    shots: Vec<Shot>,
    fired: HashSet<(PlayerId, Cell)>,
    next_event_id: u64,
    outbox: Vec<RoomEvent>,
}

impl Match {
    /// Open a new room with `creator` as its only participant.
    pub fn create(
        id: RoomId,
        name: &str,
        creator: PlayerId,
        password: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, MatchError> {
        let name = name.trim();
        let len = name.chars().count();
        if !ROOM_NAME_LEN.contains(&len) {
            return Err(MatchError::Validation(ValidationError::RoomName { len }));
        }
        let password = password.filter(|p| !p.is_empty());
        let room = Room::new(id, name.to_string(), creator, password.is_some(), now);
        Ok(Self {
            room,
            password,
            fleets: HashMap::new(),
            shots: Vec::new(),
            fired: HashSet::new(),
            next_event_id: first_event_id(now),
            outbox: Vec::new(),
        })
    }

    /// Rebuild a match from its stored record.
    pub fn from_record(record: MatchRecord, now: DateTime<Utc>) -> Self {
        let mut fleets: HashMap<PlayerId, Vec<ShipPlacement>> = HashMap::new();
        for ship in record.ships {
            fleets.entry(ship.owner.clone()).or_default().push(ship);
        }
        let fired = record
            .shots
            .iter()
            .map(|s| (s.shooter.clone(), s.cell()))
            .collect();
        Self {
            room: record.room,
            password: record.password,
            fleets,
            shots: record.shots,
            fired,
            next_event_id: first_event_id(now),
            outbox: Vec::new(),
        }
    }

    pub fn to_record(&self) -> MatchRecord {
        MatchRecord {
            room: self.room.clone(),
            password: self.password.clone(),
            ships: self.fleets.values().flatten().cloned().collect(),
            shots: self.shots.clone(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.room.id
    }

    /// Authoritative room row, without any participant check.
    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Current fleet of `player`; empty if none was submitted.
    pub fn fleet(&self, player: &PlayerId) -> &[ShipPlacement] {
        self.fleets.get(player).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    /// Events produced since the last call, in publish order.
    pub fn take_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Add `caller` to the room. Joining twice is a no-op.
    pub fn join(
        &mut self,
        caller: &PlayerId,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&Room, MatchError> {
        self.ensure_live()?;
        if self.room.is_participant(caller) {
            return Ok(&self.room);
        }
        if self.room.is_full() {
            return Err(Conflict::RoomFull.into());
        }
        if let Some(expected) = &self.password {
            if credential != Some(expected.as_str()) {
                return Err(Unauthorized::BadCredential.into());
            }
        }
        self.room.participants.push(caller.clone());
        self.touch(now);
        self.emit_room();
        Ok(&self.room)
    }

    /// Remove `caller`. A turn held by the leaver passes to whoever stays;
    /// the last one out resets the room to `waiting`.
    pub fn leave(&mut self, caller: &PlayerId, now: DateTime<Utc>) -> Result<&Room, MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        self.room.participants.retain(|p| p != caller);
        if self.room.current_turn.as_ref() == Some(caller) {
            self.room.current_turn = self.room.participants.first().cloned();
        }
        if self.room.participants.is_empty() {
            info!("{} emptied, back to waiting", self.room.id);
            self.room.status = RoomStatus::Waiting;
            self.room.current_turn = None;
            self.room.winner = None;
        }
        self.touch(now);
        self.emit_room();
        Ok(&self.room)
    }

    /// Replace `caller`'s fleet with `specs` and advance the room if both
    /// fleets are now complete.
    pub fn submit_fleet(
        &mut self,
        caller: &PlayerId,
        specs: &[ShipSpec],
        now: DateTime<Utc>,
    ) -> Result<Vec<ShipPlacement>, MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        // a replacement who joined mid-match may still deploy once
        match self.room.status {
            RoomStatus::Waiting | RoomStatus::Placing => {}
            RoomStatus::Playing if self.fleet(caller).is_empty() => {}
            status @ (RoomStatus::Playing | RoomStatus::Finished) => {
                return Err(Conflict::FleetLocked(status).into());
            }
        }
        validate_fleet(specs)?;

        let ships: Vec<ShipPlacement> = specs
            .iter()
            .map(|spec| ShipPlacement::new(caller.clone(), self.room.id, *spec))
            .collect();
        self.fleets.insert(caller.clone(), ships.clone());

        if self.room.status == RoomStatus::Waiting {
            self.room.status = RoomStatus::Placing;
        }
        if self.room.status != RoomStatus::Playing && self.ready_players() == MAX_PLAYERS {
            self.room.status = RoomStatus::Playing;
            if self.room.current_turn.is_none() {
                self.room.current_turn = self.room.participants.first().cloned();
            }
            info!(
                "{} started, {} opens fire",
                self.room.id,
                self.room.current_turn.as_ref().map(PlayerId::as_str).unwrap_or("nobody")
            );
        }
        self.touch(now);
        self.emit_room();
        Ok(ships)
    }

    /// Fire at `(x, y)` on the opponent's board.
    pub fn fire_shot(
        &mut self,
        caller: &PlayerId,
        x: u8,
        y: u8,
        now: DateTime<Utc>,
    ) -> Result<Shot, MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        let cell = Cell::new(x, y);
        if !cell.in_bounds() {
            return Err(MatchError::Validation(ValidationError::CoordinateOutOfRange { x, y }));
        }
        if self.room.status != RoomStatus::Playing {
            return Err(Conflict::WrongStatus {
                expected: RoomStatus::Playing,
                actual: self.room.status,
            }
            .into());
        }
        if self.room.current_turn.as_ref() != Some(caller) {
            return Err(Conflict::NotYourTurn.into());
        }
        let opponent = self
            .room
            .opponent_of(caller)
            .cloned()
            .ok_or(Conflict::OpponentMissing)?;
        if self.fired.contains(&(caller.clone(), cell)) {
            return Err(Conflict::AlreadyFired(cell).into());
        }
        let enemy = match self.fleets.get_mut(&opponent) {
            Some(ships) if !ships.is_empty() => ships,
            _ => return Err(Conflict::OpponentFleetMissing.into()),
        };

        let resolution = resolve_shot(enemy, x, y);
        let won = resolution.outcome.is_hit() && check_win(enemy);
        let shot = Shot {
            shooter: caller.clone(),
            room: self.room.id,
            x,
            y,
            result: resolution.outcome,
            timestamp: now,
        };
        self.fired.insert((caller.clone(), cell));
        self.shots.push(shot.clone());

        if won {
            info!("{} won by {}", self.room.id, caller);
            self.room.status = RoomStatus::Finished;
            self.room.winner = Some(caller.clone());
            self.room.current_turn = None;
        } else {
            self.room.current_turn = Some(opponent);
        }
        self.touch(now);
        self.emit(RoomEventKind::ShotFired(shot.clone()));
        self.emit_room();
        Ok(shot)
    }

    /// Room snapshot for a participant.
    pub fn snapshot(&self, caller: &PlayerId) -> Result<Room, MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        Ok(self.room.clone())
    }

    /// The caller's own fleet with hit counts.
    pub fn my_ships(&self, caller: &PlayerId) -> Result<Vec<ShipPlacement>, MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        Ok(self.fleet(caller).to_vec())
    }

    /// Every shot in firing order.
    pub fn shot_history(&self, caller: &PlayerId) -> Result<Vec<Shot>, MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        Ok(self.shots.clone())
    }

    /// Soft-delete the room. It stays stored but is excluded from every query.
    pub fn archive(&mut self, caller: &PlayerId, now: DateTime<Utc>) -> Result<(), MatchError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        self.room.deleted = true;
        self.touch(now);
        info!("{} archived by {}", self.room.id, caller);
        Ok(())
    }

    /// Participants holding a complete fleet.
    fn ready_players(&self) -> usize {
        self.room
            .participants
            .iter()
            .filter(|p| self.fleet(p).len() == TOTAL_SHIPS)
            .count()
    }

    fn ensure_live(&self) -> Result<(), MatchError> {
        if self.room.deleted {
            Err(MatchError::NotFound(self.room.id))
        } else {
            Ok(())
        }
    }

    fn ensure_participant(&self, caller: &PlayerId) -> Result<(), MatchError> {
        if self.room.is_participant(caller) {
            Ok(())
        } else {
            Err(Unauthorized::NotParticipant.into())
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.room.updated_at = now;
    }

    fn emit_room(&mut self) {
        self.emit(RoomEventKind::RoomUpdated(self.room.clone()));
    }

    fn emit(&mut self, kind: RoomEventKind) {
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.outbox.push(RoomEvent {
            id,
            room: self.room.id,
            kind,
        });
    }
}

/// Event ids start from the wall clock so a rehydrated room keeps issuing
/// ids above those sent before it was unloaded.
fn first_event_id(now: DateTime<Utc>) -> u64 {
    now.timestamp_micros().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::random_fleet;
    use crate::ship::Orientation;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn a() -> PlayerId {
        PlayerId::from("alice")
    }

    fn b() -> PlayerId {
        PlayerId::from("bob")
    }

    fn fleet(seed: u64) -> Vec<ShipSpec> {
        random_fleet(&mut SmallRng::seed_from_u64(seed)).unwrap()
    }

    fn started() -> Match {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), None, now).unwrap();
        m.join(&b(), None, now).unwrap();
        m.submit_fleet(&a(), &fleet(1), now).unwrap();
        m.submit_fleet(&b(), &fleet(2), now).unwrap();
        m.take_events();
        m
    }

    #[test]
    fn create_validates_name() {
        let now = Utc::now();
        let err = Match::create(RoomId(1), "  x ", a(), None, now).unwrap_err();
        assert_eq!(err, MatchError::Validation(ValidationError::RoomName { len: 1 }));
        let m = Match::create(RoomId(1), " bay ", a(), Some(String::new()), now).unwrap();
        assert_eq!(m.room().name, "bay");
        assert!(!m.room().locked);
    }

    #[test]
    fn join_is_idempotent_and_capped() {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), None, now).unwrap();
        m.join(&b(), None, now).unwrap();
        m.join(&b(), None, now).unwrap();
        assert_eq!(m.room().participants, vec![a(), b()]);
        assert_eq!(m.room().status, RoomStatus::Waiting);
        let err = m.join(&PlayerId::from("carol"), None, now).unwrap_err();
        assert_eq!(err, MatchError::Conflict(Conflict::RoomFull));
        // only the real join emitted
        assert_eq!(m.take_events().len(), 1);
    }

    #[test]
    fn locked_room_checks_credential() {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), Some("s3cret".into()), now).unwrap();
        assert!(m.room().locked);
        let err = m.join(&b(), Some("nope"), now).unwrap_err();
        assert_eq!(err, MatchError::Unauthorized(Unauthorized::BadCredential));
        assert_eq!(m.join(&b(), None, now).unwrap_err(), err);
        m.join(&b(), Some("s3cret"), now).unwrap();
    }

    #[test]
    fn first_participant_opens_even_if_second_submits_first() {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), None, now).unwrap();
        m.join(&b(), None, now).unwrap();
        m.submit_fleet(&b(), &fleet(3), now).unwrap();
        assert_eq!(m.room().status, RoomStatus::Placing);
        assert_eq!(m.room().current_turn, None);
        m.submit_fleet(&a(), &fleet(4), now).unwrap();
        assert_eq!(m.room().status, RoomStatus::Playing);
        assert_eq!(m.room().current_turn, Some(a()));
    }

    #[test]
    fn lone_player_submission_moves_to_placing_only() {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), None, now).unwrap();
        m.submit_fleet(&a(), &fleet(5), now).unwrap();
        assert_eq!(m.room().status, RoomStatus::Placing);
        m.submit_fleet(&a(), &fleet(6), now).unwrap();
        assert_eq!(m.room().status, RoomStatus::Placing);
        assert_eq!(m.fleet(&a()).len(), TOTAL_SHIPS);
    }

    #[test]
    fn invalid_fleet_leaves_state_untouched() {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), None, now).unwrap();
        let mut bad = fleet(7);
        bad[0] = ShipSpec::new(9, 0, 2, Orientation::Horizontal);
        let err = m.submit_fleet(&a(), &bad, now).unwrap_err();
        assert!(matches!(err, MatchError::Validation(ValidationError::Fleet(_))));
        assert_eq!(m.room().status, RoomStatus::Waiting);
        assert!(m.fleet(&a()).is_empty());
        assert!(m.take_events().is_empty());
    }

    #[test]
    fn fleet_is_locked_once_playing() {
        let mut m = started();
        let err = m.submit_fleet(&a(), &fleet(8), Utc::now()).unwrap_err();
        assert_eq!(err, MatchError::Conflict(Conflict::FleetLocked(RoomStatus::Playing)));
    }

    #[test]
    fn shot_passes_turn_and_emits_events() {
        let mut m = started();
        let shot = m.fire_shot(&a(), 0, 0, Utc::now()).unwrap();
        assert_eq!(shot.shooter, a());
        assert_eq!(m.room().current_turn, Some(b()));
        let events = m.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, RoomEventKind::ShotFired(_)));
        assert!(matches!(events[1].kind, RoomEventKind::RoomUpdated(_)));
        assert!(events[0].id < events[1].id);
    }

    #[test]
    fn shot_preconditions() {
        let mut m = started();
        let now = Utc::now();
        assert_eq!(
            m.fire_shot(&b(), 0, 0, now).unwrap_err(),
            MatchError::Conflict(Conflict::NotYourTurn)
        );
        assert_eq!(
            m.fire_shot(&a(), 10, 0, now).unwrap_err(),
            MatchError::Validation(ValidationError::CoordinateOutOfRange { x: 10, y: 0 })
        );
        assert_eq!(
            m.fire_shot(&PlayerId::from("carol"), 0, 0, now).unwrap_err(),
            MatchError::Unauthorized(Unauthorized::NotParticipant)
        );
        m.fire_shot(&a(), 2, 2, now).unwrap();
        m.fire_shot(&b(), 2, 2, now).unwrap();
        assert_eq!(
            m.fire_shot(&a(), 2, 2, now).unwrap_err(),
            MatchError::Conflict(Conflict::AlreadyFired(Cell::new(2, 2)))
        );
        assert_eq!(m.room().current_turn, Some(a()));
    }

    #[test]
    fn shooting_before_playing_is_a_conflict() {
        let now = Utc::now();
        let mut m = Match::create(RoomId(1), "harbour", a(), None, now).unwrap();
        m.join(&b(), None, now).unwrap();
        let err = m.fire_shot(&a(), 0, 0, now).unwrap_err();
        assert_eq!(
            err,
            MatchError::Conflict(Conflict::WrongStatus {
                expected: RoomStatus::Playing,
                actual: RoomStatus::Waiting
            })
        );
    }

    #[test]
    fn last_leaver_resets_room() {
        let mut m = started();
        let now = Utc::now();
        m.leave(&a(), now).unwrap();
        assert_eq!(m.room().status, RoomStatus::Playing);
        m.leave(&b(), now).unwrap();
        assert_eq!(m.room().status, RoomStatus::Waiting);
        assert_eq!(m.room().current_turn, None);
        assert_eq!(m.room().winner, None);
        // fleets survive a reset
        assert_eq!(m.fleet(&a()).len(), TOTAL_SHIPS);
        assert_eq!(
            m.leave(&b(), now).unwrap_err(),
            MatchError::Unauthorized(Unauthorized::NotParticipant)
        );
    }

    #[test]
    fn leaving_on_your_turn_hands_it_over() {
        let mut m = started();
        let now = Utc::now();
        m.fire_shot(&a(), 0, 0, now).unwrap();
        m.leave(&b(), now).unwrap();
        assert_eq!(m.room().current_turn, Some(a()));
        assert_eq!(
            m.fire_shot(&a(), 1, 0, now).unwrap_err(),
            MatchError::Conflict(Conflict::OpponentMissing)
        );
    }

    #[test]
    fn archived_room_is_not_found() {
        let mut m = started();
        m.archive(&a(), Utc::now()).unwrap();
        assert_eq!(m.snapshot(&a()).unwrap_err(), MatchError::NotFound(RoomId(1)));
    }

    #[test]
    fn record_roundtrip_preserves_fired_cells() {
        let mut m = started();
        m.fire_shot(&a(), 4, 4, Utc::now()).unwrap();
        let restored = Match::from_record(m.to_record(), Utc::now());
        assert_eq!(restored.room(), m.room());
        assert_eq!(restored.shots(), m.shots());
        let mut restored = restored;
        restored.fire_shot(&b(), 1, 1, Utc::now()).unwrap();
        assert_eq!(
            restored.fire_shot(&a(), 4, 4, Utc::now()).unwrap_err(),
            MatchError::Conflict(Conflict::AlreadyFired(Cell::new(4, 4)))
        );
    }
}
