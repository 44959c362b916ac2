//! Self-play: two scripted players fight a full match through the lobby.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use log::info;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::common::{Cell, ShotResult};
use crate::config::{EngineConfig, BOARD_SIZE};
use crate::domain::{PlayerId, RoomStatus};
use crate::fleet::random_fleet;
use crate::lobby::Lobby;
use crate::protocol::RoomApi;
use crate::store::InMemoryStore;

/// Upper bound on shots in one match; both boards fully swept.
const MAX_SHOTS: usize = 2 * (BOARD_SIZE as usize) * (BOARD_SIZE as usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerReport {
    pub shots: usize,
    pub hits: usize,
    pub sunk: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub seed: u64,
    pub winner: PlayerId,
    pub total_shots: usize,
    pub players: BTreeMap<PlayerId, PlayerReport>,
    /// Room events delivered to the first player's subscription.
    pub events_seen: usize,
}

/// Play one match between two random shooters. Deterministic in `seed`.
pub async fn simulate_match(seed: u64) -> anyhow::Result<MatchReport> {
    let lobby = Lobby::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
    simulate_in(&lobby, seed).await
}

/// Play one match in an existing lobby.
pub async fn simulate_in(lobby: &dyn RoomApi, seed: u64) -> anyhow::Result<MatchReport> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let players = [PlayerId::from("red"), PlayerId::from("blue")];

    let room = lobby
        .create_room(&players[0], &format!("sim-{}", seed), None)
        .await?;
    let mut feed = lobby.subscribe(room.id, &players[0]).await?;
    lobby.join_room(room.id, &players[1], None).await?;
    for player in &players {
        let fleet = random_fleet(&mut rng)?;
        lobby.submit_fleet(room.id, player, fleet).await?;
    }

    let mut targets: Vec<Vec<Cell>> = players
        .iter()
        .map(|_| {
            let mut cells: Vec<Cell> = (0..BOARD_SIZE)
                .flat_map(|y| (0..BOARD_SIZE).map(move |x| Cell::new(x, y)))
                .collect();
            cells.shuffle(&mut rng);
            cells
        })
        .collect();
    let mut stats: Vec<PlayerReport> = players
        .iter()
        .map(|_| PlayerReport { shots: 0, hits: 0, sunk: 0 })
        .collect();

    let mut total_shots = 0;
    let winner = loop {
        let state = lobby.room_state(room.id, &players[0]).await?;
        match state.status {
            RoomStatus::Finished => {
                break state.winner.ok_or_else(|| anyhow!("finished without a winner"))?;
            }
            RoomStatus::Playing => {}
            other => return Err(anyhow!("unexpected room status {}", other)),
        }
        if total_shots >= MAX_SHOTS {
            return Err(anyhow!("no winner after {} shots", total_shots));
        }
        let shooter = state
            .current_turn
            .ok_or_else(|| anyhow!("playing without a current turn"))?;
        let idx = players
            .iter()
            .position(|p| *p == shooter)
            .ok_or_else(|| anyhow!("unknown shooter {}", shooter))?;
        let cell = targets[idx]
            .pop()
            .ok_or_else(|| anyhow!("{} ran out of targets", shooter))?;
        let shot = lobby.fire_shot(room.id, &shooter, cell.x, cell.y).await?;
        total_shots += 1;
        let entry = &mut stats[idx];
        entry.shots += 1;
        if shot.result.is_hit() {
            entry.hits += 1;
        }
        if shot.result == ShotResult::Sunk {
            entry.sunk += 1;
        }
    };

    let mut events_seen = 0;
    while feed.try_recv().is_some() {
        events_seen += 1;
    }
    info!("sim {} won by {} after {} shots", seed, winner, total_shots);

    Ok(MatchReport {
        seed,
        winner,
        total_shots,
        players: players.into_iter().zip(stats).collect(),
        events_seen,
    })
}
