//! Shot resolution and win detection against an enemy fleet.

use crate::common::{Cell, ShotResult};
use crate::ship::ShipPlacement;

/// What a single shot did to the enemy fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotResolution {
    /// Index of the struck ship within the enemy fleet.
    pub ship: Option<usize>,
    pub outcome: ShotResult,
}

/// Index of the ship covering `cell`. Ships never overlap, so the first
/// match is the only one.
pub fn find_target(ships: &[ShipPlacement], cell: Cell) -> Option<usize> {
    ships.iter().position(|ship| ship.contains(cell))
}

/// Resolve a shot at `(x, y)`, incrementing the struck ship's hit count.
pub fn resolve_shot(ships: &mut [ShipPlacement], x: u8, y: u8) -> ShotResolution {
    let Some(index) = find_target(ships, Cell::new(x, y)) else {
        return ShotResolution {
            ship: None,
            outcome: ShotResult::Miss,
        };
    };
    let ship = &mut ships[index];
    ship.register_hit();
    let outcome = if ship.is_sunk() {
        ShotResult::Sunk
    } else {
        ShotResult::Hit
    };
    ShotResolution {
        ship: Some(index),
        outcome,
    }
}

/// True iff the fleet is non-empty and every ship is sunk. An empty fleet
/// is never a win.
pub fn check_win(ships: &[ShipPlacement]) -> bool {
    !ships.is_empty() && ships.iter().all(ShipPlacement::is_sunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlayerId, RoomId};
    use crate::ship::{Orientation, ShipSpec};

    fn fleet(specs: &[ShipSpec]) -> Vec<ShipPlacement> {
        specs
            .iter()
            .map(|s| ShipPlacement::new(PlayerId::from("b"), RoomId(1), *s))
            .collect()
    }

    #[test]
    fn miss_leaves_fleet_untouched() {
        let mut ships = fleet(&[ShipSpec::new(0, 0, 2, Orientation::Horizontal)]);
        let res = resolve_shot(&mut ships, 5, 5);
        assert_eq!(res, ShotResolution { ship: None, outcome: ShotResult::Miss });
        assert_eq!(ships[0].hit_count, 0);
    }

    #[test]
    fn hit_then_sunk() {
        let mut ships = fleet(&[
            ShipSpec::new(0, 0, 2, Orientation::Horizontal),
            ShipSpec::new(4, 4, 1, Orientation::Vertical),
        ]);
        assert_eq!(resolve_shot(&mut ships, 0, 0).outcome, ShotResult::Hit);
        assert!(!check_win(&ships));
        let res = resolve_shot(&mut ships, 1, 0);
        assert_eq!(res, ShotResolution { ship: Some(0), outcome: ShotResult::Sunk });
        assert!(!check_win(&ships));
        assert_eq!(resolve_shot(&mut ships, 4, 4).outcome, ShotResult::Sunk);
        assert!(check_win(&ships));
    }

    #[test]
    fn empty_fleet_is_not_a_win() {
        assert!(!check_win(&[]));
    }
}
