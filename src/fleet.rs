//! Fleet validation: board bounds, overlap and composition rules.
//!
//! The same cell-expansion primitive backs three entry points:
//! [`validate_fleet`] for a full submission, [`check_candidate`] for a single
//! ship previewed against the ships placed so far, and [`random_fleet`] which
//! builds a legal layout by rejection sampling over `check_candidate`.

use rand::Rng;

use crate::bitboard::CellMask;
use crate::common::{Cell, FleetError};
use crate::config::{ship_class, BOARD_SIZE, FLEET, NUM_CLASSES, TOTAL_SHIPS};
use crate::ship::{Orientation, ShipClass, ShipSpec};

const MAX_LAYOUT_RESTARTS: usize = 50;
const MAX_SHIP_ATTEMPTS: usize = 100;

/// Check a complete fleet. Fails fast on the first problem found.
pub fn validate_fleet(ships: &[ShipSpec]) -> Result<(), FleetError> {
    if ships.len() != TOTAL_SHIPS {
        return Err(FleetError::WrongShipCount {
            expected: TOTAL_SHIPS,
            actual: ships.len(),
        });
    }

    let mut occupied = CellMask::new();
    let mut counts = [0usize; NUM_CLASSES];
    for (index, ship) in ships.iter().enumerate() {
        let class = class_index(ship.length).ok_or(FleetError::InvalidLength {
            index,
            length: ship.length,
        })?;
        if let Some(cell) = ship.first_out_of_bounds() {
            return Err(FleetError::OutOfBounds { index, cell });
        }
        let mask = ship.mask();
        if let Some(cell) = first_shared(&mask, &occupied) {
            return Err(FleetError::Collision { index, cell });
        }
        occupied |= mask;
        counts[class] += 1;
    }

    for (class, actual) in FLEET.iter().zip(counts) {
        if actual != class.count() {
            return Err(FleetError::WrongClassCount {
                length: class.length(),
                required: class.count(),
                actual,
            });
        }
    }
    Ok(())
}

/// Check one more ship against a partially placed fleet.
pub fn check_candidate(candidate: &ShipSpec, placed: &[ShipSpec]) -> Result<(), FleetError> {
    let index = placed.len();
    let class = ship_class(candidate.length).ok_or(FleetError::InvalidLength {
        index,
        length: candidate.length,
    })?;
    let same_length = placed.iter().filter(|s| s.length == candidate.length).count();
    if same_length >= class.count() {
        return Err(FleetError::ClassExhausted {
            length: candidate.length,
        });
    }
    if let Some(cell) = candidate.first_out_of_bounds() {
        return Err(FleetError::OutOfBounds { index, cell });
    }
    match first_shared(&candidate.mask(), &occupied_cells(placed)) {
        Some(cell) => Err(FleetError::Collision { index, cell }),
        None => Ok(()),
    }
}

/// Union of every on-board cell covered by `ships`.
pub fn occupied_cells(ships: &[ShipSpec]) -> CellMask {
    let mut mask = CellMask::new();
    for ship in ships {
        mask |= ship.mask();
    }
    mask
}

/// Lowest cell in row-major order covered by both masks.
fn first_shared(a: &CellMask, b: &CellMask) -> Option<Cell> {
    if !a.intersects(b) {
        return None;
    }
    (*a & *b).cells().next()
}

/// Ships still to place per class, given those already placed.
pub fn remaining_classes(placed: &[ShipSpec]) -> [(ShipClass, usize); NUM_CLASSES] {
    core::array::from_fn(|i| {
        let class = FLEET[i];
        let used = placed.iter().filter(|s| s.length == class.length()).count();
        (class, class.count().saturating_sub(used))
    })
}

/// Generate a random legal fleet, largest ships first.
pub fn random_fleet<R: Rng>(rng: &mut R) -> Result<Vec<ShipSpec>, FleetError> {
    let lengths: Vec<u8> = FLEET
        .iter()
        .flat_map(|class| core::iter::repeat(class.length()).take(class.count()))
        .collect();

    'layout: for _ in 0..MAX_LAYOUT_RESTARTS {
        let mut placed: Vec<ShipSpec> = Vec::with_capacity(TOTAL_SHIPS);
        for &length in &lengths {
            match random_candidate(rng, length, &placed) {
                Some(ship) => placed.push(ship),
                None => continue 'layout,
            }
        }
        return Ok(placed);
    }
    Err(FleetError::GenerationFailed)
}

fn random_candidate<R: Rng>(rng: &mut R, length: u8, placed: &[ShipSpec]) -> Option<ShipSpec> {
    for _ in 0..MAX_SHIP_ATTEMPTS {
        let orientation = if rng.random() {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };
        let (max_x, max_y) = match orientation {
            Orientation::Horizontal => (BOARD_SIZE - length, BOARD_SIZE - 1),
            Orientation::Vertical => (BOARD_SIZE - 1, BOARD_SIZE - length),
        };
        let ship = ShipSpec::new(
            rng.random_range(0..=max_x),
            rng.random_range(0..=max_y),
            length,
            orientation,
        );
        if check_candidate(&ship, placed).is_ok() {
            return Some(ship);
        }
    }
    None
}

fn class_index(length: u8) -> Option<usize> {
    FLEET.iter().position(|class| class.length() == length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TOTAL_SHIP_CELLS;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use Orientation::{Horizontal as H, Vertical as V};

    /// A fixed legal layout used throughout the tests.
    fn sample_fleet() -> Vec<ShipSpec> {
        vec![
            ShipSpec::new(0, 0, 4, H),
            ShipSpec::new(0, 2, 3, H),
            ShipSpec::new(5, 2, 3, H),
            ShipSpec::new(0, 4, 2, H),
            ShipSpec::new(3, 4, 2, H),
            ShipSpec::new(6, 4, 2, H),
            ShipSpec::new(0, 6, 1, H),
            ShipSpec::new(2, 6, 1, H),
            ShipSpec::new(4, 6, 1, H),
            ShipSpec::new(6, 6, 1, H),
        ]
    }

    #[test]
    fn accepts_legal_fleet() {
        let fleet = sample_fleet();
        assert_eq!(validate_fleet(&fleet), Ok(()));
        assert_eq!(occupied_cells(&fleet).count_ones(), TOTAL_SHIP_CELLS);
    }

    #[test]
    fn rejects_wrong_ship_count() {
        let mut fleet = sample_fleet();
        fleet.pop();
        assert_eq!(
            validate_fleet(&fleet),
            Err(FleetError::WrongShipCount { expected: 10, actual: 9 })
        );
    }

    #[test]
    fn rejects_ship_leaving_board() {
        let mut fleet = sample_fleet();
        fleet[3] = ShipSpec::new(9, 0, 2, H);
        assert_eq!(
            validate_fleet(&fleet),
            Err(FleetError::OutOfBounds { index: 3, cell: Cell::new(10, 0) })
        );
    }

    #[test]
    fn rejects_collision() {
        let mut fleet = sample_fleet();
        fleet[1] = ShipSpec::new(3, 3, 3, H);
        fleet[2] = ShipSpec::new(3, 2, 3, V);
        assert_eq!(
            validate_fleet(&fleet),
            Err(FleetError::Collision { index: 2, cell: Cell::new(3, 3) })
        );
    }

    #[test]
    fn rejects_wrong_composition() {
        let mut fleet = sample_fleet();
        // a second 4-length ship in place of a 3
        fleet[1] = ShipSpec::new(0, 2, 4, H);
        assert_eq!(
            validate_fleet(&fleet),
            Err(FleetError::WrongClassCount { length: 4, required: 1, actual: 2 })
        );
    }

    #[test]
    fn rejects_unknown_length() {
        let mut fleet = sample_fleet();
        fleet[0] = ShipSpec::new(0, 0, 5, H);
        assert_eq!(
            validate_fleet(&fleet),
            Err(FleetError::InvalidLength { index: 0, length: 5 })
        );
        fleet[0] = ShipSpec::new(0, 0, 0, H);
        assert!(matches!(validate_fleet(&fleet), Err(FleetError::InvalidLength { .. })));
    }

    #[test]
    fn candidate_checks_class_limit_bounds_and_overlap() {
        let placed = vec![ShipSpec::new(0, 0, 4, H)];
        assert_eq!(
            check_candidate(&ShipSpec::new(0, 5, 4, H), &placed),
            Err(FleetError::ClassExhausted { length: 4 })
        );
        assert_eq!(
            check_candidate(&ShipSpec::new(8, 5, 3, H), &placed),
            Err(FleetError::OutOfBounds { index: 1, cell: Cell::new(10, 5) })
        );
        assert_eq!(
            check_candidate(&ShipSpec::new(2, 0, 3, V), &placed),
            Err(FleetError::Collision { index: 1, cell: Cell::new(2, 0) })
        );
        assert_eq!(check_candidate(&ShipSpec::new(5, 0, 3, H), &placed), Ok(()));
    }

    #[test]
    fn remaining_tracks_placed_ships() {
        let placed = vec![ShipSpec::new(0, 0, 4, H), ShipSpec::new(0, 2, 1, H)];
        let remaining = remaining_classes(&placed);
        let by_length: Vec<(u8, usize)> =
            remaining.iter().map(|(c, n)| (c.length(), *n)).collect();
        assert_eq!(by_length, vec![(4, 0), (3, 2), (2, 3), (1, 3)]);
    }

    #[test]
    fn random_fleet_is_legal() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..20 {
            let fleet = random_fleet(&mut rng).unwrap();
            assert_eq!(validate_fleet(&fleet), Ok(()));
        }
    }
}
