//! Common types: board cells, shot results and fleet validation errors.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::config::{ship_class, BOARD_SIZE};

/// A single `(x, y)` coordinate on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: u8,
    pub y: u8,
}

impl Cell {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// True when both coordinates lie in `[0, BOARD_SIZE)`.
    pub fn in_bounds(&self) -> bool {
        self.x < BOARD_SIZE && self.y < BOARD_SIZE
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Outcome of a single shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotResult {
    /// No ship occupies the cell.
    Miss,
    /// A ship was hit and still has intact segments.
    Hit,
    /// The hit brought the ship's hit count up to its length.
    Sunk,
}

impl ShotResult {
    /// Whether the shot struck a ship.
    pub fn is_hit(&self) -> bool {
        !matches!(self, ShotResult::Miss)
    }
}

/// Reasons a proposed fleet (or a single candidate ship) is illegal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetError {
    /// The fleet does not contain exactly the required number of ships.
    WrongShipCount { expected: usize, actual: usize },
    /// Ship length is not one of the fleet's ship classes.
    InvalidLength { index: usize, length: u8 },
    /// Ship at `index` has a cell outside the board.
    OutOfBounds { index: usize, cell: Cell },
    /// Two ships share `cell`.
    Collision { index: usize, cell: Cell },
    /// Number of ships of `length` differs from the fleet composition.
    WrongClassCount { length: u8, required: usize, actual: usize },
    /// No more ships of `length` may be placed.
    ClassExhausted { length: u8 },
    /// Random placement gave up after too many rejected candidates.
    GenerationFailed,
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetError::WrongShipCount { expected, actual } => {
                write!(f, "fleet must contain {} ships, got {}", expected, actual)
            }
            FleetError::InvalidLength { index, length } => {
                write!(f, "ship #{} has invalid length {}", index + 1, length)
            }
            FleetError::OutOfBounds { index, cell } => {
                write!(f, "ship #{} leaves the board at {}", index + 1, cell)
            }
            FleetError::Collision { index, cell } => {
                write!(f, "ship #{} overlaps another ship at {}", index + 1, cell)
            }
            FleetError::WrongClassCount { length, required, actual } => write!(
                f,
                "fleet needs {} ships of length {}, got {}",
                required, length, actual
            ),
            FleetError::ClassExhausted { length } => match ship_class(*length) {
                Some(class) => write!(f, "no {} (length {}) left to place", class.name(), length),
                None => write!(f, "no ships of length {} left to place", length),
            },
            FleetError::GenerationFailed => write!(f, "unable to generate a fleet layout"),
        }
    }
}

impl std::error::Error for FleetError {}
