//! Ship definitions, cell expansion and hit tracking.

use serde::{Deserialize, Serialize};

use crate::bitboard::CellMask;
use crate::common::Cell;
use crate::domain::{PlayerId, RoomId};

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Extends towards increasing `x`.
    Horizontal,
    /// Extends towards increasing `y`.
    Vertical,
}

/// One entry of the fleet composition: name, length and how many are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipClass {
    name: &'static str,
    length: u8,
    count: usize,
}

impl ShipClass {
    pub const fn new(name: &'static str, length: u8, count: usize) -> Self {
        Self { name, length, count }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    /// Ships of this class in a complete fleet.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// A proposed ship position, as submitted by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipSpec {
    pub start_x: u8,
    pub start_y: u8,
    pub length: u8,
    pub orientation: Orientation,
}

impl ShipSpec {
    pub const fn new(start_x: u8, start_y: u8, length: u8, orientation: Orientation) -> Self {
        Self {
            start_x,
            start_y,
            length,
            orientation,
        }
    }

    /// The `length` contiguous cells this ship covers, starting at its origin.
    ///
    /// Cells past the board edge are still yielded so callers can report
    /// exactly where a ship leaves the board.
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let (dx, dy) = match self.orientation {
            Orientation::Horizontal => (1u16, 0u16),
            Orientation::Vertical => (0, 1),
        };
        let (x, y) = (self.start_x as u16, self.start_y as u16);
        (0..self.length as u16).map(move |i| {
            let cx = x + dx * i;
            let cy = y + dy * i;
            Cell::new(cx.min(u8::MAX as u16) as u8, cy.min(u8::MAX as u16) as u8)
        })
    }

    /// First cell that lies off the board, if any.
    pub fn first_out_of_bounds(&self) -> Option<Cell> {
        self.cells().find(|cell| !cell.in_bounds())
    }

    /// Occupancy mask of the cells this ship covers on the board.
    pub fn mask(&self) -> CellMask {
        CellMask::from_cells(self.cells().filter(Cell::in_bounds)).unwrap_or_default()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells().any(|c| c == cell)
    }
}

/// A ship stored for one player in one room, with its accumulated hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipPlacement {
    pub owner: PlayerId,
    pub room: RoomId,
    pub spec: ShipSpec,
    pub hit_count: u8,
}

impl ShipPlacement {
    pub fn new(owner: PlayerId, room: RoomId, spec: ShipSpec) -> Self {
        Self {
            owner,
            room,
            spec,
            hit_count: 0,
        }
    }

    pub fn length(&self) -> u8 {
        self.spec.length
    }

    /// A ship is sunk once its hit count reaches its length.
    pub fn is_sunk(&self) -> bool {
        self.hit_count >= self.spec.length
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.spec.contains(cell)
    }

    /// Record one more hit; saturates rather than wrapping.
    pub fn register_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }
}
