use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

use log::warn;

use crate::ship::ShipClass;

pub const BOARD_SIZE: u8 = 10;
pub const MAX_PLAYERS: usize = 2;
pub const NUM_CLASSES: usize = 4;
pub const FLEET: [ShipClass; NUM_CLASSES] = [
    ShipClass::new("Battleship", 4, 1),
    ShipClass::new("Cruiser", 3, 2),
    ShipClass::new("Destroyer", 2, 3),
    ShipClass::new("Patrol boat", 1, 4),
];

/// Ships in a complete fleet.
pub const TOTAL_SHIPS: usize = 1 + 2 + 3 + 4;

/// Cells occupied by a complete fleet.
pub const TOTAL_SHIP_CELLS: usize = 4 + 2 * 3 + 3 * 2 + 4;

/// Allowed room name length after trimming.
pub const ROOM_NAME_LEN: RangeInclusive<usize> = 3..=50;

/// Look up the ship class for a given length.
pub fn ship_class(length: u8) -> Option<&'static ShipClass> {
    FLEET.iter().find(|class| class.length() == length)
}

/// Runtime knobs for the room actors and the network surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of each room actor's command mailbox.
    pub command_buffer: usize,
    /// Largest accepted wire frame in bytes.
    pub max_frame_size: u32,
    /// Upper bound on a single frame write.
    pub send_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_buffer: 64,
            max_frame_size: 64 * 1024,
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `BATTLEROOM_COMMAND_BUFFER`, `BATTLEROOM_MAX_FRAME`
    /// and `BATTLEROOM_SEND_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            command_buffer: env_or("BATTLEROOM_COMMAND_BUFFER", defaults.command_buffer),
            max_frame_size: env_or("BATTLEROOM_MAX_FRAME", defaults.max_frame_size),
            send_timeout: Duration::from_secs(env_or(
                "BATTLEROOM_SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )),
        }
    }
}

fn env_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring unparseable {}={:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
