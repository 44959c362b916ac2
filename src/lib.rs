mod bitboard;
mod combat;
mod common;
mod config;
pub mod domain;
mod error;
mod fleet;
mod game;
mod logging;
mod ship;

pub mod broadcast;
pub mod client;
pub mod identity;
pub mod lobby;
pub mod protocol;
pub mod room;
pub mod session;
pub mod sim;
pub mod store;
pub mod transport;

pub use bitboard::{BitBoard, BitBoardError, CellMask};
pub use broadcast::{SubscriberId, SubscriberRegistry, Subscription};
pub use client::Client;
pub use combat::*;
pub use common::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use fleet::*;
pub use game::Match;
pub use identity::{parse_token_entry, IdentityProvider, StaticIdentity};
pub use lobby::Lobby;
pub use logging::init_logging;
pub use protocol::{Message, Request, Response, RoomApi, PROTOCOL_VERSION};
pub use room::{RoomActor, RoomHandle};
pub use session::Session;
pub use ship::*;
pub use sim::{simulate_match, MatchReport, PlayerReport};
pub use store::{InMemoryStore, MatchRecord, MatchStore, StoreError};
pub use transport::in_memory::InMemoryTransport;
pub use transport::tcp::TcpTransport;
pub use transport::Transport;
