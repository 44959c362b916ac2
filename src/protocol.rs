//! Transport-agnostic operation surface and the wire messages that carry it.

use serde::{Deserialize, Serialize};

use crate::broadcast::Subscription;
use crate::domain::{PlayerId, Room, RoomEvent, RoomId, Shot};
use crate::error::MatchError;
use crate::ship::{ShipPlacement, ShipSpec};

/// Bumped whenever `Message` changes shape.
pub const PROTOCOL_VERSION: u16 = 1;

/// Room operations on behalf of an already verified caller.
#[async_trait::async_trait]
pub trait RoomApi: Send + Sync {
    async fn create_room(
        &self,
        caller: &PlayerId,
        name: &str,
        password: Option<String>,
    ) -> Result<Room, MatchError>;

    async fn join_room(
        &self,
        room: RoomId,
        caller: &PlayerId,
        credential: Option<String>,
    ) -> Result<Room, MatchError>;

    async fn leave_room(&self, room: RoomId, caller: &PlayerId) -> Result<Room, MatchError>;

    async fn submit_fleet(
        &self,
        room: RoomId,
        caller: &PlayerId,
        ships: Vec<ShipSpec>,
    ) -> Result<Vec<ShipPlacement>, MatchError>;

    async fn fire_shot(
        &self,
        room: RoomId,
        caller: &PlayerId,
        x: u8,
        y: u8,
    ) -> Result<Shot, MatchError>;

    async fn room_state(&self, room: RoomId, caller: &PlayerId) -> Result<Room, MatchError>;

    async fn my_ships(&self, room: RoomId, caller: &PlayerId)
        -> Result<Vec<ShipPlacement>, MatchError>;

    async fn shots(&self, room: RoomId, caller: &PlayerId) -> Result<Vec<Shot>, MatchError>;

    async fn archive_room(&self, room: RoomId, caller: &PlayerId) -> Result<(), MatchError>;

    /// Stream of room events. Fails only for a missing room; deliveries the
    /// caller is not entitled to are dropped.
    async fn subscribe(&self, room: RoomId, caller: &PlayerId) -> Result<Subscription, MatchError>;
}

/// A single framed message on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// First client message: protocol version and bearer token.
    Hello { version: u16, token: String },
    /// Server acceptance of `Hello`, naming the verified player.
    Welcome { version: u16, player: PlayerId },
    Request { id: u64, request: Request },
    /// Answer to the `Request` with the same `id`.
    Response {
        id: u64,
        result: Result<Response, MatchError>,
    },
    /// Pushed room event for an active subscription.
    Event(RoomEvent),
    /// Either side is closing the connection.
    Goodbye { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    CreateRoom { name: String, password: Option<String> },
    JoinRoom { room: RoomId, credential: Option<String> },
    LeaveRoom { room: RoomId },
    SubmitFleet { room: RoomId, ships: Vec<ShipSpec> },
    FireShot { room: RoomId, x: u8, y: u8 },
    RoomState { room: RoomId },
    MyShips { room: RoomId },
    Shots { room: RoomId },
    ArchiveRoom { room: RoomId },
    Subscribe { room: RoomId },
    Unsubscribe { room: RoomId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Room(Room),
    Ships(Vec<ShipPlacement>),
    Shot(Shot),
    Shots(Vec<Shot>),
    Archived(RoomId),
    Subscribed(RoomId),
    Unsubscribed(RoomId),
}

impl Request {
    /// Room the request targets, if any.
    pub fn room(&self) -> Option<RoomId> {
        match self {
            Request::CreateRoom { .. } => None,
            Request::JoinRoom { room, .. }
            | Request::LeaveRoom { room }
            | Request::SubmitFleet { room, .. }
            | Request::FireShot { room, .. }
            | Request::RoomState { room }
            | Request::MyShips { room }
            | Request::Shots { room }
            | Request::ArchiveRoom { room }
            | Request::Subscribe { room }
            | Request::Unsubscribe { room } => Some(*room),
        }
    }
}

/// Run a request that maps directly onto a `RoomApi` call. Subscription
/// management is left to the caller, which owns the event streams.
pub async fn dispatch<A: RoomApi + ?Sized>(
    api: &A,
    caller: &PlayerId,
    request: Request,
) -> Result<Response, MatchError> {
    let response = match request {
        Request::CreateRoom { name, password } => {
            Response::Room(api.create_room(caller, &name, password).await?)
        }
        Request::JoinRoom { room, credential } => {
            Response::Room(api.join_room(room, caller, credential).await?)
        }
        Request::LeaveRoom { room } => Response::Room(api.leave_room(room, caller).await?),
        Request::SubmitFleet { room, ships } => {
            Response::Ships(api.submit_fleet(room, caller, ships).await?)
        }
        Request::FireShot { room, x, y } => Response::Shot(api.fire_shot(room, caller, x, y).await?),
        Request::RoomState { room } => Response::Room(api.room_state(room, caller).await?),
        Request::MyShips { room } => Response::Ships(api.my_ships(room, caller).await?),
        Request::Shots { room } => Response::Shots(api.shots(room, caller).await?),
        Request::ArchiveRoom { room } => {
            api.archive_room(room, caller).await?;
            Response::Archived(room)
        }
        Request::Subscribe { room } => {
            // validates the room; the stream itself is dropped here
            api.subscribe(room, caller).await?;
            Response::Subscribed(room)
        }
        Request::Unsubscribe { room } => Response::Unsubscribed(room),
    };
    Ok(response)
}
