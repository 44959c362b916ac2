//! Client side of the wire protocol.

use std::collections::VecDeque;

use anyhow::anyhow;

use crate::domain::{PlayerId, Room, RoomEvent, RoomId, Shot};
use crate::protocol::{Message, Request, Response, PROTOCOL_VERSION};
use crate::ship::{ShipPlacement, ShipSpec};
use crate::transport::Transport;

/// Issues requests over a transport and buffers room events that arrive
/// while waiting for a response.
///
/// Room errors are returned as `anyhow::Error` wrapping a
/// [`MatchError`](crate::error::MatchError); use `downcast_ref` to inspect.
pub struct Client<T: Transport> {
    transport: T,
    player: PlayerId,
    next_id: u64,
    events: VecDeque<RoomEvent>,
}

impl<T: Transport> Client<T> {
    /// Perform the handshake with `token`.
    pub async fn connect(mut transport: T, token: &str) -> anyhow::Result<Self> {
        transport
            .send(Message::Hello {
                version: PROTOCOL_VERSION,
                token: token.to_string(),
            })
            .await?;
        match transport.recv().await? {
            Message::Welcome { version, player } if version == PROTOCOL_VERSION => Ok(Self {
                transport,
                player,
                next_id: 0,
                events: VecDeque::new(),
            }),
            Message::Goodbye { reason } => Err(anyhow!("Server refused connection: {}", reason)),
            other => Err(anyhow!("Unexpected message: {:?}", other)),
        }
    }

    /// Identity the server verified for this connection.
    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    pub async fn request(&mut self, request: Request) -> anyhow::Result<Response> {
        let id = self.next_id;
        self.next_id += 1;
        self.transport.send(Message::Request { id, request }).await?;
        loop {
            match self.transport.recv().await? {
                Message::Event(event) => self.events.push_back(event),
                Message::Response { id: got, result } if got == id => {
                    return result.map_err(anyhow::Error::from);
                }
                Message::Goodbye { reason } => return Err(anyhow!("Server closed: {}", reason)),
                other => return Err(anyhow!("Unexpected message: {:?}", other)),
            }
        }
    }

    /// Next pushed room event, waiting if none is buffered.
    pub async fn next_event(&mut self) -> anyhow::Result<RoomEvent> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        match self.transport.recv().await? {
            Message::Event(event) => Ok(event),
            Message::Goodbye { reason } => Err(anyhow!("Server closed: {}", reason)),
            other => Err(anyhow!("Unexpected message: {:?}", other)),
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.transport
            .send(Message::Goodbye {
                reason: "client closed".to_string(),
            })
            .await
    }

    pub async fn create_room(&mut self, name: &str, password: Option<String>) -> anyhow::Result<Room> {
        let request = Request::CreateRoom {
            name: name.to_string(),
            password,
        };
        match self.request(request).await? {
            Response::Room(room) => Ok(room),
            other => Err(unexpected(other)),
        }
    }

    pub async fn join_room(&mut self, room: RoomId, credential: Option<String>) -> anyhow::Result<Room> {
        match self.request(Request::JoinRoom { room, credential }).await? {
            Response::Room(room) => Ok(room),
            other => Err(unexpected(other)),
        }
    }

    pub async fn leave_room(&mut self, room: RoomId) -> anyhow::Result<Room> {
        match self.request(Request::LeaveRoom { room }).await? {
            Response::Room(room) => Ok(room),
            other => Err(unexpected(other)),
        }
    }

    pub async fn submit_fleet(
        &mut self,
        room: RoomId,
        ships: Vec<ShipSpec>,
    ) -> anyhow::Result<Vec<ShipPlacement>> {
        match self.request(Request::SubmitFleet { room, ships }).await? {
            Response::Ships(ships) => Ok(ships),
            other => Err(unexpected(other)),
        }
    }

    pub async fn fire_shot(&mut self, room: RoomId, x: u8, y: u8) -> anyhow::Result<Shot> {
        match self.request(Request::FireShot { room, x, y }).await? {
            Response::Shot(shot) => Ok(shot),
            other => Err(unexpected(other)),
        }
    }

    pub async fn room_state(&mut self, room: RoomId) -> anyhow::Result<Room> {
        match self.request(Request::RoomState { room }).await? {
            Response::Room(room) => Ok(room),
            other => Err(unexpected(other)),
        }
    }

    pub async fn my_ships(&mut self, room: RoomId) -> anyhow::Result<Vec<ShipPlacement>> {
        match self.request(Request::MyShips { room }).await? {
            Response::Ships(ships) => Ok(ships),
            other => Err(unexpected(other)),
        }
    }

    pub async fn shots(&mut self, room: RoomId) -> anyhow::Result<Vec<Shot>> {
        match self.request(Request::Shots { room }).await? {
            Response::Shots(shots) => Ok(shots),
            other => Err(unexpected(other)),
        }
    }

    pub async fn subscribe(&mut self, room: RoomId) -> anyhow::Result<()> {
        match self.request(Request::Subscribe { room }).await? {
            Response::Subscribed(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn unsubscribe(&mut self, room: RoomId) -> anyhow::Result<()> {
        match self.request(Request::Unsubscribe { room }).await? {
            Response::Unsubscribed(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> anyhow::Error {
    anyhow!("Unexpected response: {:?}", response)
}
