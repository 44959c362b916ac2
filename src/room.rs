//! Per-room actor.
//!
//! A `RoomActor` task owns one [`Match`] together with its subscribers and
//! processes commands from a bounded mailbox one at a time, so no two
//! operations on the same room ever interleave. Callers talk to it through
//! a cloneable [`RoomHandle`].
//!
//! Every mutation runs against a checkpoint of the match. The outcome is
//! persisted before any event is published, and a failed write restores
//! the checkpoint so memory never runs ahead of the store.
//!
//! An actor stops after the command that archives its room, or once every
//! handle to it has been dropped. Finished rooms keep their actor, since
//! participants may still read them, leave or archive them. Subscriptions
//! end when the actor stops.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::broadcast::{SubscriberRegistry, Subscription};
use crate::domain::{PlayerId, Room, RoomId, Shot};
use crate::error::MatchError;
use crate::game::Match;
use crate::ship::{ShipPlacement, ShipSpec};
use crate::store::{MatchStore, StoreError};

type Reply<T> = oneshot::Sender<Result<T, MatchError>>;

enum RoomCommand {
    Join {
        caller: PlayerId,
        credential: Option<String>,
        reply: Reply<Room>,
    },
    Leave {
        caller: PlayerId,
        reply: Reply<Room>,
    },
    SubmitFleet {
        caller: PlayerId,
        ships: Vec<ShipSpec>,
        reply: Reply<Vec<ShipPlacement>>,
    },
    FireShot {
        caller: PlayerId,
        x: u8,
        y: u8,
        reply: Reply<Shot>,
    },
    Snapshot {
        caller: PlayerId,
        reply: Reply<Room>,
    },
    MyShips {
        caller: PlayerId,
        reply: Reply<Vec<ShipPlacement>>,
    },
    Shots {
        caller: PlayerId,
        reply: Reply<Vec<Shot>>,
    },
    Archive {
        caller: PlayerId,
        reply: Reply<()>,
    },
    Subscribe {
        caller: PlayerId,
        reply: Reply<Subscription>,
    },
}

/// Cloneable address of a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// False once the actor has stopped.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| MatchError::NotFound(self.id))?;
        rx.await.map_err(|_| MatchError::NotFound(self.id))?
    }

    pub async fn join(&self, caller: PlayerId, credential: Option<String>) -> Result<Room, MatchError> {
        self.call(|reply| RoomCommand::Join { caller, credential, reply }).await
    }

    pub async fn leave(&self, caller: PlayerId) -> Result<Room, MatchError> {
        self.call(|reply| RoomCommand::Leave { caller, reply }).await
    }

    pub async fn submit_fleet(
        &self,
        caller: PlayerId,
        ships: Vec<ShipSpec>,
    ) -> Result<Vec<ShipPlacement>, MatchError> {
        self.call(|reply| RoomCommand::SubmitFleet { caller, ships, reply }).await
    }

    pub async fn fire_shot(&self, caller: PlayerId, x: u8, y: u8) -> Result<Shot, MatchError> {
        self.call(|reply| RoomCommand::FireShot { caller, x, y, reply }).await
    }

    pub async fn snapshot(&self, caller: PlayerId) -> Result<Room, MatchError> {
        self.call(|reply| RoomCommand::Snapshot { caller, reply }).await
    }

    pub async fn my_ships(&self, caller: PlayerId) -> Result<Vec<ShipPlacement>, MatchError> {
        self.call(|reply| RoomCommand::MyShips { caller, reply }).await
    }

    pub async fn shots(&self, caller: PlayerId) -> Result<Vec<Shot>, MatchError> {
        self.call(|reply| RoomCommand::Shots { caller, reply }).await
    }

    pub async fn archive(&self, caller: PlayerId) -> Result<(), MatchError> {
        self.call(|reply| RoomCommand::Archive { caller, reply }).await
    }

    /// Attach a subscriber. Never fails on authorization: events are simply
    /// withheld while the caller is not a participant.
    pub async fn subscribe(&self, caller: PlayerId) -> Result<Subscription, MatchError> {
        self.call(|reply| RoomCommand::Subscribe { caller, reply }).await
    }
}

pub struct RoomActor {
    game: Match,
    store: Arc<dyn MatchStore>,
    subscribers: SubscriberRegistry,
    mailbox: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Start an actor for `game` on the current runtime.
    pub fn spawn(game: Match, store: Arc<dyn MatchStore>, mailbox_size: usize) -> RoomHandle {
        let id = game.id();
        let (sender, mailbox) = mpsc::channel(mailbox_size.max(1));
        let actor = RoomActor {
            subscribers: SubscriberRegistry::new(id),
            game,
            store,
            mailbox,
        };
        tokio::spawn(actor.run());
        RoomHandle { id, sender }
    }

    async fn run(mut self) {
        debug!("{} actor started", self.game.id());
        while let Some(command) = self.mailbox.recv().await {
            self.handle(command).await;
            if self.game.room().deleted {
                break;
            }
        }
        debug!("{} actor stopped", self.game.id());
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join { caller, credential, reply } => {
                let res = self.join(&caller, credential.as_deref()).await;
                respond(reply, res);
            }
            RoomCommand::Leave { caller, reply } => {
                let res = self.leave(&caller).await;
                respond(reply, res);
            }
            RoomCommand::SubmitFleet { caller, ships, reply } => {
                let res = self.submit_fleet(&caller, &ships).await;
                respond(reply, res);
            }
            RoomCommand::FireShot { caller, x, y, reply } => {
                let res = self.fire_shot(&caller, x, y).await;
                respond(reply, res);
            }
            RoomCommand::Snapshot { caller, reply } => {
                respond(reply, self.game.snapshot(&caller));
            }
            RoomCommand::MyShips { caller, reply } => {
                respond(reply, self.game.my_ships(&caller));
            }
            RoomCommand::Shots { caller, reply } => {
                respond(reply, self.game.shot_history(&caller));
            }
            RoomCommand::Archive { caller, reply } => {
                let res = self.archive(&caller).await;
                respond(reply, res);
            }
            RoomCommand::Subscribe { caller, reply } => {
                respond(reply, Ok(self.subscribers.subscribe(caller)));
            }
        }
    }

    async fn join(&mut self, caller: &PlayerId, credential: Option<&str>) -> Result<Room, MatchError> {
        let checkpoint = self.game.clone();
        let room = self.game.join(caller, credential, Utc::now())?.clone();
        let saved = self.store.save_room(&room, self.game.password()).await;
        self.settle(checkpoint, saved)?;
        Ok(room)
    }

    async fn leave(&mut self, caller: &PlayerId) -> Result<Room, MatchError> {
        let checkpoint = self.game.clone();
        let room = self.game.leave(caller, Utc::now())?.clone();
        let saved = self.store.save_room(&room, self.game.password()).await;
        self.settle(checkpoint, saved)?;
        Ok(room)
    }

    async fn submit_fleet(
        &mut self,
        caller: &PlayerId,
        ships: &[ShipSpec],
    ) -> Result<Vec<ShipPlacement>, MatchError> {
        let checkpoint = self.game.clone();
        let placed = self.game.submit_fleet(caller, ships, Utc::now())?;
        let saved = self
            .store
            .commit_fleet(self.game.room(), caller, &placed)
            .await;
        self.settle(checkpoint, saved)?;
        Ok(placed)
    }

    async fn fire_shot(&mut self, caller: &PlayerId, x: u8, y: u8) -> Result<Shot, MatchError> {
        let checkpoint = self.game.clone();
        let shot = self.game.fire_shot(caller, x, y, Utc::now())?;
        let saved = match self.game.room().opponent_of(caller) {
            Some(target) => {
                self.store
                    .commit_shot(self.game.room(), &shot, target, self.game.fleet(target))
                    .await
            }
            None => Err(StoreError::Unavailable("shot without a target".to_string())),
        };
        self.settle(checkpoint, saved)?;
        Ok(shot)
    }

    async fn archive(&mut self, caller: &PlayerId) -> Result<(), MatchError> {
        let checkpoint = self.game.clone();
        self.game.archive(caller, Utc::now())?;
        let saved = self
            .store
            .save_room(self.game.room(), self.game.password())
            .await;
        self.settle(checkpoint, saved)
    }

    /// Publish the queued events if the write went through, otherwise
    /// restore `checkpoint` and report the store failure.
    fn settle(&mut self, checkpoint: Match, saved: Result<(), StoreError>) -> Result<(), MatchError> {
        match saved {
            Ok(()) => {
                let room = self.game.room().clone();
                for event in self.game.take_events() {
                    self.subscribers.publish(&event, &room);
                }
                Ok(())
            }
            Err(err) => {
                warn!("{}: store write failed, rolled back: {}", self.game.id(), err);
                self.game = checkpoint;
                Err(err.into())
            }
        }
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, MatchError>) {
    if let Err(err) = &result {
        debug!("request refused: {}", err);
    }
    // the caller may have given up waiting
    let _ = reply.send(result);
}

