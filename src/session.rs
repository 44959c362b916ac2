//! Server side of one client connection.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::domain::{PlayerId, RoomEvent, RoomId};
use crate::error::MatchError;
use crate::identity::IdentityProvider;
use crate::protocol::{dispatch, Message, Request, Response, RoomApi, PROTOCOL_VERSION};
use crate::transport::Transport;

/// Serves a single connection: handshake, then requests and pushed events
/// until the peer says goodbye or the connection drops.
pub struct Session<T: Transport> {
    api: Arc<dyn RoomApi>,
    identity: Arc<dyn IdentityProvider>,
    transport: T,
    forwarders: HashMap<RoomId, JoinHandle<()>>,
    events_tx: UnboundedSender<RoomEvent>,
    events_rx: UnboundedReceiver<RoomEvent>,
}

impl<T: Transport> Session<T> {
    pub fn new(api: Arc<dyn RoomApi>, identity: Arc<dyn IdentityProvider>, transport: T) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            identity,
            transport,
            forwarders: HashMap::new(),
            events_tx,
            events_rx,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let player = self.handshake().await?;
        info!("session opened for {}", player);
        let result = self.serve(&player).await;
        for (_, task) in self.forwarders.drain() {
            task.abort();
        }
        info!("session closed for {}", player);
        result
    }

    async fn handshake(&mut self) -> anyhow::Result<PlayerId> {
        let (version, token) = match self.transport.recv().await? {
            Message::Hello { version, token } => (version, token),
            other => {
                self.goodbye("expected handshake").await;
                return Err(anyhow!("Expected handshake, got {:?}", other));
            }
        };
        if version != PROTOCOL_VERSION {
            self.goodbye("unsupported protocol version").await;
            return Err(anyhow!(
                "Protocol version mismatch: client {}, server {}",
                version,
                PROTOCOL_VERSION
            ));
        }
        let player = match self.identity.authenticate(&token).await {
            Ok(player) => player,
            Err(err) => {
                self.goodbye("authentication failed").await;
                return Err(anyhow!("Handshake rejected: {}", err));
            }
        };
        self.transport
            .send(Message::Welcome {
                version: PROTOCOL_VERSION,
                player: player.clone(),
            })
            .await?;
        Ok(player)
    }

    async fn serve(&mut self, player: &PlayerId) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                incoming = self.transport.recv() => {
                    let msg = match incoming {
                        Ok(msg) => msg,
                        Err(err) => {
                            warn!("connection of {} dropped: {}", player, err);
                            return Ok(());
                        }
                    };
                    match msg {
                        Message::Request { id, request } => {
                            let result = self.handle(player, request).await;
                            self.transport.send(Message::Response { id, result }).await?;
                        }
                        Message::Goodbye { reason } => {
                            debug!("{} said goodbye: {}", player, reason);
                            return Ok(());
                        }
                        other => {
                            self.goodbye("unexpected message").await;
                            return Err(anyhow!("Unexpected message from {}: {:?}", player, other));
                        }
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.transport.send(Message::Event(event)).await?;
                }
            }
        }
    }

    async fn handle(
        &mut self,
        player: &PlayerId,
        request: Request,
    ) -> Result<Response, MatchError> {
        match request {
            Request::Subscribe { room } => {
                let mut subscription = self.api.subscribe(room, player).await?;
                let tx = self.events_tx.clone();
                let task = tokio::spawn(async move {
                    while let Some(event) = subscription.recv().await {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                });
                if let Some(previous) = self.forwarders.insert(room, task) {
                    previous.abort();
                }
                Ok(Response::Subscribed(room))
            }
            Request::Unsubscribe { room } => {
                if let Some(task) = self.forwarders.remove(&room) {
                    task.abort();
                }
                Ok(Response::Unsubscribed(room))
            }
            other => dispatch(self.api.as_ref(), player, other).await,
        }
    }

    async fn goodbye(&mut self, reason: &str) {
        let _ = self
            .transport
            .send(Message::Goodbye {
                reason: reason.to_string(),
            })
            .await;
    }
}
