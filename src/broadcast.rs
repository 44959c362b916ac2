//! Per-room event fan-out.
//!
//! Each subscriber owns an unbounded channel, so publishing never waits on a
//! slow reader and each reader sees events in publish order. Whether a
//! subscriber may see an event is decided at publish time against the room
//! snapshot that accompanies it, never at subscribe time.

use log::debug;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::domain::{PlayerId, Room, RoomEvent, RoomId};

/// Identifies one subscription within its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Receiving end handed to a subscriber. Dropping it detaches.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    room: RoomId,
    receiver: UnboundedReceiver<RoomEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Next event, or `None` once the room has shut down.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.receiver.recv().await
    }

    /// Next already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

struct Subscriber {
    id: SubscriberId,
    player: PlayerId,
    sender: UnboundedSender<RoomEvent>,
}

/// Live subscriptions of a single room.
pub struct SubscriberRegistry {
    room: RoomId,
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Whether `player` may receive events about `room` right now.
pub fn may_receive(player: &PlayerId, room: &Room) -> bool {
    !room.deleted && room.is_participant(player)
}

impl SubscriberRegistry {
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, player: PlayerId) -> Subscription {
        self.prune();
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        debug!("{} subscribed to {} as #{}", player, self.room, id.0);
        self.subscribers.push(Subscriber { id, player, sender });
        Subscription {
            id,
            room: self.room,
            receiver,
        }
    }

    /// Forget subscribers whose `Subscription` has been dropped.
    fn prune(&mut self) {
        let room = self.room;
        self.subscribers.retain(|sub| {
            let open = !sub.sender.is_closed();
            if !open {
                debug!("#{} detached from {}", sub.id.0, room);
            }
            open
        });
    }

    /// Deliver `event` to every subscriber allowed to see `room` in its
    /// current state. Detached subscribers are pruned. Returns the number of
    /// deliveries made.
    pub fn publish(&mut self, event: &RoomEvent, room: &Room) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|sub| {
            if sub.sender.is_closed() {
                return false;
            }
            if !may_receive(&sub.player, room) {
                debug!(
                    "event {} on {} withheld from {}",
                    event.id, room.id, sub.player
                );
                return true;
            }
            match sub.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Subscribers still attached.
    pub fn len(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|sub| !sub.sender.is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoomEventKind;
    use chrono::Utc;

    fn room_with(players: &[&str]) -> Room {
        let mut room = Room::new(RoomId(1), "harbour".into(), PlayerId::from(players[0]), false, Utc::now());
        for p in &players[1..] {
            room.participants.push(PlayerId::from(*p));
        }
        room
    }

    fn event(id: u64, room: &Room) -> RoomEvent {
        RoomEvent {
            id,
            room: room.id,
            kind: RoomEventKind::RoomUpdated(room.clone()),
        }
    }

    #[test]
    fn delivers_in_publish_order() {
        let room = room_with(&["a", "b"]);
        let mut reg = SubscriberRegistry::new(room.id);
        let mut sub = reg.subscribe(PlayerId::from("a"));
        for id in 0..5 {
            assert_eq!(reg.publish(&event(id, &room), &room), 1);
        }
        let ids: Vec<u64> = std::iter::from_fn(|| sub.try_recv()).map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn predicate_is_checked_per_event() {
        let mut room = room_with(&["a"]);
        let mut reg = SubscriberRegistry::new(room.id);
        let mut sub = reg.subscribe(PlayerId::from("b"));
        assert_eq!(reg.publish(&event(1, &room), &room), 0);
        room.participants.push(PlayerId::from("b"));
        assert_eq!(reg.publish(&event(2, &room), &room), 1);
        room.deleted = true;
        assert_eq!(reg.publish(&event(3, &room), &room), 0);
        assert_eq!(sub.try_recv().map(|e| e.id), Some(2));
        assert!(sub.try_recv().is_none());
        // withheld, not removed
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let room = room_with(&["a", "b"]);
        let mut reg = SubscriberRegistry::new(room.id);
        let sub = reg.subscribe(PlayerId::from("a"));
        let _keep = reg.subscribe(PlayerId::from("b"));
        drop(sub);
        assert_eq!(reg.publish(&event(1, &room), &room), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn detached_subscribers_do_not_pile_up_in_an_idle_room() {
        let room = room_with(&["a"]);
        let mut reg = SubscriberRegistry::new(room.id);
        for _ in 0..1000 {
            let sub = reg.subscribe(PlayerId::from("a"));
            drop(sub);
        }
        assert_eq!(reg.len(), 0);
        assert!(reg.is_empty());
        let live = reg.subscribe(PlayerId::from("a"));
        assert_eq!(live.id(), SubscriberId(1000));
        assert_eq!(reg.subscribers.len(), 1);
        assert_eq!(reg.len(), 1);
    }
}
