//! Room fan-out.
//!
//! Two room families: one per market (round state, round errors, market
//! status) and one per player (payout and balance events). Rooms are backed
//! by `tokio::sync::broadcast`; a room with no subscribers costs nothing and
//! is garbage-collected on the next emit.

use plinko_types::ServerEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Fan-out seam the scheduler and pipelines write through.
pub trait Broadcaster: Send + Sync {
    fn emit_market(&self, market: &str, event: &ServerEvent);
    fn emit_player(&self, player_id: &str, event: &ServerEvent);
}

type Room = broadcast::Sender<Arc<ServerEvent>>;

pub struct Rooms {
    capacity: usize,
    markets: Mutex<HashMap<String, Room>>,
    players: Mutex<HashMap<String, Room>>,
}

impl Rooms {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            markets: Mutex::new(HashMap::new()),
            players: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe_market(&self, market: &str) -> broadcast::Receiver<Arc<ServerEvent>> {
        Self::subscribe(lock(&self.markets), market, self.capacity)
    }

    pub fn subscribe_player(&self, player_id: &str) -> broadcast::Receiver<Arc<ServerEvent>> {
        Self::subscribe(lock(&self.players), player_id, self.capacity)
    }

    fn subscribe(
        mut rooms: MutexGuard<'_, HashMap<String, Room>>,
        name: &str,
        capacity: usize,
    ) -> broadcast::Receiver<Arc<ServerEvent>> {
        match rooms.get(name) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(capacity);
                rooms.insert(name.to_string(), sender);
                receiver
            }
        }
    }

    fn emit(rooms: &Mutex<HashMap<String, Room>>, name: &str, event: &ServerEvent) {
        let mut rooms = lock(rooms);
        if let Some(sender) = rooms.get(name) {
            if sender.send(Arc::new(event.clone())).is_err() {
                // Last subscriber left; drop the room.
                rooms.remove(name);
            }
        }
    }
}

fn lock<'a>(
    rooms: &'a Mutex<HashMap<String, Room>>,
) -> MutexGuard<'a, HashMap<String, Room>> {
    rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Broadcaster for Rooms {
    fn emit_market(&self, market: &str, event: &ServerEvent) {
        Rooms::emit(&self.markets, market, event);
    }

    fn emit_player(&self, player_id: &str, event: &ServerEvent) {
        Rooms::emit(&self.players, player_id, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinko_types::events::{MarketAvailability, MarketStatus};

    fn status_event(ts: u64) -> ServerEvent {
        ServerEvent::MarketStatus(MarketStatus {
            status: MarketAvailability::Open,
            reason: None,
            timestamp: ts,
        })
    }

    #[tokio::test]
    async fn market_rooms_are_isolated() {
        let rooms = Rooms::new(16);
        let mut m = rooms.subscribe_market("M");
        let mut n = rooms.subscribe_market("N");

        rooms.emit_market("M", &status_event(1));
        assert_eq!(*m.recv().await.unwrap(), status_event(1));
        assert!(n.try_recv().is_err());
    }

    #[tokio::test]
    async fn player_rooms_reach_every_subscriber() {
        let rooms = Rooms::new(16);
        let mut a = rooms.subscribe_player("p1");
        let mut b = rooms.subscribe_player("p1");
        rooms.emit_player("p1", &status_event(2));
        assert_eq!(*a.recv().await.unwrap(), status_event(2));
        assert_eq!(*b.recv().await.unwrap(), status_event(2));
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_a_noop() {
        let rooms = Rooms::new(16);
        rooms.emit_market("ghost", &status_event(3));
        // Room created by a past subscriber is dropped once empty.
        let receiver = rooms.subscribe_market("M");
        drop(receiver);
        rooms.emit_market("M", &status_event(4));
        assert!(lock(&rooms.markets).get("M").is_none());
    }
}
