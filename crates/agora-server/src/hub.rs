//! Broadcast hub fanning normalized server events out to every live
//! WebSocket connection.
//!
//! One global channel: every subscriber sees every event, mirroring the
//! single-room semantics of the socket surface. Slow consumers lag and drop
//! events rather than backpressure the router.

use tokio::sync::broadcast;
use tracing::debug;

use agora_shared::protocol::ServerEvent;

/// Default channel capacity before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Register a new connection. The receiver yields every event broadcast
    /// after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Fan an event out to all subscribers. Sending with zero connected
    /// peers is not an error; the event simply evaporates.
    pub fn broadcast(&self, event: ServerEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Broadcast event"),
            Err(_) => debug!("Broadcast with no connected peers"),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let hub = EventHub::default();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.broadcast(ServerEvent::Error {
            message: "ping".to_string(),
        });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                ServerEvent::Error { message } => assert_eq!(message, "ping"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn broadcast_without_peers_is_silent() {
        let hub = EventHub::default();
        hub.broadcast(ServerEvent::Error {
            message: "void".to_string(),
        });
        assert_eq!(hub.receiver_count(), 0);
    }
}
