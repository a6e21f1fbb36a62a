//! Event Gateway
//!
//! Fanout seam between the coordinator and the connection handlers. The
//! coordinator emits `OutboundEvent`s after each completed mutation; every
//! connection holds a broadcast receiver and translates events into wire
//! messages. Nothing here blocks: a send with no subscribers is fine.

use tokio::sync::broadcast;
use tracing::trace;

use crate::game::state::GameState;
use crate::network::protocol::{ChatEntry, ClientInfo};
use crate::vote::ballot::VoteSnapshot;

/// Events broadcast to all connected clients, in mutation order.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    VoteStarted(VoteSnapshot),
    VoteUpdated(VoteSnapshot),
    VoteEnded(VoteSnapshot),
    VoteCancel(VoteSnapshot),
    GameState(Option<GameState>),
    Chat(ChatEntry),
    ClientsUpdate(Vec<ClientInfo>),
}

#[derive(Debug, Clone)]
pub struct BroadcastGateway {
    tx: broadcast::Sender<OutboundEvent>,
}

impl BroadcastGateway {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.tx.subscribe()
    }

    /// Broadcast to every subscriber. Having none is not an error.
    pub fn emit(&self, event: OutboundEvent) {
        if self.tx.send(event).is_err() {
            trace!("no subscribers for outbound event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastGateway {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let gateway = BroadcastGateway::new(8);
        gateway.emit(OutboundEvent::GameState(None));
    }

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let gateway = BroadcastGateway::new(8);
        let mut rx = gateway.subscribe();
        gateway.emit(OutboundEvent::GameState(None));
        gateway.emit(OutboundEvent::ClientsUpdate(Vec::new()));

        assert!(matches!(rx.recv().await.unwrap(), OutboundEvent::GameState(None)));
        assert!(matches!(rx.recv().await.unwrap(), OutboundEvent::ClientsUpdate(_)));
    }
}
