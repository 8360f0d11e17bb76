use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::LedgerKind;

/// Everything the engine reports back to the presentation layer travels
/// through this single stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    LedgerSynced { kind: LedgerKind, count: usize },
    DetailQueued { kind: LedgerKind, id: i64 },
    DetailCompleted { kind: LedgerKind, id: i64, items: usize },
    DetailFailed { kind: LedgerKind, id: i64, reason: String },
    AutoRegistered { kind: LedgerKind, id: i64 },
    BatchRegistered { kind: LedgerKind, ok: usize, failed: usize },
    TransportError { message: String },
    SessionCleared,
}

/// Fan-out bus for session events. A lagging receiver loses the oldest
/// events, never the stream itself.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: LedgerEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_every_subscriber() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(LedgerEvent::SessionCleared);

        assert!(matches!(
            first.recv().await.unwrap(),
            LedgerEvent::SessionCleared
        ));
        assert!(matches!(
            second.recv().await.unwrap(),
            LedgerEvent::SessionCleared
        ));
    }

    #[test]
    fn emit_without_subscribers_is_a_noop() {
        let bus = EventBus::new(8);
        bus.emit(LedgerEvent::TransportError {
            message: "sin conexión".to_string(),
        });
    }
}
