//! # Event Log Adapter
//!
//! In-memory append-only log with a broadcast feed for live consumers.

use crate::domain::value_objects::Address;
use crate::events::{FactoryEvent, LogEntry};
use crate::ports::outbound::EventLog;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Default capacity of the broadcast feed.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Append-only in-memory event log.
#[derive(Debug)]
pub struct InMemoryEventLog {
    entries: RwLock<Vec<LogEntry>>,
    sender: broadcast::Sender<LogEntry>,
}

impl InMemoryEventLog {
    /// Create an empty log whose feed buffers `capacity` entries per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Subscribe to entries appended from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, factory: Address, correlation_id: Uuid, event: FactoryEvent) -> LogEntry {
        let entry = {
            let mut entries = self.entries.write();
            let entry = LogEntry {
                sequence: entries.len() as u64,
                correlation_id,
                factory,
                event,
            };
            entries.push(entry.clone());
            entry
        };

        // No live subscribers is fine; the entry is already stored.
        let receivers = self.sender.send(entry.clone()).unwrap_or(0);
        debug!(
            sequence = entry.sequence,
            event = entry.event.name(),
            receivers,
            "Event appended"
        );
        entry
    }

    fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Salt;
    use crate::events::EventKind;

    fn clone_event(n: u8) -> FactoryEvent {
        FactoryEvent::CloneDeployed {
            instance: Address::new([n; 20]),
            salt: Salt::new([n; 32]),
        }
    }

    #[test]
    fn test_append_assigns_sequence() {
        let log = InMemoryEventLog::default();
        let factory = Address::new([0xfa; 20]);

        let first = log.append(factory, Uuid::new_v4(), clone_event(1));
        let second = log.append(
            factory,
            Uuid::new_v4(),
            FactoryEvent::UpgradableProxyDeployed {
                instance: Address::new([2; 20]),
                salt: Salt::new([2; 32]),
            },
        );

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.filter(EventKind::CloneDeployed), vec![first]);
    }

    #[tokio::test]
    async fn test_subscribers_receive_new_entries() {
        let log = InMemoryEventLog::new(8);
        let mut rx = log.subscribe();

        let appended = log.append(Address::ZERO, Uuid::new_v4(), clone_event(3));
        let received = rx.recv().await.unwrap();

        assert_eq!(received, appended);
    }
}
