//! Change notification for the remote store.
//!
//! The backend announces every insert, update and delete on its three
//! tables. Subscribers receive events per record kind: order is kept within
//! a kind, but nothing is promised about order across kinds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{broadcast, RwLock};

use crate::models::{FamilyMember, Purchase, RotationRecord};

/// Events buffered per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// The three record kinds the backend stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Members,
    Purchases,
    RotationState,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Members,
        RecordKind::Purchases,
        RecordKind::RotationState,
    ];

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Members => "family_members",
            RecordKind::Purchases => "purchases",
            RecordKind::RotationState => "rotation_state",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// One row-level change. Deletes only carry the old id.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

/// A change to any of the three record kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Member(Change<FamilyMember>),
    Purchase(Change<Purchase>),
    Rotation(Change<RotationRecord>),
}

impl ChangeEvent {
    pub fn kind(&self) -> RecordKind {
        match self {
            ChangeEvent::Member(_) => RecordKind::Members,
            ChangeEvent::Purchase(_) => RecordKind::Purchases,
            ChangeEvent::Rotation(_) => RecordKind::RotationState,
        }
    }
}

/// Source of change events, one subscription per record kind.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn subscribe(&self, kind: RecordKind) -> broadcast::Receiver<ChangeEvent>;
}

/// In-process notifier backed by one broadcast channel per record kind.
pub struct ChangeHub {
    channels: RwLock<HashMap<RecordKind, broadcast::Sender<ChangeEvent>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Sends an event to every subscriber of its kind.
    pub async fn publish(&self, event: ChangeEvent) {
        let kind = event.kind();
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(&kind) {
            // No subscribers is not an error
            let _ = sender.send(event);
        } else {
            tracing::trace!("No subscribers for {}, dropping event", kind);
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeNotifier for ChangeHub {
    async fn subscribe(&self, kind: RecordKind) -> broadcast::Receiver<ChangeEvent> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(&kind) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(kind, sender);
            receiver
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe(RecordKind::Members).await;

        let member = FamilyMember::new("Alice", "blue");
        hub.publish(ChangeEvent::Member(Change::Insert(member.clone())))
            .await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event, ChangeEvent::Member(Change::Insert(member)));
    }

    #[tokio::test]
    async fn test_kinds_are_isolated() {
        let hub = ChangeHub::new();
        let mut members = hub.subscribe(RecordKind::Members).await;
        let mut purchases = hub.subscribe(RecordKind::Purchases).await;

        hub.publish(ChangeEvent::Member(Change::Delete {
            id: "m1".to_string(),
        }))
        .await;

        assert!(members.try_recv().is_ok());
        assert!(purchases.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let hub = ChangeHub::new();
        hub.publish(ChangeEvent::Rotation(Change::Update(RotationRecord::new())))
            .await;

        // A later subscriber does not see earlier events
        let mut rx = hub.subscribe(RecordKind::RotationState).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_order_kept_within_kind() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe(RecordKind::Members).await;

        for name in ["A", "B", "C"] {
            hub.publish(ChangeEvent::Member(Change::Insert(FamilyMember::new(
                name, "blue",
            ))))
            .await;
        }

        let names: Vec<String> = (0..3)
            .map(|_| match rx.try_recv().unwrap() {
                ChangeEvent::Member(Change::Insert(m)) => m.name,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_record_kind_tables() {
        assert_eq!(RecordKind::Members.to_string(), "family_members");
        assert_eq!(RecordKind::Purchases.table(), "purchases");
        assert_eq!(RecordKind::RotationState.table(), "rotation_state");
    }
}
