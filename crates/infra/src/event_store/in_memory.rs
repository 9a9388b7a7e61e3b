use std::collections::HashMap;
use std::sync::RwLock;

use tonytoken_core::{ExpectedVersion, LedgerId};

use super::r#trait::{
    EventStore, EventStoreError, StoredEvent, UncommittedEvent, commit_batch, validate_batch,
};

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<LedgerId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let (ledger_id, aggregate_type) = validate_batch(&events)?;

        let mut streams = self.streams.write().map_err(|_| EventStoreError::Poisoned)?;
        let stream = streams.entry(ledger_id).or_default();

        let committed = commit_batch(stream, &aggregate_type, events, expected_version)?;
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams.get(&ledger_id).cloned().unwrap_or_default())
    }

    fn list_streams(&self) -> Result<Vec<LedgerId>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        let mut ids: Vec<_> = streams
            .iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(ledger_id: LedgerId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            ledger_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "token.ledger.transfer".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn assigns_sequence_numbers_from_one() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::new();

        let first = store
            .append(vec![event(id, "token.ledger"), event(id, "token.ledger")], ExpectedVersion::Exact(0))
            .unwrap();
        let second = store
            .append(vec![event(id, "token.ledger")], ExpectedVersion::Exact(2))
            .unwrap();

        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second[0].sequence_number, 3);
        assert_eq!(store.load_stream(id).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let id = LedgerId::new();
        store.append(vec![event(id, "token.ledger")], ExpectedVersion::Exact(0)).unwrap();

        let err = store
            .append(vec![event(id, "token.ledger")], ExpectedVersion::Exact(0))
            .unwrap_err();

        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(id).unwrap().len(), 1);
    }

    #[test]
    fn mixed_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = LedgerId::new();
        let b = LedgerId::new();

        let err = store
            .append(vec![event(a, "token.ledger"), event(b, "token.ledger")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));

        let err = store
            .append(vec![event(a, "token.ledger"), event(a, "other")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
        assert!(store.list_streams().unwrap().is_empty());
    }

    #[test]
    fn unknown_stream_loads_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.load_stream(LedgerId::new()).unwrap().is_empty());
    }
}
