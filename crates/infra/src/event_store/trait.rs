use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use std::sync::Arc;
use tonytoken_core::{ExpectedVersion, LedgerId};

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Lifecycle:
///
/// 1. **Domain event**: produced by the ledger's `handle()`
/// 2. **UncommittedEvent**: serialized and wrapped with stream metadata
/// 3. **StoredEvent**: persisted with an assigned `sequence_number`
/// 4. **EventEnvelope**: published on the bus
///
/// Use [`UncommittedEvent::from_typed`] to build one from a typed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers start at 1, increase by one per event, and are scoped to
/// a single ledger stream. They drive optimistic concurrency and projection
/// idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the ledger stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> tonytoken_events::EventEnvelope<JsonValue> {
        tonytoken_events::EventEnvelope::new(
            self.event_id,
            self.ledger_id,
            self.aggregate_type.clone(),
            self.event_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }

    fn committed(event: UncommittedEvent, sequence_number: u64) -> Self {
        Self {
            event_id: event.event_id,
            ledger_id: event.ledger_id,
            aggregate_type: event.aggregate_type,
            sequence_number,
            event_type: event.event_type,
            event_version: event.event_version,
            occurred_at: event.occurred_at,
            payload: event.payload,
        }
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, encoding) as
/// opposed to domain errors (balances, allowances, ownership).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event serialization failed: {0}")]
    Serialization(String),

    #[error("corrupt event stream {ledger_id} at line {line}: {reason}")]
    Corrupt {
        ledger_id: LedgerId,
        line: usize,
        reason: String,
    },

    #[error("event store io failure ({operation}): {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("event store lock poisoned")]
    Poisoned,
}

impl EventStoreError {
    pub(crate) fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }
}

/// Append-only event store, one stream per ledger.
///
/// `append()` must:
/// - reject batches that mix ledgers or aggregate types
/// - check `expected_version` against the current stream version
/// - assign `sequence_number`s starting at `current_version + 1`
/// - persist the whole batch or nothing
///
/// `load_stream()` returns events in sequence order, or an empty vector when
/// the stream does not exist yet.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Ledgers with at least one stored event.
    fn list_streams(&self) -> Result<Vec<LedgerId>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(ledger_id)
    }

    fn list_streams(&self) -> Result<Vec<LedgerId>, EventStoreError> {
        (**self).list_streams()
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed event.
    pub fn from_typed<E>(
        ledger_id: LedgerId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: tonytoken_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::Serialization(format!("payload: {e}")))?;

        Ok(Self {
            event_id,
            ledger_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// Shared batch checks: one ledger, one aggregate type per append.
///
/// Returns the batch's `(ledger_id, aggregate_type)`.
pub(crate) fn validate_batch(
    events: &[UncommittedEvent],
) -> Result<(LedgerId, String), EventStoreError> {
    let first = events
        .first()
        .ok_or_else(|| EventStoreError::InvalidAppend("empty batch".to_string()))?;

    for (idx, e) in events.iter().enumerate() {
        if e.ledger_id != first.ledger_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch contains multiple ledger_ids (index {idx})"
            )));
        }
        if e.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "batch contains multiple aggregate_types (index {idx})"
            )));
        }
    }

    Ok((first.ledger_id, first.aggregate_type.clone()))
}

/// Shared stream checks before appending: aggregate type stability and the
/// optimistic version expectation. Returns the committed events.
pub(crate) fn commit_batch(
    stream: &[StoredEvent],
    aggregate_type: &str,
    events: Vec<UncommittedEvent>,
    expected_version: ExpectedVersion,
) -> Result<Vec<StoredEvent>, EventStoreError> {
    let current = stream.last().map(|e| e.sequence_number).unwrap_or(0);

    if !expected_version.matches(current) {
        return Err(EventStoreError::Concurrency(format!(
            "expected {expected_version:?}, found {current}"
        )));
    }

    if let Some(existing) = stream.first() {
        if existing.aggregate_type != aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "stream aggregate_type is '{}', attempted append with '{}'",
                existing.aggregate_type, aggregate_type
            )));
        }
    }

    Ok(events
        .into_iter()
        .zip(current + 1..)
        .map(|(e, seq)| StoredEvent::committed(e, seq))
        .collect())
}
