//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the ledger stream from the store
//!   ↓
//! 2. Rehydrate the aggregate (apply historical events)
//!   ↓
//! 3. Handle the command (pure decision logic, produces events)
//!   ↓
//! 4. Append events (optimistic concurrency check)
//!   ↓
//! 5. Publish committed events on the bus
//! ```
//!
//! Steps 1–4 run under an exclusive write lock, so every ledger operation is
//! one indivisible step for callers in this process. Between processes sharing
//! a data directory, the file store appends atomically under its lock and the
//! version check turns a stale load into `DispatchError::Concurrency`.

use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use tonytoken_core::{Aggregate, DomainError, ExpectedVersion, LedgerId};
use tonytoken_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The aggregate rejected the command (balance, allowance, ownership, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure (stream moved underneath us).
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    /// Loading or persisting the stream failed.
    #[error(transparent)]
    Store(EventStoreError),

    #[error("dispatcher lock poisoned")]
    Poisoned,
}

impl DispatchError {
    /// The domain rejection behind this error, if that is what it is.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// - `S`: event store (`InMemoryEventStore` in tests, `FileEventStore` for the CLI)
/// - `B`: event bus receiving committed envelopes
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    write_lock: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// Returns the committed events with their sequence numbers. A rejected
    /// command appends and publishes nothing. Publication failures are logged
    /// and do not fail the call.
    pub fn dispatch<A>(
        &self,
        ledger_id: LedgerId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(LedgerId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: tonytoken_events::Event + Serialize + DeserializeOwned,
    {
        let committed = {
            let _guard = self.write_lock.lock().map_err(|_| DispatchError::Poisoned)?;

            // 1) Load history
            let history = self.store.load_stream(ledger_id)?;
            validate_loaded_stream(ledger_id, &history)?;
            let expected = ExpectedVersion::Exact(stream_version(&history));

            // 2) Rehydrate aggregate
            let mut aggregate = make_aggregate(ledger_id);
            apply_history(&mut aggregate, &history)?;

            // 3) Decide events (no mutation)
            let decided = match aggregate.handle(&command) {
                Ok(events) => events,
                Err(err) => {
                    tracing::warn!(ledger_id = %ledger_id, command = ?command, error = %err, "command rejected");
                    return Err(DispatchError::Domain(err));
                }
            };
            if decided.is_empty() {
                return Ok(vec![]);
            }

            // 4) Persist (append-only, optimistic)
            let aggregate_type = aggregate_type.into();
            let uncommitted = decided
                .iter()
                .map(|ev| UncommittedEvent::from_typed(ledger_id, aggregate_type.clone(), Uuid::now_v7(), ev))
                .collect::<Result<Vec<_>, _>>()?;

            self.store.append(uncommitted, expected)?
        };

        tracing::info!(
            ledger_id = %ledger_id,
            events = committed.len(),
            version = stream_version(&committed),
            "command committed"
        );

        // 5) Publish committed events (after append); failures are only logged
        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!(
                    ledger_id = %ledger_id,
                    sequence_number = stored.sequence_number,
                    error = ?e,
                    "event publication failed; events are committed"
                );
            }
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate from its stream without dispatching anything.
    pub fn load<A>(
        &self,
        ledger_id: LedgerId,
        make_aggregate: impl FnOnce(LedgerId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(ledger_id)?;
        validate_loaded_stream(ledger_id, &history)?;

        let mut aggregate = make_aggregate(ledger_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(ledger_id: LedgerId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.ledger_id != ledger_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong ledger_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(format!("sequence {}: {e}", stored.sequence_number)))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use tonytoken_core::{Address, Amount};
    use tonytoken_events::Subscription;
    use tonytoken_ledger::TokenMetadata;

    use super::*;
    use crate::event_store::InMemoryEventStore;
    use crate::service::TokenService;

    /// A bus whose every publication fails.
    struct ClosedBus;

    impl EventBus<EventEnvelope<JsonValue>> for ClosedBus {
        type Error = &'static str;

        fn publish(&self, _message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
            Err("closed")
        }

        fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
            Subscription::new(mpsc::channel().1)
        }
    }

    #[test]
    fn committed_events_are_returned_when_publication_fails() {
        let owner = Address::repeat_byte(0x11);
        let service = TokenService::new(InMemoryEventStore::new(), ClosedBus);

        let (id, events) = service
            .deploy(owner, TokenMetadata::default(), Amount::new(1_000))
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(service.dispatcher().store().load_stream(id).unwrap().len(), 2);
        assert_eq!(service.balance_of(id, &owner).unwrap(), Amount::new(1_000));

        service
            .transfer(id, owner, Address::repeat_byte(0x22), Amount::new(1))
            .unwrap();
        assert_eq!(service.history(id).unwrap().len(), 3);
    }
}
