use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tonytoken_core::LedgerId;

/// Envelope for an event, containing stream metadata.
///
/// This is the unit published on the bus after a successful append.
///
/// - `sequence_number` is monotonically increasing per ledger stream
///   (starting at 1).
/// - `payload` is the serialized domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    ledger_id: LedgerId,
    aggregate_type: String,
    event_type: String,

    /// Monotonically increasing position in the ledger stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        ledger_id: LedgerId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            ledger_id,
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    /// Re-wrap the same metadata around a transformed payload.
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            ledger_id: self.ledger_id,
            aggregate_type: self.aggregate_type,
            event_type: self.event_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }
}
