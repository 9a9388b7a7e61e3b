use crate::EventEnvelope;

/// A projection builds a read model from an append-only event stream.
///
/// Read models are disposable: they can be dropped and rebuilt by replaying
/// the stream. `apply` must be idempotent, since the bus delivers at least
/// once; [`crate::ProjectionRunner`] helps by rejecting non-monotonic sequence
/// numbers.
pub trait Projection {
    /// Payload type carried by the envelopes this projection consumes.
    type Payload;

    /// Apply a single envelope, updating the read model.
    ///
    /// Envelopes that are irrelevant to this projection are ignored.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Payload>);
}
