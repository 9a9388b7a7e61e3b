//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes events to observers **after** they have been appended
//! to the event store. It is a side channel: the ledger's correctness never
//! depends on anyone listening.
//!
//! - **Transport-agnostic**: in-memory channels today, anything else later
//! - **At-least-once delivery**: consumers must tolerate duplicates
//! - **No persistence**: the event store is the source of truth

use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

/// A subscription to an event stream.
///
/// Each subscription receives a copy of every message published after it was
/// created (broadcast semantics), in publication order.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// service.transfer(ledger_id, from, to, amount)?;
/// for envelope in subscription.drain() {
///     projection.apply(&envelope)?;
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Publish/subscribe contract.
///
/// `publish()` can fail; the dispatcher logs that and still reports the
/// command as committed. Since the events are already persisted, republishing
/// is safe.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
