//! Ledger events and the mechanics around them.
//!
//! - [`Event`]: typed, versioned domain events
//! - [`EventEnvelope`]: stream metadata wrapped around a payload
//! - [`EventBus`]: publish/subscribe distribution after persistence
//! - [`Projection`] / [`ProjectionRunner`]: read models built from envelopes

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use runner::{ProjectionCursor, ProjectionError, ProjectionRunner};
