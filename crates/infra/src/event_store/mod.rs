//! Append-only event store boundary.
//!
//! One stream per ledger; implementations differ only in where the stream
//! lives (memory for tests, JSON-lines files for the CLI).

pub mod file;
pub mod in_memory;
pub mod r#trait;

pub use file::FileEventStore;
pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
