//! Append-only event store boundary.
//!
//! Streams are keyed by `(aggregate_type, aggregate_id)` and checked with
//! optimistic concurrency on every append. Publication is not the store's
//! job; see [`EventProcessor`](crate::EventProcessor).

pub mod in_memory;
pub mod stream;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError};
pub use stream::Stream;
