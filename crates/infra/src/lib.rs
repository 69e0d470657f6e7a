//! Infrastructure layer: event storage and the append-then-publish path.
//!
//! - [`event_store`]: the [`EventStore`] boundary and its in-memory
//!   implementation.
//! - [`processor`]: [`EventProcessor`], which appends records and then hands
//!   them to the event dispatcher.
//! - [`repository`]: [`EventSourcedRepository`], which loads aggregates from
//!   their streams and runs commands against them.

pub mod event_store;
pub mod processor;
pub mod repository;


pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, Stream};
pub use processor::{EventProcessor, ProcessError};
pub use repository::{EventSourcedRepository, RepositoryError};
