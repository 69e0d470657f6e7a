//! Append-then-publish composition.
//!
//! The store never publishes. [`EventProcessor`] appends a batch with
//! [`EventStore::append_atomic`] and, only after the store accepted all of
//! it, hands each record to a publisher (normally the
//! [`EventDispatcher`](conduit_events::EventDispatcher)). A rejected batch
//! leaves nothing stored, so every stored record is also published.

use thiserror::Error;

use conduit_core::Event;
use conduit_events::{EventPublisher, EventRecord};

use crate::event_store::{EventStore, EventStoreError};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// The records are committed; publishing one of them failed.
    #[error("event {sequence_number} was appended but publication failed: {source}")]
    Publish {
        sequence_number: u64,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct EventProcessor<S, P> {
    store: S,
    publisher: P,
}

impl<S, P> EventProcessor<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_parts(self) -> (S, P) {
        (self.store, self.publisher)
    }
}

impl<S, P> EventProcessor<S, P>
where
    P: EventPublisher,
{
    /// Append `records` atomically, then publish them in order.
    ///
    /// Returns the committed records. Nothing is published when the append
    /// fails; publication stops at the first failing record.
    pub fn process<E>(&self, records: Vec<EventRecord<E>>) -> Result<Vec<EventRecord<E>>, ProcessError>
    where
        E: Event,
        S: EventStore<E>,
    {
        if records.is_empty() {
            return Ok(records);
        }

        self.store.append_atomic(records.clone())?;

        for record in &records {
            self.publisher
                .publish(record.message())
                .map_err(|source| ProcessError::Publish {
                    sequence_number: record.sequence_number(),
                    source,
                })?;
        }

        tracing::debug!(record_count = records.len(), "events processed");
        Ok(records)
    }
}
