//! Command execution for event-sourced aggregates.
//!
//! ```text
//! command
//!   ↓
//! 1. read the aggregate's stream (absent stream = fresh aggregate)
//!   ↓
//! 2. rehydrate (apply every record in sequence order)
//!   ↓
//! 3. decide (aggregate.handle, no mutation)
//!   ↓
//! 4. number the new events from current version + 1
//!   ↓
//! 5. EventProcessor: append atomically, then publish
//! ```
//!
//! The repository does no IO itself; it composes an [`EventStore`] and an
//! [`EventPublisher`]. A concurrent writer that appended between steps 1 and
//! 5 makes the append fail with [`EventStoreError::Concurrency`]; callers
//! retry by executing the command again.

use thiserror::Error;

use conduit_core::{Aggregate, AggregateId, DomainError, Envelope};
use conduit_events::{EventPublisher, EventRecord};

use crate::event_store::{EventStore, EventStoreError};
use crate::processor::{EventProcessor, ProcessError};

/// Metadata keys stamped on every event the repository emits, so subscribers
/// (which only see the message) can tell which stream it belongs to.
pub mod metadata_keys {
    pub const AGGREGATE_TYPE: &str = "aggregate_type";
    pub const AGGREGATE_ID: &str = "aggregate_id";
    pub const SEQUENCE_NUMBER: &str = "sequence_number";
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// Events were appended; publishing them failed.
    #[error("events appended but publication failed: {0}")]
    Publish(#[source] anyhow::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, RepositoryError::Store(e) if e.is_concurrency())
    }
}

impl From<ProcessError> for RepositoryError {
    fn from(value: ProcessError) -> Self {
        match value {
            ProcessError::Store(e) => RepositoryError::Store(e),
            ProcessError::Publish { source, .. } => RepositoryError::Publish(source),
        }
    }
}

/// Loads and saves aggregates through their event streams.
#[derive(Debug, Clone)]
pub struct EventSourcedRepository<S, P> {
    processor: EventProcessor<S, P>,
}

impl<S, P> EventSourcedRepository<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self {
            processor: EventProcessor::new(store, publisher),
        }
    }

    pub fn processor(&self) -> &EventProcessor<S, P> {
        &self.processor
    }

    pub fn into_parts(self) -> (S, P) {
        self.processor.into_parts()
    }
}

impl<S, P> EventSourcedRepository<S, P>
where
    P: EventPublisher,
{
    /// Rehydrate an aggregate and return it with its stream version
    /// (`None` when the stream does not exist yet).
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<(A, Option<u64>), RepositoryError>
    where
        A: Aggregate,
        S: EventStore<A::Event>,
    {
        let mut aggregate = make_aggregate(aggregate_id);
        let stream = match self.processor.store().read_stream(
            &A::aggregate_type(),
            aggregate_id,
            None,
            None,
        ) {
            Ok(stream) => stream,
            Err(EventStoreError::StreamNotFound { .. }) => return Ok((aggregate, None)),
            Err(e) => return Err(e.into()),
        };

        for record in &stream {
            aggregate.apply(record.payload());
        }
        Ok((aggregate, Some(stream.last_version())))
    }

    /// Load, decide, append and publish.
    ///
    /// Returns the committed records; an empty vector when the aggregate
    /// decided nothing.
    pub fn execute<A>(
        &self,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<EventRecord<A::Event>>, RepositoryError>
    where
        A: Aggregate<Error = DomainError>,
        S: EventStore<A::Event>,
    {
        let (aggregate, version) = self.load(aggregate_id, make_aggregate)?;

        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let next = version.map_or(0, |v| v + 1);
        let records = decided
            .into_iter()
            .zip(next..)
            .map(|(event, sequence)| {
                let envelope = Envelope::new(event)
                    .with_metadata(metadata_keys::AGGREGATE_TYPE, A::aggregate_type().as_str())
                    .with_metadata(metadata_keys::AGGREGATE_ID, aggregate_id.to_string())
                    .with_metadata(metadata_keys::SEQUENCE_NUMBER, sequence as i64);
                EventRecord::from_envelope(A::aggregate_type(), aggregate_id, sequence, envelope)
            })
            .collect();

        tracing::debug!(
            aggregate_type = %A::aggregate_type(),
            aggregate_id = %aggregate_id,
            first_sequence = next,
            "executing command"
        );
        Ok(self.processor.process(records)?)
    }
}
