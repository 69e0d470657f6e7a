use std::sync::Arc;

use thiserror::Error;

use conduit_core::{AggregateId, AggregateType};
use conduit_events::EventRecord;

use super::stream::Stream;

/// Event store operation error.
///
/// These are infrastructure errors (ordering, missing streams, storage) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    /// The record's sequence number is not the one the stream accepts next.
    ///
    /// `expected` is the next sequence number the stream would accept
    /// (`current_version + 1`, or `0` for an absent stream) and `found` the
    /// number the rejected record carried.
    #[error(
        "optimistic concurrency check failed for {aggregate_type}/{aggregate_id}: \
         expected sequence {expected}, found {found}"
    )]
    Concurrency {
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        expected: u64,
        found: u64,
        current_version: Option<u64>,
    },

    #[error("no event stream for {aggregate_type}/{aggregate_id}")]
    StreamNotFound {
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
    },

    #[error("event store lock poisoned")]
    Poisoned,
}

impl EventStoreError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, EventStoreError::Concurrency { .. })
    }
}

/// Append-only store of per-aggregate event streams.
///
/// A stream is keyed by `(aggregate_type, aggregate_id)`. Its version is the
/// sequence number of its last record; a stream without records does not
/// exist.
///
/// ## Append semantics
///
/// A record with sequence number `n` is accepted only when the stream's
/// current version is `n - 1` (or the stream is absent and `n == 0`). Records
/// are never modified or removed.
///
/// Implementations must serialize the check-then-write for a single stream so
/// concurrent appenders cannot both pass the check.
pub trait EventStore<E>: Send + Sync {
    /// Append one record at its declared sequence number.
    fn append(&self, record: EventRecord<E>) -> Result<(), EventStoreError>;

    /// Append records one by one, in order.
    ///
    /// Not atomic: when a record is rejected, the records before it stay
    /// committed and the ones after it are not attempted.
    fn append_stream(&self, records: Vec<EventRecord<E>>) -> Result<(), EventStoreError> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Append records that may span several streams, all or nothing.
    ///
    /// Every record is checked against its stream, and against the records
    /// before it in the batch, before any is written. On rejection nothing is
    /// stored.
    fn append_atomic(&self, records: Vec<EventRecord<E>>) -> Result<(), EventStoreError>;

    /// Records with sequence numbers in `[first, last]`, ascending.
    ///
    /// `first` defaults to 0 and `last` to the stream's current version.
    fn read_stream(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
        first: Option<u64>,
        last: Option<u64>,
    ) -> Result<Stream<E>, EventStoreError>;

    /// Whether the stream holds at least one record. Never fails.
    fn has_stream(&self, aggregate_type: &AggregateType, aggregate_id: AggregateId) -> bool;

    /// Sequence number of the stream's last record, `None` when absent.
    fn stream_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Option<u64>;
}

impl<E, S> EventStore<E> for Arc<S>
where
    S: EventStore<E> + ?Sized,
{
    fn append(&self, record: EventRecord<E>) -> Result<(), EventStoreError> {
        (**self).append(record)
    }

    fn append_stream(&self, records: Vec<EventRecord<E>>) -> Result<(), EventStoreError> {
        (**self).append_stream(records)
    }

    fn append_atomic(&self, records: Vec<EventRecord<E>>) -> Result<(), EventStoreError> {
        (**self).append_atomic(records)
    }

    fn read_stream(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
        first: Option<u64>,
        last: Option<u64>,
    ) -> Result<Stream<E>, EventStoreError> {
        (**self).read_stream(aggregate_type, aggregate_id, first, last)
    }

    fn has_stream(&self, aggregate_type: &AggregateType, aggregate_id: AggregateId) -> bool {
        (**self).has_stream(aggregate_type, aggregate_id)
    }

    fn stream_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Option<u64> {
        (**self).stream_version(aggregate_type, aggregate_id)
    }
}
