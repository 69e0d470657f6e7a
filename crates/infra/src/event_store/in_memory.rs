use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::instrument;

use conduit_core::{AggregateId, AggregateType, Event};
use conduit_events::EventRecord;

use super::r#trait::{EventStore, EventStoreError};
use super::stream::Stream;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct StreamKey {
    aggregate_type: AggregateType,
    aggregate_id: AggregateId,
}

impl StreamKey {
    fn new(aggregate_type: &AggregateType, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.clone(),
            aggregate_id,
        }
    }

    fn of<E>(record: &EventRecord<E>) -> Self {
        Self::new(record.aggregate_type(), record.aggregate_id())
    }
}

struct StreamSlot<E> {
    current_version: Option<u64>,
    records: BTreeMap<u64, EventRecord<E>>,
}

impl<E> Default for StreamSlot<E> {
    fn default() -> Self {
        Self {
            current_version: None,
            records: BTreeMap::new(),
        }
    }
}

impl<E> StreamSlot<E> {
    /// Check `sequence` against a stream currently at `current`.
    fn check(key: &StreamKey, current: Option<u64>, sequence: u64) -> Result<(), EventStoreError> {
        let accepts = match sequence.checked_sub(1) {
            None => current.is_none(),
            Some(previous) => current == Some(previous),
        };
        if accepts {
            return Ok(());
        }
        Err(EventStoreError::Concurrency {
            aggregate_type: key.aggregate_type.clone(),
            aggregate_id: key.aggregate_id,
            expected: current.map_or(0, |v| v + 1),
            found: sequence,
            current_version: current,
        })
    }

    fn insert(&mut self, record: EventRecord<E>) {
        let sequence = record.sequence_number();
        self.records.insert(sequence, record);
        self.current_version = Some(sequence);
    }
}

/// Lock every slot of a batch, in key order, and validate the batch against
/// them. The guards are returned only when every record is accepted.
fn lock_and_check<'s, E>(
    slots: &'s [Arc<Mutex<StreamSlot<E>>>],
    grouped: &BTreeMap<StreamKey, Vec<EventRecord<E>>>,
) -> Result<Vec<MutexGuard<'s, StreamSlot<E>>>, EventStoreError> {
    let mut guards = Vec::with_capacity(slots.len());
    for slot in slots {
        guards.push(slot.lock().map_err(|_| EventStoreError::Poisoned)?);
    }

    for ((key, batch), guard) in grouped.iter().zip(&guards) {
        let mut current = guard.current_version;
        for record in batch {
            StreamSlot::<E>::check(key, current, record.sequence_number())?;
            current = Some(record.sequence_number());
        }
    }
    Ok(guards)
}

/// In-memory append-only event store.
///
/// The stream map is behind an `RwLock` that is only held to find or create a
/// slot; each slot has its own mutex, so appends to different aggregates do
/// not contend.
pub struct InMemoryEventStore<E> {
    streams: RwLock<HashMap<StreamKey, Arc<Mutex<StreamSlot<E>>>>>,
}

impl<E> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &StreamKey) -> Result<Option<Arc<Mutex<StreamSlot<E>>>>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams.get(key).cloned())
    }

    fn slot_or_create(&self, key: &StreamKey) -> Result<Arc<Mutex<StreamSlot<E>>>, EventStoreError> {
        if let Some(slot) = self.slot(key)? {
            return Ok(slot);
        }
        let mut streams = self.streams.write().map_err(|_| EventStoreError::Poisoned)?;
        Ok(Arc::clone(streams.entry(key.clone()).or_default()))
    }

    /// Drop slots that a rejected append created but never filled.
    ///
    /// A slot is only removed while the map is the sole owner, so no appender
    /// can be holding it.
    fn discard_empty<'k>(&self, keys: impl IntoIterator<Item = &'k StreamKey>) {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            let unused = streams.get(key).is_some_and(|slot| {
                Arc::strong_count(slot) == 1
                    && slot
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .current_version
                        .is_none()
            });
            if unused {
                streams.remove(key);
            }
        }
    }

    /// Current version of a stream, tolerating poisoned locks.
    fn peek_version(&self, key: &StreamKey) -> Option<u64> {
        let slot = {
            let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
            streams.get(key).cloned()
        }?;
        let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.current_version
    }

    /// Number of streams holding at least one record.
    pub fn stream_count(&self) -> usize {
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        streams
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .current_version
                    .is_some()
            })
            .count()
    }
}

impl<E: Event> EventStore<E> for InMemoryEventStore<E> {
    #[instrument(
        level = "debug",
        skip(self, record),
        fields(
            aggregate_type = %record.aggregate_type(),
            aggregate_id = %record.aggregate_id(),
            sequence_number = record.sequence_number()
        )
    )]
    fn append(&self, record: EventRecord<E>) -> Result<(), EventStoreError> {
        let key = StreamKey::of(&record);
        let slot = self.slot_or_create(&key)?;
        let checked = {
            let mut slot = slot.lock().map_err(|_| EventStoreError::Poisoned)?;
            let checked =
                StreamSlot::<E>::check(&key, slot.current_version, record.sequence_number());
            if checked.is_ok() {
                slot.insert(record);
            }
            checked
        };
        drop(slot);

        if let Err(err) = checked {
            tracing::warn!(error = %err, "append rejected");
            self.discard_empty([&key]);
            return Err(err);
        }
        tracing::debug!("event appended");
        Ok(())
    }

    /// Slot locks are taken in key order, so concurrent batches cannot
    /// deadlock.
    #[instrument(level = "debug", skip(self, records), fields(record_count = records.len()))]
    fn append_atomic(&self, records: Vec<EventRecord<E>>) -> Result<(), EventStoreError> {
        let mut grouped: BTreeMap<StreamKey, Vec<EventRecord<E>>> = BTreeMap::new();
        for record in records {
            grouped.entry(StreamKey::of(&record)).or_default().push(record);
        }

        let mut slots = Vec::with_capacity(grouped.len());
        for key in grouped.keys() {
            slots.push(self.slot_or_create(key)?);
        }

        let err = match lock_and_check(&slots, &grouped) {
            Ok(mut guards) => {
                for (batch, guard) in grouped.into_values().zip(guards.iter_mut()) {
                    for record in batch {
                        guard.insert(record);
                    }
                }
                tracing::debug!("batch appended");
                return Ok(());
            }
            Err(err) => err,
        };
        drop(slots);
        tracing::warn!(error = %err, "batch append rejected");
        self.discard_empty(grouped.keys());
        Err(err)
    }

    #[instrument(level = "debug", skip(self), fields(aggregate_type = %aggregate_type, aggregate_id = %aggregate_id))]
    fn read_stream(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
        first: Option<u64>,
        last: Option<u64>,
    ) -> Result<Stream<E>, EventStoreError> {
        let key = StreamKey::new(aggregate_type, aggregate_id);
        let not_found = || EventStoreError::StreamNotFound {
            aggregate_type: aggregate_type.clone(),
            aggregate_id,
        };

        let slot = self.slot(&key)?.ok_or_else(not_found)?;
        let slot = slot.lock().map_err(|_| EventStoreError::Poisoned)?;
        let version = slot.current_version.ok_or_else(not_found)?;

        let first = first.unwrap_or(0);
        let last = last.unwrap_or(version);
        let records = if first > last {
            Vec::new()
        } else {
            slot.records
                .range(first..=last)
                .map(|(_, record)| record.clone())
                .collect()
        };

        tracing::debug!(record_count = records.len(), version, "stream read");
        Ok(Stream::new(aggregate_type.clone(), aggregate_id, version, records))
    }

    fn has_stream(&self, aggregate_type: &AggregateType, aggregate_id: AggregateId) -> bool {
        self.peek_version(&StreamKey::new(aggregate_type, aggregate_id))
            .is_some()
    }

    fn stream_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Option<u64> {
        self.peek_version(&StreamKey::new(aggregate_type, aggregate_id))
    }
}

impl<E> fmt::Debug for InMemoryEventStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("streams", &self.stream_count())
            .finish()
    }
}
