use conduit_core::{AggregateId, AggregateType};
use conduit_events::EventRecord;

/// Result of a stream read: the requested slice of records plus the stream's
/// version at read time.
///
/// `first_version` and `last_version` both report the stream's current
/// version, independent of the requested bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream<E> {
    aggregate_type: AggregateType,
    aggregate_id: AggregateId,
    first_version: u64,
    last_version: u64,
    records: Vec<EventRecord<E>>,
}

impl<E> Stream<E> {
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        version: u64,
        records: Vec<EventRecord<E>>,
    ) -> Self {
        Self {
            aggregate_type,
            aggregate_id,
            first_version: version,
            last_version: version,
            records,
        }
    }

    pub fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn first_version(&self) -> u64 {
        self.first_version
    }

    pub fn last_version(&self) -> u64 {
        self.last_version
    }

    pub fn records(&self) -> &[EventRecord<E>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EventRecord<E>> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord<E>> {
        self.records.iter()
    }
}

impl<E> IntoIterator for Stream<E> {
    type Item = EventRecord<E>;
    type IntoIter = std::vec::IntoIter<EventRecord<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a Stream<E> {
    type Item = &'a EventRecord<E>;
    type IntoIter = std::slice::Iter<'a, EventRecord<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
