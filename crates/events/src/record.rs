use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use conduit_core::{
    AggregateId, AggregateType, Envelope, Message, MessageId, Metadata, Payload, PayloadType,
};

/// An event envelope positioned in an aggregate stream.
///
/// This is the unit appended to the event store and published to subscribers.
///
/// Notes:
/// - **Stream identity** is `(aggregate_type, aggregate_id)`.
/// - **Append-only**: `sequence_number` is 0-based and gapless per stream.
/// - A typed `&EventRecord<E>` coerces to `&EventRecord<dyn Payload>`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord<E: ?Sized> {
    aggregate_type: AggregateType,
    aggregate_id: AggregateId,

    /// Position in the aggregate stream, starting at 0.
    sequence_number: u64,

    envelope: Envelope<E>,
}

impl<E: Payload> EventRecord<E> {
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self::from_envelope(
            aggregate_type,
            aggregate_id,
            sequence_number,
            Envelope::new(payload),
        )
    }

    pub fn from_envelope(
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        sequence_number: u64,
        envelope: Envelope<E>,
    ) -> Self {
        Self {
            aggregate_type,
            aggregate_id,
            sequence_number,
            envelope,
        }
    }

    /// The envelope in erased form, ready for the dispatcher.
    pub fn message(&self) -> &Message {
        &self.envelope
    }

    pub fn into_envelope(self) -> Envelope<E> {
        self.envelope
    }

    pub fn into_payload(self) -> E {
        self.envelope.into_payload()
    }

    /// Encode into the persisted shape.
    pub fn to_stored(&self) -> Result<StoredEvent, serde_json::Error>
    where
        E: Serialize,
    {
        Ok(StoredEvent {
            aggregate_type: self.aggregate_type.clone(),
            aggregate_id: self.aggregate_id,
            sequence_number: self.sequence_number,
            message_id: self.envelope.id(),
            occurred_on: self.envelope.occurred_on(),
            payload_type: self.envelope.payload_type().clone(),
            payload: serde_json::to_value(self.envelope.payload())?,
            metadata: self.envelope.metadata().clone(),
        })
    }
}

impl<E: ?Sized> EventRecord<E> {
    pub fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn envelope(&self) -> &Envelope<E> {
        &self.envelope
    }

    pub fn payload(&self) -> &E {
        self.envelope.payload()
    }
}

/// Persisted/exchanged form of an [`EventRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub aggregate_type: AggregateType,
    pub aggregate_id: AggregateId,
    pub sequence_number: u64,
    pub message_id: MessageId,
    pub occurred_on: DateTime<Utc>,
    pub payload_type: PayloadType,
    pub payload: JsonValue,
    pub metadata: Metadata,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload deserialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("stored payload type '{stored}' decoded as '{decoded}'")]
    TypeMismatch {
        stored: PayloadType,
        decoded: PayloadType,
    },
}

impl StoredEvent {
    /// Decode back into a typed record, keeping the original header values.
    pub fn decode<E>(&self) -> Result<EventRecord<E>, DecodeError>
    where
        E: Payload + DeserializeOwned,
    {
        let payload: E = serde_json::from_value(self.payload.clone())?;
        let decoded = payload.payload_type();
        if decoded != self.payload_type {
            return Err(DecodeError::TypeMismatch {
                stored: self.payload_type.clone(),
                decoded,
            });
        }

        let envelope = Envelope::restore(
            self.message_id,
            self.occurred_on,
            self.metadata.clone(),
            payload,
        );
        Ok(EventRecord::from_envelope(
            self.aggregate_type.clone(),
            self.aggregate_id,
            self.sequence_number,
            envelope,
        ))
    }
}
