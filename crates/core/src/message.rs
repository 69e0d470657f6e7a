//! Message envelope model shared by commands, queries and events.
//!
//! An [`Envelope`] wraps a payload with identity, timestamp and metadata. The
//! identity and timestamp are assigned when the envelope is created and never
//! change afterwards.
//!
//! Buses, filters and the event dispatcher work on the erased form
//! [`Message`] (`Envelope<dyn Payload>`). A typed `&Envelope<P>` coerces to
//! `&Message` by reference, and [`Message::downcast_ref`] recovers a typed
//! [`MessageRef`] on the way back.

use std::any::{Any, type_name};
use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::id::MessageId;
use crate::metadata::{Metadata, MetadataValue};
use crate::name::PayloadType;

/// Anything that can travel inside an envelope.
pub trait Payload: Any + fmt::Debug + Send + Sync {
    /// Logical type name used for routing and subscription matching.
    fn payload_type(&self) -> PayloadType;
}

/// A request to change state. Handled by exactly one handler.
pub trait Command: Payload {}

/// A request to read state. Handled by exactly one handler.
pub trait Query: Payload {
    type Output: Send + 'static;
}

/// A fact that already happened. Delivered to any number of subscribers.
pub trait Event: Payload + Clone {}

/// Immutable message wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<P: ?Sized> {
    id: MessageId,
    occurred_on: DateTime<Utc>,
    metadata: Metadata,
    payload_type: PayloadType,
    payload: P,
}

/// Type-erased envelope seen by buses, filters and subscribers.
pub type Message = Envelope<dyn Payload>;

impl<P: Payload> Envelope<P> {
    /// Wrap a payload, assigning a fresh id and the current time.
    pub fn new(payload: P) -> Self {
        Self::restore(MessageId::new(), Utc::now(), Metadata::new(), payload)
    }

    /// Rebuild an envelope from previously assigned header values
    /// (e.g. when decoding a persisted event).
    pub fn restore(
        id: MessageId,
        occurred_on: DateTime<Utc>,
        metadata: Metadata,
        payload: P,
    ) -> Self {
        Self {
            id,
            occurred_on,
            metadata,
            payload_type: payload.payload_type(),
            payload,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        for (key, value) in metadata.iter() {
            self.metadata.insert(key, value.clone());
        }
        self
    }

    pub fn as_message(&self) -> &Message {
        self
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P: ?Sized> Envelope<P> {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn payload_type(&self) -> &PayloadType {
        &self.payload_type
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}

impl Message {
    /// Typed view of this message, if the payload is a `T`.
    pub fn downcast_ref<T: Payload>(&self) -> Option<MessageRef<'_, T>> {
        let any: &dyn Any = &self.payload;
        any.downcast_ref::<T>().map(|payload| MessageRef {
            message: self,
            payload,
        })
    }

    /// Like [`Message::downcast_ref`], reporting the mismatch as an error.
    pub fn expect_payload<T: Payload>(&self) -> Result<MessageRef<'_, T>, PayloadMismatch> {
        self.downcast_ref::<T>().ok_or_else(|| PayloadMismatch {
            expected: type_name::<T>(),
            found: self.payload_type.clone(),
        })
    }

    pub fn is<T: Payload>(&self) -> bool {
        let any: &dyn Any = &self.payload;
        any.is::<T>()
    }
}

/// A payload did not have the Rust type a handler or subscriber expected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("payload of type '{found}' is not a {expected}")]
pub struct PayloadMismatch {
    pub expected: &'static str,
    pub found: PayloadType,
}

/// Borrowed, typed view of an erased [`Message`].
///
/// Dereferences to the payload; the envelope header stays reachable through
/// the accessors.
pub struct MessageRef<'a, P> {
    message: &'a Message,
    payload: &'a P,
}

impl<'a, P> MessageRef<'a, P> {
    pub fn message(&self) -> &'a Message {
        self.message
    }

    pub fn payload(&self) -> &'a P {
        self.payload
    }

    pub fn id(&self) -> MessageId {
        self.message.id()
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.message.occurred_on()
    }

    pub fn metadata(&self) -> &'a Metadata {
        self.message.metadata()
    }

    pub fn payload_type(&self) -> &'a PayloadType {
        self.message.payload_type()
    }
}

impl<P> Clone for MessageRef<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for MessageRef<'_, P> {}

impl<P> Deref for MessageRef<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.payload
    }
}

impl<P: fmt::Debug> fmt::Debug for MessageRef<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRef")
            .field("id", &self.message.id())
            .field("payload_type", self.message.payload_type())
            .field("payload", self.payload)
            .finish()
    }
}

impl<'a, P: Payload> From<&'a Envelope<P>> for MessageRef<'a, P> {
    fn from(envelope: &'a Envelope<P>) -> Self {
        Self {
            message: envelope,
            payload: &envelope.payload,
        }
    }
}
