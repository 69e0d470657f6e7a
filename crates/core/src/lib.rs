//! `conduit-core`: message and domain building blocks.
//!
//! This crate contains the message envelope model, identifiers, type names and
//! the aggregate abstraction (no dispatch or storage concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod message;
pub mod metadata;
pub mod name;
pub mod predicate;

pub use aggregate::Aggregate;
pub use error::DomainError;
pub use id::{AggregateId, MessageId, ParseIdError};
pub use message::{Command, Envelope, Event, Message, MessageRef, Payload, PayloadMismatch, Query};
pub use metadata::{Metadata, MetadataValue};
pub use name::{AggregateType, InvalidTypeName, PayloadType, WILDCARD};
pub use predicate::Predicate;
