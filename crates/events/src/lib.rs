//! `conduit-events`: event records and publish/subscribe fan-out.

pub mod dispatcher;
pub mod publisher;
pub mod record;
pub mod subscriber;

pub use dispatcher::{DeliveryFailure, EventDispatcher, EventKey, Listener};
pub use publisher::EventPublisher;
pub use record::{DecodeError, EventRecord, StoredEvent};
pub use subscriber::{EventSubscriber, Subscription};
