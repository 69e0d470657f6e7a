//! Subscriber declarations.
//!
//! A subscriber declares its interest up front as a list of
//! [`Subscription`]s: which event type (or every event, via the wildcard) it
//! wants, which of its methods handles it, and at what priority.
//!
//! ```ignore
//! impl EventSubscriber for AuditTrail {
//!     fn subscriptions() -> Vec<Subscription<Self>> {
//!         vec![
//!             Subscription::on(ACCOUNT_OPENED, Self::on_opened).with_priority(10),
//!             Subscription::any(Self::record),
//!         ]
//!     }
//! }
//! ```

use std::any::type_name;
use std::sync::Arc;

use conduit_core::{Message, MessageRef, Payload, PayloadType};

use crate::dispatcher::EventKey;

pub(crate) type Method<S> = Arc<dyn Fn(&S, &Message) -> anyhow::Result<()> + Send + Sync>;

/// An object that receives events from an [`EventDispatcher`](crate::EventDispatcher).
pub trait EventSubscriber: Send + Sync + 'static {
    /// Event types (or the wildcard) this subscriber listens to, with the
    /// method and priority for each. A type may appear more than once.
    fn subscriptions() -> Vec<Subscription<Self>>
    where
        Self: Sized;

    /// Label used in logs and delivery failure reports.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// One `(event type | wildcard) -> (method, priority)` entry.
pub struct Subscription<S> {
    pub(crate) key: EventKey,
    pub(crate) priority: i32,
    pub(crate) method: Method<S>,
}

impl<S: 'static> Subscription<S> {
    /// Typed subscription: the payload is downcast to `E` before the call.
    ///
    /// A payload of another Rust type under the same name fails delivery with
    /// a [`PayloadMismatch`](conduit_core::PayloadMismatch).
    pub fn on<E: Payload>(
        event_type: PayloadType,
        method: fn(&S, MessageRef<'_, E>) -> anyhow::Result<()>,
    ) -> Self {
        Self::with_method(
            EventKey::Type(event_type),
            Arc::new(move |subscriber: &S, message: &Message| -> anyhow::Result<()> {
                let event = message.expect_payload::<E>()?;
                method(subscriber, event)
            }),
        )
    }

    /// Subscription receiving the erased message.
    pub fn on_message(
        event_type: PayloadType,
        method: fn(&S, &Message) -> anyhow::Result<()>,
    ) -> Self {
        Self::with_method(EventKey::Type(event_type), Arc::new(method))
    }

    /// Wildcard subscription: receives every triggered event.
    pub fn any(method: fn(&S, &Message) -> anyhow::Result<()>) -> Self {
        Self::with_method(EventKey::Wildcard, Arc::new(method))
    }

    /// Higher runs first. Defaults to 0.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    fn with_method(key: EventKey, method: Method<S>) -> Self {
        Self {
            key,
            priority: 0,
            method,
        }
    }
}

impl<S> std::fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
