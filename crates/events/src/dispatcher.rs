//! Priority-ordered publish/subscribe fan-out.
//!
//! ## Delivery order
//!
//! For one triggered event the dispatcher pools every listener registered for
//! the event's exact payload type together with every wildcard listener, then
//! orders the pool by priority, highest first. Listeners with equal priority
//! run in the order they were registered.
//!
//! ## Failure semantics
//!
//! [`EventDispatcher::trigger`] is fail-fast: the first listener error stops
//! delivery and is returned unchanged. [`EventDispatcher::trigger_isolated`]
//! keeps going and reports every failure instead.
//!
//! Registration happens during wiring (`&mut self`); triggering only needs
//! `&self`, so a wired dispatcher can be shared behind an `Arc`.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use conduit_core::{InvalidTypeName, Message, PayloadType, WILDCARD};

use crate::publisher::EventPublisher;
use crate::subscriber::EventSubscriber;

/// What a listener subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Type(PayloadType),
    Wildcard,
}

impl EventKey {
    pub fn of(event_type: &'static str) -> Self {
        if event_type == WILDCARD {
            Self::Wildcard
        } else {
            Self::Type(PayloadType::from_static(event_type))
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Type(t) => fmt::Display::fmt(t, f),
            EventKey::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// Erased event callback.
pub type Listener = Arc<dyn Fn(&Message) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    priority: i32,
    order: u64,
    name: Arc<str>,
    listener: Listener,
}

/// A listener error collected by [`EventDispatcher::trigger_isolated`].
#[derive(Debug)]
pub struct DeliveryFailure {
    pub listener: Arc<str>,
    pub priority: i32,
    pub error: anyhow::Error,
}

#[derive(Default)]
pub struct EventDispatcher {
    by_type: HashMap<PayloadType, Vec<Registration>>,
    wildcard: Vec<Registration>,
    next_order: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every subscription a subscriber declares.
    ///
    /// All event types are validated first; on error nothing is registered.
    pub fn register<S: EventSubscriber>(&mut self, subscriber: Arc<S>) -> Result<(), InvalidTypeName> {
        let subscriptions = S::subscriptions();
        for subscription in &subscriptions {
            if let EventKey::Type(t) = &subscription.key {
                t.validate()?;
            }
        }

        let name: Arc<str> = Arc::from(subscriber.name());
        for subscription in subscriptions {
            let target = Arc::clone(&subscriber);
            let method = subscription.method;
            let listener: Listener = Arc::new(move |message: &Message| method(&*target, message));
            self.insert(subscription.key, subscription.priority, Arc::clone(&name), listener);
        }

        tracing::debug!(subscriber = %name, "registered event subscriber");
        Ok(())
    }

    /// Register a single closure listener.
    pub fn listen<F>(
        &mut self,
        key: EventKey,
        priority: i32,
        name: impl Into<Arc<str>>,
        listener: F,
    ) -> Result<(), InvalidTypeName>
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if let EventKey::Type(t) = &key {
            t.validate()?;
        }
        self.insert(key, priority, name.into(), Arc::new(listener));
        Ok(())
    }

    /// Deliver an event to every matching listener, in priority order.
    ///
    /// Stops at the first failing listener and returns its error untouched;
    /// later listeners are not invoked.
    pub fn trigger(&self, message: &Message) -> anyhow::Result<()> {
        let listeners = self.candidates(message.payload_type());
        tracing::trace!(
            message_id = %message.id(),
            payload_type = %message.payload_type(),
            listeners = listeners.len(),
            "triggering event"
        );

        for registration in listeners {
            (registration.listener)(message).inspect_err(|err| {
                tracing::debug!(
                    message_id = %message.id(),
                    listener = %registration.name,
                    error = %err,
                    "event listener failed; delivery stopped"
                );
            })?;
        }
        Ok(())
    }

    /// Deliver an event to every matching listener, continuing past failures.
    pub fn trigger_isolated(&self, message: &Message) -> Vec<DeliveryFailure> {
        let mut failures = Vec::new();
        for registration in self.candidates(message.payload_type()) {
            if let Err(error) = (registration.listener)(message) {
                tracing::warn!(
                    message_id = %message.id(),
                    payload_type = %message.payload_type(),
                    listener = %registration.name,
                    error = %error,
                    "event listener failed"
                );
                failures.push(DeliveryFailure {
                    listener: Arc::clone(&registration.name),
                    priority: registration.priority,
                    error,
                });
            }
        }
        failures
    }

    /// Number of listeners registered directly under `key`.
    pub fn listener_count(&self, key: &EventKey) -> usize {
        match key {
            EventKey::Type(t) => self.by_type.get(t).map_or(0, Vec::len),
            EventKey::Wildcard => self.wildcard.len(),
        }
    }

    fn insert(&mut self, key: EventKey, priority: i32, name: Arc<str>, listener: Listener) {
        let registration = Registration {
            priority,
            order: self.next_order,
            name,
            listener,
        };
        self.next_order += 1;

        match key {
            EventKey::Type(t) => self.by_type.entry(t).or_default().push(registration),
            EventKey::Wildcard => self.wildcard.push(registration),
        }
    }

    fn candidates(&self, payload_type: &PayloadType) -> Vec<&Registration> {
        let mut pool: Vec<&Registration> = self
            .by_type
            .get(payload_type)
            .into_iter()
            .flatten()
            .chain(self.wildcard.iter())
            .collect();
        pool.sort_by_key(|r| (Reverse(r.priority), r.order));
        pool
    }
}

impl EventPublisher for EventDispatcher {
    fn publish(&self, message: &Message) -> anyhow::Result<()> {
        self.trigger(message)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event_types", &self.by_type.len())
            .field("wildcard_listeners", &self.wildcard.len())
            .finish()
    }
}
