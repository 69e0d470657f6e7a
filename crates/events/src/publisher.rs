use std::sync::Arc;

use conduit_core::Message;

/// Hands committed events to their consumers.
///
/// The event processor publishes only after the store accepted the records,
/// so a publisher never sees an event that was not appended.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, message: &Message) -> anyhow::Result<()>;
}

impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    fn publish(&self, message: &Message) -> anyhow::Result<()> {
        (**self).publish(message)
    }
}
