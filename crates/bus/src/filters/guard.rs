use std::borrow::Cow;
use std::fmt;

use conduit_core::{Message, Predicate};

use crate::error::BusError;
use crate::pipeline::{Filter, Next};
use crate::routing::Reply;

/// Lets a message through only when `predicate` holds for it.
///
/// Rejected messages never reach the inner chain; the caller gets
/// [`BusError::Rejected`] carrying `reason`.
pub struct GuardFilter<P> {
    predicate: P,
    reason: Cow<'static, str>,
}

impl<P> GuardFilter<P>
where
    P: Predicate<Message> + Send + Sync,
{
    pub fn new(predicate: P, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            predicate,
            reason: reason.into(),
        }
    }
}

impl<P> Filter for GuardFilter<P>
where
    P: Predicate<Message> + Send + Sync,
{
    fn call(&self, message: &Message, next: Next<'_>) -> Result<Reply, BusError> {
        if !self.predicate.test(message) {
            tracing::debug!(
                message_id = %message.id(),
                payload_type = %message.payload_type(),
                reason = %self.reason,
                "message rejected by guard"
            );
            return Err(BusError::rejected(self.reason.clone()));
        }
        next.run(message)
    }
}

impl<P> fmt::Debug for GuardFilter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardFilter")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}
