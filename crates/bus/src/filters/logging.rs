use std::time::Instant;

use tracing::Level;

use conduit_core::Message;

use crate::error::BusError;
use crate::pipeline::{Filter, Next};
use crate::routing::Reply;

/// Opens a `dispatch` span per message and records the outcome.
///
/// The result of the inner chain is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFilter;

impl LoggingFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for LoggingFilter {
    fn call(&self, message: &Message, next: Next<'_>) -> Result<Reply, BusError> {
        let span = tracing::span!(
            Level::INFO,
            "dispatch",
            message_id = %message.id(),
            payload_type = %message.payload_type()
        );
        let _entered = span.enter();

        tracing::debug!("dispatching message");
        let started = Instant::now();
        let result = next.run(message);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

        match &result {
            Ok(_) => tracing::debug!(elapsed_ms, "message handled"),
            Err(err) => tracing::warn!(elapsed_ms, error = %err, "message dispatch failed"),
        }
        result
    }
}
