use thiserror::Error;

use conduit_core::{InvalidTypeName, PayloadMismatch, PayloadType};

/// Dispatch failure.
///
/// Routing and registration problems are wiring faults. Anything a handler
/// returns is carried in [`BusError::Handler`] unchanged: the original error
/// stays reachable through `downcast_ref`.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no handler registered for payload type '{payload_type}'")]
    HandlerNotFound { payload_type: PayloadType },

    #[error("invalid payload type '{payload_type}': {reason}")]
    InvalidPayloadType { payload_type: String, reason: String },

    #[error("a handler is already registered for payload type '{payload_type}'")]
    DuplicateHandler { payload_type: PayloadType },

    /// A filter refused to pass the message on.
    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("handler for '{payload_type}' returned an unexpected reply type")]
    UnexpectedReply { payload_type: PayloadType },

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl BusError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Whether this is a routing/registration fault rather than a runtime failure.
    pub fn is_wiring_fault(&self) -> bool {
        matches!(
            self,
            BusError::HandlerNotFound { .. }
                | BusError::InvalidPayloadType { .. }
                | BusError::DuplicateHandler { .. }
        )
    }
}

impl From<InvalidTypeName> for BusError {
    fn from(value: InvalidTypeName) -> Self {
        BusError::InvalidPayloadType {
            payload_type: value.name,
            reason: value.reason.to_string(),
        }
    }
}

impl From<PayloadMismatch> for BusError {
    fn from(value: PayloadMismatch) -> Self {
        BusError::InvalidPayloadType {
            payload_type: value.found.to_string(),
            reason: format!("handler expects {}", value.expected),
        }
    }
}
