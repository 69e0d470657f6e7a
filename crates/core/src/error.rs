use thiserror::Error;

/// Why an aggregate refused a command.
///
/// Only decision failures live here; dispatch and storage failures have
/// their own error types in the bus and infra crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The command breaks a business rule (bad input or an invariant).
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The aggregate is already in a state the command cannot move from.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The command needs history, but the aggregate's stream is empty.
    #[error("aggregate has no history")]
    Uninitialized,
}

impl DomainError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }
}
