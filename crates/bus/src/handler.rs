use conduit_core::{Command, MessageRef, Query};

/// Handles one command type.
///
/// Commands produce no reply; failure is reported through `Self::Error`,
/// which reaches the caller as [`BusError::Handler`](crate::BusError::Handler).
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    type Error: Into<anyhow::Error>;

    fn handle(&self, command: MessageRef<'_, C>) -> Result<(), Self::Error>;
}

/// Handles one query type and returns its output.
pub trait QueryHandler<Q: Query>: Send + Sync + 'static {
    type Error: Into<anyhow::Error>;

    fn handle(&self, query: MessageRef<'_, Q>) -> Result<Q::Output, Self::Error>;
}

impl<C, F> CommandHandler<C> for F
where
    C: Command,
    F: Fn(MessageRef<'_, C>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    type Error = anyhow::Error;

    fn handle(&self, command: MessageRef<'_, C>) -> anyhow::Result<()> {
        self(command)
    }
}

impl<Q, F> QueryHandler<Q> for F
where
    Q: Query,
    F: Fn(MessageRef<'_, Q>) -> anyhow::Result<Q::Output> + Send + Sync + 'static,
{
    type Error = anyhow::Error;

    fn handle(&self, query: MessageRef<'_, Q>) -> anyhow::Result<Q::Output> {
        self(query)
    }
}
