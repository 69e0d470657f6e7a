use std::fmt;
use std::sync::Arc;

use conduit_core::{Command, Envelope, Message, PayloadType, Query};

use crate::error::BusError;
use crate::handler::{CommandHandler, QueryHandler};
use crate::pipeline::{Filter, Pipeline};
use crate::routing::{CommandRoute, QueryRoute, Reply, Router, RoutingTable};

/// Router plus filter pipeline. Shared machinery of [`CommandBus`] and
/// [`QueryBus`].
///
/// Wiring (`register`, `add_filter`) takes `&mut self`; dispatch takes `&self`
/// so a wired bus can be shared behind an `Arc` and entered re-entrantly from
/// inside a handler.
pub struct Bus<R = RoutingTable> {
    router: R,
    pipeline: Pipeline,
}

impl Bus<RoutingTable> {
    pub fn new() -> Self {
        Self::with_router(RoutingTable::new())
    }
}

impl Default for Bus<RoutingTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Router> Bus<R> {
    pub fn with_router(router: R) -> Self {
        Self {
            router,
            pipeline: Pipeline::new(),
        }
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Wrap all later dispatches in `filter`. It becomes the outermost layer.
    pub fn add_filter<F: Filter + 'static>(&mut self, filter: F) {
        self.pipeline.add_filter(Arc::new(filter));
    }

    /// Run `message` through the pipeline and its routed handler.
    pub fn dispatch(&self, message: &Message) -> Result<Reply, BusError> {
        self.pipeline.run(message, |message: &Message| {
            let route = self.router.resolve(message.payload_type())?;
            tracing::trace!(
                message_id = %message.id(),
                payload_type = %message.payload_type(),
                "routing message"
            );
            route.call(message)
        })
    }
}

impl<R> fmt::Debug for Bus<R>
where
    R: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("router", &self.router)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// Dispatches each command to its single handler.
#[derive(Debug)]
pub struct CommandBus<R = RoutingTable>(Bus<R>);

impl Default for CommandBus<RoutingTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus<RoutingTable> {
    pub fn new() -> Self {
        Self(Bus::new())
    }

    /// Route commands of `payload_type` to `handler`.
    ///
    /// The key is authoritative: dispatch looks up the message's own
    /// `payload_type()`, and the key is not compared with `C` here. One
    /// handler may be registered under several keys (an enum command whose
    /// variants report different types). A key that `C` never reports is
    /// never reached, and a message of another Rust type sent under the key
    /// fails with [`BusError::InvalidPayloadType`].
    ///
    /// ```
    /// use conduit_bus::CommandBus;
    /// use conduit_core::{Command, MessageRef, Payload, PayloadType};
    ///
    /// #[derive(Debug)]
    /// struct Ping;
    ///
    /// impl Payload for Ping {
    ///     fn payload_type(&self) -> PayloadType {
    ///         PayloadType::from_static("ping")
    ///     }
    /// }
    /// impl Command for Ping {}
    ///
    /// let mut bus = CommandBus::new();
    /// bus.register::<Ping, _>(
    ///     PayloadType::from_static("ping"),
    ///     |_: MessageRef<'_, Ping>| -> anyhow::Result<()> { Ok(()) },
    /// )
    /// .unwrap();
    /// bus.execute(Ping).unwrap();
    /// ```
    pub fn register<C, H>(&mut self, payload_type: PayloadType, handler: H) -> Result<(), BusError>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.0
            .router_mut()
            .register(payload_type, Box::new(CommandRoute::<C, H>::new(handler)))
    }
}

impl<R: Router> CommandBus<R> {
    pub fn with_router(router: R) -> Self {
        Self(Bus::with_router(router))
    }

    pub fn add_filter<F: Filter + 'static>(&mut self, filter: F) {
        self.0.add_filter(filter);
    }

    /// Wrap `command` in a fresh envelope and dispatch it.
    pub fn execute<C: Command>(&self, command: C) -> Result<(), BusError> {
        self.execute_envelope(&Envelope::new(command))
    }

    /// Dispatch an envelope the caller already built (e.g. with metadata).
    pub fn execute_envelope<C: Command>(&self, envelope: &Envelope<C>) -> Result<(), BusError> {
        self.dispatch(envelope.as_message())
    }

    pub fn dispatch(&self, message: &Message) -> Result<(), BusError> {
        self.0.dispatch(message).map(drop)
    }

    pub fn inner(&self) -> &Bus<R> {
        &self.0
    }
}

/// Dispatches each query to its single handler and returns the handler's output.
#[derive(Debug)]
pub struct QueryBus<R = RoutingTable>(Bus<R>);

impl Default for QueryBus<RoutingTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBus<RoutingTable> {
    pub fn new() -> Self {
        Self(Bus::new())
    }

    /// Route queries of `payload_type` to `handler`. The key is authoritative,
    /// as for [`CommandBus::register`].
    pub fn register<Q, H>(&mut self, payload_type: PayloadType, handler: H) -> Result<(), BusError>
    where
        Q: Query,
        H: QueryHandler<Q>,
    {
        self.0
            .router_mut()
            .register(payload_type, Box::new(QueryRoute::<Q, H>::new(handler)))
    }
}

impl<R: Router> QueryBus<R> {
    pub fn with_router(router: R) -> Self {
        Self(Bus::with_router(router))
    }

    pub fn add_filter<F: Filter + 'static>(&mut self, filter: F) {
        self.0.add_filter(filter);
    }

    pub fn fetch<Q: Query>(&self, query: Q) -> Result<Q::Output, BusError> {
        self.fetch_envelope(&Envelope::new(query))
    }

    pub fn fetch_envelope<Q: Query>(&self, envelope: &Envelope<Q>) -> Result<Q::Output, BusError> {
        let reply = self.dispatch(envelope.as_message())?;
        reply
            .downcast::<Q::Output>()
            .map(|output| *output)
            .map_err(|_| BusError::UnexpectedReply {
                payload_type: envelope.payload_type().clone(),
            })
    }

    /// Erased dispatch; the reply is whatever the routed handler produced.
    pub fn dispatch(&self, message: &Message) -> Result<Reply, BusError> {
        self.0.dispatch(message)
    }

    pub fn inner(&self) -> &Bus<R> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};

    use conduit_core::{MessageRef, Payload};

    use super::*;
    use crate::pipeline::Next;

    #[derive(Debug)]
    struct Deposit {
        amount: u64,
    }

    impl Payload for Deposit {
        fn payload_type(&self) -> PayloadType {
            PayloadType::from_static("accounts.deposit")
        }
    }
    impl Command for Deposit {}

    #[derive(Debug)]
    struct Audit;

    impl Payload for Audit {
        fn payload_type(&self) -> PayloadType {
            PayloadType::from_static("accounts.audit")
        }
    }
    impl Command for Audit {}

    #[derive(Debug)]
    struct Balance;

    impl Payload for Balance {
        fn payload_type(&self) -> PayloadType {
            PayloadType::from_static("accounts.balance")
        }
    }
    impl Query for Balance {
        type Output = u64;
    }

    /// Claims the deposit payload type but is a different Rust type.
    #[derive(Debug)]
    struct Impostor;

    impl Payload for Impostor {
        fn payload_type(&self) -> PayloadType {
            PayloadType::from_static("accounts.deposit")
        }
    }
    impl Command for Impostor {}

    #[derive(Debug, thiserror::Error)]
    #[error("insufficient funds: {0}")]
    struct InsufficientFunds(u64);

    #[derive(Clone, Default)]
    struct Ledger {
        total: Arc<Mutex<u64>>,
    }

    impl CommandHandler<Deposit> for Ledger {
        type Error = InsufficientFunds;

        fn handle(&self, command: MessageRef<'_, Deposit>) -> Result<(), InsufficientFunds> {
            if command.amount == 0 {
                return Err(InsufficientFunds(0));
            }
            *self.total.lock().unwrap() += command.amount;
            Ok(())
        }
    }

    impl QueryHandler<Balance> for Ledger {
        type Error = anyhow::Error;

        fn handle(&self, _query: MessageRef<'_, Balance>) -> anyhow::Result<u64> {
            Ok(*self.total.lock().unwrap())
        }
    }

    fn deposit_type() -> PayloadType {
        PayloadType::from_static("accounts.deposit")
    }

    #[test]
    fn executes_registered_command_and_fetches_query() {
        let ledger = Ledger::default();
        let mut commands = CommandBus::new();
        commands
            .register::<Deposit, _>(deposit_type(), ledger.clone())
            .unwrap();
        let mut queries = QueryBus::new();
        queries
            .register::<Balance, _>(PayloadType::from_static("accounts.balance"), ledger)
            .unwrap();

        commands.execute(Deposit { amount: 40 }).unwrap();
        commands.execute(Deposit { amount: 2 }).unwrap();

        assert_eq!(queries.fetch(Balance).unwrap(), 42);
    }

    #[test]
    fn handler_error_is_preserved() {
        let ledger = Ledger::default();
        let mut bus = CommandBus::new();
        bus.register::<Deposit, _>(deposit_type(), ledger).unwrap();

        let err = bus.execute(Deposit { amount: 0 }).unwrap_err();
        match err {
            BusError::Handler(inner) => {
                assert!(inner.downcast_ref::<InsufficientFunds>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn registration_key_decides_routing() {
        let ledger = Ledger::default();
        let mut bus = CommandBus::new();
        // Deposit reports "accounts.deposit", so this key is never reached
        bus.register::<Deposit, _>(PayloadType::from_static("accounts.credit"), ledger.clone())
            .unwrap();

        let err = bus.execute(Deposit { amount: 5 }).unwrap_err();
        assert!(matches!(
            err,
            BusError::HandlerNotFound { ref payload_type } if *payload_type == deposit_type()
        ));

        bus.register::<Deposit, _>(deposit_type(), ledger.clone()).unwrap();
        bus.execute(Deposit { amount: 5 }).unwrap();
        assert_eq!(*ledger.total.lock().unwrap(), 5);

        let err = bus.execute(Impostor).unwrap_err();
        assert!(matches!(err, BusError::InvalidPayloadType { .. }));
    }

    #[test]
    fn unknown_command_is_handler_not_found() {
        let bus = CommandBus::new();
        let err = bus.execute(Audit).unwrap_err();
        assert!(matches!(
            err,
            BusError::HandlerNotFound { ref payload_type } if payload_type.as_str() == "accounts.audit"
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut bus = CommandBus::new();
        bus.register::<Audit, _>(
            PayloadType::from_static("accounts.audit"),
            |_: MessageRef<'_, Audit>| -> anyhow::Result<()> { Ok(()) },
        )
        .unwrap();
        let err = bus
            .register::<Audit, _>(
                PayloadType::from_static("accounts.audit"),
                |_: MessageRef<'_, Audit>| -> anyhow::Result<()> { Ok(()) },
            )
            .unwrap_err();
        assert!(matches!(err, BusError::DuplicateHandler { .. }));
    }

    #[test]
    fn payload_of_wrong_rust_type_is_invalid_payload_type() {
        let ledger = Ledger::default();
        let mut bus = CommandBus::new();
        bus.register::<Deposit, _>(deposit_type(), ledger).unwrap();

        let err = bus.execute(Impostor).unwrap_err();
        assert!(matches!(err, BusError::InvalidPayloadType { .. }));
    }

    #[test]
    fn query_reply_of_wrong_type_is_unexpected_reply() {
        struct WrongReply;

        impl crate::routing::Route for WrongReply {
            fn call(&self, _message: &Message) -> Result<Reply, BusError> {
                Ok(Box::new("not a number"))
            }
        }

        let mut table = RoutingTable::new();
        table
            .register(
                PayloadType::from_static("accounts.balance"),
                Box::new(WrongReply),
            )
            .unwrap();
        let bus = QueryBus::with_router(table);

        let err = bus.fetch(Balance).unwrap_err();
        assert!(matches!(err, BusError::UnexpectedReply { .. }));
    }

    #[test]
    fn filters_wrap_handler_last_added_outermost() {
        let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let mut bus = CommandBus::new();

        let handler_log = log.clone();
        bus.register::<Audit, _>(
            PayloadType::from_static("accounts.audit"),
            move |_: MessageRef<'_, Audit>| -> anyhow::Result<()> {
                handler_log.lock().unwrap().push("handler");
                Ok(())
            },
        )
        .unwrap();

        let f1 = log.clone();
        bus.add_filter(move |message: &Message, next: Next<'_>| {
            f1.lock().unwrap().push("f1.before");
            let result = next.run(message);
            f1.lock().unwrap().push("f1.after");
            result
        });
        let f2 = log.clone();
        bus.add_filter(move |message: &Message, next: Next<'_>| {
            f2.lock().unwrap().push("f2.before");
            let result = next.run(message);
            f2.lock().unwrap().push("f2.after");
            result
        });

        bus.execute(Audit).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["f2.before", "f1.before", "handler", "f1.after", "f2.after"]
        );
    }

    #[test]
    fn filters_see_routing_failures() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut bus = CommandBus::new();
        let counter = seen.clone();
        bus.add_filter(move |message: &Message, next: Next<'_>| {
            let result = next.run(message);
            if matches!(result, Err(BusError::HandlerNotFound { .. })) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            result
        });

        assert!(bus.execute(Audit).is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_dispatch_through_the_same_bus() {
        let bus_slot: Arc<OnceLock<CommandBus>> = Arc::new(OnceLock::new());
        let audits = Arc::new(AtomicUsize::new(0));

        let mut bus = CommandBus::new();
        let slot = bus_slot.clone();
        bus.register::<Deposit, _>(
            deposit_type(),
            move |_: MessageRef<'_, Deposit>| -> anyhow::Result<()> {
                let bus = slot
                    .get()
                    .ok_or_else(|| anyhow::anyhow!("bus not wired"))?;
                bus.execute(Audit)?;
                Ok(())
            },
        )
        .unwrap();
        let counter = audits.clone();
        bus.register::<Audit, _>(
            PayloadType::from_static("accounts.audit"),
            move |_: MessageRef<'_, Audit>| -> anyhow::Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();
        assert!(bus_slot.set(bus).is_ok());

        let bus = bus_slot.get().unwrap();
        bus.execute(Deposit { amount: 5 }).unwrap();
        bus.execute(Deposit { amount: 7 }).unwrap();
        assert_eq!(audits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn execute_envelope_keeps_caller_metadata() {
        let seen = Arc::new(Mutex::new(None));
        let mut bus = CommandBus::new();
        let sink = seen.clone();
        bus.register::<Audit, _>(
            PayloadType::from_static("accounts.audit"),
            move |cmd: MessageRef<'_, Audit>| -> anyhow::Result<()> {
                let user = cmd
                    .metadata()
                    .get("user")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned);
                *sink.lock().unwrap() = user;
                Ok(())
            },
        )
        .unwrap();

        let envelope = Envelope::new(Audit).with_metadata("user", "ada");
        bus.execute_envelope(&envelope).unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("ada"));
    }
}
