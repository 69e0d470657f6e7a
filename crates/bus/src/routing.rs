//! Payload type → handler resolution.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use conduit_core::{Command, Message, PayloadType, Query};

use crate::error::BusError;
use crate::handler::{CommandHandler, QueryHandler};

/// Erased handler result. Commands reply with `()`, queries with their output.
pub type Reply = Box<dyn Any + Send>;

/// A resolved, type-erased handler.
pub trait Route: Send + Sync {
    fn call(&self, message: &Message) -> Result<Reply, BusError>;
}

/// Resolves a payload type to exactly one [`Route`].
///
/// [`RoutingTable`] is the in-process implementation; buses are generic over
/// the router so it can be replaced.
pub trait Router: Send + Sync {
    fn resolve(&self, payload_type: &PayloadType) -> Result<&dyn Route, BusError>;
}

pub(crate) struct CommandRoute<C, H> {
    handler: H,
    _command: PhantomData<fn(C)>,
}

impl<C, H> CommandRoute<C, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _command: PhantomData,
        }
    }
}

impl<C: Command, H: CommandHandler<C>> Route for CommandRoute<C, H> {
    fn call(&self, message: &Message) -> Result<Reply, BusError> {
        let command = message.expect_payload::<C>()?;
        self.handler
            .handle(command)
            .map_err(|e| BusError::Handler(e.into()))?;
        Ok(Box::new(()))
    }
}

pub(crate) struct QueryRoute<Q, H> {
    handler: H,
    _query: PhantomData<fn(Q)>,
}

impl<Q, H> QueryRoute<Q, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _query: PhantomData,
        }
    }
}

impl<Q: Query, H: QueryHandler<Q>> Route for QueryRoute<Q, H> {
    fn call(&self, message: &Message) -> Result<Reply, BusError> {
        let query = message.expect_payload::<Q>()?;
        let output = self
            .handler
            .handle(query)
            .map_err(|e| BusError::Handler(e.into()))?;
        Ok(Box::new(output))
    }
}

/// One-to-one map from payload type to route.
#[derive(Default)]
pub struct RoutingTable {
    routes: HashMap<PayloadType, Box<dyn Route>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route for `payload_type`.
    ///
    /// Fails with [`BusError::InvalidPayloadType`] when the name breaks the
    /// type-name grammar and with [`BusError::DuplicateHandler`] when the
    /// type already has a route. An existing route is never replaced.
    pub fn register(
        &mut self,
        payload_type: PayloadType,
        route: Box<dyn Route>,
    ) -> Result<(), BusError> {
        payload_type.validate()?;
        if self.routes.contains_key(&payload_type) {
            return Err(BusError::DuplicateHandler { payload_type });
        }
        tracing::debug!(payload_type = %payload_type, "registered route");
        self.routes.insert(payload_type, route);
        Ok(())
    }

    pub fn contains(&self, payload_type: &PayloadType) -> bool {
        self.routes.contains_key(payload_type)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn payload_types(&self) -> impl Iterator<Item = &PayloadType> {
        self.routes.keys()
    }
}

impl Router for RoutingTable {
    fn resolve(&self, payload_type: &PayloadType) -> Result<&dyn Route, BusError> {
        self.routes
            .get(payload_type)
            .map(|route| route.as_ref())
            .ok_or_else(|| BusError::HandlerNotFound {
                payload_type: payload_type.clone(),
            })
    }
}

impl fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.routes.keys().map(PayloadType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("RoutingTable").field("routes", &types).finish()
    }
}
