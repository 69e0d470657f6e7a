//! `conduit-bus`: command/query dispatch.
//!
//! A bus composes a [`Router`] (payload type → exactly one handler) with a
//! [`Pipeline`] of filters wrapped around the routed call:
//!
//! ```text
//! execute(cmd) → Envelope → F_n … F_1 → terminal (resolve + handle) → F_1 … F_n
//! ```
//!
//! The most recently added filter is the outermost layer.

pub mod bus;
pub mod error;
pub mod filters;
pub mod handler;
pub mod pipeline;
pub mod routing;

pub use bus::{Bus, CommandBus, QueryBus};
pub use error::BusError;
pub use filters::{GuardFilter, LoggingFilter};
pub use handler::{CommandHandler, QueryHandler};
pub use pipeline::{Filter, Next, Pipeline};
pub use routing::{Reply, Route, Router, RoutingTable};
