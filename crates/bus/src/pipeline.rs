//! Filter chain wrapped around handler invocation.
//!
//! Each filter receives the message and a [`Next`] continuation. Calling
//! `next.run(message)` hands control to the next inner filter and finally to
//! the handler; returning without calling it short-circuits the dispatch.
//! Filters run outermost-first, and the filter registered last is the
//! outermost one.

use std::fmt;
use std::sync::Arc;

use conduit_core::Message;

use crate::error::BusError;
use crate::routing::Reply;

/// One stage of the pipeline.
pub trait Filter: Send + Sync {
    fn call(&self, message: &Message, next: Next<'_>) -> Result<Reply, BusError>;
}

impl<F> Filter for F
where
    F: Fn(&Message, Next<'_>) -> Result<Reply, BusError> + Send + Sync,
{
    fn call(&self, message: &Message, next: Next<'_>) -> Result<Reply, BusError> {
        self(message, next)
    }
}

/// Continuation to the rest of the chain.
///
/// `Next` is `Copy`, so a filter may invoke it more than once (retries) or not
/// at all.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    terminal: &'a dyn Fn(&Message) -> Result<Reply, BusError>,
}

impl<'a> Next<'a> {
    pub fn run(self, message: &Message) -> Result<Reply, BusError> {
        match self.filters.split_first() {
            Some((filter, inner)) => filter.call(
                message,
                Next {
                    filters: inner,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(message),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.filters.len())
            .finish()
    }
}

/// Ordered filter list. Stored outermost-first.
#[derive(Clone)]
pub struct Pipeline {
    filters: Arc<[Arc<dyn Filter>]>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            filters: Arc::from(Vec::new()),
        }
    }

    /// Wrap the current chain in `filter`.
    pub fn add_filter(&mut self, filter: Arc<dyn Filter>) {
        let mut filters = Vec::with_capacity(self.filters.len() + 1);
        filters.push(filter);
        filters.extend(self.filters.iter().cloned());
        self.filters = filters.into();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run `message` through every filter and then `terminal`.
    pub fn run<T>(&self, message: &Message, terminal: T) -> Result<Reply, BusError>
    where
        T: Fn(&Message) -> Result<Reply, BusError>,
    {
        // a snapshot keeps an in-flight dispatch stable if the pipeline is
        // extended from another clone
        let filters = Arc::clone(&self.filters);
        Next {
            filters: &filters,
            terminal: &terminal,
        }
        .run(message)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("filters", &self.filters.len())
            .finish()
    }
}
