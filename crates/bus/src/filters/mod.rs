//! Stock pipeline filters.

mod guard;
mod logging;

pub use guard::GuardFilter;
pub use logging::LoggingFilter;
