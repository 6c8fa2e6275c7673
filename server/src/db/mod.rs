//! Database module for PostgreSQL persistence.

mod counters;
mod documents;
mod pool;

pub use counters::*;
pub use documents::*;
pub use pool::*;
