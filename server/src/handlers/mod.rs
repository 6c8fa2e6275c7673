//! Request handlers for documents and counters.

mod counters;
mod documents;

pub use counters::*;
pub use documents::*;
