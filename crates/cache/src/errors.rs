//! Error handling for the cache layer
//!
//! Every variant carries a `RecoveryHint` so callers can decide how to react
//! without matching on error text.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
