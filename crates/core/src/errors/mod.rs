//! Error types for rolegate operations

mod builders;
mod conversions;
mod types;

pub use types::{Error, Result};
