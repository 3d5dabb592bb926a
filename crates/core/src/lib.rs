//! Core domain types, errors, and constants for `rolegate`.
//!
//! This crate holds the building blocks shared by the cache layer and the
//! permission engine.
//!
//! ## Key Components
//!
//! - **`errors`**: the core `Error` enum and `Result` alias used for validation,
//!   configuration and file system failures.
//! - **`types`**: validated newtypes (`UserId`, `Role`, `PermissionName`) that
//!   enforce invariants at the type level.
//! - **`clock`**: the `Clock` abstraction every time-dependent operation reads
//!   `now` from, so expiry logic stays deterministic under test.
//! - **`constants`**: shared static values such as cache key prefixes and
//!   default TTLs.

pub mod clock;
pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    clock::{Clock, ManualClock, SharedClock, SystemClock},
    constants::*,
    errors::{Error, Result},
    types::*,
};
