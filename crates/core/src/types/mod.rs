//! Core domain types for `rolegate`.
//!
//! - **`newtypes`**: validated identifiers (`UserId`, `Role`, `PermissionName`)

pub mod newtypes;

pub use newtypes::*;
