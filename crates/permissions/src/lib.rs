//! Layered, cache-backed permission resolution for `rolegate`.
//!
//! A user's permissions live in a single [`PermissionRecord`] with five
//! buckets: direct grants, role-derived grants, custom grants, time-bounded
//! temporary grants and explicit denials. Records are materialized lazily from
//! [`RoleDefaults`] on the first cache miss and persisted through a
//! [`PermissionStore`].
//!
//! ## Key Components
//!
//! - **`resolver`**: pure decision logic. Denials win over everything,
//!   including `*` and wildcard patterns.
//! - **`delta`**: explicit mutation batches applied in a fixed order.
//! - **`service`**: the [`PermissionService`] API: checks, updates, templates,
//!   role syncs, audits and invalidation.
//! - **`store`**: the persistence port and its cache-backed implementation.
//! - **`config`**: service settings loaded from defaults, a JSON file and the
//!   environment.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod delta;
pub mod errors;
pub mod glob;
pub mod lookup;
pub mod record;
pub mod resolver;
pub mod roles;
pub mod service;
pub mod store;

pub use self::{
    audit::{AuditReport, Conflict, SecurityRisk},
    catalog::PermissionCatalog,
    config::{ConfigSource, FailurePolicy, PermissionConfigLoader, PermissionServiceConfig},
    delta::{ChangeSummary, PermissionDelta},
    errors::{PermissionError, Result},
    lookup::{RoleLookup, StaticRoleLookup},
    record::PermissionRecord,
    resolver::{Grant, GrantSource},
    roles::{RoleDefaults, TemplateRegistry},
    service::{
        BulkDecision, BulkMode, Decision, PermissionService, PermissionServiceBuilder,
        TemplateOutcome, UpdateOutcome,
    },
    store::{CachePermissionStore, PermissionStore},
};
