use super::PermissionService;
use crate::catalog::PermissionCatalog;
use crate::config::PermissionServiceConfig;
use crate::lookup::RoleLookup;
use crate::roles::{RoleDefaults, TemplateRegistry};
use crate::store::{CachePermissionStore, PermissionStore};
use dashmap::DashMap;
use rolegate_cache::{KeyValueBackend, MemoryBackend};
use rolegate_core::{Error, Result, SharedClock, SystemClock};
use std::sync::Arc;

/// Builder for a `PermissionService`
///
/// Only the role lookup is required. Without a store or backend the service
/// keeps records in memory.
#[derive(Debug, Default)]
pub struct PermissionServiceBuilder {
    store: Option<Arc<dyn PermissionStore>>,
    backend: Option<Arc<dyn KeyValueBackend>>,
    roles: Option<Arc<dyn RoleLookup>>,
    defaults: RoleDefaults,
    templates: TemplateRegistry,
    catalog: PermissionCatalog,
    config: PermissionServiceConfig,
    clock: Option<SharedClock>,
}

impl PermissionServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a ready-made store; takes precedence over [`with_backend`](Self::with_backend)
    pub fn with_store(mut self, store: Arc<dyn PermissionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Store records in `backend` through a `CachePermissionStore`
    pub fn with_backend(mut self, backend: Arc<dyn KeyValueBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_role_lookup(mut self, roles: Arc<dyn RoleLookup>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn with_role_defaults(mut self, defaults: RoleDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_catalog(mut self, catalog: PermissionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_config(mut self, config: PermissionServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the service
    pub fn build(self) -> Result<PermissionService> {
        self.config.validate()?;
        let roles = self
            .roles
            .ok_or_else(|| Error::configuration("permission service needs a role lookup"))?;
        let clock = self.clock.unwrap_or_else(SystemClock::shared);

        let store: Arc<dyn PermissionStore> = match self.store {
            Some(store) => store,
            None => {
                let cache_config = self
                    .config
                    .cache_config()
                    .map_err(|e| Error::configuration(e.to_string()))?;
                let backend: Arc<dyn KeyValueBackend> = match self.backend {
                    Some(backend) => backend,
                    None => Arc::new(MemoryBackend::new(clock.clone())),
                };
                Arc::new(CachePermissionStore::new(backend, cache_config, clock.clone()))
            }
        };

        Ok(PermissionService {
            store,
            roles,
            defaults: Arc::new(self.defaults),
            templates: Arc::new(self.templates),
            catalog: Arc::new(self.catalog),
            config: self.config,
            clock,
            last_known: Arc::new(DashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticRoleLookup;

    #[test]
    fn test_role_lookup_is_required() {
        let err = PermissionServiceBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PermissionServiceConfig {
            long_temporary_grant_days: -1,
            ..Default::default()
        };
        let result = PermissionService::builder()
            .with_role_lookup(Arc::new(StaticRoleLookup::new()))
            .with_config(config)
            .build();
        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
