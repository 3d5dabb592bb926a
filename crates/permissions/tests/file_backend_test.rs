//! Records persisted on disk survive across service instances
mod common;

use chrono::Duration;
use common::*;
use rolegate_cache::{Codec, CompressionConfig, FileBackend};
use rolegate_core::ManualClock;
use rolegate_permissions::{
    GrantSource, PermissionDelta, PermissionService, PermissionServiceConfig, StaticRoleLookup,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn service_at(root: &Path, clock: Arc<ManualClock>) -> PermissionService {
    let config = PermissionServiceConfig {
        compression: CompressionConfig {
            min_size: 64,
            ..CompressionConfig::enabled(Codec::Gzip)
        },
        ..Default::default()
    };
    PermissionService::builder()
        .with_backend(Arc::new(FileBackend::new(root, clock.clone())))
        .with_role_lookup(Arc::new(
            StaticRoleLookup::new().with_user(user(RESEARCHER), role("researcher")),
        ))
        .with_config(config)
        .with_clock(clock)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_state_survives_a_new_service_instance() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let researcher = user(RESEARCHER);

    let first = service_at(dir.path(), clock.clone());
    first
        .update(
            researcher,
            &PermissionDelta::new()
                .add("report.export")
                .deny("trademark.update")
                .add_temporary("admin.users", start() + Duration::hours(2)),
        )
        .await
        .unwrap();
    drop(first);

    let second = service_at(dir.path(), clock.clone());
    let record = second.permissions(researcher).await.unwrap();
    assert_eq!(record.version, 2);
    assert!(record.custom.contains("report.export"));

    let decision = second.check(researcher, "admin.users").await.unwrap();
    assert_eq!(decision.granted_by, Some(GrantSource::Temporary));
    assert!(!second.check(researcher, "trademark.update").await.unwrap().has_permission);
}

#[tokio::test]
async fn test_expired_file_is_treated_as_absent() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let researcher = user(RESEARCHER);
    let service = service_at(dir.path(), clock.clone());

    service
        .update(researcher, &PermissionDelta::new().add("report.export"))
        .await
        .unwrap();
    clock.advance(Duration::hours(2));

    assert!(service.cache_info(researcher).await.unwrap().is_none());
    let record = service.permissions(researcher).await.unwrap();
    assert_eq!(record.version, 1);
    assert!(record.custom.is_empty());
}
