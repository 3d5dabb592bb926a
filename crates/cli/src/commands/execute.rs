use super::Commands;
use anyhow::Result;
use rolegate_permissions::{BulkMode, PermissionDelta, PermissionService};
use serde::Serialize;
use serde_json::json;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Commands {
    pub async fn execute(self, service: &PermissionService) -> Result<()> {
        match self {
            Commands::Check {
                user_id,
                permission,
                gate,
            } => {
                if gate {
                    print_json(&service.is_allowed(user_id, &permission).await)
                } else {
                    print_json(&service.check(user_id, &permission).await?)
                }
            }

            Commands::BulkCheck {
                user_id,
                permissions,
                all,
            } => {
                let mode = if all { BulkMode::All } else { BulkMode::Any };
                print_json(&service.bulk_check(user_id, &permissions, mode).await?)
            }

            Commands::Update {
                user_id,
                add,
                remove,
                add_temporary,
                remove_temporary,
                deny,
                allow,
                expected_version,
            } => {
                let delta = PermissionDelta {
                    add,
                    remove,
                    add_temporary: add_temporary.into_iter().collect(),
                    remove_temporary,
                    deny,
                    allow,
                };
                if delta.is_empty() {
                    anyhow::bail!("nothing to update; pass at least one of --add, --remove, --add-temporary, --remove-temporary, --deny or --allow");
                }
                let outcome = match expected_version {
                    Some(version) => service.update_checked(user_id, &delta, version).await?,
                    None => service.update(user_id, &delta).await?,
                };
                print_json(&outcome)
            }

            Commands::Template {
                user_id,
                template,
                replace,
            } => print_json(&service.apply_template(user_id, &template, !replace).await?),

            Commands::Audit { user_id } => match service.audit(user_id).await? {
                Some(report) => print_json(&report),
                None => anyhow::bail!("no cached permissions for user {user_id}"),
            },

            Commands::SyncRole { user_id, role } => {
                print_json(&service.sync_role(user_id, &role).await?)
            }

            Commands::Invalidate { user_ids } => {
                let removed = service.invalidate_many(&user_ids).await?;
                print_json(&json!({ "requested": user_ids.len(), "removed": removed }))
            }

            Commands::Effective { user_id } => {
                print_json(&service.effective_permissions(user_id).await?)
            }

            Commands::Show { user_id, refresh } => {
                let record = if refresh {
                    service.refresh(user_id).await?
                } else {
                    service.permissions(user_id).await?
                };
                let cache = service.cache_info(user_id).await?;
                print_json(&json!({ "record": record, "cache": cache }))
            }

            Commands::Describe { permission } => match permission {
                Some(permission) => print_json(&json!({
                    "permission": permission,
                    "description": service.describe(&permission),
                })),
                None => print_json(&json!({
                    "permissions": service.catalog().descriptions(),
                    "hierarchy": service.permission_hierarchy(),
                })),
            },
        }
    }
}
