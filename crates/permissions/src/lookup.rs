//! Role directory port

use async_trait::async_trait;
use dashmap::DashMap;
use rolegate_core::{Role, UserId};
use std::sync::Arc;

/// Resolves the role of a user
///
/// `Ok(None)` means the directory has no such user. `Err` means the directory
/// itself failed.
#[async_trait]
pub trait RoleLookup: Send + Sync + std::fmt::Debug {
    async fn role_of(&self, user_id: UserId) -> anyhow::Result<Option<Role>>;
}

/// In-memory directory
#[derive(Debug, Clone, Default)]
pub struct StaticRoleLookup {
    roles: Arc<DashMap<UserId, Role>>,
}

impl StaticRoleLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: UserId, role: Role) -> Self {
        self.roles.insert(user_id, role);
        self
    }

    pub fn assign(&self, user_id: UserId, role: Role) {
        self.roles.insert(user_id, role);
    }

    pub fn remove(&self, user_id: UserId) -> Option<Role> {
        self.roles.remove(&user_id).map(|(_, role)| role)
    }
}

impl FromIterator<(UserId, Role)> for StaticRoleLookup {
    fn from_iter<I: IntoIterator<Item = (UserId, Role)>>(iter: I) -> Self {
        let lookup = Self::new();
        for (user_id, role) in iter {
            lookup.assign(user_id, role);
        }
        lookup
    }
}

#[async_trait]
impl RoleLookup for StaticRoleLookup {
    async fn role_of(&self, user_id: UserId) -> anyhow::Result<Option<Role>> {
        Ok(self.roles.get(&user_id).map(|role| role.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup() {
        let user = UserId::new(1).unwrap();
        let lookup = StaticRoleLookup::new().with_user(user, Role::new("viewer").unwrap());
        assert_eq!(
            lookup.role_of(user).await.unwrap(),
            Some(Role::new("viewer").unwrap())
        );
        assert_eq!(lookup.role_of(UserId::new(2).unwrap()).await.unwrap(), None);

        lookup.remove(user);
        assert_eq!(lookup.role_of(user).await.unwrap(), None);
    }
}
