//! Guard-name based access checks for users and roles.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use super::models::UserId;
use super::{PermissionRepository, RoleRepository, UserRepository};
use crate::db::Database;
use crate::error::Result;

/// Answers "does this user (or role) hold that permission" by guard name.
///
/// ```rust,ignore
/// let access = AccessControl::new(&db);
/// if access.user_has_permission(user_id, "articles.publish").await? {
///     publish(article).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AccessControl {
    roles: RoleRepository,
    permissions: PermissionRepository,
    users: UserRepository,
}

impl AccessControl {
    pub fn new(db: &Database) -> Self {
        Self {
            roles: RoleRepository::new(db),
            permissions: PermissionRepository::new(db),
            users: UserRepository::new(db),
        }
    }

    /// Whether any of the user's roles holds the permission.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when no permission has this guard name.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_has_permission(&self, user_id: UserId, permission: &str) -> Result<bool> {
        let permission = self.permissions.get_by_guard_name(permission).await?;
        let role_ids = self.users.role_ids(user_id).await?;

        let allowed = self
            .roles
            .has_permission_id(&role_ids, permission.id)
            .await?;
        debug!(allowed, roles = role_ids.len(), "Permission check");
        Ok(allowed)
    }

    /// Whether the user's roles together hold every listed permission.
    ///
    /// A guard name that matches no permission makes the answer `false`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_has_all_permissions(
        &self,
        user_id: UserId,
        permissions: &[&str],
    ) -> Result<bool> {
        let requested: BTreeSet<&str> = permissions.iter().copied().collect();
        let found = self.permissions.get_by_guard_names(permissions).await?;
        if found.len() < requested.len() {
            debug!(
                requested = requested.len(),
                found = found.len(),
                "Unknown permission requested"
            );
            return Ok(false);
        }

        let role_ids = self.users.role_ids(user_id).await?;
        self.roles
            .has_all_permission_ids(&role_ids, &found.ids())
            .await
    }

    /// Whether the user's roles hold at least one listed permission.
    ///
    /// Guard names that match no permission are ignored.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_has_any_permissions(
        &self,
        user_id: UserId,
        permissions: &[&str],
    ) -> Result<bool> {
        let found = self.permissions.get_by_guard_names(permissions).await?;
        if found.is_empty() {
            return Ok(false);
        }

        let role_ids = self.users.role_ids(user_id).await?;
        self.roles
            .has_any_permission_ids(&role_ids, &found.ids())
            .await
    }

    /// Whether a role holds a permission, both named by guard name.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when either guard name is unknown.
    #[instrument(skip(self))]
    pub async fn role_has_permission(&self, role: &str, permission: &str) -> Result<bool> {
        let role = self.roles.get_by_guard_name(role).await?;
        let permission = self.permissions.get_by_guard_name(permission).await?;

        self.roles
            .has_permission_id(&[role.id], permission.id)
            .await
    }
}
