//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use rbac_core::db::Database;
use rbac_core::rbac::{
    NewPermission, NewRole, Permission, PermissionRepository, Role, RoleRepository,
    UserRepository,
};

/// A freshly migrated in-memory store with repositories attached.
pub struct TestStore {
    pub db: Database,
    pub roles: RoleRepository,
    pub permissions: PermissionRepository,
    pub users: UserRepository,
}

pub async fn store() -> TestStore {
    let db = Database::connect_url("sqlite::memory:")
        .await
        .expect("in-memory database");

    TestStore {
        roles: RoleRepository::new(&db),
        permissions: PermissionRepository::new(&db),
        users: UserRepository::new(&db),
        db,
    }
}

impl TestStore {
    pub async fn role(&self, name: &str) -> Role {
        self.roles
            .first_or_create(NewRole::new(name))
            .await
            .expect("create role")
    }

    pub async fn permission(&self, guard_name: &str) -> Permission {
        self.permissions
            .first_or_create(NewPermission::new(guard_name).with_guard_name(guard_name))
            .await
            .expect("create permission")
    }

    pub async fn link_count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.db.pool())
            .await
            .expect("count rows")
    }
}
