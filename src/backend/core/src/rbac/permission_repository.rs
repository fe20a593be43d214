//! Permission persistence.

use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, Transaction};
use tracing::{debug, info, instrument};

use super::collections::PermissionCollection;
use super::models::{NewPermission, Permission, PermissionId, PermissionPatch, RoleId};
use super::sql::{distinct, push_list, settle};
use crate::db::{Database, Db};
use crate::error::{RbacError, Result};
use crate::pagination::{paginate, IdPage, OffsetPagination};

const SELECT_PERMISSIONS: &str =
    "SELECT id, name, guard_name, description, created_at, updated_at FROM permissions";

/// Data access for permissions.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: SqlitePool,
}

impl PermissionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Fetch one permission by id, or `RecordNotFound`.
    #[instrument(skip(self), fields(permission_id = %id))]
    pub async fn get_by_id(&self, id: PermissionId) -> Result<Permission> {
        let mut query = QueryBuilder::<Db>::new(SELECT_PERMISSIONS);
        query.push(" WHERE id = ").push_bind(id);

        query
            .build_query_as::<Permission>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RbacError::not_found("permission", id.to_string()))
    }

    /// Fetch one permission by guard name, or `RecordNotFound`.
    #[instrument(skip(self))]
    pub async fn get_by_guard_name(&self, guard_name: &str) -> Result<Permission> {
        let mut query = QueryBuilder::<Db>::new(SELECT_PERMISSIONS);
        query
            .push(" WHERE guard_name = ")
            .push_bind(guard_name.to_string());

        query
            .build_query_as::<Permission>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RbacError::not_found("permission", guard_name))
    }

    /// Fetch the permissions that exist among `ids`, ordered by id.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn get_many(&self, ids: &[PermissionId]) -> Result<PermissionCollection> {
        if ids.is_empty() {
            return Ok(PermissionCollection::default());
        }

        let mut query = QueryBuilder::<Db>::new(SELECT_PERMISSIONS);
        query.push(" WHERE id IN ");
        push_list(&mut query, distinct(ids))?;
        query.push(" ORDER BY id");

        let permissions = query
            .build_query_as::<Permission>()
            .fetch_all(&self.pool)
            .await?;
        debug!(found = permissions.len(), "Loaded permissions by id");
        Ok(permissions.into())
    }

    /// Fetch the permissions that exist among `guard_names`, ordered by id.
    #[instrument(skip(self, guard_names), fields(requested = guard_names.len()))]
    pub async fn get_by_guard_names(&self, guard_names: &[&str]) -> Result<PermissionCollection> {
        if guard_names.is_empty() {
            return Ok(PermissionCollection::default());
        }

        let mut query = QueryBuilder::<Db>::new(SELECT_PERMISSIONS);
        query.push(" WHERE guard_name IN ");
        push_list(&mut query, guard_names.iter().map(|g| g.to_string()))?;
        query.push(" ORDER BY id");

        let permissions = query
            .build_query_as::<Permission>()
            .fetch_all(&self.pool)
            .await?;
        debug!(found = permissions.len(), "Loaded permissions by guard name");
        Ok(permissions.into())
    }

    /// Ids of all permissions, ascending.
    #[instrument(skip(self))]
    pub async fn ids(
        &self,
        pagination: Option<&OffsetPagination>,
    ) -> Result<IdPage<PermissionId>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions")
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Db>::new("SELECT id FROM permissions ORDER BY id");
        paginate(&mut query, pagination);
        let ids = query
            .build_query_scalar::<PermissionId>()
            .fetch_all(&self.pool)
            .await?;

        Ok(IdPage::new(ids, total as u64))
    }

    /// Distinct ids of the permissions held by any of `role_ids`, ascending.
    #[instrument(skip(self, role_ids), fields(roles = role_ids.len()))]
    pub async fn ids_of_roles(
        &self,
        role_ids: &[RoleId],
        pagination: Option<&OffsetPagination>,
    ) -> Result<IdPage<PermissionId>> {
        if role_ids.is_empty() {
            return Ok(IdPage::default());
        }
        let role_ids = distinct(role_ids);

        let mut count = QueryBuilder::<Db>::new(
            "SELECT COUNT(DISTINCT permission_id) FROM role_permissions WHERE role_id IN ",
        );
        push_list(&mut count, role_ids.iter().copied())?;
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Db>::new(
            "SELECT DISTINCT permission_id FROM role_permissions WHERE role_id IN ",
        );
        push_list(&mut query, role_ids.iter().copied())?;
        query.push(" ORDER BY permission_id");
        paginate(&mut query, pagination);
        let ids = query
            .build_query_scalar::<PermissionId>()
            .fetch_all(&self.pool)
            .await?;

        Ok(IdPage::new(ids, total as u64))
    }

    /// Return the permission with `new_permission.guard_name`, inserting it first if absent.
    #[instrument(skip(self, new_permission), fields(guard_name = %new_permission.guard_name))]
    pub async fn first_or_create(&self, new_permission: NewPermission) -> Result<Permission> {
        new_permission.validate()?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO permissions (name, guard_name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT (guard_name) DO NOTHING",
        )
        .bind(&new_permission.name)
        .bind(&new_permission.guard_name)
        .bind(&new_permission.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(permission_id = result.last_insert_rowid(), "Permission created");
        }

        self.get_by_guard_name(&new_permission.guard_name).await
    }

    /// Apply a partial update and return the stored row.
    #[instrument(skip(self, patch), fields(permission_id = %id))]
    pub async fn update(&self, id: PermissionId, patch: PermissionPatch) -> Result<Permission> {
        patch.validate()?;
        if patch.is_empty() {
            return self.get_by_id(id).await;
        }

        let result = sqlx::query(
            "UPDATE permissions SET name = COALESCE(?, name), guard_name = COALESCE(?, guard_name), \
             description = COALESCE(?, description), updated_at = ? WHERE id = ?",
        )
        .bind(patch.name)
        .bind(patch.guard_name)
        .bind(patch.description)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RbacError::not_found("permission", id.to_string()));
        }

        info!("Permission updated");
        self.get_by_id(id).await
    }

    /// Delete a permission and its role links in one transaction.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when no permission has this id, rather than succeeding
    /// as a no-op.
    #[instrument(skip(self), fields(permission_id = %id))]
    pub async fn delete(&self, id: PermissionId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let outcome = delete_permission(&mut tx, id).await;
        let role_links = settle(tx, outcome).await?;

        info!(role_links, "Permission deleted");
        Ok(())
    }
}

async fn delete_permission(tx: &mut Transaction<'_, Db>, id: PermissionId) -> Result<u64> {
    let role_links = sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM permissions WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    if deleted == 0 {
        return Err(RbacError::not_found("permission", id.to_string()));
    }
    Ok(role_links)
}
