//! Role persistence, role-permission links and permission-satisfaction checks.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Executor, FromRow, QueryBuilder, SqlitePool, Transaction};
use tracing::{debug, info, instrument};

use super::collections::{PermissionCollection, RoleCollection};
use super::models::{NewRole, Permission, PermissionId, Role, RoleId, RolePatch, UserId};
use super::sql::{distinct, json_list, push_list, settle};
use crate::db::{Database, Db};
use crate::error::{RbacError, Result};
use crate::pagination::{paginate, IdPage, OffsetPagination};

const SELECT_ROLES: &str =
    "SELECT id, name, guard_name, description, created_at, updated_at FROM roles";

/// A permission joined with the role that holds it, for eager loading.
#[derive(FromRow)]
struct RolePermissionRow {
    role_id: RoleId,
    #[sqlx(flatten)]
    permission: Permission,
}

/// Data access for roles.
#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch one role by id.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when no role has this id.
    #[instrument(skip(self), fields(role_id = %id))]
    pub async fn get_by_id(&self, id: RoleId) -> Result<Role> {
        let mut query = QueryBuilder::<Db>::new(SELECT_ROLES);
        query.push(" WHERE id = ").push_bind(id);

        query
            .build_query_as::<Role>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RbacError::not_found("role", id.to_string()))
    }

    /// Fetch one role by id with its permissions loaded.
    pub async fn get_by_id_with_permissions(&self, id: RoleId) -> Result<Role> {
        let mut role = self.get_by_id(id).await?;
        self.load_permissions(std::slice::from_mut(&mut role)).await?;
        Ok(role)
    }

    /// Fetch one role by guard name.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when no role has this guard name.
    #[instrument(skip(self))]
    pub async fn get_by_guard_name(&self, guard_name: &str) -> Result<Role> {
        let mut query = QueryBuilder::<Db>::new(SELECT_ROLES);
        query
            .push(" WHERE guard_name = ")
            .push_bind(guard_name.to_string());

        query
            .build_query_as::<Role>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RbacError::not_found("role", guard_name))
    }

    pub async fn get_by_guard_name_with_permissions(&self, guard_name: &str) -> Result<Role> {
        let mut role = self.get_by_guard_name(guard_name).await?;
        self.load_permissions(std::slice::from_mut(&mut role)).await?;
        Ok(role)
    }

    /// Fetch the roles that exist among `ids`, ordered by id.
    ///
    /// Unknown ids are skipped; an empty input never touches the store.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn get_many(&self, ids: &[RoleId]) -> Result<RoleCollection> {
        if ids.is_empty() {
            return Ok(RoleCollection::default());
        }

        let mut query = QueryBuilder::<Db>::new(SELECT_ROLES);
        query.push(" WHERE id IN ");
        push_list(&mut query, distinct(ids))?;
        query.push(" ORDER BY id");

        let roles = query.build_query_as::<Role>().fetch_all(&self.pool).await?;
        debug!(found = roles.len(), "Loaded roles by id");
        Ok(roles.into())
    }

    pub async fn get_many_with_permissions(&self, ids: &[RoleId]) -> Result<RoleCollection> {
        let mut roles = self.get_many(ids).await?.into_inner();
        self.load_permissions(&mut roles).await?;
        Ok(roles.into())
    }

    /// Fetch the roles that exist among `guard_names`, ordered by id.
    #[instrument(skip(self, guard_names), fields(requested = guard_names.len()))]
    pub async fn get_by_guard_names(&self, guard_names: &[&str]) -> Result<RoleCollection> {
        if guard_names.is_empty() {
            return Ok(RoleCollection::default());
        }

        let mut query = QueryBuilder::<Db>::new(SELECT_ROLES);
        query.push(" WHERE guard_name IN ");
        push_list(&mut query, guard_names.iter().map(|g| g.to_string()))?;
        query.push(" ORDER BY id");

        let roles = query.build_query_as::<Role>().fetch_all(&self.pool).await?;
        debug!(found = roles.len(), "Loaded roles by guard name");
        Ok(roles.into())
    }

    pub async fn get_by_guard_names_with_permissions(
        &self,
        guard_names: &[&str],
    ) -> Result<RoleCollection> {
        let mut roles = self.get_by_guard_names(guard_names).await?.into_inner();
        self.load_permissions(&mut roles).await?;
        Ok(roles.into())
    }

    /// Fill `permissions` on each role with one join query.
    async fn load_permissions(&self, roles: &mut [Role]) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Db>::new(
            "SELECT rp.role_id, p.id, p.name, p.guard_name, p.description, p.created_at, p.updated_at \
             FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id \
             WHERE rp.role_id IN ",
        );
        push_list(&mut query, roles.iter().map(|r| r.id))?;
        query.push(" ORDER BY rp.role_id, p.id");

        let rows = query
            .build_query_as::<RolePermissionRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut by_role: HashMap<RoleId, Vec<Permission>> = HashMap::new();
        for row in rows {
            by_role.entry(row.role_id).or_default().push(row.permission);
        }
        for role in roles.iter_mut() {
            role.permissions = by_role.remove(&role.id).unwrap_or_default();
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identifier retrieval
    // ─────────────────────────────────────────────────────────────────────────

    /// Ids of all roles, ascending.
    #[instrument(skip(self))]
    pub async fn ids(&self, pagination: Option<&OffsetPagination>) -> Result<IdPage<RoleId>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Db>::new("SELECT id FROM roles ORDER BY id");
        paginate(&mut query, pagination);
        let ids = query
            .build_query_scalar::<RoleId>()
            .fetch_all(&self.pool)
            .await?;

        Ok(IdPage::new(ids, total as u64))
    }

    /// Ids of the roles assigned to a user, ascending.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn ids_of_user(
        &self,
        user_id: UserId,
        pagination: Option<&OffsetPagination>,
    ) -> Result<IdPage<RoleId>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Db>::new("SELECT role_id FROM user_roles WHERE user_id = ");
        query.push_bind(user_id).push(" ORDER BY role_id");
        paginate(&mut query, pagination);
        let ids = query
            .build_query_scalar::<RoleId>()
            .fetch_all(&self.pool)
            .await?;

        Ok(IdPage::new(ids, total as u64))
    }

    /// Ids of the roles holding a permission, ascending.
    #[instrument(skip(self), fields(permission_id = %permission_id))]
    pub async fn ids_of_permission(
        &self,
        permission_id: PermissionId,
        pagination: Option<&OffsetPagination>,
    ) -> Result<IdPage<RoleId>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE permission_id = ?")
                .bind(permission_id)
                .fetch_one(&self.pool)
                .await?;

        let mut query =
            QueryBuilder::<Db>::new("SELECT role_id FROM role_permissions WHERE permission_id = ");
        query.push_bind(permission_id).push(" ORDER BY role_id");
        paginate(&mut query, pagination);
        let ids = query
            .build_query_scalar::<RoleId>()
            .fetch_all(&self.pool)
            .await?;

        Ok(IdPage::new(ids, total as u64))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Return the role with `new_role.guard_name`, inserting it first if absent.
    ///
    /// An existing row is returned as stored; its other fields are not updated.
    #[instrument(skip(self, new_role), fields(guard_name = %new_role.guard_name))]
    pub async fn first_or_create(&self, new_role: NewRole) -> Result<Role> {
        new_role.validate()?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO roles (name, guard_name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT (guard_name) DO NOTHING",
        )
        .bind(&new_role.name)
        .bind(&new_role.guard_name)
        .bind(&new_role.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(role_id = result.last_insert_rowid(), "Role created");
        } else {
            debug!("Role already exists");
        }

        self.get_by_guard_name(&new_role.guard_name).await
    }

    /// Apply a partial update and return the stored row.
    #[instrument(skip(self, patch), fields(role_id = %id))]
    pub async fn update(&self, id: RoleId, patch: RolePatch) -> Result<Role> {
        patch.validate()?;
        if patch.is_empty() {
            return self.get_by_id(id).await;
        }

        let result = sqlx::query(
            "UPDATE roles SET name = COALESCE(?, name), guard_name = COALESCE(?, guard_name), \
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
            return Err(RbacError::not_found("role", id.to_string()));
        }

        info!("Role updated");
        self.get_by_id(id).await
    }

    /// Delete a role together with its user and permission links.
    ///
    /// All three deletes run in one transaction; on any failure nothing is
    /// removed.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when no role has this id, rather than succeeding as a
    /// no-op. `DatabaseTransactionFailed` when a statement fails.
    #[instrument(skip(self), fields(role_id = %id))]
    pub async fn delete(&self, id: RoleId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let outcome = delete_role(&mut tx, id).await;
        let (user_links, permission_links) = settle(tx, outcome).await?;

        info!(user_links, permission_links, "Role deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission links
    // ─────────────────────────────────────────────────────────────────────────

    /// Link permissions to a role. Existing links are kept; returns the number added.
    #[instrument(skip(self, permission_ids), fields(role_id = %role_id, count = permission_ids.len()))]
    pub async fn add_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<u64> {
        let permission_ids = distinct(permission_ids);
        if permission_ids.is_empty() {
            return Ok(0);
        }

        let added = link_permissions(&self.pool, role_id, json_list(&permission_ids)?).await?;

        debug!(added, "Permissions linked");
        Ok(added)
    }

    /// Make the role's permission set exactly `permission_ids`.
    ///
    /// An empty slice clears every link.
    #[instrument(skip(self, permission_ids), fields(role_id = %role_id, count = permission_ids.len()))]
    pub async fn replace_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<()> {
        let permission_ids = distinct(permission_ids);

        let mut tx = self.pool.begin().await?;
        let outcome = replace_permission_links(&mut tx, role_id, &permission_ids).await;
        let (removed, added) = settle(tx, outcome).await?;

        debug!(removed, added, "Permissions replaced");
        Ok(())
    }

    /// Unlink the given permissions; returns the number of links removed.
    #[instrument(skip(self, permission_ids), fields(role_id = %role_id, count = permission_ids.len()))]
    pub async fn remove_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<u64> {
        if permission_ids.is_empty() {
            return Ok(0);
        }

        let mut query =
            QueryBuilder::<Db>::new("DELETE FROM role_permissions WHERE role_id = ");
        query.push_bind(role_id).push(" AND permission_id IN ");
        push_list(&mut query, distinct(permission_ids))?;

        let removed = query.build().execute(&self.pool).await?.rows_affected();
        debug!(removed, "Permissions unlinked");
        Ok(removed)
    }

    /// Unlink every permission of the role.
    #[instrument(skip(self), fields(role_id = %role_id))]
    pub async fn clear_permissions(&self, role_id: RoleId) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(removed, "Permissions cleared");
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission satisfaction
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether any role in `roles` holds `permission`.
    #[instrument(skip_all, fields(roles = roles.len(), permission = %permission.guard_name))]
    pub async fn has_permission(
        &self,
        roles: &RoleCollection,
        permission: &Permission,
    ) -> Result<bool> {
        self.has_permission_id(&roles.ids(), permission.id).await
    }

    /// Whether any (role, permission) pair from the two collections is linked.
    #[instrument(skip_all, fields(roles = roles.len(), permissions = permissions.len()))]
    pub async fn has_any_permissions(
        &self,
        roles: &RoleCollection,
        permissions: &PermissionCollection,
    ) -> Result<bool> {
        self.has_any_permission_ids(&roles.ids(), &permissions.ids())
            .await
    }

    /// Whether the roles together hold every permission.
    ///
    /// A permission counts as held when at least one of the roles has it.
    #[instrument(skip_all, fields(roles = roles.len(), permissions = permissions.len()))]
    pub async fn has_all_permissions(
        &self,
        roles: &RoleCollection,
        permissions: &PermissionCollection,
    ) -> Result<bool> {
        self.has_all_permission_ids(&roles.ids(), &permissions.ids())
            .await
    }

    /// Whether each role individually holds every permission.
    #[instrument(skip_all, fields(roles = roles.len(), permissions = permissions.len()))]
    pub async fn every_role_has_all_permissions(
        &self,
        roles: &RoleCollection,
        permissions: &PermissionCollection,
    ) -> Result<bool> {
        self.every_role_has_all_permission_ids(&roles.ids(), &permissions.ids())
            .await
    }

    /// Id form of [`has_permission`](Self::has_permission).
    pub async fn has_permission_id(
        &self,
        role_ids: &[RoleId],
        permission_id: PermissionId,
    ) -> Result<bool> {
        if role_ids.is_empty() {
            return Ok(false);
        }
        let linked = self
            .count_links("SELECT COUNT(*)", role_ids, &[permission_id])
            .await?;
        Ok(linked > 0)
    }

    /// Id form of [`has_any_permissions`](Self::has_any_permissions).
    pub async fn has_any_permission_ids(
        &self,
        role_ids: &[RoleId],
        permission_ids: &[PermissionId],
    ) -> Result<bool> {
        if role_ids.is_empty() || permission_ids.is_empty() {
            return Ok(false);
        }
        let linked = self
            .count_links("SELECT COUNT(*)", role_ids, permission_ids)
            .await?;
        Ok(linked > 0)
    }

    /// Id form of [`has_all_permissions`](Self::has_all_permissions).
    pub async fn has_all_permission_ids(
        &self,
        role_ids: &[RoleId],
        permission_ids: &[PermissionId],
    ) -> Result<bool> {
        let permission_ids = distinct(permission_ids);
        if permission_ids.is_empty() {
            return Ok(true);
        }
        if role_ids.is_empty() {
            return Ok(false);
        }

        let covered = self
            .count_links(
                "SELECT COUNT(DISTINCT permission_id)",
                role_ids,
                &permission_ids,
            )
            .await?;
        Ok(covered as usize == permission_ids.len())
    }

    /// Id form of [`every_role_has_all_permissions`](Self::every_role_has_all_permissions).
    pub async fn every_role_has_all_permission_ids(
        &self,
        role_ids: &[RoleId],
        permission_ids: &[PermissionId],
    ) -> Result<bool> {
        let permission_ids = distinct(permission_ids);
        if permission_ids.is_empty() {
            return Ok(true);
        }
        let role_ids = distinct(role_ids);
        if role_ids.is_empty() {
            return Ok(false);
        }

        // (role_id, permission_id) is the primary key, so rows are distinct pairs.
        let pairs = self
            .count_links("SELECT COUNT(*)", &role_ids, &permission_ids)
            .await?;
        Ok(pairs as usize == role_ids.len() * permission_ids.len())
    }

    async fn count_links(
        &self,
        select: &str,
        role_ids: &[RoleId],
        permission_ids: &[PermissionId],
    ) -> Result<i64> {
        let mut query = QueryBuilder::<Db>::new(select);
        query.push(" FROM role_permissions WHERE role_id IN ");
        push_list(&mut query, role_ids.iter().copied())?;
        query.push(" AND permission_id IN ");
        push_list(&mut query, permission_ids.iter().copied())?;

        Ok(query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?)
    }
}

async fn delete_role(tx: &mut Transaction<'_, Db>, id: RoleId) -> Result<(u64, u64)> {
    let user_links = sqlx::query("DELETE FROM user_roles WHERE role_id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    let permission_links = sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    if deleted == 0 {
        return Err(RbacError::not_found("role", id.to_string()));
    }
    Ok((user_links, permission_links))
}

async fn replace_permission_links(
    tx: &mut Transaction<'_, Db>,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> Result<(u64, u64)> {
    let mut stale = QueryBuilder::<Db>::new("DELETE FROM role_permissions WHERE role_id = ");
    stale.push_bind(role_id);
    if !permission_ids.is_empty() {
        stale.push(" AND permission_id NOT IN ");
        push_list(&mut stale, permission_ids.iter().copied())?;
    }
    let removed = stale
        .build()
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    if permission_ids.is_empty() {
        return Ok((removed, 0));
    }

    let added = link_permissions(&mut **tx, role_id, json_list(permission_ids)?)
        .await
        .map_err(RbacError::transaction_failed)?;

    Ok((removed, added))
}

/// Insert one link per element of the JSON id list, skipping existing links.
async fn link_permissions<'c, E>(
    executor: E,
    role_id: RoleId,
    permission_ids: String,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'c, Database = Db>,
{
    // `WHERE true` keeps SQLite from parsing ON CONFLICT as a join constraint.
    let result = sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id) \
         SELECT ?, value FROM json_each(?) WHERE true \
         ON CONFLICT (role_id, permission_id) DO NOTHING",
    )
    .bind(role_id)
    .bind(permission_ids)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
