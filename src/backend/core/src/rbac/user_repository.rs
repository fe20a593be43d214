//! Role assignment for users through the `user_roles` join table.

use sqlx::{Executor, QueryBuilder, SqlitePool, Transaction};
use tracing::{debug, instrument};

use super::models::{RoleId, UserId};
use super::sql::{distinct, json_list, push_list, settle};
use crate::db::{Database, Db};
use crate::error::{RbacError, Result};

/// Data access for user-role assignments.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// All role ids assigned to a user, ascending.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn role_ids(&self, user_id: UserId) -> Result<Vec<RoleId>> {
        let ids = sqlx::query_scalar(
            "SELECT role_id FROM user_roles WHERE user_id = ? ORDER BY role_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Assign roles; already-assigned roles are kept. Returns the number added.
    #[instrument(skip(self, role_ids), fields(user_id = %user_id, count = role_ids.len()))]
    pub async fn add_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> Result<u64> {
        let role_ids = distinct(role_ids);
        if role_ids.is_empty() {
            return Ok(0);
        }

        let added = assign_roles(&self.pool, user_id, json_list(&role_ids)?).await?;

        debug!(added, "Roles assigned");
        Ok(added)
    }

    /// Make the user's role set exactly `role_ids`; an empty slice clears it.
    #[instrument(skip(self, role_ids), fields(user_id = %user_id, count = role_ids.len()))]
    pub async fn replace_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> Result<()> {
        let role_ids = distinct(role_ids);

        let mut tx = self.pool.begin().await?;
        let outcome = replace_role_assignments(&mut tx, user_id, &role_ids).await;
        let (removed, added) = settle(tx, outcome).await?;

        debug!(removed, added, "Roles replaced");
        Ok(())
    }

    /// Unassign the given roles; returns the number removed.
    #[instrument(skip(self, role_ids), fields(user_id = %user_id, count = role_ids.len()))]
    pub async fn remove_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> Result<u64> {
        if role_ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Db>::new("DELETE FROM user_roles WHERE user_id = ");
        query.push_bind(user_id).push(" AND role_id IN ");
        push_list(&mut query, distinct(role_ids))?;

        let removed = query.build().execute(&self.pool).await?.rows_affected();
        debug!(removed, "Roles unassigned");
        Ok(removed)
    }

    /// Unassign every role of the user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_roles(&self, user_id: UserId) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!(removed, "Roles cleared");
        Ok(removed)
    }
}

async fn replace_role_assignments(
    tx: &mut Transaction<'_, Db>,
    user_id: UserId,
    role_ids: &[RoleId],
) -> Result<(u64, u64)> {
    let mut stale = QueryBuilder::<Db>::new("DELETE FROM user_roles WHERE user_id = ");
    stale.push_bind(user_id);
    if !role_ids.is_empty() {
        stale.push(" AND role_id NOT IN ");
        push_list(&mut stale, role_ids.iter().copied())?;
    }
    let removed = stale
        .build()
        .execute(&mut **tx)
        .await
        .map_err(RbacError::transaction_failed)?
        .rows_affected();

    if role_ids.is_empty() {
        return Ok((removed, 0));
    }

    let added = assign_roles(&mut **tx, user_id, json_list(role_ids)?)
        .await
        .map_err(RbacError::transaction_failed)?;

    Ok((removed, added))
}

async fn assign_roles<'c, E>(
    executor: E,
    user_id: UserId,
    role_ids: String,
) -> std::result::Result<u64, sqlx::Error>
where
    E: Executor<'c, Database = Db>,
{
    let result = sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) \
         SELECT ?, value FROM json_each(?) WHERE true \
         ON CONFLICT (user_id, role_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(role_ids)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
