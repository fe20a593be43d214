//! Query-building helpers shared by the repositories.

use std::collections::BTreeSet;

use serde::Serialize;
use sqlx::{QueryBuilder, Transaction};
use tracing::warn;

use crate::db::Db;
use crate::error::{ErrorContext, RbacError, Result};

/// Encode `values` as the JSON array bound into `json_each(?)`.
///
/// A whole list travels as one parameter, so its length is not bounded by the
/// store's limit on bound variables.
pub(crate) fn json_list<T: Serialize>(values: impl IntoIterator<Item = T>) -> Result<String> {
    let values: Vec<T> = values.into_iter().collect();
    serde_json::to_string(&values).context("Failed to encode identifier list")
}

/// Push a subquery yielding each value of the list: `(SELECT value FROM json_each(?))`.
pub(crate) fn push_list<T: Serialize>(
    query: &mut QueryBuilder<'_, Db>,
    values: impl IntoIterator<Item = T>,
) -> Result<()> {
    query
        .push("(SELECT value FROM json_each(")
        .push_bind(json_list(values)?)
        .push("))");
    Ok(())
}

/// Sorted, duplicate-free copy of `ids`.
pub(crate) fn distinct<T: Ord + Copy>(ids: &[T]) -> Vec<T> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Commit `tx` if `outcome` succeeded, otherwise roll it back and return the error.
pub(crate) async fn settle<T>(tx: Transaction<'_, Db>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(RbacError::transaction_failed)?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Transaction rollback failed");
            }
            error.log();
            Err(error)
        }
    }
}
