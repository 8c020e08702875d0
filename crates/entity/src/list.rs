//! List and query helpers
//!
//! Each call connects, runs one query against a named table and disconnects
//! before returning. Result rows are wrapped into [`Entity`] values without
//! reloading them.
//!
//! Conditions are raw SQL fragments handed to the backend unescaped. They
//! must never be assembled from untrusted input; use
//! [`EntityList::find_by_with_params`] to bind values instead.

use crate::connection::ConnectionManager;
use crate::entity::Entity;
use crate::error::EntityResult;
use crate::record::Record;
use crate::value::Value;

/// Stateless list operations over a table
pub struct EntityList;

impl EntityList {
    /// Number of rows in `table`, 0 when it has never been written to
    pub async fn count(db: &mut ConnectionManager, table: &str) -> EntityResult<u64> {
        db.connect().await?;
        let result = match db.store() {
            Ok(mut store) => store.count(table).await,
            Err(e) => Err(e),
        };
        db.disconnect_after(result).await
    }

    /// Every row of `table`, in primary key order
    pub async fn find_all(db: &mut ConnectionManager, table: &str) -> EntityResult<Vec<Entity>> {
        db.connect().await?;
        let result = match db.store() {
            Ok(mut store) => store.find_all(table).await,
            Err(e) => Err(e),
        };
        wrap(db.disconnect_after(result).await?)
    }

    /// Rows of `table` matching `condition`, e.g. `value2 > 500`.
    ///
    /// Matches come back in the same relative order as from
    /// [`find_all`](Self::find_all), unless the condition carries its own
    /// `ORDER BY`. It may also carry a `LIMIT`.
    pub async fn find_by(
        db: &mut ConnectionManager,
        table: &str,
        condition: &str,
    ) -> EntityResult<Vec<Entity>> {
        Self::find_by_with_params(db, table, condition, &[]).await
    }

    /// Like [`find_by`](Self::find_by), binding `params` to the backend's
    /// placeholders in `condition` (`?` or `$1`, `$2`, ...)
    pub async fn find_by_with_params(
        db: &mut ConnectionManager,
        table: &str,
        condition: &str,
        params: &[Value],
    ) -> EntityResult<Vec<Entity>> {
        db.connect().await?;
        let result = match db.store() {
            Ok(mut store) => store.find(table, condition, params).await,
            Err(e) => Err(e),
        };
        wrap(db.disconnect_after(result).await?)
    }
}

fn wrap(records: Vec<Record>) -> EntityResult<Vec<Entity>> {
    Ok(records.into_iter().map(Entity::from_record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, DB_TYPE};

    #[tokio::test]
    async fn test_list_operations_fail_on_bad_configuration() {
        let mut db = ConnectionManager::new(Settings::new().with(DB_TYPE, "oracle"));

        let err = EntityList::count(&mut db, "test").await.unwrap_err();
        assert!(err.is_configuration());
        let err = EntityList::find_all(&mut db, "test").await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_invalid_table_name_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = ConnectionManager::new(Settings::sqlite(dir.path().join("list.sqlite")));

        let err = EntityList::find_by(&mut db, "bad name", "1 = 1")
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!db.is_connected());
    }
}
