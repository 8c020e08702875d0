//! sqlx Backend Implementation
//!
//! One connection type serves SQLite, MySQL/MariaDB and PostgreSQL through
//! sqlx's `Any` driver. SQL is passed to the driver as written, so callers
//! must use the placeholder style of the [`SqlDialect`](super::SqlDialect)
//! of the connected backend.

use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Column, Connection, Row, ValueRef};

use super::core::{DatabaseConnection, DatabaseRow, ExecuteResult};
use super::BackendKind;
use crate::error::{EntityError, EntityResult};
use crate::value::Value;

/// Connection backed by `sqlx::AnyConnection`
pub struct AnyDatabaseConnection {
    kind: BackendKind,
    conn: Option<AnyConnection>,
}

impl AnyDatabaseConnection {
    /// Connect to `url`. The URL carries credentials and is never logged.
    pub async fn connect(kind: BackendKind, url: &str) -> EntityResult<Self> {
        sqlx::any::install_default_drivers();

        let conn = AnyConnection::connect(url).await.map_err(|e| {
            EntityError::Storage(format!("Failed to connect to {} database: {}", kind, e))
        })?;
        tracing::debug!(backend = %kind, "sqlx connection established");

        Ok(Self {
            kind,
            conn: Some(conn),
        })
    }

    fn conn(&mut self) -> EntityResult<&mut AnyConnection> {
        self.conn.as_mut().ok_or(EntityError::NotConnected)
    }
}

#[async_trait]
impl DatabaseConnection for AnyDatabaseConnection {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> EntityResult<ExecuteResult> {
        tracing::debug!(sql, params = params.len(), "execute");
        let conn = self.conn()?;

        let result = build_query(sql, params)
            .execute(conn)
            .await
            .map_err(|e| EntityError::Storage(format!("Query execution failed: {}", e)))?;

        Ok(ExecuteResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> EntityResult<Vec<DatabaseRow>> {
        tracing::debug!(sql, params = params.len(), "fetch_all");
        let conn = self.conn()?;

        let rows = build_query(sql, params)
            .fetch_all(conn)
            .await
            .map_err(|e| EntityError::Storage(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(decode_row).collect()
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> EntityResult<Option<DatabaseRow>> {
        tracing::debug!(sql, params = params.len(), "fetch_optional");
        let conn = self.conn()?;

        let row = build_query(sql, params)
            .fetch_optional(conn)
            .await
            .map_err(|e| EntityError::Storage(format!("Query fetch failed: {}", e)))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn ping(&mut self) -> EntityResult<()> {
        self.conn()?
            .ping()
            .await
            .map_err(|e| EntityError::Storage(format!("Ping failed: {}", e)))
    }

    async fn close(&mut self) -> EntityResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| EntityError::Storage(format!("Failed to close connection: {}", e)))?;
        }
        Ok(())
    }
}

fn build_query<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Any, AnyArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| bind_value(query, param))
}

/// Bind a Value to a sqlx query. Booleans are stored as 0/1 integers.
fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
    }
}

fn decode_row(row: &AnyRow) -> EntityResult<DatabaseRow> {
    let mut columns = IndexMap::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        columns.insert(column.name().to_string(), decode_value(row, index)?);
    }
    Ok(DatabaseRow::new(columns))
}

/// Convert a column value to a Value, trying the representations the Any
/// driver can produce from widest-compatible to narrowest
fn decode_value(row: &AnyRow, index: usize) -> EntityResult<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(Value::Int(value));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Ok(Value::Float(value));
    }
    if let Ok(value) = row.try_get::<f32, _>(index) {
        return Ok(Value::Float(f64::from(value)));
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Ok(Value::String(value));
    }
    if let Ok(value) = row.try_get::<bool, _>(index) {
        return Ok(Value::Bool(value));
    }
    if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(Value::String(String::from_utf8_lossy(&value).into_owned()));
    }

    Err(EntityError::Storage(format!(
        "Unsupported value type in column '{}'",
        row.columns()[index].name()
    )))
}
