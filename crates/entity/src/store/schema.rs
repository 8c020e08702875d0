//! Fluid schema
//!
//! Tables and columns are created the first time a record needs them.
//! A column whose declared type is too narrow for a new value is widened
//! (integer, then double, then text). Nothing is ever dropped or narrowed.

use indexmap::IndexMap;

use crate::backends::{ColumnType, DatabaseConnection, SqlDialect};
use crate::error::EntityResult;
use crate::security::{attribute_key, PRIMARY_KEY_COLUMN};
use crate::value::Value;

/// Columns of an existing table, in column order. Names are matched
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    columns: IndexMap<String, ColumnType>,
}

impl TableSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(&attribute_key(name))
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(&attribute_key(name)).copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Changes needed so every non-null value in `fields` fits its column
    pub fn plan_changes<'a>(
        &self,
        fields: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> Vec<ColumnChange> {
        let mut changes = Vec::new();
        for (name, value) in fields {
            let Some(required) = ColumnType::for_value(value) else {
                continue;
            };
            match self.column_type(name) {
                None => changes.push(ColumnChange::Add {
                    column: attribute_key(name),
                    column_type: required,
                }),
                Some(existing) if existing < required => changes.push(ColumnChange::Widen {
                    column: attribute_key(name),
                    column_type: required,
                }),
                Some(_) => {}
            }
        }
        changes
    }

    pub(crate) fn apply(&mut self, change: &ColumnChange) {
        let (ColumnChange::Add {
            column,
            column_type,
        }
        | ColumnChange::Widen {
            column,
            column_type,
        }) = change;
        self.columns.insert(attribute_key(column), *column_type);
    }
}

/// A single schema change for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    Add {
        column: String,
        column_type: ColumnType,
    },
    Widen {
        column: String,
        column_type: ColumnType,
    },
}

impl ColumnChange {
    /// SQL for this change, `None` when the backend needs no statement
    pub fn to_sql(&self, dialect: SqlDialect, table: &str) -> Option<String> {
        match self {
            ColumnChange::Add {
                column,
                column_type,
            } => Some(dialect.add_column(table, column, *column_type)),
            ColumnChange::Widen {
                column,
                column_type,
            } => dialect.widen_column(table, column, *column_type),
        }
    }
}

/// Read the columns of `table`. `None` when the table does not exist.
pub async fn inspect(
    conn: &mut dyn DatabaseConnection,
    dialect: SqlDialect,
    table: &str,
) -> EntityResult<Option<TableSchema>> {
    let rows = conn
        .fetch_all(dialect.columns_query(), &[Value::from(table)])
        .await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let columns = rows
        .iter()
        .filter_map(|row| {
            let name = attribute_key(&row.get_by_index(0)?.to_string());
            let sql_type = row.get_by_index(1).map(Value::to_string).unwrap_or_default();
            Some((name, ColumnType::from_sql_type(&sql_type)))
        })
        .collect();

    Ok(Some(TableSchema { columns }))
}

/// Read the columns of `table`, creating it with only a primary key when it
/// does not exist yet
pub async fn ensure_table(
    conn: &mut dyn DatabaseConnection,
    dialect: SqlDialect,
    table: &str,
) -> EntityResult<TableSchema> {
    if let Some(schema) = inspect(conn, dialect, table).await? {
        return Ok(schema);
    }

    conn.execute(&dialect.create_table(table, PRIMARY_KEY_COLUMN), &[])
        .await?;
    tracing::info!(table, "Created table");

    let mut columns = IndexMap::new();
    columns.insert(PRIMARY_KEY_COLUMN.to_string(), ColumnType::Integer);
    Ok(TableSchema { columns })
}

/// Add and widen columns of `table` so every value of `fields` can be stored
pub async fn sync_columns(
    conn: &mut dyn DatabaseConnection,
    dialect: SqlDialect,
    table: &str,
    schema: &mut TableSchema,
    fields: &IndexMap<String, Value>,
) -> EntityResult<()> {
    for change in schema.plan_changes(fields) {
        if let Some(sql) = change.to_sql(dialect, table) {
            conn.execute(&sql, &[]).await?;
            tracing::info!(table, change = ?change, "Altered table");
        }
        schema.apply(&change);
    }
    Ok(())
}
