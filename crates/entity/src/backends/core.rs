//! Core Database Backend Traits
//!
//! The connection trait, the decoded row type and the SQL dialect used to
//! generate backend-specific statements.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::BackendKind;
use crate::error::EntityResult;
use crate::value::Value;

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    pub rows_affected: u64,
    /// Generated key of the last inserted row, where the backend reports one
    pub last_insert_id: Option<i64>,
}

/// Abstract database connection trait
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Backend this connection talks to
    fn kind(&self) -> BackendKind;

    /// Execute a statement and return the affected row count
    async fn execute(&mut self, sql: &str, params: &[Value]) -> EntityResult<ExecuteResult>;

    /// Execute a query and return the result rows
    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> EntityResult<Vec<DatabaseRow>>;

    /// Execute a query and return the first result row
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> EntityResult<Option<DatabaseRow>>;

    /// Check that the connection is still alive
    async fn ping(&mut self) -> EntityResult<()>;

    /// Close the connection
    async fn close(&mut self) -> EntityResult<()>;
}

/// A fully decoded result row, columns in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: IndexMap<String, Value>,
}

impl DatabaseRow {
    pub fn new(columns: IndexMap<String, Value>) -> Self {
        Self { columns }
    }

    /// Get a column value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.columns.get_index(index).map(|(_, value)| value)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Consume the row, yielding `(column, value)` pairs in select order
    pub fn into_columns(self) -> impl Iterator<Item = (String, Value)> {
        self.columns.into_iter()
    }

    /// Convert row to JSON value
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl FromIterator<(String, Value)> for DatabaseRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Storage type of a column, ordered from narrowest to widest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnType {
    Integer,
    Double,
    Text,
}

impl ColumnType {
    /// Narrowest column type able to hold `value`. Null fits anywhere.
    pub fn for_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) | Value::Int(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Double),
            Value::String(_) => Some(ColumnType::Text),
        }
    }

    /// Classify a type name reported by the backend's catalog
    pub fn from_sql_type(sql_type: &str) -> Self {
        let sql_type = sql_type.to_ascii_lowercase();
        if sql_type.contains("int") || sql_type.contains("bool") {
            ColumnType::Integer
        } else if ["real", "double", "float", "numeric", "decimal"]
            .iter()
            .any(|t| sql_type.contains(t))
        {
            ColumnType::Double
        } else {
            ColumnType::Text
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => '"',
            SqlDialect::MySQL => '`',
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = identifier.replace(quote, &format!("{}{}", quote, quote));
        format!("{}{}{}", quote, escaped, quote)
    }

    /// Column type used to store values of the given kind
    pub fn column_type(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (SqlDialect::SQLite, ColumnType::Integer) => "INTEGER",
            (SqlDialect::SQLite, ColumnType::Double) => "REAL",
            (SqlDialect::SQLite, ColumnType::Text) => "TEXT",
            (SqlDialect::PostgreSQL, ColumnType::Integer) => "BIGINT",
            (SqlDialect::PostgreSQL, ColumnType::Double) => "DOUBLE PRECISION",
            (SqlDialect::PostgreSQL, ColumnType::Text) => "TEXT",
            (SqlDialect::MySQL, ColumnType::Integer) => "BIGINT",
            (SqlDialect::MySQL, ColumnType::Double) => "DOUBLE",
            (SqlDialect::MySQL, ColumnType::Text) => "LONGTEXT",
        }
    }

    /// Get the auto-increment primary key column definition for this dialect
    pub fn primary_key_definition(&self, column: &str) -> String {
        let column = self.quote_identifier(column);
        match self {
            SqlDialect::PostgreSQL => format!("{} BIGSERIAL PRIMARY KEY", column),
            SqlDialect::MySQL => format!("{} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY", column),
            SqlDialect::SQLite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", column),
        }
    }

    /// Whether `INSERT ... RETURNING` can hand back the generated key
    pub fn supports_returning(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => true,
            SqlDialect::MySQL => false,
        }
    }

    /// Insert a row with every column at its default
    pub fn insert_default_values(&self, table: &str) -> String {
        let table = self.quote_identifier(table);
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => {
                format!("INSERT INTO {} DEFAULT VALUES", table)
            }
            SqlDialect::MySQL => format!("INSERT INTO {} () VALUES ()", table),
        }
    }

    /// Query listing `(column name, column type)` of a table, in column
    /// order. Takes the table name as its single parameter and returns no
    /// rows for a missing table.
    pub fn columns_query(&self) -> &'static str {
        match self {
            SqlDialect::SQLite => "SELECT name, type FROM pragma_table_info(?)",
            SqlDialect::PostgreSQL => {
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position"
            }
            SqlDialect::MySQL => {
                "SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR) \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION"
            }
        }
    }

    pub fn create_table(&self, table: &str, primary_key: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote_identifier(table),
            self.primary_key_definition(primary_key)
        )
    }

    pub fn add_column(&self, table: &str, column: &str, column_type: ColumnType) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.column_type(column_type)
        )
    }

    /// Statement changing a column to a wider type. SQLite columns accept any
    /// value regardless of their declared type, so nothing is needed there.
    pub fn widen_column(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
    ) -> Option<String> {
        let table = self.quote_identifier(table);
        let quoted_column = self.quote_identifier(column);
        let sql_type = self.column_type(column_type);
        match self {
            SqlDialect::SQLite => None,
            SqlDialect::PostgreSQL => Some(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                table, quoted_column, sql_type, quoted_column, sql_type
            )),
            SqlDialect::MySQL => Some(format!(
                "ALTER TABLE {} MODIFY COLUMN {} {}",
                table, quoted_column, sql_type
            )),
        }
    }
}
