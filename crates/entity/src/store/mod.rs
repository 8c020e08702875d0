//! Record store
//!
//! Dispense, load, store, find and count records of any table over a live
//! [`DatabaseConnection`]. The store never opens or closes the connection
//! itself; the [`ConnectionManager`](crate::ConnectionManager) does.

pub mod schema;

use indexmap::IndexMap;

use crate::backends::{DatabaseConnection, SqlDialect};
use crate::error::{EntityError, EntityResult};
use crate::record::Record;
use crate::security::{table_name, validate_attribute_name, PRIMARY_KEY_COLUMN};
use crate::value::Value;

use self::schema::TableSchema;

/// Clauses that may open a condition without a `WHERE` in front of them
const CONDITION_CLAUSES: &[&str] = &["WHERE", "ORDER BY", "GROUP BY", "HAVING", "LIMIT"];

/// Clauses restricting how many rows a condition returns
const LIMIT_CLAUSES: &[&str] = &["LIMIT", "OFFSET", "FETCH"];

/// Record operations bound to one open connection
pub struct RecordStore<'c> {
    conn: &'c mut dyn DatabaseConnection,
    dialect: SqlDialect,
}

impl<'c> RecordStore<'c> {
    pub fn new(conn: &'c mut dyn DatabaseConnection) -> EntityResult<Self> {
        let kind = conn.kind();
        let dialect = kind.dialect().ok_or_else(|| {
            EntityError::Configuration(format!("No SQL dialect for the {} backend", kind))
        })?;
        Ok(Self { conn, dialect })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// A new, empty record for the table `name` (lowercased)
    pub fn dispense(&self, name: &str) -> EntityResult<Record> {
        Ok(Record::new(table_name(name)?))
    }

    /// Load the row with primary key `id`. A missing row, or a missing
    /// table, yields an empty record.
    pub async fn load(&mut self, name: &str, id: i64) -> EntityResult<Record> {
        let table = table_name(name)?;
        if schema::inspect(&mut *self.conn, self.dialect, &table)
            .await?
            .is_none()
        {
            return Ok(Record::new(table));
        }

        let sql = format!(
            "SELECT * FROM {} WHERE {} = {}",
            self.dialect.quote_identifier(&table),
            self.dialect.quote_identifier(PRIMARY_KEY_COLUMN),
            self.dialect.parameter_placeholder(0)
        );
        let row = self.conn.fetch_optional(&sql, &[Value::Int(id)]).await?;

        Ok(match row {
            Some(row) => Record::from_row(table, row),
            None => Record::new(table),
        })
    }

    /// Persist `record`, creating its table and columns as needed, and
    /// return its primary key. A record without an id is inserted, one with
    /// an id is updated in place.
    pub async fn store(&mut self, record: &mut Record) -> EntityResult<i64> {
        let table = table_name(record.table())?;
        for name in record.fields().keys() {
            validate_attribute_name(name)?;
        }

        let mut schema = schema::ensure_table(&mut *self.conn, self.dialect, &table).await?;
        schema::sync_columns(
            &mut *self.conn,
            self.dialect,
            &table,
            &mut schema,
            record.fields(),
        )
        .await?;

        let id = match record.id() {
            None => self.insert(&table, record.fields()).await?,
            Some(id) => {
                if let Some((sql, params)) =
                    update_statement(self.dialect, &table, id, record.fields(), &schema)
                {
                    self.conn.execute(&sql, &params).await?;
                }
                id
            }
        };

        record.set_id(id);
        tracing::debug!(table = %table, id, "Stored record");
        Ok(id)
    }

    async fn insert(&mut self, table: &str, fields: &IndexMap<String, Value>) -> EntityResult<i64> {
        let (mut sql, params) = insert_statement(self.dialect, table, fields);

        if self.dialect.supports_returning() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.dialect.quote_identifier(PRIMARY_KEY_COLUMN));
            let row = self.conn.fetch_optional(&sql, &params).await?;
            row.as_ref()
                .and_then(|row| row.get_by_index(0))
                .and_then(Value::as_i64)
                .ok_or_else(|| missing_key(table))
        } else {
            let result = self.conn.execute(&sql, &params).await?;
            result.last_insert_id.ok_or_else(|| missing_key(table))
        }
    }

    /// Rows matching a raw condition, passed to the backend unescaped.
    /// `params` bind to the backend's native placeholders in `condition`.
    ///
    /// Rows come back in primary key order unless the condition carries its
    /// own `ORDER BY`.
    pub async fn find(
        &mut self,
        name: &str,
        condition: &str,
        params: &[Value],
    ) -> EntityResult<Vec<Record>> {
        let table = table_name(name)?;
        if schema::inspect(&mut *self.conn, self.dialect, &table)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        let sql = select_statement(self.dialect, &table, condition);
        let rows = self.conn.fetch_all(&sql, params).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(table.as_str(), row))
            .collect())
    }

    /// Every row of the table, in primary key order
    pub async fn find_all(&mut self, name: &str) -> EntityResult<Vec<Record>> {
        self.find(name, "", &[]).await
    }

    /// Number of rows in the table; 0 when it does not exist
    pub async fn count(&mut self, name: &str) -> EntityResult<u64> {
        let table = table_name(name)?;
        if schema::inspect(&mut *self.conn, self.dialect, &table)
            .await?
            .is_none()
        {
            return Ok(0);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            self.dialect.quote_identifier(&table)
        );
        let row = self.conn.fetch_optional(&sql, &[]).await?;
        let count = row
            .as_ref()
            .and_then(|row| row.get_by_index(0))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn missing_key(table: &str) -> EntityError {
    EntityError::Storage(format!(
        "Insert into '{}' did not return a primary key",
        table
    ))
}

/// `INSERT` for a new row. Null fields are left to the column default.
fn insert_statement(
    dialect: SqlDialect,
    table: &str,
    fields: &IndexMap<String, Value>,
) -> (String, Vec<Value>) {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();

    for (name, value) in fields.iter().filter(|(_, value)| !value.is_null()) {
        columns.push(dialect.quote_identifier(name));
        placeholders.push(dialect.parameter_placeholder(params.len()));
        params.push(value.clone());
    }

    if columns.is_empty() {
        return (dialect.insert_default_values(table), params);
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_identifier(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    (sql, params)
}

/// `UPDATE` of an existing row, `None` when there is nothing to write.
/// Null fields without a column are skipped; they are already null.
fn update_statement(
    dialect: SqlDialect,
    table: &str,
    id: i64,
    fields: &IndexMap<String, Value>,
    schema: &TableSchema,
) -> Option<(String, Vec<Value>)> {
    let mut assignments = Vec::new();
    let mut params = Vec::new();

    for (name, value) in fields {
        if value.is_null() {
            if schema.has_column(name) {
                assignments.push(format!("{} = NULL", dialect.quote_identifier(name)));
            }
            continue;
        }
        assignments.push(format!(
            "{} = {}",
            dialect.quote_identifier(name),
            dialect.parameter_placeholder(params.len())
        ));
        params.push(value.clone());
    }

    if assignments.is_empty() {
        return None;
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        dialect.quote_identifier(table),
        assignments.join(", "),
        dialect.quote_identifier(PRIMARY_KEY_COLUMN),
        dialect.parameter_placeholder(params.len())
    );
    params.push(Value::Int(id));
    Some((sql, params))
}

/// `SELECT *` with a raw condition glued on. `WHERE` is added unless the
/// condition already starts with it or with a trailing clause such as
/// `ORDER BY` or `LIMIT`.
///
/// Without an `ORDER BY` of its own the result is ordered by primary key. A
/// condition that limits the rows is wrapped in a subquery for that, so the
/// ordering never lands after its `LIMIT`.
fn select_statement(dialect: SqlDialect, table: &str, condition: &str) -> String {
    let mut sql = format!("SELECT * FROM {}", dialect.quote_identifier(table));
    let condition = condition.trim();
    let upper = condition.to_ascii_uppercase();

    if !condition.is_empty() {
        sql.push(' ');
        if !CONDITION_CLAUSES
            .iter()
            .any(|clause| starts_with_keyword(&upper, clause))
        {
            sql.push_str("WHERE ");
        }
        sql.push_str(condition);
    }

    if contains_keyword(&upper, "ORDER BY") {
        return sql;
    }

    let order = dialect.quote_identifier(PRIMARY_KEY_COLUMN);
    if LIMIT_CLAUSES
        .iter()
        .any(|clause| contains_keyword(&upper, clause))
    {
        return format!(
            "SELECT * FROM ({}) AS {} ORDER BY {}",
            sql,
            dialect.quote_identifier("found"),
            order
        );
    }

    sql.push_str(" ORDER BY ");
    sql.push_str(&order);
    sql
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `text` opens with `keyword` as a whole word
fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .map_or(false, |rest| !rest.starts_with(is_word_char))
}

/// Whether `keyword` appears in `text` as a whole word
fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + keyword.len()..].chars().next();
        !before.map_or(false, is_word_char) && !after.map_or(false, is_word_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ColumnType;

    fn fields(values: Vec<(&str, Value)>) -> IndexMap<String, Value> {
        values
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn test_insert_statement_skips_nulls() {
        let fields = fields(vec![
            ("value1", Value::from("String 1")),
            ("note", Value::Null),
            ("value2", Value::Int(123)),
        ]);
        let (sql, params) = insert_statement(SqlDialect::PostgreSQL, "test", &fields);

        assert_eq!(
            sql,
            "INSERT INTO \"test\" (\"value1\", \"value2\") VALUES ($1, $2)"
        );
        assert_eq!(params, vec![Value::from("String 1"), Value::Int(123)]);
    }

    #[test]
    fn test_insert_statement_without_values() {
        let (sql, params) = insert_statement(SqlDialect::MySQL, "test", &IndexMap::new());
        assert_eq!(sql, "INSERT INTO `test` () VALUES ()");
        assert!(params.is_empty());
    }

    #[test]
    fn test_update_statement() {
        let schema = {
            let mut schema = TableSchema::default();
            for change in schema.plan_changes(&fields(vec![("note", Value::from("x"))])) {
                schema.apply(&change);
            }
            schema
        };
        let fields = fields(vec![
            ("value1", Value::from("changed")),
            ("note", Value::Null),
            ("missing", Value::Null),
        ]);

        let (sql, params) =
            update_statement(SqlDialect::SQLite, "test", 4, &fields, &schema).unwrap();
        assert_eq!(
            sql,
            "UPDATE \"test\" SET \"value1\" = ?, \"note\" = NULL WHERE \"id\" = ?"
        );
        assert_eq!(params, vec![Value::from("changed"), Value::Int(4)]);
        assert_eq!(schema.column_type("note"), Some(ColumnType::Text));
    }

    #[test]
    fn test_update_statement_with_nothing_to_write() {
        let fields = fields(vec![("missing", Value::Null)]);
        assert!(
            update_statement(SqlDialect::SQLite, "test", 1, &fields, &TableSchema::default())
                .is_none()
        );
    }

    #[test]
    fn test_select_statement_glues_conditions() {
        let dialect = SqlDialect::SQLite;
        assert_eq!(
            select_statement(dialect, "test", ""),
            "SELECT * FROM \"test\" ORDER BY \"id\""
        );
        assert_eq!(
            select_statement(dialect, "test", "value2 > 500"),
            "SELECT * FROM \"test\" WHERE value2 > 500 ORDER BY \"id\""
        );
        assert_eq!(
            select_statement(dialect, "test", " order by value1 "),
            "SELECT * FROM \"test\" order by value1"
        );
        assert_eq!(
            select_statement(dialect, "test", "WHERE value2 = 1"),
            "SELECT * FROM \"test\" WHERE value2 = 1 ORDER BY \"id\""
        );
        assert_eq!(
            select_statement(dialect, "quota", "limit_count > 1"),
            "SELECT * FROM \"quota\" WHERE limit_count > 1 ORDER BY \"id\""
        );
        assert_eq!(
            select_statement(dialect, "quota", "having_more = 1"),
            "SELECT * FROM \"quota\" WHERE having_more = 1 ORDER BY \"id\""
        );
        assert_eq!(
            select_statement(dialect, "quota", "where_used = 1"),
            "SELECT * FROM \"quota\" WHERE where_used = 1 ORDER BY \"id\""
        );
    }

    #[test]
    fn test_select_statement_orders_limited_rows_outside() {
        assert_eq!(
            select_statement(SqlDialect::MySQL, "test", "value2 > 1 LIMIT 2"),
            "SELECT * FROM (SELECT * FROM `test` WHERE value2 > 1 LIMIT 2) AS `found` ORDER BY `id`"
        );
        assert_eq!(
            select_statement(SqlDialect::SQLite, "test", "ORDER BY value2 DESC LIMIT 2"),
            "SELECT * FROM \"test\" ORDER BY value2 DESC LIMIT 2"
        );
        assert_eq!(
            select_statement(SqlDialect::PostgreSQL, "test", "offset_days > 3"),
            "SELECT * FROM \"test\" WHERE offset_days > 3 ORDER BY \"id\""
        );
    }

    #[test]
    fn test_keyword_matching_needs_whole_words() {
        assert!(starts_with_keyword("LIMIT 5", "LIMIT"));
        assert!(starts_with_keyword("LIMIT", "LIMIT"));
        assert!(!starts_with_keyword("LIMIT_COUNT > 1", "LIMIT"));
        assert!(contains_keyword("A > 1 ORDER BY B", "ORDER BY"));
        assert!(!contains_keyword("REORDER BYTES", "ORDER BY"));
        assert!(!contains_keyword("MY_LIMIT > 1", "LIMIT"));
    }
}
