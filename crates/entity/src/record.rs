//! Records - the storage-side representation of one table row

use indexmap::IndexMap;
use serde::Serialize;

use crate::backends::DatabaseRow;
use crate::security::{attribute_key, PRIMARY_KEY_COLUMN};
use crate::value::Value;

/// One row of a table: its table name, its primary key once stored, and its
/// other columns in order. Column names are lowercased.
///
/// A record without an id is either freshly dispensed or the result of
/// loading a key that does not exist; the two are not distinguished.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    table: String,
    id: Option<i64>,
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Dispense an empty, unsaved record for `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: None,
            fields: IndexMap::new(),
        }
    }

    /// Build a record from a result row. The primary key column becomes the
    /// id, normalized to an integer whatever representation the backend used.
    pub fn from_row(table: impl Into<String>, row: DatabaseRow) -> Self {
        let mut record = Self::new(table);
        for (column, value) in row.into_columns() {
            if column.eq_ignore_ascii_case(PRIMARY_KEY_COLUMN) {
                record.id = value.as_i64();
            } else {
                record.fields.insert(attribute_key(&column), value);
            }
        }
        record
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// Whether the record has been persisted
    pub fn is_stored(&self) -> bool {
        self.id.is_some()
    }

    /// No id and no fields
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(&attribute_key(name))
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<Value>) {
        self.fields.insert(attribute_key(name.as_ref()), value.into());
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }
}
