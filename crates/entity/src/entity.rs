//! Dynamic Entities
//!
//! An [`Entity`] stands for one row of an arbitrary table. Attributes live in
//! an ordered in-memory map and are only written to storage by
//! [`Entity::save`], which flushes all of them in a single store.
//!
//! Attribute names are case-insensitive: `Title` and `title` are the same
//! attribute and the same column.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::connection::ConnectionManager;
use crate::error::EntityResult;
use crate::record::Record;
use crate::security::{attribute_key, table_name, validate_attribute_name, PRIMARY_KEY_COLUMN};
use crate::value::Value;

/// One row of a named table with dynamic attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    name: String,
    id: Option<i64>,
    attributes: IndexMap<String, Value>,
    record: Option<Record>,
}

impl Entity {
    /// Create an entity for the table `name`, connecting if needed.
    ///
    /// A fresh record is dispensed. With an `id`, that row is loaded right
    /// away (which closes the connection again).
    pub async fn new(
        db: &mut ConnectionManager,
        name: impl Into<String>,
        id: Option<i64>,
    ) -> EntityResult<Self> {
        let name = name.into();
        db.connect().await?;
        let record = db.store()?.dispense(&name)?;

        let mut entity = Self {
            name,
            id: None,
            attributes: IndexMap::new(),
            record: Some(record),
        };
        if let Some(id) = id {
            entity.load(db, id).await?;
        }
        Ok(entity)
    }

    /// A new, unsaved entity for `name`
    pub async fn dispense(db: &mut ConnectionManager, name: impl Into<String>) -> EntityResult<Self> {
        Self::new(db, name, None).await
    }

    /// The entity stored under `id` in `name`
    pub async fn with_id(
        db: &mut ConnectionManager,
        name: impl Into<String>,
        id: i64,
    ) -> EntityResult<Self> {
        Self::new(db, name, Some(id)).await
    }

    /// An uninitialized entity. Nothing touches storage until `save`, which
    /// dispenses the record on demand.
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Wrap an already fetched record without another round trip
    pub fn from_record(record: Record) -> Self {
        Self {
            name: record.table().to_string(),
            id: record.id(),
            attributes: record.fields().clone(),
            record: Some(record),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary key, once the entity has been saved or loaded
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Whether a backing record is held
    pub fn is_initialized(&self) -> bool {
        self.record.is_some()
    }

    /// The backing record, as last loaded or saved
    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(&attribute_key(name))
    }

    /// Set an attribute, returning the value it replaced
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(attribute_key(name.as_ref()), value.into())
    }

    /// Whether the attribute is present. A null attribute is present.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(&attribute_key(name))
    }

    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(&attribute_key(name))
    }

    /// String form of a non-null attribute
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|value| !value.is_null())
            .map(Value::to_string)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Attributes in the order they were first set or loaded
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// JSON object of the id followed by every attribute
    pub fn to_json(&self) -> JsonValue {
        let mut object = JsonMap::new();
        object.insert(
            PRIMARY_KEY_COLUMN.to_string(),
            self.id.map(JsonValue::from).unwrap_or(JsonValue::Null),
        );
        for (name, value) in &self.attributes {
            object.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(object)
    }

    /// Load the row `id` into this entity, replacing the backing record and
    /// overwriting attributes of the same name. A missing row leaves the id
    /// unset and adds no attributes. The connection is closed afterwards.
    pub async fn load(&mut self, db: &mut ConnectionManager, id: i64) -> EntityResult<()> {
        db.connect().await?;
        let result = match db.store() {
            Ok(mut store) => store.load(&self.name, id).await,
            Err(e) => Err(e),
        };
        let record = db.disconnect_after(result).await?;

        self.id = record.id();
        for (name, value) in record.fields() {
            self.attributes.insert(name.clone(), value.clone());
        }
        self.record = Some(record);
        Ok(())
    }

    /// Write every attribute to storage and return the primary key. The
    /// connection is closed afterwards, whether or not the store succeeded.
    ///
    /// On failure the entity is left as it was before the call.
    pub async fn save(&mut self, db: &mut ConnectionManager) -> EntityResult<i64> {
        for name in self.attributes.keys() {
            validate_attribute_name(name)?;
        }
        table_name(&self.name)?;

        db.connect().await?;
        let result = self.persist(db).await;
        let (id, record) = db.disconnect_after(result).await?;

        tracing::debug!(entity = %self.name, id, "Saved entity");
        self.id = Some(id);
        self.record = Some(record);
        Ok(id)
    }

    async fn persist(&self, db: &mut ConnectionManager) -> EntityResult<(i64, Record)> {
        let mut store = db.store()?;
        let mut record = match &self.record {
            Some(record) => record.clone(),
            None => store.dispense(&self.name)?,
        };
        for (name, value) in &self.attributes {
            record.set(name, value.clone());
        }

        let id = store.store(&mut record).await?;
        Ok((id, record))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
