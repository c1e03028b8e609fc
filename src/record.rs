//! Materialized entity instances.

use crate::schema::EntityDescriptor;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Ordered field-name → value map, used for rows and incoming field sets.
pub type FieldMap = Map<String, Value>;

/// Timestamp columns rendered by `to_dict`, in the transport format.
const DICT_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Incoming field set for `create`/`update`, built fluently:
///
/// ```ignore
/// deploys.create(Fields::new().set("name", "api").set("status", "running")).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Fields(FieldMap);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> FieldMap {
        self.0
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Fields> for FieldMap {
    fn from(fields: Fields) -> Self {
        fields.0
    }
}

impl From<FieldMap> for Fields {
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

/// A materialized entity: its descriptor plus current column values.
///
/// Instances come out of the mutation pipeline (`create`) or the query
/// engine/object cache; they are never assembled ad hoc by callers.
#[derive(Clone)]
pub struct Record {
    descriptor: Arc<EntityDescriptor>,
    values: FieldMap,
}

impl Record {
    pub(crate) fn new(descriptor: Arc<EntityDescriptor>, values: FieldMap) -> Self {
        Self { descriptor, values }
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    pub fn entity_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn uuid(&self) -> &str {
        self.values
            .get("uuid")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Write a column value on the in-memory instance. Persistence still
    /// goes through the update pipeline; this is for property setters.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.values.insert(field.to_string(), value.into());
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("created_at")
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("updated_at")
    }

    /// True when the type is soft-deletable and this row is logically deleted.
    pub fn is_dead(&self) -> bool {
        self.descriptor.soft_delete()
            && self
                .values
                .get("dead")
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    /// Columns in declaration order, timestamps formatted for transport.
    pub fn to_dict(&self) -> FieldMap {
        let mut dict = FieldMap::new();
        for column in self.descriptor.columns() {
            let value = self.values.get(column).cloned().unwrap_or(Value::Null);
            dict.insert(column.to_string(), value);
        }
        for column in ["created_at", "updated_at"] {
            if let Some(stamp) = self.timestamp(column) {
                dict.insert(
                    column.to_string(),
                    Value::String(stamp.format(DICT_DATE_FORMAT).to_string()),
                );
            }
        }
        dict
    }

    pub(crate) fn values(&self) -> &FieldMap {
        &self.values
    }

    fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        let raw = self.values.get(field)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} ", self.descriptor.name())?;
        f.debug_map().entries(self.values.iter()).finish()?;
        write!(f, ">")
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dict = self.to_dict();
        let mut map = serializer.serialize_map(Some(dict.len()))?;
        for (key, value) in &dict {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
