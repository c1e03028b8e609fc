//! Entity descriptors: field layout fixed at registration time.

use crate::db::Database;
use crate::error::{DbError, SchemaError};
use crate::record::Record;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One persisted column on an entity type.
#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub name: String,
    /// PostgreSQL type name used for SQL casts when binding (e.g. "timestamptz").
    pub pg_type: Option<String>,
}

/// A writable computed property. Setting it fans out to one or more columns
/// (e.g. a human-readable name resolves to a stored foreign uuid); a
/// property can also derive a readable value for transport serialization.
#[async_trait]
pub trait PropertyDef: Send + Sync {
    fn name(&self) -> &str;

    /// Apply the incoming value to the record's columns. May consult the
    /// database, e.g. to resolve a name into a foreign key.
    async fn set(&self, db: &Database, record: &mut Record, value: Value) -> Result<(), DbError>;

    /// Derive the readable value. `None` marks the property write-only.
    async fn get(&self, db: &Database, record: &Record) -> Result<Option<Value>, DbError> {
        let _ = (db, record);
        Ok(None)
    }
}

/// Field layout of one entity type. Columns and writable properties are
/// declared once, at registration; the `dead`/`updated_at`/`slug`
/// conventions are resolved here instead of being re-checked per call.
pub struct EntityDescriptor {
    name: String,
    table_name: String,
    columns: Vec<ColumnSpec>,
    properties: Vec<Arc<dyn PropertyDef>>,
    soft_delete: bool,
    has_updated_at: bool,
    has_slug: bool,
}

impl EntityDescriptor {
    pub fn builder(name: &str, table_name: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.to_string(),
            table_name: table_name.to_string(),
            columns: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Persisted column names, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_specs(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names of the writable computed properties.
    pub fn writable_properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name())
    }

    pub fn property(&self, name: &str) -> Option<&Arc<dyn PropertyDef>> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// The Field Set: columns plus writable properties. Incoming field sets
    /// for create/update must be a subset of this.
    pub fn is_field(&self, name: &str) -> bool {
        self.has_column(name) || self.property(name).is_some()
    }

    /// Whether `delete` is a logical delete (`dead = true`) for this type.
    pub fn soft_delete(&self) -> bool {
        self.soft_delete
    }

    pub fn has_updated_at(&self) -> bool {
        self.has_updated_at
    }

    pub fn has_slug(&self) -> bool {
        self.has_slug
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("table_name", &self.table_name)
            .field("columns", &self.columns.iter().map(|c| &c.name).collect::<Vec<_>>())
            .field(
                "properties",
                &self.properties.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

pub struct DescriptorBuilder {
    name: String,
    table_name: String,
    columns: Vec<ColumnSpec>,
    properties: Vec<Arc<dyn PropertyDef>>,
}

impl DescriptorBuilder {
    /// Inherit the parent's columns and writable properties. Explicit schema
    /// composition: the child may add its own on top.
    pub fn extends(mut self, parent: &EntityDescriptor) -> Self {
        self.columns.extend(parent.columns.iter().cloned());
        self.properties.extend(parent.properties.iter().cloned());
        self
    }

    pub fn column(mut self, name: &str) -> Self {
        self.columns.push(ColumnSpec {
            name: name.to_string(),
            pg_type: None,
        });
        self
    }

    /// Column with a PostgreSQL type name, used for SQL casts when binding.
    pub fn typed_column(mut self, name: &str, pg_type: &str) -> Self {
        self.columns.push(ColumnSpec {
            name: name.to_string(),
            pg_type: Some(pg_type.to_string()),
        });
        self
    }

    pub fn property(mut self, property: Arc<dyn PropertyDef>) -> Self {
        self.properties.push(property);
        self
    }

    pub fn build(self) -> Result<EntityDescriptor, SchemaError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity: self.name.clone(),
                    field: column.name.clone(),
                });
            }
        }
        for property in &self.properties {
            if !seen.insert(property.name()) {
                return Err(SchemaError::DuplicateField {
                    entity: self.name.clone(),
                    field: property.name().to_string(),
                });
            }
        }
        for required in ["uuid", "created_at"] {
            if !self.columns.iter().any(|c| c.name == required) {
                return Err(SchemaError::MissingRequiredColumn {
                    entity: self.name.clone(),
                    column: required,
                });
            }
        }
        let soft_delete = self.columns.iter().any(|c| c.name == "dead");
        let has_updated_at = self.columns.iter().any(|c| c.name == "updated_at");
        let has_slug = self.columns.iter().any(|c| c.name == "slug");
        Ok(EntityDescriptor {
            name: self.name,
            table_name: self.table_name,
            columns: self.columns,
            properties: self.properties,
            soft_delete,
            has_updated_at,
            has_slug,
        })
    }
}
