//! Mutation pipeline: validate, stamp, persist, invalidate. This is the one
//! path where store failures propagate to the caller.

use crate::config::ValidationMode;
use crate::db::Database;
use crate::error::{DbError, StoreError};
use crate::record::{FieldMap, Record};
use crate::schema::{EntityDescriptor, PropertyDef};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Fields the generic update path never changes once set.
const UNCHANGING_FIELDS: &[&str] = &["uuid", "created_at"];

pub(crate) async fn create(
    db: &Database,
    entity: &Arc<EntityDescriptor>,
    fields: FieldMap,
) -> Result<Record, DbError> {
    let (columns, properties) = validate(db, entity, fields)?;

    let mut record = Record::new(entity.clone(), FieldMap::new());
    let now = Utc::now().to_rfc3339();
    record.set("uuid", uuid::Uuid::new_v4().to_string());
    record.set("created_at", now.clone());
    if entity.has_updated_at() {
        record.set("updated_at", now);
    }
    if entity.soft_delete() {
        record.set("dead", false);
    }
    for (field, value) in columns {
        record.set(&field, value);
    }
    if entity.has_slug() && is_unset(record.get("slug")) {
        if let Some(name) = record.get("name").and_then(Value::as_str) {
            let slug = parameterize(name);
            record.set("slug", slug);
        }
    }
    for (property, value) in properties {
        property.set(db, &mut record, value).await?;
    }

    let stored = persist(db, entity, db.store().insert(entity, record.values()).await)?;
    let record = Record::new(entity.clone(), stored);
    // eviction accompanies every save
    db.cache().delete(record.uuid(), entity.name());
    Ok(record)
}

pub(crate) async fn update(
    db: &Database,
    entity: &Arc<EntityDescriptor>,
    record: &Record,
    fields: FieldMap,
) -> Result<Record, DbError> {
    let (columns, properties) = validate(db, entity, fields)?;

    let mut changes = FieldMap::new();
    let mut changed = false;
    for (field, value) in columns {
        if UNCHANGING_FIELDS.contains(&field.as_str()) {
            continue;
        }
        changes.insert(field, value);
        changed = true;
    }
    if !properties.is_empty() {
        // setters fan out onto a working copy; their column effects fold
        // into the change set
        let mut working = record.clone();
        for (property, value) in properties {
            property.set(db, &mut working, value).await?;
            changed = true;
        }
        for (field, value) in working.values() {
            if UNCHANGING_FIELDS.contains(&field.as_str()) {
                continue;
            }
            if record.get(field) != Some(value) {
                changes.insert(field.clone(), value.clone());
            }
        }
    }
    if !changed {
        return Ok(record.clone());
    }
    if entity.has_updated_at() && !changes.contains_key("updated_at") {
        changes.insert(
            "updated_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
    if changes.is_empty() {
        return Ok(record.clone());
    }

    let stored = persist(
        db,
        entity,
        db.store().update(entity, record.uuid(), &changes).await,
    )?;
    db.cache().delete(record.uuid(), entity.name());
    Ok(Record::new(entity.clone(), stored))
}

pub(crate) async fn hard_delete(
    db: &Database,
    entity: &Arc<EntityDescriptor>,
    record: &Record,
) -> Result<(), DbError> {
    // eviction precedes the store call on the physical-delete path
    db.cache().delete(record.uuid(), entity.name());
    persist(db, entity, db.store().delete(entity, record.uuid()).await)?;
    Ok(())
}

/// Partition the incoming field set into columns and property applications.
/// Unknown fields are collected so one call reports every violation; strict
/// mode raises, lenient mode logs each and proceeds with the rest.
fn validate(
    db: &Database,
    entity: &EntityDescriptor,
    fields: FieldMap,
) -> Result<(Vec<(String, Value)>, Vec<(Arc<dyn PropertyDef>, Value)>), DbError> {
    let mut unknown = Vec::new();
    let mut columns = Vec::new();
    let mut properties = Vec::new();
    for (field, value) in fields {
        if entity.has_column(&field) {
            columns.push((field, value));
        } else if let Some(property) = entity.property(&field) {
            properties.push((property.clone(), value));
        } else {
            unknown.push(field);
        }
    }
    if !unknown.is_empty() {
        match db.config().validation {
            ValidationMode::Strict => {
                return Err(DbError::Validation {
                    entity: entity.name().to_string(),
                    fields: unknown,
                });
            }
            ValidationMode::Lenient => {
                for field in &unknown {
                    db.report_error(&format!(
                        "{}: '{}' is not a column or writable property",
                        entity.name(),
                        field
                    ));
                }
            }
        }
    }
    Ok((columns, properties))
}

fn persist<T>(
    db: &Database,
    entity: &EntityDescriptor,
    result: Result<T, StoreError>,
) -> Result<T, DbError> {
    result.map_err(|err| {
        db.report_error(&format!("{}: write failed: {}", entity.name(), err));
        DbError::Persistence(err)
    })
}

fn is_unset(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

/// Parameterized form of a name: lowercased, runs of anything else collapsed
/// to single dashes.
fn parameterize(name: &str) -> String {
    let lowered = name.to_lowercase();
    match Regex::new("[^a-z0-9]+") {
        Ok(re) => re.replace_all(&lowered, "-").trim_matches('-').to_string(),
        Err(_) => lowered,
    }
}
