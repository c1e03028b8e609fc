//! In-memory store backend with the same query semantics as the PostgreSQL
//! one. The test and development backend.

use crate::error::StoreError;
use crate::query::QueryPlan;
use crate::record::FieldMap;
use crate::schema::EntityDescriptor;
use crate::store::Store;
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

/// Per-table row maps behind one lock, rows keyed by uuid.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, FieldMap>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows_matching(
        &self,
        entity: &EntityDescriptor,
        plan: &QueryPlan,
    ) -> Result<Vec<FieldMap>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("table lock poisoned".into()))?;
        let mut rows: Vec<FieldMap> = match tables.get(entity.table_name()) {
            Some(table) => table.values().cloned().collect(),
            None => Vec::new(),
        };
        drop(tables);

        rows.retain(|row| row_matches(row, plan));
        if let Some(sort) = &plan.sort {
            rows.sort_by(|a, b| nulls_last(a.get(&sort.field), b.get(&sort.field), sort.desc));
        }
        if plan.distinct {
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(serde_json::to_string(row).unwrap_or_default()));
        }
        let offset = plan.offset.unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(offset);
        Ok(match plan.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(
        &self,
        entity: &EntityDescriptor,
        plan: &QueryPlan,
    ) -> Result<Vec<FieldMap>, StoreError> {
        self.rows_matching(entity, plan)
    }

    async fn count(&self, entity: &EntityDescriptor, plan: &QueryPlan) -> Result<u64, StoreError> {
        Ok(self.rows_matching(entity, plan)?.len() as u64)
    }

    async fn insert(
        &self,
        entity: &EntityDescriptor,
        row: &FieldMap,
    ) -> Result<FieldMap, StoreError> {
        let uuid = row
            .get("uuid")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Backend("insert row has no uuid".into()))?
            .to_string();
        // only declared columns persist, as with an explicit column list
        let stored: FieldMap = row
            .iter()
            .filter(|(column, _)| entity.has_column(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("table lock poisoned".into()))?;
        tables
            .entry(entity.table_name().to_string())
            .or_default()
            .insert(uuid, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        uuid: &str,
        changes: &FieldMap,
    ) -> Result<FieldMap, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("table lock poisoned".into()))?;
        let row = tables
            .get_mut(entity.table_name())
            .and_then(|table| table.get_mut(uuid))
            .ok_or_else(|| StoreError::RowMissing {
                entity: entity.name().to_string(),
                uuid: uuid.to_string(),
            })?;
        for (column, value) in changes {
            if entity.has_column(column) {
                row.insert(column.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, entity: &EntityDescriptor, uuid: &str) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("table lock poisoned".into()))?;
        if let Some(table) = tables.get_mut(entity.table_name()) {
            table.remove(uuid);
        }
        Ok(())
    }

    async fn truncate(&self, entity: &EntityDescriptor) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("table lock poisoned".into()))?;
        if let Some(table) = tables.get_mut(entity.table_name()) {
            table.clear();
        }
        Ok(())
    }
}

fn row_matches(row: &FieldMap, plan: &QueryPlan) -> bool {
    for (column, values) in &plan.membership {
        let cell = row.get(column).unwrap_or(&Value::Null);
        if !values.iter().any(|v| value_eq(cell, v)) {
            return false;
        }
    }
    for (column, value) in &plan.equals {
        let cell = row.get(column).unwrap_or(&Value::Null);
        if !value_eq(cell, value) {
            return false;
        }
    }
    true
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

/// Null cells sort last regardless of direction, matching `NULLS LAST`.
fn nulls_last(a: Option<&Value>, b: Option<&Value>, desc: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = value_order(a, b);
            if desc {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

fn value_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&m.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => match (parse_timestamp(a), parse_timestamp(b)) {
            // RFC 3339 strings compare as instants, whatever their offsets
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a.cmp(b),
        },
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_micros())
}
