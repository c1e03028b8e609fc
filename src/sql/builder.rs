//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from an entity
//! descriptor and a resolved query plan.

use crate::query::QueryPlan;
use crate::record::FieldMap;
use crate::schema::EntityDescriptor;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: names come from registered schemas).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: &str, entity: &EntityDescriptor) -> String {
    format!("{}.{}", quoted(schema), quoted(entity.table_name()))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

fn column_list(entity: &EntityDescriptor) -> String {
    entity
        .columns()
        .map(quoted)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$n`, with a SQL cast when the column declares a type (so string-form
/// uuids and timestamps bind correctly).
fn placeholder(entity: &EntityDescriptor, column: &str, n: u32) -> String {
    entity
        .column(column)
        .and_then(|c| c.pg_type.as_deref())
        .map(|t| format!("${}::{}", n, t))
        .unwrap_or_else(|| format!("${}", n))
}

/// WHERE clause from the plan: membership predicates first, then equality.
fn where_clause(entity: &EntityDescriptor, plan: &QueryPlan, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for (column, values) in &plan.membership {
        let placeholders: Vec<String> = values
            .iter()
            .map(|v| {
                let n = q.push_param(v.clone());
                placeholder(entity, column, n)
            })
            .collect();
        parts.push(format!("{} IN ({})", quoted(column), placeholders.join(", ")));
    }
    for (column, value) in &plan.equals {
        let n = q.push_param(value.clone());
        parts.push(format!("{} = {}", quoted(column), placeholder(entity, column, n)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(plan: &QueryPlan) -> String {
    match &plan.sort {
        Some(sort) => {
            let direction = if sort.desc { "DESC" } else { "ASC" };
            format!(" ORDER BY {} {} NULLS LAST", quoted(&sort.field), direction)
        }
        None => String::new(),
    }
}

fn limit_offset_clause(plan: &QueryPlan) -> String {
    let mut clause = String::new();
    if let Some(limit) = plan.limit {
        clause.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = plan.offset {
        clause.push_str(&format!(" OFFSET {}", offset));
    }
    clause
}

/// SELECT with filters, sort (nulls last), and limit/offset from the plan.
pub fn select_list(schema: &str, entity: &EntityDescriptor, plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity);
    let where_clause = where_clause(entity, plan, &mut q);
    let select = if plan.distinct { "SELECT DISTINCT" } else { "SELECT" };
    q.sql = format!(
        "{} {} FROM {}{}{}{}",
        select,
        column_list(entity),
        table,
        where_clause,
        order_clause(plan),
        limit_offset_clause(plan)
    );
    q
}

/// COUNT over the same constrained row set, as a subquery so limit/offset
/// and distinct bound what gets counted.
pub fn select_count(schema: &str, entity: &EntityDescriptor, plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity);
    let where_clause = where_clause(entity, plan, &mut q);
    let select = if plan.distinct { "SELECT DISTINCT" } else { "SELECT" };
    q.sql = format!(
        "SELECT COUNT(*) FROM ({} {} FROM {}{}{}) AS counted",
        select,
        column_list(entity),
        table,
        where_clause,
        limit_offset_clause(plan)
    );
    q
}

/// INSERT of a fully stamped row, RETURNING all columns so server-computed
/// defaults come back with the result.
pub fn insert(schema: &str, entity: &EntityDescriptor, row: &FieldMap) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity);
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    for spec in entity.column_specs() {
        let Some(value) = row.get(&spec.name) else { continue };
        let n = q.push_param(value.clone());
        columns.push(quoted(&spec.name));
        placeholders.push(placeholder(entity, &spec.name, n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        column_list(entity)
    );
    q
}

/// UPDATE by uuid: SET only the changed columns, RETURNING the full row.
pub fn update_by_uuid(
    schema: &str,
    entity: &EntityDescriptor,
    uuid: &str,
    changes: &FieldMap,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity);
    let mut sets = Vec::new();
    for (column, value) in changes {
        if column == "uuid" || !entity.has_column(column) {
            continue;
        }
        let n = q.push_param(value.clone());
        sets.push(format!("{} = {}", quoted(column), placeholder(entity, column, n)));
    }
    let n = q.push_param(Value::String(uuid.to_string()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        quoted("uuid"),
        placeholder(entity, "uuid", n),
        column_list(entity)
    );
    q
}

/// DELETE by uuid.
pub fn delete_by_uuid(schema: &str, entity: &EntityDescriptor, uuid: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity);
    let n = q.push_param(Value::String(uuid.to_string()));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table,
        quoted("uuid"),
        placeholder(entity, "uuid", n)
    );
    q
}

/// Remove every row. The test-environment guard lives in the facade.
pub fn truncate(schema: &str, entity: &EntityDescriptor) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("DELETE FROM {}", qualified_table(schema, entity));
    q
}
