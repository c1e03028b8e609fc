//! PostgreSQL store backend over sqlx. The production store.

use crate::error::StoreError;
use crate::query::QueryPlan;
use crate::record::FieldMap;
use crate::schema::EntityDescriptor;
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::store::Store;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::{Duration, Instant};

/// Statements slower than this are logged at warn level.
const SLOW_STATEMENT: Duration = Duration::from_secs(1);

/// Table schema for entity tables. From env `OPSTORE_SCHEMA`, default `public`.
pub fn table_schema() -> String {
    std::env::var("OPSTORE_SCHEMA").unwrap_or_else(|_| "public".into())
}

/// Shared connection pool plus the schema entity tables live in.
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    /// Connect using `DATABASE_URL` (dotenv-aware).
    pub async fn from_env() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Backend("DATABASE_URL is not set".into()))?;
        Self::connect(&url).await
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema: table_schema(),
        }
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let started = Instant::now();
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        observe(&q.sql, started);
        Ok(rows)
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let started = Instant::now();
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        observe(&q.sql, started);
        Ok(row)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<(), StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let started = Instant::now();
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query.execute(&self.pool).await?;
        observe(&q.sql, started);
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(
        &self,
        entity: &EntityDescriptor,
        plan: &QueryPlan,
    ) -> Result<Vec<FieldMap>, StoreError> {
        let q = sql::select_list(&self.schema, entity, plan);
        let rows = self.fetch_all(&q).await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn count(&self, entity: &EntityDescriptor, plan: &QueryPlan) -> Result<u64, StoreError> {
        let q = sql::select_count(&self.schema, entity, plan);
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Backend("count returned no row".into()))?;
        let count: i64 = row.try_get(0).map_err(StoreError::Db)?;
        Ok(count.max(0) as u64)
    }

    async fn insert(
        &self,
        entity: &EntityDescriptor,
        row: &FieldMap,
    ) -> Result<FieldMap, StoreError> {
        let q = sql::insert(&self.schema, entity, row);
        let stored = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Backend("insert returned no row".into()))?;
        Ok(decode_row(&stored))
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        uuid: &str,
        changes: &FieldMap,
    ) -> Result<FieldMap, StoreError> {
        let q = sql::update_by_uuid(&self.schema, entity, uuid, changes);
        let stored = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::RowMissing {
                entity: entity.name().to_string(),
                uuid: uuid.to_string(),
            })?;
        Ok(decode_row(&stored))
    }

    async fn delete(&self, entity: &EntityDescriptor, uuid: &str) -> Result<(), StoreError> {
        let q = sql::delete_by_uuid(&self.schema, entity, uuid);
        self.execute(&q).await
    }

    async fn truncate(&self, entity: &EntityDescriptor) -> Result<(), StoreError> {
        let q = sql::truncate(&self.schema, entity);
        self.execute(&q).await
    }
}

fn observe(sql: &str, started: Instant) {
    let elapsed = started.elapsed();
    if elapsed > SLOW_STATEMENT {
        tracing::warn!(sql = %sql, elapsed_ms = elapsed.as_millis() as u64, "slow statement");
    }
}

fn decode_row(row: &PgRow) -> FieldMap {
    use sqlx::Column;
    let mut map = FieldMap::new();
    for column in row.columns() {
        let name = column.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

/// Decode one cell into its JSON shape; timestamps come back as RFC 3339
/// strings, uuids as strings.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(v) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(v)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(v.to_rfc3339());
    }
    if let Ok(Some(v)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(v.and_utc().to_rfc3339());
    }
    if let Ok(Some(v)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(v.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Value>, _>(name) {
        return v;
    }
    Value::Null
}
