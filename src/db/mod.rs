//! The active-record facade: `Database`, its builder, and per-entity-type
//! handles. The handle method set is the sole interface other subsystems use
//! to reach storage.

mod read;
mod write;

use crate::cache::{MemoryCache, ObjectCache};
use crate::config::{DbConfig, Environment};
use crate::error::{DbError, SchemaError};
use crate::query::Query;
use crate::record::{Fields, Record};
use crate::report::{ErrorReporter, NoopReporter};
use crate::schema::{EntityDescriptor, SchemaRegistry};
use crate::store::{MemoryStore, Store};
use std::sync::Arc;

/// Shared handle on the data layer. Cheap to clone; the store, cache, and
/// schema registry live behind `Arc`s shared across request workers.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    cache: Arc<dyn ObjectCache>,
    registry: SchemaRegistry,
    config: DbConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl Database {
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder {
            store: None,
            cache: None,
            registry: SchemaRegistry::new(),
            config: None,
            reporter: None,
        }
    }

    /// Per-entity-type handle for a registered entity.
    pub fn entity(&self, name: &str) -> Result<EntityHandle, DbError> {
        let entity = self
            .inner
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::UnknownEntity(name.to_string()))?;
        Ok(EntityHandle {
            db: self.clone(),
            entity,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub(crate) fn cache(&self) -> &dyn ObjectCache {
        self.inner.cache.as_ref()
    }

    /// Error-severity log plus external notification.
    pub(crate) fn report_error(&self, message: &str) {
        tracing::error!("{message}");
        self.inner.reporter.notify(message);
    }
}

/// Assembles a `Database` at startup: store and cache services, config, and
/// the entity descriptors. Defaults to an in-memory store and cache.
pub struct DatabaseBuilder {
    store: Option<Arc<dyn Store>>,
    cache: Option<Arc<dyn ObjectCache>>,
    registry: SchemaRegistry,
    config: Option<DbConfig>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl DatabaseBuilder {
    pub fn store(mut self, store: impl Store + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn cache(mut self, cache: impl ObjectCache + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn config(mut self, config: DbConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    pub fn register(mut self, descriptor: EntityDescriptor) -> Result<Self, SchemaError> {
        self.registry.register(descriptor)?;
        Ok(self)
    }

    pub fn build(self) -> Database {
        Database {
            inner: Arc::new(Inner {
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
                registry: self.registry,
                config: self.config.unwrap_or_default(),
                reporter: self.reporter.unwrap_or_else(|| Arc::new(NoopReporter)),
            }),
        }
    }
}

/// Per-entity-type convenience surface.
///
/// Reads are dead-flag aware: for soft-deletable types, `dead = false` is
/// added to the constraints unless the caller filters on `dead` explicitly.
/// Reads degrade to an absent result on failure; writes return `Result`.
#[derive(Clone)]
pub struct EntityHandle {
    db: Database,
    entity: Arc<EntityDescriptor>,
}

impl EntityHandle {
    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    /// First match for the constraints, if any.
    ///
    /// When the constraint is solely a `uuid` equality, the object cache is
    /// consulted before the store; any other constraint shape bypasses it.
    pub async fn get(&self, query: Query) -> Option<Record> {
        if let Some(uuid) = query.sole_uuid_equality() {
            if let Some(hit) = self.db.cache().get(uuid, self.entity.name()) {
                return Some(hit);
            }
        }
        read::find(&self.db, &self.entity, self.scoped(query)).await
    }

    /// `get`, with absence promoted to `DbError::NotFound` for callers that
    /// require existence.
    pub async fn get_required(&self, query: Query) -> Result<Record, DbError> {
        self.get(query).await.ok_or_else(|| DbError::NotFound {
            entity: self.entity.name().to_string(),
        })
    }

    pub async fn get_list(&self, query: Query) -> Vec<Record> {
        read::find_many(&self.db, &self.entity, self.scoped(query)).await
    }

    pub async fn paginate(&self, page: u64, num_per_page: u64, query: Query) -> Vec<Record> {
        self.get_list(query.page(page).num_per_page(num_per_page))
            .await
    }

    pub async fn count(&self, query: Query) -> u64 {
        read::count(&self.db, &self.entity, self.scoped(query)).await
    }

    pub async fn create(&self, fields: Fields) -> Result<Record, DbError> {
        write::create(&self.db, &self.entity, fields.into_map()).await
    }

    /// `get` with the fields as constraints, `create` from them on a miss.
    ///
    /// Not atomic: two concurrent callers can both miss and both create.
    /// Callers needing strict uniqueness enforce it with a store-level
    /// unique constraint.
    pub async fn get_or_create(&self, fields: Fields) -> Result<Record, DbError> {
        let mut query = Query::new();
        for (field, value) in fields.iter() {
            query = query.filter(field, value.clone());
        }
        if let Some(existing) = self.get(query).await {
            return Ok(existing);
        }
        self.create(fields).await
    }

    pub async fn update(&self, record: &Record, fields: Fields) -> Result<Record, DbError> {
        write::update(&self.db, &self.entity, record, fields.into_map()).await
    }

    /// Logical delete (`dead = true`) for soft-deletable types, physical row
    /// removal otherwise. Either way the cache entry is evicted.
    pub async fn delete(&self, record: &Record) -> Result<(), DbError> {
        if self.entity.soft_delete() {
            write::update(
                &self.db,
                &self.entity,
                record,
                Fields::new().set("dead", true).into_map(),
            )
            .await?;
            Ok(())
        } else {
            write::hard_delete(&self.db, &self.entity, record).await
        }
    }

    /// Delete every match for the constraints. Returns how many went.
    pub async fn delete_all(&self, query: Query) -> Result<u64, DbError> {
        let records = self.get_list(query).await;
        let mut deleted = 0;
        for record in &records {
            self.delete(record).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Remove every row, bypassing the `dead` column. Only for tests; any
    /// other environment gets `DbError::TruncateOutsideTests`.
    pub async fn truncate(&self) -> Result<(), DbError> {
        if self.db.config().environment != Environment::Test {
            return Err(DbError::TruncateOutsideTests);
        }
        self.db
            .store()
            .truncate(&self.entity)
            .await
            .map_err(DbError::Persistence)
    }

    /// Put the record in the object cache. Population is only ever explicit.
    pub fn cache(&self, record: &Record) {
        let uuid = record.uuid();
        if uuid.is_empty() {
            return;
        }
        self.db.cache().set(uuid, record.clone(), self.entity.name());
    }

    pub fn uncache(&self, record: &Record) {
        self.db.cache().delete(record.uuid(), self.entity.name());
    }

    fn scoped(&self, query: Query) -> Query {
        if self.entity.soft_delete() && !query.has_filter("dead") {
            query.filter("dead", false)
        } else {
            query
        }
    }
}
