//! Shared fixture: an in-memory database with the ops entities registered.

use opstore::{Database, DbConfig, EntityDescriptor, MemoryCache, MemoryStore, SchemaError};

pub fn deploy_descriptor() -> Result<EntityDescriptor, SchemaError> {
    EntityDescriptor::builder("deploy", "deploys")
        .typed_column("uuid", "uuid")
        .typed_column("created_at", "timestamptz")
        .typed_column("updated_at", "timestamptz")
        .column("name")
        .column("status")
        .typed_column("service_uuid", "uuid")
        .typed_column("dead", "boolean")
        .build()
}

pub fn service_descriptor() -> Result<EntityDescriptor, SchemaError> {
    EntityDescriptor::builder("service", "services")
        .typed_column("uuid", "uuid")
        .typed_column("created_at", "timestamptz")
        .column("name")
        .column("slug")
        .build()
}

pub fn build_db() -> anyhow::Result<Database> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    Ok(Database::builder()
        .store(MemoryStore::new())
        .cache(MemoryCache::new())
        .config(DbConfig::for_tests())
        .register(deploy_descriptor()?)?
        .register(service_descriptor()?)?
        .build())
}
