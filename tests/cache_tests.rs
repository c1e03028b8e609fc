mod common;

use anyhow::Result;
use opstore::{Database, DbConfig, Fields, MemoryCache, MemoryStore, ObjectCache, Query};
use serde_json::json;
use std::sync::Arc;

fn build_db_with_cache() -> Result<(Database, Arc<MemoryCache>)> {
    let cache = Arc::new(MemoryCache::new());
    let db = Database::builder()
        .store(Arc::new(MemoryStore::new()))
        .cache(cache.clone())
        .config(DbConfig::for_tests())
        .register(common::deploy_descriptor()?)?
        .register(common::service_descriptor()?)?
        .build();
    Ok((db, cache))
}

#[tokio::test]
async fn population_only_happens_on_explicit_cache_calls() -> Result<()> {
    let (db, cache) = build_db_with_cache()?;
    let deploys = db.entity("deploy")?;

    let created = deploys.create(Fields::new().set("name", "api")).await?;
    // a plain read does not populate
    deploys
        .get(Query::new().filter("uuid", created.uuid()))
        .await
        .expect("row exists");
    assert!(cache.get(created.uuid(), "deploy").is_none());

    deploys.cache(&created);
    assert!(cache.get(created.uuid(), "deploy").is_some());
    Ok(())
}

#[tokio::test]
async fn sole_uuid_lookup_prefers_the_cache() -> Result<()> {
    let (db, _cache) = build_db_with_cache()?;
    let deploys = db.entity("deploy")?;

    let created = deploys
        .create(Fields::new().set("name", "api").set("status", "running"))
        .await?;
    deploys
        .update(&created, Fields::new().set("status", "done"))
        .await?;

    // cache the pre-update instance; the uuid lookup must serve it as-is
    deploys.cache(&created);
    let hit = deploys
        .get(Query::new().filter("uuid", created.uuid()))
        .await
        .expect("cached row");
    assert_eq!(hit.get("status"), Some(&json!("running")));

    // any other constraint shape bypasses the cache
    let by_name = deploys
        .get(Query::new().filter("name", "api"))
        .await
        .expect("stored row");
    assert_eq!(by_name.get("status"), Some(&json!("done")));
    let by_uuid_and_status = deploys
        .get(
            Query::new()
                .filter("uuid", created.uuid())
                .filter("status", "done"),
        )
        .await
        .expect("stored row");
    assert_eq!(by_uuid_and_status.get("status"), Some(&json!("done")));

    deploys.uncache(&created);
    let fresh = deploys
        .get(Query::new().filter("uuid", created.uuid()))
        .await
        .expect("stored row");
    assert_eq!(fresh.get("status"), Some(&json!("done")));
    Ok(())
}

#[tokio::test]
async fn update_evicts_the_cache_entry() -> Result<()> {
    let (db, cache) = build_db_with_cache()?;
    let deploys = db.entity("deploy")?;

    let created = deploys
        .create(Fields::new().set("name", "api").set("status", "running"))
        .await?;
    deploys.cache(&created);

    deploys
        .update(&created, Fields::new().set("status", "done"))
        .await?;
    // never stale-but-present: the pre-update state is gone
    assert!(cache.get(created.uuid(), "deploy").is_none());
    Ok(())
}

#[tokio::test]
async fn logical_and_physical_deletes_both_evict() -> Result<()> {
    let (db, cache) = build_db_with_cache()?;

    let deploys = db.entity("deploy")?;
    let deploy = deploys.create(Fields::new().set("name", "api")).await?;
    deploys.cache(&deploy);
    deploys.delete(&deploy).await?;
    assert!(cache.get(deploy.uuid(), "deploy").is_none());

    let services = db.entity("service")?;
    let service = services.create(Fields::new().set("name", "payments")).await?;
    services.cache(&service);
    services.delete(&service).await?;
    assert!(cache.get(service.uuid(), "service").is_none());
    assert!(services
        .get(Query::new().filter("uuid", service.uuid()))
        .await
        .is_none());
    Ok(())
}
