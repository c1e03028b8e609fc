mod common;

use anyhow::Result;
use opstore::{DbError, Fields, Query};
use serde_json::json;

#[tokio::test]
async fn create_then_get_round_trips_fields() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys
        .create(Fields::new().set("name", "api").set("status", "running"))
        .await?;
    assert!(!created.uuid().is_empty());
    assert!(created.created_at().is_some());

    let fetched = deploys
        .get(Query::new().filter("uuid", created.uuid()))
        .await
        .expect("created deploy should be fetchable");
    assert_eq!(fetched.uuid(), created.uuid());
    assert_eq!(fetched.get("name"), Some(&json!("api")));
    assert_eq!(fetched.get("status"), Some(&json!("running")));
    Ok(())
}

#[tokio::test]
async fn create_accepts_explicit_timestamps() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys
        .create(
            Fields::new()
                .set("name", "api")
                .set("created_at", "2026-01-05T00:00:00Z"),
        )
        .await?;
    assert_eq!(created.get("created_at"), Some(&json!("2026-01-05T00:00:00Z")));
    Ok(())
}

#[tokio::test]
async fn update_applies_fields_and_stamps_updated_at() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys
        .create(Fields::new().set("name", "api").set("status", "running"))
        .await?;
    let updated = deploys
        .update(&created, Fields::new().set("status", "done"))
        .await?;

    assert_eq!(updated.get("status"), Some(&json!("done")));
    assert_ne!(updated.get("updated_at"), created.get("updated_at"));
    Ok(())
}

#[tokio::test]
async fn update_respects_caller_supplied_updated_at() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys.create(Fields::new().set("name", "api")).await?;
    let updated = deploys
        .update(
            &created,
            Fields::new()
                .set("status", "done")
                .set("updated_at", "2026-02-01T00:00:00Z"),
        )
        .await?;
    assert_eq!(updated.get("updated_at"), Some(&json!("2026-02-01T00:00:00Z")));
    Ok(())
}

#[tokio::test]
async fn noop_update_returns_record_without_stamping() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys.create(Fields::new().set("name", "api")).await?;
    let untouched = deploys.update(&created, Fields::new()).await?;
    assert_eq!(untouched.get("updated_at"), created.get("updated_at"));
    assert_eq!(untouched.to_dict(), created.to_dict());
    Ok(())
}

#[tokio::test]
async fn update_skips_immutable_fields() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys.create(Fields::new().set("name", "api")).await?;
    let updated = deploys
        .update(
            &created,
            Fields::new()
                .set("uuid", "11111111-2222-3333-4444-555555555555")
                .set("created_at", "1999-01-01T00:00:00Z")
                .set("status", "done"),
        )
        .await?;

    assert_eq!(updated.uuid(), created.uuid());
    assert_eq!(updated.get("created_at"), created.get("created_at"));
    assert_eq!(updated.get("status"), Some(&json!("done")));
    Ok(())
}

#[tokio::test]
async fn get_required_reports_absence() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let missing = deploys
        .get_required(Query::new().filter("uuid", "00000000-0000-0000-0000-000000000000"))
        .await;
    assert!(matches!(missing, Err(DbError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn get_or_create_returns_same_row_on_second_call() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let first = deploys
        .get_or_create(Fields::new().set("name", "worker"))
        .await?;
    let second = deploys
        .get_or_create(Fields::new().set("name", "worker"))
        .await?;
    assert_eq!(first.uuid(), second.uuid());
    assert_eq!(deploys.count(Query::new().filter("name", "worker")).await, 1);
    Ok(())
}

#[tokio::test]
async fn slug_fills_from_name_on_create() -> Result<()> {
    let db = common::build_db()?;
    let services = db.entity("service")?;

    let created = services
        .create(Fields::new().set("name", "Billing & Payments API"))
        .await?;
    assert_eq!(created.get("slug"), Some(&json!("billing-payments-api")));

    let explicit = services
        .create(Fields::new().set("name", "Search").set("slug", "search-v2"))
        .await?;
    assert_eq!(explicit.get("slug"), Some(&json!("search-v2")));
    Ok(())
}

#[tokio::test]
async fn to_dict_formats_timestamps() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys
        .create(
            Fields::new()
                .set("name", "api")
                .set("created_at", "2026-08-03T10:30:00Z"),
        )
        .await?;
    let dict = created.to_dict();
    assert_eq!(dict.get("created_at"), Some(&json!("Mon, 03 Aug 2026 10:30:00")));
    assert_eq!(dict.get("name"), Some(&json!("api")));
    Ok(())
}
