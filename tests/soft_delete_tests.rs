mod common;

use anyhow::Result;
use opstore::{DbConfig, DbError, Fields, Query};
use serde_json::json;

#[tokio::test]
async fn delete_marks_dead_and_keeps_the_row() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let created = deploys.create(Fields::new().set("name", "api")).await?;
    deploys.delete(&created).await?;

    let revived = deploys
        .get(
            Query::new()
                .filter("uuid", created.uuid())
                .filter("dead", true),
        )
        .await
        .expect("soft-deleted row should still exist");
    assert_eq!(revived.get("dead"), Some(&json!(true)));
    assert!(revived.is_dead());
    Ok(())
}

#[tokio::test]
async fn default_reads_exclude_dead_rows() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let live = deploys.create(Fields::new().set("name", "live")).await?;
    let doomed = deploys.create(Fields::new().set("name", "doomed")).await?;
    deploys.delete(&doomed).await?;

    assert_eq!(deploys.count(Query::new()).await, 1);
    let rows = deploys.get_list(Query::new()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].uuid(), live.uuid());
    assert!(deploys
        .get(Query::new().filter("name", "doomed"))
        .await
        .is_none());
    Ok(())
}

#[tokio::test]
async fn explicit_dead_filter_overrides_the_default() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    let doomed = deploys.create(Fields::new().set("name", "doomed")).await?;
    deploys.delete(&doomed).await?;

    assert_eq!(deploys.count(Query::new().filter("dead", true)).await, 1);
    assert_eq!(
        deploys
            .count(Query::new().filter("dead", json!([true, false])))
            .await,
        1
    );
    Ok(())
}

#[tokio::test]
async fn types_without_dead_delete_physically() -> Result<()> {
    let db = common::build_db()?;
    let services = db.entity("service")?;

    let created = services.create(Fields::new().set("name", "payments")).await?;
    services.delete(&created).await?;

    assert!(services
        .get(Query::new().filter("uuid", created.uuid()))
        .await
        .is_none());
    assert_eq!(services.count(Query::new()).await, 0);
    Ok(())
}

#[tokio::test]
async fn delete_all_removes_matching_rows() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;

    for status in ["failed", "failed", "done"] {
        deploys
            .create(Fields::new().set("name", "job").set("status", status))
            .await?;
    }
    let deleted = deploys
        .delete_all(Query::new().filter("status", "failed"))
        .await?;
    assert_eq!(deleted, 2);
    assert_eq!(deploys.count(Query::new()).await, 1);
    // logically deleted, so the rows are still there under the flag
    assert_eq!(deploys.count(Query::new().filter("dead", true)).await, 2);
    Ok(())
}

#[tokio::test]
async fn truncate_runs_only_in_the_test_environment() -> Result<()> {
    let db = common::build_db()?;
    let deploys = db.entity("deploy")?;
    let doomed = deploys.create(Fields::new().set("name", "doomed")).await?;
    deploys.delete(&doomed).await?;
    deploys.create(Fields::new().set("name", "live")).await?;

    deploys.truncate().await?;
    // bypasses the dead column: everything is gone
    assert_eq!(deploys.count(Query::new().filter("dead", json!([true, false]))).await, 0);

    let prod_db = opstore::Database::builder()
        .config(DbConfig::default())
        .register(common::deploy_descriptor()?)?
        .build();
    let prod_deploys = prod_db.entity("deploy")?;
    let refused = prod_deploys.truncate().await;
    assert!(matches!(refused, Err(DbError::TruncateOutsideTests)));
    Ok(())
}
