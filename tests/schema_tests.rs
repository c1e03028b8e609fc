mod common;

use anyhow::Result;
use async_trait::async_trait;
use opstore::{
    Database, DbConfig, DbError, EntityDescriptor, Fields, PropertyDef, Query, Record, SchemaError,
};
use serde_json::{json, Value};
use std::sync::Arc;

struct DisplayName;

#[async_trait]
impl PropertyDef for DisplayName {
    fn name(&self) -> &str {
        "display_name"
    }

    async fn set(&self, _db: &Database, record: &mut Record, value: Value) -> Result<(), DbError> {
        if let Some(v) = value.as_str() {
            record.set("name", v.trim().to_lowercase());
        }
        Ok(())
    }
}

fn resource_descriptor() -> Result<EntityDescriptor, SchemaError> {
    EntityDescriptor::builder("resource", "resources")
        .typed_column("uuid", "uuid")
        .typed_column("created_at", "timestamptz")
        .column("name")
        .property(Arc::new(DisplayName))
        .build()
}

#[test]
fn extends_composes_columns_and_properties() -> Result<()> {
    let parent = resource_descriptor()?;
    let child = EntityDescriptor::builder("cluster", "clusters")
        .extends(&parent)
        .column("region")
        .build()?;

    let columns: Vec<_> = child.columns().collect();
    assert_eq!(columns, vec!["uuid", "created_at", "name", "region"]);
    let properties: Vec<_> = child.writable_properties().collect();
    assert_eq!(properties, vec!["display_name"]);
    assert!(child.is_field("region"));
    assert!(child.is_field("display_name"));
    assert!(!child.is_field("missing"));
    Ok(())
}

#[tokio::test]
async fn inherited_property_applies_through_the_pipeline() -> Result<()> {
    let parent = resource_descriptor()?;
    let child = EntityDescriptor::builder("cluster", "clusters")
        .extends(&parent)
        .column("region")
        .build()?;
    let db = Database::builder()
        .config(DbConfig::for_tests())
        .register(child)?
        .build();
    let clusters = db.entity("cluster")?;

    let created = clusters
        .create(
            Fields::new()
                .set("display_name", "  Primary  ")
                .set("region", "us-east-1"),
        )
        .await?;
    assert_eq!(created.get("name"), Some(&json!("primary")));
    assert_eq!(created.get("region"), Some(&json!("us-east-1")));

    let fetched = clusters
        .get(Query::new().filter("name", "primary"))
        .await
        .expect("row by fanned-out column");
    assert_eq!(fetched.uuid(), created.uuid());
    Ok(())
}

#[test]
fn duplicate_fields_are_rejected_at_build_time() {
    let result = EntityDescriptor::builder("deploy", "deploys")
        .typed_column("uuid", "uuid")
        .typed_column("created_at", "timestamptz")
        .column("name")
        .column("name")
        .build();
    assert!(matches!(result, Err(SchemaError::DuplicateField { .. })));
}

#[test]
fn required_columns_are_enforced_at_build_time() {
    let result = EntityDescriptor::builder("deploy", "deploys")
        .typed_column("uuid", "uuid")
        .column("name")
        .build();
    assert!(matches!(
        result,
        Err(SchemaError::MissingRequiredColumn {
            column: "created_at",
            ..
        })
    ));
}

#[test]
fn duplicate_entity_names_are_rejected_at_registration() -> Result<()> {
    let result = Database::builder()
        .register(common::deploy_descriptor()?)?
        .register(common::deploy_descriptor()?);
    assert!(matches!(result, Err(SchemaError::DuplicateEntity(_))));
    Ok(())
}

#[tokio::test]
async fn unregistered_entities_are_unknown() -> Result<()> {
    let db = common::build_db()?;
    assert!(matches!(
        db.entity("nonesuch"),
        Err(DbError::UnknownEntity(_))
    ));
    Ok(())
}
