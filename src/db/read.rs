//! Read path. Query failures degrade to an absent result with an
//! error-severity log and reporter notification; they never reach the
//! caller, so a page render survives a bad read.

use crate::db::Database;
use crate::error::StoreError;
use crate::query::Query;
use crate::record::Record;
use crate::schema::EntityDescriptor;
use std::sync::Arc;

pub(crate) async fn find(
    db: &Database,
    entity: &Arc<EntityDescriptor>,
    query: Query,
) -> Option<Record> {
    let plan = match query.plan(entity) {
        Ok(plan) => plan.first_only(),
        Err(err) => {
            report(db, entity, &err);
            return None;
        }
    };
    match db.store().select(entity, &plan).await {
        Ok(rows) => rows
            .into_iter()
            .next()
            .map(|row| Record::new(entity.clone(), row)),
        Err(err) => {
            report(db, entity, &err);
            None
        }
    }
}

pub(crate) async fn find_many(
    db: &Database,
    entity: &Arc<EntityDescriptor>,
    query: Query,
) -> Vec<Record> {
    let plan = match query.plan(entity) {
        Ok(plan) => plan,
        Err(err) => {
            report(db, entity, &err);
            return Vec::new();
        }
    };
    match db.store().select(entity, &plan).await {
        Ok(rows) => rows
            .into_iter()
            .map(|row| Record::new(entity.clone(), row))
            .collect(),
        Err(err) => {
            report(db, entity, &err);
            Vec::new()
        }
    }
}

pub(crate) async fn count(db: &Database, entity: &Arc<EntityDescriptor>, query: Query) -> u64 {
    let plan = match query.plan(entity) {
        Ok(plan) => plan,
        Err(err) => {
            report(db, entity, &err);
            return 0;
        }
    };
    match db.store().count(entity, &plan).await {
        Ok(count) => count,
        Err(err) => {
            report(db, entity, &err);
            0
        }
    }
}

fn report(db: &Database, entity: &EntityDescriptor, err: &StoreError) {
    db.report_error(&format!("{}: read failed: {}", entity.name(), err));
}
