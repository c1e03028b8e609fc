//! Relational store contract and its backends.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::query::QueryPlan;
use crate::record::FieldMap;
use crate::schema::EntityDescriptor;
use async_trait::async_trait;

/// Transactional access to the relational store. Each call is one
/// transaction: it commits or rolls back before returning, and no operation
/// in the layer spans two calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(
        &self,
        entity: &EntityDescriptor,
        plan: &QueryPlan,
    ) -> Result<Vec<FieldMap>, StoreError>;

    async fn count(&self, entity: &EntityDescriptor, plan: &QueryPlan) -> Result<u64, StoreError>;

    /// Insert a fully stamped row. Returns the stored row, server-computed
    /// defaults included.
    async fn insert(
        &self,
        entity: &EntityDescriptor,
        row: &FieldMap,
    ) -> Result<FieldMap, StoreError>;

    /// Apply `changes` to the row identified by `uuid`. Returns the full
    /// updated row.
    async fn update(
        &self,
        entity: &EntityDescriptor,
        uuid: &str,
        changes: &FieldMap,
    ) -> Result<FieldMap, StoreError>;

    /// Physical delete. Deleting an absent row is not an error.
    async fn delete(&self, entity: &EntityDescriptor, uuid: &str) -> Result<(), StoreError>;

    /// Remove every row of the entity's table. The test-environment guard
    /// lives in the facade, not here.
    async fn truncate(&self, entity: &EntityDescriptor) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn select(
        &self,
        entity: &EntityDescriptor,
        plan: &QueryPlan,
    ) -> Result<Vec<FieldMap>, StoreError> {
        (**self).select(entity, plan).await
    }

    async fn count(&self, entity: &EntityDescriptor, plan: &QueryPlan) -> Result<u64, StoreError> {
        (**self).count(entity, plan).await
    }

    async fn insert(
        &self,
        entity: &EntityDescriptor,
        row: &FieldMap,
    ) -> Result<FieldMap, StoreError> {
        (**self).insert(entity, row).await
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        uuid: &str,
        changes: &FieldMap,
    ) -> Result<FieldMap, StoreError> {
        (**self).update(entity, uuid, changes).await
    }

    async fn delete(&self, entity: &EntityDescriptor, uuid: &str) -> Result<(), StoreError> {
        (**self).delete(entity, uuid).await
    }

    async fn truncate(&self, entity: &EntityDescriptor) -> Result<(), StoreError> {
        (**self).truncate(entity).await
    }
}
