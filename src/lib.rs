//! opstore: the data-access and object-cache layer under the ops-management
//! models. Entities are declared once as schema descriptors; a per-type
//! handle gives query/filter/sort/paginate reads, a validating
//! create/update/delete pipeline, and an identity-keyed object cache.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod query;
pub mod record;
pub mod report;
pub mod schema;
pub mod sql;
pub mod store;

pub use cache::{MemoryCache, ObjectCache};
pub use config::{DbConfig, Environment, ValidationMode};
pub use db::{Database, DatabaseBuilder, EntityHandle};
pub use error::{DbError, SchemaError, StoreError};
pub use query::{Query, QueryPlan, Sort};
pub use record::{FieldMap, Fields, Record};
pub use report::{ErrorReporter, NoopReporter};
pub use schema::{ColumnSpec, DescriptorBuilder, EntityDescriptor, PropertyDef, SchemaRegistry};
pub use store::{MemoryStore, PgStore, Store};
