//! Typed errors for schema registration, store access, and the facade.

use thiserror::Error;

/// Schema construction problems. Raised while descriptors are registered at
/// startup, never from a runtime operation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("entity '{0}' is already registered")]
    DuplicateEntity(String),
    #[error("entity '{entity}' declares field '{field}' more than once")]
    DuplicateField { entity: String, field: String },
    #[error("entity '{entity}' is missing required column '{column}'")]
    MissingRequiredColumn {
        entity: String,
        column: &'static str,
    },
}

/// Failures from a store backend. Each store call is one transaction, so the
/// backend has already rolled back by the time this reaches the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("'{field}' is not a column on {entity}")]
    UnknownField { entity: String, field: String },
    #[error("row '{uuid}' not found in {entity}")]
    RowMissing { entity: String, uuid: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Runtime errors surfaced by the facade and the mutation pipeline.
///
/// Reads never return these: `get`/`get_list`/`count` degrade to an absent
/// result instead. Writes propagate `Validation` and `Persistence`;
/// `NotFound` comes only from `get_required`.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("{fields:?} are not columns or writable properties on {entity}")]
    Validation { entity: String, fields: Vec<String> },
    #[error("persistence: {0}")]
    Persistence(#[from] StoreError),
    #[error("not found: {entity}")]
    NotFound { entity: String },
    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),
    #[error("truncate called in non-test environment")]
    TruncateOutsideTests,
}
