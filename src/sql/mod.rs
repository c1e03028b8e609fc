//! SQL text generation and parameter binding for the PostgreSQL backend.

mod builder;
mod params;

pub use builder::{delete_by_uuid, insert, select_count, select_list, truncate, update_by_uuid, QueryBuf};
pub use params::PgBindValue;
