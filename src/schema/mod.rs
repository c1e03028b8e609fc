//! Entity schemas: statically declared descriptors replacing runtime field
//! reflection. Descriptors are built once, registered at startup, and shared
//! for the process lifetime.

mod descriptor;
mod registry;

pub use descriptor::{ColumnSpec, DescriptorBuilder, EntityDescriptor, PropertyDef};
pub use registry::SchemaRegistry;
