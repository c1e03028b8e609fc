//! Entity name → descriptor lookup, built once at startup.

use crate::error::SchemaError;
use crate::schema::EntityDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct SchemaRegistry {
    by_name: HashMap<String, Arc<EntityDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its entity name. Names are unique.
    pub fn register(
        &mut self,
        descriptor: EntityDescriptor,
    ) -> Result<Arc<EntityDescriptor>, SchemaError> {
        let name = descriptor.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(SchemaError::DuplicateEntity(name));
        }
        let descriptor = Arc::new(descriptor);
        self.by_name.insert(name, descriptor.clone());
        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}
