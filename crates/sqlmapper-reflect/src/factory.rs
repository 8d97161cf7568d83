//! Reflector cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::ReflectResult;
use crate::reflector::Reflector;
use crate::schema::TypeSchema;

/// Creates and caches [`Reflector`]s for schema types.
///
/// Lookups are safe to perform concurrently. Two racing misses may both
/// construct a reflector for the same type; either instance is kept and the
/// values are equivalent.
pub struct ReflectorFactory {
    schema: Arc<TypeSchema>,
    cache_enabled: bool,
    cache: RwLock<HashMap<String, Arc<Reflector>>>,
}

impl ReflectorFactory {
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        Self {
            schema,
            cache_enabled: true,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn without_cache(schema: Arc<TypeSchema>) -> Self {
        Self {
            schema,
            cache_enabled: false,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn find_for_type(&self, type_name: &str) -> ReflectResult<Arc<Reflector>> {
        if !self.cache_enabled {
            return Ok(Arc::new(Reflector::new(type_name, &self.schema)?));
        }
        if let Some(found) = self.cache.read().expect("reflector cache poisoned").get(type_name) {
            return Ok(found.clone());
        }
        let built = Arc::new(Reflector::new(type_name, &self.schema)?);
        let mut cache = self.cache.write().expect("reflector cache poisoned");
        Ok(cache
            .entry(type_name.to_string())
            .or_insert(built)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MethodDescriptor, TypeDescriptor, TypeRef};

    #[test]
    fn cached_lookups_return_the_same_reflector() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.User")
                .extends(TypeRef::concrete("object"))
                .with_method(MethodDescriptor::new(
                    "getId",
                    vec![],
                    TypeRef::concrete("long"),
                )),
        );
        let factory = ReflectorFactory::new(Arc::new(schema));
        let first = factory.find_for_type("app.User").unwrap();
        let second = factory.find_for_type("app.User").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn determinism_across_instances() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.User")
                .extends(TypeRef::concrete("object"))
                .with_method(MethodDescriptor::new(
                    "getId",
                    vec![],
                    TypeRef::concrete("long"),
                ))
                .with_method(MethodDescriptor::new(
                    "getName",
                    vec![],
                    TypeRef::concrete("string"),
                )),
        );
        let schema = Arc::new(schema);
        let factory = ReflectorFactory::without_cache(schema);
        let first = factory.find_for_type("app.User").unwrap();
        let second = factory.find_for_type("app.User").unwrap();
        assert_eq!(first.readable_properties(), second.readable_properties());
        assert_eq!(
            first.getter_type("id").unwrap(),
            second.getter_type("id").unwrap()
        );
    }
}
