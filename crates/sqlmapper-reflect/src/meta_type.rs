//! Property-path traversal facade.
//!
//! [`MetaType`] combines a [`Reflector`] with the tokenizer to answer
//! questions about dotted paths (`a.b[3].c`) against nested host types.

use crate::error::{ReflectResult, ReflectionError};
use crate::factory::ReflectorFactory;
use crate::invoker::Invoker;
use crate::property::PropertyTokenizer;
use crate::reflector::Reflector;
use crate::resolver;
use crate::schema::TypeRef;
use std::sync::Arc;

pub struct MetaType<'a> {
    factory: &'a ReflectorFactory,
    reflector: Arc<Reflector>,
}

impl<'a> MetaType<'a> {
    pub fn for_type(type_name: &str, factory: &'a ReflectorFactory) -> ReflectResult<Self> {
        Ok(Self {
            factory,
            reflector: factory.find_for_type(type_name)?,
        })
    }

    pub fn reflector(&self) -> &Reflector {
        &self.reflector
    }

    /// Facade for the property's own type, using the getter type.
    pub fn meta_for_property(&self, name: &str) -> ReflectResult<MetaType<'a>> {
        let property_type = self.reflector.getter_type(name)?.to_string();
        MetaType::for_type(&property_type, self.factory)
    }

    /// Canonical capitalization of a dotted path, or `None` when any segment
    /// is missing. With `use_camel_case_mapping`, underscores are removed
    /// from the input before lookup.
    pub fn find_property(&self, name: &str, use_camel_case_mapping: bool) -> Option<String> {
        let name = if use_camel_case_mapping {
            name.replace('_', "")
        } else {
            name.to_string()
        };
        let mut built = String::new();
        if self.build_property(&name, &mut built) && !built.is_empty() {
            Some(built)
        } else {
            None
        }
    }

    fn build_property(&self, name: &str, builder: &mut String) -> bool {
        let token = PropertyTokenizer::new(name);
        if token.has_next() {
            let Some(property) = self.reflector.find_property_name(token.name()) else {
                return false;
            };
            builder.push_str(property);
            builder.push('.');
            let Ok(meta) = self.meta_for_property(property) else {
                return false;
            };
            meta.build_property(token.children().unwrap_or(""), builder)
        } else {
            match self.reflector.find_property_name(name) {
                Some(property) => {
                    builder.push_str(property);
                    true
                }
                None => false,
            }
        }
    }

    pub fn getter_names(&self) -> &[String] {
        self.reflector.readable_properties()
    }

    pub fn setter_names(&self) -> &[String] {
        self.reflector.writable_properties()
    }

    /// The setter type at the end of a dotted path.
    pub fn setter_type(&self, name: &str) -> ReflectResult<String> {
        let token = PropertyTokenizer::new(name);
        if token.has_next() {
            let meta = self.meta_for_property(token.name())?;
            meta.setter_type(token.children().unwrap_or(""))
        } else {
            Ok(self.reflector.setter_type(token.name())?.to_string())
        }
    }

    /// The getter type at the end of a dotted path. Indexed segments whose
    /// getter returns a collection peek at the declared element type.
    pub fn getter_type(&self, name: &str) -> ReflectResult<String> {
        let token = PropertyTokenizer::new(name);
        if token.has_next() {
            let meta = self.meta_for_token(&token)?;
            meta.getter_type(token.children().unwrap_or(""))
        } else {
            self.getter_type_for_token(&token)
        }
    }

    fn meta_for_token(&self, token: &PropertyTokenizer) -> ReflectResult<MetaType<'a>> {
        let property_type = self.getter_type_for_token(token)?;
        MetaType::for_type(&property_type, self.factory)
    }

    fn getter_type_for_token(&self, token: &PropertyTokenizer) -> ReflectResult<String> {
        let mut property_type = self.reflector.getter_type(token.name())?.to_string();
        if token.index().is_some()
            && self
                .factory
                .schema()
                .is_assignable("collection", &property_type)
        {
            if let Some(generic) = self.generic_getter_type(token.name()) {
                if let TypeRef::Parameterized { args, .. } = generic {
                    if args.len() == 1 {
                        match &args[0] {
                            TypeRef::Concrete(name) => property_type = name.clone(),
                            TypeRef::Parameterized { raw, .. } => property_type = raw.clone(),
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(property_type)
    }

    /// The fully resolved (un-erased) getter type, recovered from the
    /// winning accessor.
    fn generic_getter_type(&self, property: &str) -> Option<TypeRef> {
        let schema = self.factory.schema();
        match self.reflector.get_invoker(property).ok()? {
            Invoker::MethodGetter {
                method,
                declared_by,
                ..
            } => resolver::resolve_return_type(
                method,
                &TypeRef::concrete(self.reflector.type_name()),
                declared_by,
                schema,
            )
            .ok(),
            Invoker::FieldGetter { field, declared_by } => resolver::resolve_field_type(
                field,
                &TypeRef::concrete(self.reflector.type_name()),
                declared_by,
                schema,
            )
            .ok(),
            _ => None,
        }
    }

    pub fn has_setter(&self, name: &str) -> bool {
        let token = PropertyTokenizer::new(name);
        if !token.has_next() {
            return self.reflector.has_setter(token.name());
        }
        if self.reflector.has_setter(token.name()) {
            match self.meta_for_property(token.name()) {
                Ok(meta) => meta.has_setter(token.children().unwrap_or("")),
                Err(_) => false,
            }
        } else {
            false
        }
    }

    pub fn has_getter(&self, name: &str) -> bool {
        let token = PropertyTokenizer::new(name);
        if !token.has_next() {
            return self.reflector.has_getter(token.name());
        }
        if self.reflector.has_getter(token.name()) {
            match self.meta_for_token(&token) {
                Ok(meta) => meta.has_getter(token.children().unwrap_or("")),
                Err(_) => false,
            }
        } else {
            false
        }
    }

    pub fn get_invoker(&self, name: &str) -> ReflectResult<&Invoker> {
        self.reflector.get_invoker(name)
    }

    pub fn set_invoker(&self, name: &str) -> ReflectResult<&Invoker> {
        self.reflector.set_invoker(name)
    }

    pub fn has_default_constructor(&self) -> bool {
        self.reflector.has_default_constructor()
    }

    /// Convenience wrapper erroring when the path does not resolve.
    pub fn require_property(&self, name: &str) -> ReflectResult<String> {
        self.find_property(name, false).ok_or_else(|| {
            ReflectionError::new(format!(
                "Could not find property '{}' on '{}'",
                name,
                self.reflector.type_name()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        FieldDescriptor, MethodDescriptor, TypeDescriptor, TypeSchema, OBJECT,
    };

    fn order_schema() -> TypeSchema {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Item")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(MethodDescriptor::new(
                    "getName",
                    vec![],
                    TypeRef::concrete("string"),
                )),
        );
        schema.register(
            TypeDescriptor::new("app.Order")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(MethodDescriptor::new(
                    "getItems",
                    vec![],
                    TypeRef::parameterized("list", vec![TypeRef::concrete("app.Item")]),
                ))
                .with_field(FieldDescriptor::new(
                    "createdAt",
                    TypeRef::concrete("date"),
                )),
        );
        schema.register(
            TypeDescriptor::new("app.Customer")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(MethodDescriptor::new(
                    "getFirstOrder",
                    vec![],
                    TypeRef::concrete("app.Order"),
                ))
                .with_method(MethodDescriptor::new(
                    "setFirstOrder",
                    vec![TypeRef::concrete("app.Order")],
                    TypeRef::concrete(OBJECT),
                )),
        );
        schema
    }

    #[test]
    fn find_property_recovers_canonical_capitalization() {
        let schema = order_schema();
        let factory = ReflectorFactory::new(Arc::new(schema));
        let meta = MetaType::for_type("app.Customer", &factory).unwrap();
        assert_eq!(
            meta.find_property("firstorder.createdat", false).as_deref(),
            Some("firstOrder.createdAt")
        );
        assert_eq!(meta.find_property("firstorder.missing", false), None);
    }

    #[test]
    fn camel_case_mapping_strips_underscores() {
        let schema = order_schema();
        let factory = ReflectorFactory::new(Arc::new(schema));
        let meta = MetaType::for_type("app.Customer", &factory).unwrap();
        let found = meta.find_property("first_order", true).unwrap();
        assert_eq!(found, "firstOrder");
        assert_eq!(
            found.to_lowercase(),
            "first_order".to_lowercase().replace('_', "")
        );
    }

    #[test]
    fn indexed_collection_segment_peeks_element_type() {
        let schema = order_schema();
        let factory = ReflectorFactory::new(Arc::new(schema));
        let meta = MetaType::for_type("app.Order", &factory).unwrap();
        assert_eq!(meta.getter_type("items").unwrap(), "list");
        assert_eq!(meta.getter_type("items[0]").unwrap(), "app.Item");
        assert_eq!(meta.getter_type("items[0].name").unwrap(), "string");
    }

    #[test]
    fn nested_has_getter_and_setter() {
        let schema = order_schema();
        let factory = ReflectorFactory::new(Arc::new(schema));
        let meta = MetaType::for_type("app.Customer", &factory).unwrap();
        assert!(meta.has_getter("firstOrder.items"));
        assert!(meta.has_getter("firstOrder.items[0].name"));
        assert!(!meta.has_getter("firstOrder.nope"));
        assert!(meta.has_setter("firstOrder"));
        assert!(!meta.has_setter("firstOrder.items"));
    }
}
