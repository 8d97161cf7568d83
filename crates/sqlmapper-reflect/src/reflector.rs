//! Per-type property metadata.
//!
//! A [`Reflector`] caches, for one schema type: the readable and writable
//! property names, the winning accessor per property after conflict
//! arbitration, the erased getter/setter types, and a case-insensitive
//! property index.

use std::collections::HashMap;

use crate::error::{ReflectResult, ReflectionError};
use crate::invoker::Invoker;
use crate::property::PropertyNamer;
use crate::resolver;
use crate::schema::{FieldDescriptor, MethodDescriptor, TypeRef, TypeSchema, OBJECT};

/// A method paired with the type that declares it.
#[derive(Debug, Clone)]
struct DeclaredMethod {
    method: MethodDescriptor,
    declared_by: String,
}

#[derive(Debug)]
pub struct Reflector {
    type_name: String,
    readable: Vec<String>,
    writable: Vec<String>,
    get_invokers: HashMap<String, Invoker>,
    set_invokers: HashMap<String, Invoker>,
    get_types: HashMap<String, String>,
    set_types: HashMap<String, String>,
    has_default_constructor: bool,
    case_insensitive: HashMap<String, String>,
}

impl Reflector {
    pub fn new(type_name: &str, schema: &TypeSchema) -> ReflectResult<Self> {
        log::debug!("building reflector for '{}'", type_name);
        let descriptor = schema.lookup(type_name)?.clone();
        let mut reflector = Self {
            type_name: type_name.to_string(),
            readable: Vec::new(),
            writable: Vec::new(),
            get_invokers: HashMap::new(),
            set_invokers: HashMap::new(),
            get_types: HashMap::new(),
            set_types: HashMap::new(),
            has_default_constructor: descriptor.has_default_constructor,
            case_insensitive: HashMap::new(),
        };

        let methods = collect_methods(type_name, schema)?;
        if descriptor.is_record {
            reflector.add_record_get_methods(&methods, schema)?;
        } else {
            reflector.add_get_methods(&methods, schema)?;
            reflector.add_set_methods(&methods, schema)?;
            reflector.add_fields(type_name, schema)?;
        }

        reflector.readable = reflector.get_invokers.keys().cloned().collect();
        reflector.readable.sort();
        reflector.writable = reflector.set_invokers.keys().cloned().collect();
        reflector.writable.sort();
        for name in reflector.readable.iter().chain(reflector.writable.iter()) {
            reflector
                .case_insensitive
                .insert(name.to_uppercase(), name.clone());
        }
        Ok(reflector)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn readable_properties(&self) -> &[String] {
        &self.readable
    }

    pub fn writable_properties(&self) -> &[String] {
        &self.writable
    }

    pub fn has_default_constructor(&self) -> bool {
        self.has_default_constructor
    }

    pub fn has_getter(&self, property: &str) -> bool {
        self.get_invokers.contains_key(property)
    }

    pub fn has_setter(&self, property: &str) -> bool {
        self.set_invokers.contains_key(property)
    }

    pub fn get_invoker(&self, property: &str) -> ReflectResult<&Invoker> {
        self.get_invokers.get(property).ok_or_else(|| {
            ReflectionError::new(format!(
                "There is no getter for property named '{}' in '{}'",
                property, self.type_name
            ))
        })
    }

    pub fn set_invoker(&self, property: &str) -> ReflectResult<&Invoker> {
        self.set_invokers.get(property).ok_or_else(|| {
            ReflectionError::new(format!(
                "There is no setter for property named '{}' in '{}'",
                property, self.type_name
            ))
        })
    }

    /// Erased type of the property getter.
    pub fn getter_type(&self, property: &str) -> ReflectResult<&str> {
        self.get_types.get(property).map(String::as_str).ok_or_else(|| {
            ReflectionError::new(format!(
                "There is no getter for property named '{}' in '{}'",
                property, self.type_name
            ))
        })
    }

    /// Erased type of the property setter.
    pub fn setter_type(&self, property: &str) -> ReflectResult<&str> {
        self.set_types.get(property).map(String::as_str).ok_or_else(|| {
            ReflectionError::new(format!(
                "There is no setter for property named '{}' in '{}'",
                property, self.type_name
            ))
        })
    }

    /// Canonical capitalization for a case-insensitive property lookup.
    pub fn find_property_name(&self, name: &str) -> Option<&str> {
        self.case_insensitive
            .get(&name.to_uppercase())
            .map(String::as_str)
    }

    fn add_record_get_methods(
        &mut self,
        methods: &[DeclaredMethod],
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        for declared in methods {
            if declared.method.param_types.is_empty() {
                self.add_get_method(&declared.method.name.clone(), declared, false, schema)?;
            }
        }
        Ok(())
    }

    fn add_get_methods(
        &mut self,
        methods: &[DeclaredMethod],
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        let mut conflicting: HashMap<String, Vec<DeclaredMethod>> = HashMap::new();
        for declared in methods {
            if declared.method.param_types.is_empty()
                && PropertyNamer::is_getter(&declared.method.name)
            {
                let property = PropertyNamer::method_to_property(&declared.method.name);
                if PropertyNamer::is_valid_property(&property) {
                    conflicting.entry(property).or_default().push(declared.clone());
                }
            }
        }
        self.resolve_getter_conflicts(conflicting, schema)
    }

    fn resolve_getter_conflicts(
        &mut self,
        conflicting: HashMap<String, Vec<DeclaredMethod>>,
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        let mut properties: Vec<&String> = conflicting.keys().collect();
        properties.sort();
        for property in properties {
            let candidates = &conflicting[property];
            let mut winner: Option<&DeclaredMethod> = None;
            let mut ambiguous = false;
            for candidate in candidates {
                let Some(current) = winner else {
                    winner = Some(candidate);
                    continue;
                };
                let winner_type =
                    schema.erasure(&current.method.return_type, &current.declared_by);
                let candidate_type =
                    schema.erasure(&candidate.method.return_type, &candidate.declared_by);
                if candidate_type == winner_type {
                    if winner_type != "boolean" {
                        ambiguous = true;
                        break;
                    }
                    if candidate.method.name.starts_with("is") {
                        winner = Some(candidate);
                    }
                } else if schema.is_assignable(&candidate_type, &winner_type) {
                    // current winner is the more specific type
                } else if schema.is_assignable(&winner_type, &candidate_type) {
                    winner = Some(candidate);
                } else {
                    ambiguous = true;
                    break;
                }
            }
            if let Some(declared) = winner.cloned() {
                self.add_get_method(property, &declared, ambiguous, schema)?;
            }
        }
        Ok(())
    }

    fn add_get_method(
        &mut self,
        property: &str,
        declared: &DeclaredMethod,
        ambiguous: bool,
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        let invoker = if ambiguous {
            Invoker::Ambiguous {
                property: property.to_string(),
                message: format!(
                    "Illegal overloaded getter method with ambiguous type for property '{}' in type '{}'. \
                     This breaks the accessor contract and can cause unpredictable results.",
                    property, self.type_name
                ),
            }
        } else {
            Invoker::MethodGetter {
                property: property.to_string(),
                method: declared.method.clone(),
                declared_by: declared.declared_by.clone(),
            }
        };
        self.get_invokers.insert(property.to_string(), invoker);
        let resolved = resolver::resolve_return_type(
            &declared.method,
            &TypeRef::concrete(&self.type_name),
            &declared.declared_by,
            schema,
        )?;
        self.get_types.insert(
            property.to_string(),
            schema.erasure(&resolved, &declared.declared_by),
        );
        Ok(())
    }

    fn add_set_methods(
        &mut self,
        methods: &[DeclaredMethod],
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        let mut conflicting: HashMap<String, Vec<DeclaredMethod>> = HashMap::new();
        for declared in methods {
            if declared.method.param_types.len() == 1
                && PropertyNamer::is_setter(&declared.method.name)
            {
                let property = PropertyNamer::method_to_property(&declared.method.name);
                if PropertyNamer::is_valid_property(&property) {
                    conflicting.entry(property).or_default().push(declared.clone());
                }
            }
        }
        self.resolve_setter_conflicts(conflicting, schema)
    }

    fn resolve_setter_conflicts(
        &mut self,
        conflicting: HashMap<String, Vec<DeclaredMethod>>,
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        let mut properties: Vec<String> = conflicting.keys().cloned().collect();
        properties.sort();
        for property in properties {
            let setters = &conflicting[&property];
            let getter_type = self.get_types.get(&property).cloned();
            let getter_ambiguous = self
                .get_invokers
                .get(&property)
                .is_some_and(Invoker::is_ambiguous);
            let mut setter_ambiguous = false;
            let mut matched: Option<DeclaredMethod> = None;
            for setter in setters {
                let param_type =
                    schema.erasure(&setter.method.param_types[0], &setter.declared_by);
                if !getter_ambiguous && Some(&param_type) == getter_type.as_ref() {
                    // exact match with the resolved getter type wins outright
                    matched = Some(setter.clone());
                    break;
                }
                if !setter_ambiguous {
                    matched = self.pick_better_setter(matched, setter, &property, schema)?;
                    setter_ambiguous = matched.is_none();
                }
            }
            if let Some(declared) = matched {
                self.add_set_method(&property, &declared, schema)?;
            }
        }
        Ok(())
    }

    fn pick_better_setter(
        &mut self,
        current: Option<DeclaredMethod>,
        candidate: &DeclaredMethod,
        property: &str,
        schema: &TypeSchema,
    ) -> ReflectResult<Option<DeclaredMethod>> {
        let Some(current) = current else {
            return Ok(Some(candidate.clone()));
        };
        let param1 = schema.erasure(&current.method.param_types[0], &current.declared_by);
        let param2 = schema.erasure(&candidate.method.param_types[0], &candidate.declared_by);
        if schema.is_assignable(&param1, &param2) {
            return Ok(Some(candidate.clone()));
        }
        if schema.is_assignable(&param2, &param1) {
            return Ok(Some(current));
        }
        self.set_invokers.insert(
            property.to_string(),
            Invoker::Ambiguous {
                property: property.to_string(),
                message: format!(
                    "Ambiguous setters defined for property '{}' in type '{}' with types '{}' and '{}'.",
                    property, self.type_name, param1, param2
                ),
            },
        );
        let resolved = resolver::resolve_param_types(
            &current.method,
            &TypeRef::concrete(&self.type_name),
            &current.declared_by,
            schema,
        )?;
        self.set_types.insert(
            property.to_string(),
            schema.erasure(&resolved[0], &current.declared_by),
        );
        Ok(None)
    }

    fn add_set_method(
        &mut self,
        property: &str,
        declared: &DeclaredMethod,
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        self.set_invokers.insert(
            property.to_string(),
            Invoker::MethodSetter {
                property: property.to_string(),
                method: declared.method.clone(),
                declared_by: declared.declared_by.clone(),
            },
        );
        let resolved = resolver::resolve_param_types(
            &declared.method,
            &TypeRef::concrete(&self.type_name),
            &declared.declared_by,
            schema,
        )?;
        self.set_types.insert(
            property.to_string(),
            schema.erasure(&resolved[0], &declared.declared_by),
        );
        Ok(())
    }

    fn add_fields(&mut self, type_name: &str, schema: &TypeSchema) -> ReflectResult<()> {
        let descriptor = schema.lookup(type_name)?.clone();
        for field in &descriptor.fields {
            if !self.set_invokers.contains_key(&field.name)
                && !(field.is_final && field.is_static)
            {
                self.add_set_field(field, type_name, schema)?;
            }
            if !self.get_invokers.contains_key(&field.name) {
                self.add_get_field(field, type_name, schema)?;
            }
        }
        if let Some(parent) = descriptor.superclass.as_ref().and_then(TypeRef::raw_name) {
            if parent != OBJECT && schema.contains(&parent) {
                self.add_fields(&parent, schema)?;
            }
        }
        Ok(())
    }

    fn add_set_field(
        &mut self,
        field: &FieldDescriptor,
        declared_by: &str,
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        if !PropertyNamer::is_valid_property(&field.name) {
            return Ok(());
        }
        self.set_invokers.insert(
            field.name.clone(),
            Invoker::FieldSetter {
                field: field.clone(),
                declared_by: declared_by.to_string(),
            },
        );
        let resolved = resolver::resolve_field_type(
            field,
            &TypeRef::concrete(&self.type_name),
            declared_by,
            schema,
        )?;
        self.set_types
            .insert(field.name.clone(), schema.erasure(&resolved, declared_by));
        Ok(())
    }

    fn add_get_field(
        &mut self,
        field: &FieldDescriptor,
        declared_by: &str,
        schema: &TypeSchema,
    ) -> ReflectResult<()> {
        if !PropertyNamer::is_valid_property(&field.name) {
            return Ok(());
        }
        self.get_invokers.insert(
            field.name.clone(),
            Invoker::FieldGetter {
                field: field.clone(),
                declared_by: declared_by.to_string(),
            },
        );
        let resolved = resolver::resolve_field_type(
            field,
            &TypeRef::concrete(&self.type_name),
            declared_by,
            schema,
        )?;
        self.get_types
            .insert(field.name.clone(), schema.erasure(&resolved, declared_by));
        Ok(())
    }
}

/// All methods declared on the type, its superclasses, and its interfaces,
/// deduplicated by an erased `return#name:params` signature. Bridge methods
/// are skipped so overriding declarations win.
fn collect_methods(type_name: &str, schema: &TypeSchema) -> ReflectResult<Vec<DeclaredMethod>> {
    let mut unique: HashMap<String, DeclaredMethod> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut current = Some(type_name.to_string());
    while let Some(name) = current {
        if name == OBJECT {
            break;
        }
        let Some(descriptor) = schema.get(&name) else {
            break;
        };
        add_unique_methods(&mut unique, &mut order, &name, &descriptor.methods, schema);
        for interface in descriptor.interfaces.iter().filter_map(TypeRef::raw_name) {
            collect_interface_methods(&interface, schema, &mut unique, &mut order);
        }
        current = descriptor.superclass.as_ref().and_then(TypeRef::raw_name);
    }
    Ok(order.into_iter().map(|sig| unique[&sig].clone()).collect())
}

fn collect_interface_methods(
    interface: &str,
    schema: &TypeSchema,
    unique: &mut HashMap<String, DeclaredMethod>,
    order: &mut Vec<String>,
) {
    let Some(descriptor) = schema.get(interface) else {
        return;
    };
    add_unique_methods(unique, order, interface, &descriptor.methods, schema);
    for parent in descriptor.interfaces.iter().filter_map(TypeRef::raw_name) {
        collect_interface_methods(&parent, schema, unique, order);
    }
}

fn add_unique_methods(
    unique: &mut HashMap<String, DeclaredMethod>,
    order: &mut Vec<String>,
    declared_by: &str,
    methods: &[MethodDescriptor],
    schema: &TypeSchema,
) {
    for method in methods {
        if method.is_bridge {
            continue;
        }
        let signature = method_signature(method, declared_by, schema);
        if !unique.contains_key(&signature) {
            unique.insert(
                signature.clone(),
                DeclaredMethod {
                    method: method.clone(),
                    declared_by: declared_by.to_string(),
                },
            );
            order.push(signature);
        }
    }
}

fn method_signature(method: &MethodDescriptor, declared_by: &str, schema: &TypeSchema) -> String {
    let mut signature = format!(
        "{}#{}",
        schema.erasure(&method.return_type, declared_by),
        method.name
    );
    for (i, param) in method.param_types.iter().enumerate() {
        signature.push(if i == 0 { ':' } else { ',' });
        signature.push_str(&schema.erasure(param, declared_by));
    }
    signature
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{TypeDescriptor, TypeParam};

    fn getter(name: &str, return_type: TypeRef) -> MethodDescriptor {
        MethodDescriptor::new(name, vec![], return_type)
    }

    fn setter(name: &str, param: TypeRef) -> MethodDescriptor {
        MethodDescriptor::new(name, vec![param], TypeRef::concrete(OBJECT))
    }

    fn user_schema() -> TypeSchema {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.User")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("getId", TypeRef::concrete("long")))
                .with_method(getter("getName", TypeRef::concrete("string")))
                .with_method(getter("isActive", TypeRef::concrete("boolean")))
                .with_method(setter("setId", TypeRef::concrete("long")))
                .with_method(setter("setName", TypeRef::concrete("string")))
                .with_field(FieldDescriptor::new("email", TypeRef::concrete("string"))),
        );
        schema
    }

    #[test]
    fn properties_and_types_are_collected() {
        let schema = user_schema();
        let reflector = Reflector::new("app.User", &schema).unwrap();
        assert_eq!(
            reflector.readable_properties(),
            &["active", "email", "id", "name"]
        );
        assert_eq!(reflector.writable_properties(), &["email", "id", "name"]);
        assert_eq!(reflector.getter_type("id").unwrap(), "long");
        assert_eq!(reflector.getter_type("active").unwrap(), "boolean");
        assert_eq!(reflector.setter_type("email").unwrap(), "string");
        assert_eq!(reflector.find_property_name("NAME"), Some("name"));
        assert_eq!(reflector.find_property_name("nope"), None);
    }

    #[test]
    fn ambiguous_getter_raises_on_invocation() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Weird")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("getX", TypeRef::concrete("int")))
                .with_method(getter("getX", TypeRef::concrete("string"))),
        );
        let reflector = Reflector::new("app.Weird", &schema).unwrap();
        let invoker = reflector.get_invoker("x").unwrap();
        assert!(invoker.is_ambiguous());
        let target = crate::invoker::DynObject::new("app.Weird");
        let err = invoker.get(&target).unwrap_err();
        assert!(err.message.contains("property 'x'"));
        assert!(err.message.contains("app.Weird"));
        // the recorded type is one of the conflicting return types
        let recorded = reflector.getter_type("x").unwrap();
        assert!(recorded == "int" || recorded == "string");
    }

    #[test]
    fn boolean_is_getter_preferred_over_get() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Flag")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("getOn", TypeRef::concrete("boolean")))
                .with_method(getter("isOn", TypeRef::concrete("boolean"))),
        );
        let reflector = Reflector::new("app.Flag", &schema).unwrap();
        match reflector.get_invoker("on").unwrap() {
            Invoker::MethodGetter { method, .. } => assert_eq!(method.name, "isOn"),
            other => panic!("expected a method getter, got {:?}", other),
        }
    }

    #[test]
    fn covariant_getter_picks_subtype() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Holder")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("getItems", TypeRef::concrete("collection")))
                .with_method(getter("getItems", TypeRef::concrete("arraylist"))),
        );
        let reflector = Reflector::new("app.Holder", &schema).unwrap();
        assert_eq!(reflector.getter_type("items").unwrap(), "arraylist");
        assert!(!reflector.get_invoker("items").unwrap().is_ambiguous());
    }

    #[test]
    fn setter_matching_getter_type_wins() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Holder")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("getItems", TypeRef::concrete("list")))
                .with_method(setter("setItems", TypeRef::concrete("collection")))
                .with_method(setter("setItems", TypeRef::concrete("list"))),
        );
        let reflector = Reflector::new("app.Holder", &schema).unwrap();
        assert_eq!(reflector.setter_type("items").unwrap(), "list");
    }

    #[test]
    fn unrelated_setters_are_ambiguous() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Odd")
                .extends(TypeRef::concrete(OBJECT))
                .with_method(setter("setValue", TypeRef::concrete("string")))
                .with_method(setter("setValue", TypeRef::concrete("int"))),
        );
        let reflector = Reflector::new("app.Odd", &schema).unwrap();
        assert!(reflector.set_invoker("value").unwrap().is_ambiguous());
    }

    #[test]
    fn fields_fill_in_missing_accessors_but_final_static_is_read_only() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Consts")
                .extends(TypeRef::concrete(OBJECT))
                .with_field(
                    FieldDescriptor::new("VERSION", TypeRef::concrete("string")).final_static(),
                )
                .with_field(FieldDescriptor::new("payload", TypeRef::concrete("string"))),
        );
        let reflector = Reflector::new("app.Consts", &schema).unwrap();
        assert!(reflector.has_getter("VERSION"));
        assert!(!reflector.has_setter("VERSION"));
        assert!(reflector.has_setter("payload"));
    }

    #[test]
    fn record_types_register_component_accessors() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Point")
                .record()
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("x", TypeRef::concrete("int")))
                .with_method(getter("y", TypeRef::concrete("int"))),
        );
        let reflector = Reflector::new("app.Point", &schema).unwrap();
        assert_eq!(reflector.readable_properties(), &["x", "y"]);
        assert!(reflector.writable_properties().is_empty());
    }

    #[test]
    fn generic_getter_resolves_through_inheritance() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Box")
                .with_type_param(TypeParam::new("T"))
                .extends(TypeRef::concrete(OBJECT))
                .with_method(getter("getContent", TypeRef::variable("T"))),
        );
        schema.register(TypeDescriptor::new("app.IntBox").extends(TypeRef::parameterized(
            "app.Box",
            vec![TypeRef::concrete("int")],
        )));
        let reflector = Reflector::new("app.IntBox", &schema).unwrap();
        assert_eq!(reflector.getter_type("content").unwrap(), "int");
    }
}
