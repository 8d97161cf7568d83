//! The data-driven type model the reflection engine operates on.
//!
//! A [`TypeSchema`] is the pre-extracted description of the host types a
//! mapping configuration refers to. Descriptors carry everything the engine
//! needs: supertype links, declared generic parameters, method and field
//! signatures. Type uses are [`TypeRef`]s, which mirror the five shapes a
//! declared type can take.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReflectResult, ReflectionError};

/// The canonical root type every descriptor is assignable to.
pub const OBJECT: &str = "object";

/// A use of a type: concrete, type variable, parameterized, array, or
/// wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    /// A fully resolved named type, e.g. `string` or `com.example.User`.
    Concrete(String),
    /// A type variable such as `T`.
    Variable(String),
    /// A generic type application, e.g. `list<int>`.
    Parameterized { raw: String, args: Vec<TypeRef> },
    /// An array of some component type.
    Array(Box<TypeRef>),
    /// A bounded wildcard.
    Wildcard {
        lower: Vec<TypeRef>,
        upper: Vec<TypeRef>,
    },
}

impl TypeRef {
    pub fn concrete(name: impl Into<String>) -> Self {
        TypeRef::Concrete(name.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        TypeRef::Variable(name.into())
    }

    pub fn parameterized(raw: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Parameterized {
            raw: raw.into(),
            args,
        }
    }

    pub fn array(component: TypeRef) -> Self {
        TypeRef::Array(Box::new(component))
    }

    /// The raw (erased) type name of this reference, when it has one.
    ///
    /// Variables and wildcards have no raw name of their own; arrays report
    /// their component's raw name suffixed with `[]`.
    pub fn raw_name(&self) -> Option<String> {
        match self {
            TypeRef::Concrete(name) => Some(name.clone()),
            TypeRef::Parameterized { raw, .. } => Some(raw.clone()),
            TypeRef::Array(component) => component.raw_name().map(|n| format!("{}[]", n)),
            TypeRef::Variable(_) | TypeRef::Wildcard { .. } => None,
        }
    }

    pub const fn is_variable(&self) -> bool {
        matches!(self, TypeRef::Variable(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Concrete(name) => write!(f, "{}", name),
            TypeRef::Variable(name) => write!(f, "{}", name),
            TypeRef::Parameterized { raw, args } => {
                write!(f, "{}<", raw)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeRef::Array(component) => write!(f, "{}[]", component),
            TypeRef::Wildcard { .. } => write!(f, "?"),
        }
    }
}

/// A declared generic parameter with its bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeRef>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bounds: Vec::new(),
        }
    }

    pub fn bounded(name: impl Into<String>, bounds: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// A method signature as declared on a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub param_types: Vec<TypeRef>,
    pub return_type: TypeRef,
    /// Compiler-synthesized bridge methods are skipped during enumeration.
    pub is_bridge: bool,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, param_types: Vec<TypeRef>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            param_types,
            return_type,
            is_bridge: false,
        }
    }

    pub fn bridge(mut self) -> Self {
        self.is_bridge = true;
        self
    }
}

/// A field as declared on a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: TypeRef,
    pub is_final: bool,
    pub is_static: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_final: false,
            is_static: false,
        }
    }

    pub fn final_static(mut self) -> Self {
        self.is_final = true;
        self.is_static = true;
        self
    }
}

/// Everything the engine knows about one host type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Fully qualified dotted name.
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub methods: Vec<MethodDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub has_default_constructor: bool,
    /// Record-shaped types expose every component as a zero-arg accessor
    /// bearing the component name.
    pub is_record: bool,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_anonymous: bool,
    pub is_inner: bool,
    /// Declared alias, the annotation analog; overrides the simple name.
    pub alias: Option<String>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            has_default_constructor: true,
            is_record: false,
            is_interface: false,
            is_abstract: false,
            is_anonymous: false,
            is_inner: false,
            alias: None,
        }
    }

    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_type_param(mut self, param: TypeParam) -> Self {
        self.type_params.push(param);
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn record(mut self) -> Self {
        self.is_record = true;
        self
    }

    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self.has_default_constructor = false;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.is_anonymous = true;
        self
    }

    pub fn inner(mut self) -> Self {
        self.is_inner = true;
        self
    }

    pub fn no_default_constructor(mut self) -> Self {
        self.has_default_constructor = false;
        self
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The part of the name after the last dot.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// A concrete type can be instantiated: not an interface, not abstract.
    pub const fn is_concrete(&self) -> bool {
        !self.is_interface && !self.is_abstract
    }
}

/// Registry of type descriptors keyed by fully qualified name.
#[derive(Debug, Default)]
pub struct TypeSchema {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl TypeSchema {
    /// An empty schema with no built-in types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema pre-seeded with the primitive, boxed-collection, and JDBC
    /// result-set descriptors the alias registry expects.
    pub fn with_builtins() -> Self {
        let mut schema = Self::new();
        schema.register(TypeDescriptor::new(OBJECT));
        for name in [
            "string",
            "byte",
            "char",
            "short",
            "int",
            "long",
            "float",
            "double",
            "boolean",
            "date",
            "decimal",
            "biginteger",
        ] {
            schema.register(TypeDescriptor::new(name).extends(TypeRef::concrete(OBJECT)));
        }
        schema.register(
            TypeDescriptor::new("collection")
                .interface()
                .with_type_param(TypeParam::new("E"))
                .extends(TypeRef::concrete(OBJECT)),
        );
        schema.register(
            TypeDescriptor::new("list")
                .interface()
                .with_type_param(TypeParam::new("E"))
                .extends(TypeRef::parameterized("collection", vec![TypeRef::variable("E")])),
        );
        schema.register(
            TypeDescriptor::new("arraylist")
                .with_type_param(TypeParam::new("E"))
                .extends(TypeRef::parameterized("list", vec![TypeRef::variable("E")])),
        );
        schema.register(
            TypeDescriptor::new("map")
                .interface()
                .with_type_param(TypeParam::new("K"))
                .with_type_param(TypeParam::new("V"))
                .extends(TypeRef::concrete(OBJECT)),
        );
        schema.register(
            TypeDescriptor::new("hashmap")
                .with_type_param(TypeParam::new("K"))
                .with_type_param(TypeParam::new("V"))
                .extends(TypeRef::parameterized(
                    "map",
                    vec![TypeRef::variable("K"), TypeRef::variable("V")],
                )),
        );
        schema.register(
            TypeDescriptor::new("iterator")
                .interface()
                .with_type_param(TypeParam::new("E"))
                .extends(TypeRef::concrete(OBJECT)),
        );
        schema.register(TypeDescriptor::new("resultset").extends(TypeRef::concrete(OBJECT)));
        schema
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    /// Like [`get`](Self::get) but failing with a descriptive error.
    pub fn lookup(&self, name: &str) -> ReflectResult<&Arc<TypeDescriptor>> {
        self.types.get(name).ok_or_else(|| {
            ReflectionError::new(format!("Type '{}' is not present in the schema", name))
        })
    }

    /// Whether `sub` is assignable to `sup`, walking superclass and
    /// interface links. Every type is assignable to `object`.
    pub fn is_assignable(&self, sup: &str, sub: &str) -> bool {
        if sup == sub || sup == OBJECT {
            return true;
        }
        let Some(descriptor) = self.types.get(sub) else {
            return false;
        };
        if let Some(parent) = descriptor.superclass.as_ref().and_then(TypeRef::raw_name) {
            if self.is_assignable(sup, &parent) {
                return true;
            }
        }
        descriptor
            .interfaces
            .iter()
            .filter_map(TypeRef::raw_name)
            .any(|iface| self.is_assignable(sup, &iface))
    }

    /// The erased (raw) name of a type reference, resolving variables to
    /// their first declared bound on `declared_by`.
    pub fn erasure(&self, type_ref: &TypeRef, declared_by: &str) -> String {
        match type_ref {
            TypeRef::Concrete(name) => name.clone(),
            TypeRef::Parameterized { raw, .. } => raw.clone(),
            TypeRef::Array(component) => format!("{}[]", self.erasure(component, declared_by)),
            TypeRef::Variable(var) => self
                .types
                .get(declared_by)
                .and_then(|descriptor| {
                    descriptor
                        .type_params
                        .iter()
                        .find(|param| param.name == *var)
                })
                .and_then(|param| param.bounds.first())
                .map(|bound| self.erasure(bound, declared_by))
                .unwrap_or_else(|| OBJECT.to_string()),
            TypeRef::Wildcard { upper, .. } => upper
                .first()
                .map(|bound| self.erasure(bound, declared_by))
                .unwrap_or_else(|| OBJECT.to_string()),
        }
    }

    /// All descriptors whose name lives under the dotted `prefix`.
    pub fn types_in_package(&self, prefix: &str) -> Vec<Arc<TypeDescriptor>> {
        let dotted = format!("{}.", prefix);
        let mut found: Vec<Arc<TypeDescriptor>> = self
            .types
            .values()
            .filter(|descriptor| descriptor.name.starts_with(&dotted))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}
