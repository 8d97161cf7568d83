//! Schema-driven reflection engine for sqlmapper.
//!
//! Rust has no runtime reflection, so this crate operates on a
//! caller-supplied [`TypeSchema`]: a registry of type descriptors carrying
//! supertype links, generic parameters, methods, and fields. On top of the
//! schema it provides:
//!
//! - [`Reflector`] — cached per-type property metadata with getter/setter
//!   conflict arbitration
//! - [`MetaType`] — dotted property-path traversal (`a.b[3].c`)
//! - [`resolver`] — generic type-variable resolution through inheritance
//!   chains
//! - [`Invoker`] — tagged accessors operating on [`HostObject`] values

pub mod error;
pub mod factory;
pub mod invoker;
pub mod meta_type;
pub mod property;
pub mod reflector;
pub mod resolver;
pub mod schema;

pub use error::{ReflectResult, ReflectionError};
pub use factory::ReflectorFactory;
pub use invoker::{DynObject, HostObject, Invoker};
pub use meta_type::MetaType;
pub use property::{PropertyNamer, PropertyTokenizer};
pub use reflector::Reflector;
pub use schema::{
    FieldDescriptor, MethodDescriptor, TypeDescriptor, TypeParam, TypeRef, TypeSchema,
};
