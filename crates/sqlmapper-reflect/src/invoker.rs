//! Accessor invokers and the host object model.
//!
//! Accessors are a tagged sum rather than runtime-generated proxies: a
//! method-backed or field-backed getter/setter, or an ambiguous marker that
//! fails on invocation. Host objects are dynamic property bags typed against
//! the schema; the payload is `serde_json::Value`.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{ReflectResult, ReflectionError};
use crate::schema::{FieldDescriptor, MethodDescriptor};

/// A dynamic host object the engine can read and write properties on.
pub trait HostObject {
    /// The schema name of this object's type.
    fn type_name(&self) -> &str;

    /// Read a property; `None` when the property holds no value.
    fn read(&self, property: &str) -> Option<JsonValue>;

    /// Write a property.
    fn write(&mut self, property: &str, value: JsonValue);
}

/// Map-backed [`HostObject`] implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct DynObject {
    type_name: String,
    values: BTreeMap<String, JsonValue>,
}

impl DynObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style property assignment.
    pub fn with(mut self, property: impl Into<String>, value: JsonValue) -> Self {
        self.values.insert(property.into(), value);
        self
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl HostObject for DynObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn read(&self, property: &str) -> Option<JsonValue> {
        self.values.get(property).cloned()
    }

    fn write(&mut self, property: &str, value: JsonValue) {
        self.values.insert(property.to_string(), value);
    }
}

/// A resolved accessor for one property.
#[derive(Debug, Clone, PartialEq)]
pub enum Invoker {
    MethodGetter {
        property: String,
        method: MethodDescriptor,
        declared_by: String,
    },
    MethodSetter {
        property: String,
        method: MethodDescriptor,
        declared_by: String,
    },
    FieldGetter {
        field: FieldDescriptor,
        declared_by: String,
    },
    FieldSetter {
        field: FieldDescriptor,
        declared_by: String,
    },
    /// Conflict arbitration failed; invocation reports the stored message.
    Ambiguous { property: String, message: String },
}

impl Invoker {
    /// The property this invoker accesses.
    pub fn property(&self) -> &str {
        match self {
            Invoker::MethodGetter { property, .. }
            | Invoker::MethodSetter { property, .. }
            | Invoker::Ambiguous { property, .. } => property,
            Invoker::FieldGetter { field, .. } | Invoker::FieldSetter { field, .. } => &field.name,
        }
    }

    /// Read the property from `target`. Absent values read as JSON null.
    pub fn get(&self, target: &dyn HostObject) -> ReflectResult<JsonValue> {
        match self {
            Invoker::MethodGetter { property, .. } => {
                Ok(target.read(property).unwrap_or(JsonValue::Null))
            }
            Invoker::FieldGetter { field, .. } => {
                Ok(target.read(&field.name).unwrap_or(JsonValue::Null))
            }
            Invoker::Ambiguous { message, .. } => Err(ReflectionError::new(message.clone())),
            Invoker::MethodSetter { .. } | Invoker::FieldSetter { .. } => {
                Err(ReflectionError::new(format!(
                    "Cannot read property '{}' through a setter on '{}'",
                    self.property(),
                    target.type_name()
                )))
            }
        }
    }

    /// Write the property on `target`.
    pub fn set(&self, target: &mut dyn HostObject, value: JsonValue) -> ReflectResult<()> {
        match self {
            Invoker::MethodSetter { property, .. } => {
                target.write(property, value);
                Ok(())
            }
            Invoker::FieldSetter { field, .. } => {
                target.write(&field.name, value);
                Ok(())
            }
            Invoker::Ambiguous { message, .. } => Err(ReflectionError::new(message.clone())),
            Invoker::MethodGetter { .. } | Invoker::FieldGetter { .. } => {
                Err(ReflectionError::new(format!(
                    "Cannot write property '{}' through a getter on '{}'",
                    self.property(),
                    target.type_name()
                )))
            }
        }
    }

    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Invoker::Ambiguous { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRef;

    #[test]
    fn dyn_object_read_write() {
        let mut user = DynObject::new("app.User").with("id", JsonValue::from(7));
        assert_eq!(user.read("id"), Some(JsonValue::from(7)));
        user.write("name", JsonValue::from("ada"));
        assert_eq!(user.read("name"), Some(JsonValue::from("ada")));
        assert_eq!(user.read("missing"), None);
    }

    #[test]
    fn ambiguous_invoker_fails_with_its_message() {
        let invoker = Invoker::Ambiguous {
            property: "x".to_string(),
            message: "ambiguous getter for 'x'".to_string(),
        };
        let user = DynObject::new("app.User");
        let err = invoker.get(&user).unwrap_err();
        assert!(err.message.contains("ambiguous getter for 'x'"));
    }

    #[test]
    fn method_getter_reads_backing_property() {
        let invoker = Invoker::MethodGetter {
            property: "name".to_string(),
            method: MethodDescriptor::new("getName", vec![], TypeRef::concrete("string")),
            declared_by: "app.User".to_string(),
        };
        let user = DynObject::new("app.User").with("name", JsonValue::from("ada"));
        assert_eq!(invoker.get(&user).unwrap(), JsonValue::from("ada"));
    }
}
