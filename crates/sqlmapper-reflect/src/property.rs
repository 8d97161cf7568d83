//! Property naming, tokenizing, and best-effort copying.

use serde_json::Value as JsonValue;

use crate::invoker::HostObject;
use crate::schema::{TypeRef, TypeSchema};

/// Accessor-name conventions: `getX`/`isX` read, `setX` writes.
pub struct PropertyNamer;

impl PropertyNamer {
    pub fn is_getter(name: &str) -> bool {
        (name.starts_with("get") && name.len() > 3) || (name.starts_with("is") && name.len() > 2)
    }

    pub fn is_setter(name: &str) -> bool {
        name.starts_with("set") && name.len() > 3
    }

    /// Strip the accessor prefix and decapitalize the leading character.
    ///
    /// The leading character is lowered only when the second character is
    /// not already uppercase, so `getURL` stays `URL`.
    pub fn method_to_property(name: &str) -> String {
        let stripped = if let Some(rest) = name.strip_prefix("is") {
            rest
        } else if let Some(rest) = name.strip_prefix("get").or_else(|| name.strip_prefix("set")) {
            rest
        } else {
            name
        };
        let mut chars = stripped.chars();
        match chars.next() {
            Some(first) => {
                let rest: String = chars.collect();
                if rest.chars().next().is_some_and(|c| c.is_uppercase()) {
                    format!("{}{}", first, rest)
                } else {
                    format!("{}{}", first.to_lowercase(), rest)
                }
            }
            None => String::new(),
        }
    }

    /// Names starting with `$`, plus `serialVersionUID` and `class`, are not
    /// properties.
    pub fn is_valid_property(name: &str) -> bool {
        !name.starts_with('$') && name != "serialVersionUID" && name != "class"
    }
}

/// Splits a dotted property expression `a.b[3].c` into its leading segment
/// and remainder.
///
/// The first `.` separates `name[index?]` from `children`; the first pair of
/// brackets isolates the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTokenizer {
    name: String,
    indexed_name: String,
    index: Option<String>,
    children: Option<String>,
}

impl PropertyTokenizer {
    pub fn new(full_name: &str) -> Self {
        let (mut name, children) = match full_name.find('.') {
            Some(delim) => (
                full_name[..delim].to_string(),
                Some(full_name[delim + 1..].to_string()),
            ),
            None => (full_name.to_string(), None),
        };
        let indexed_name = name.clone();
        let index = match name.find('[') {
            Some(open) => {
                let close = name.rfind(']').unwrap_or(name.len());
                let idx = name[open + 1..close].to_string();
                name.truncate(open);
                Some(idx)
            }
            None => None,
        };
        Self {
            name,
            indexed_name,
            index,
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The segment with its index suffix intact, e.g. `b[3]`.
    pub fn indexed_name(&self) -> &str {
        &self.indexed_name
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn children(&self) -> Option<&str> {
        self.children.as_deref()
    }

    pub fn has_next(&self) -> bool {
        self.children.is_some()
    }

    /// Tokenizer for the remainder after the leading segment.
    pub fn next_token(&self) -> PropertyTokenizer {
        PropertyTokenizer::new(self.children.as_deref().unwrap_or(""))
    }
}

/// Copy every field of `type_name` (walking ancestors) from `source` to
/// `destination`. Individual fields that cannot be copied are skipped; this
/// is a best-effort operation by contract.
pub fn copy_properties(
    schema: &TypeSchema,
    type_name: &str,
    source: &dyn HostObject,
    destination: &mut dyn HostObject,
) {
    let mut current = Some(type_name.to_string());
    while let Some(name) = current {
        let Some(descriptor) = schema.get(&name) else {
            break;
        };
        for field in &descriptor.fields {
            if field.is_final && field.is_static {
                continue;
            }
            if let Some(value) = source.read(&field.name) {
                destination.write(&field.name, value);
            }
        }
        current = descriptor.superclass.as_ref().and_then(TypeRef::raw_name);
    }
}

/// Read a property as a JSON value, defaulting to null.
pub fn read_or_null(source: &dyn HostObject, property: &str) -> JsonValue {
    source.read(property).unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::DynObject;
    use crate::schema::{FieldDescriptor, TypeDescriptor};

    #[test]
    fn tokenizer_splits_indexed_paths() {
        let token = PropertyTokenizer::new("orders[3].item.name");
        assert_eq!(token.name(), "orders");
        assert_eq!(token.indexed_name(), "orders[3]");
        assert_eq!(token.index(), Some("3"));
        assert_eq!(token.children(), Some("item.name"));
        assert!(token.has_next());

        let next = token.next_token();
        assert_eq!(next.name(), "item");
        assert_eq!(next.index(), None);
        assert_eq!(next.children(), Some("name"));

        let last = next.next_token();
        assert_eq!(last.name(), "name");
        assert!(!last.has_next());
    }

    #[test]
    fn namer_strips_prefixes() {
        assert_eq!(PropertyNamer::method_to_property("getName"), "name");
        assert_eq!(PropertyNamer::method_to_property("isActive"), "active");
        assert_eq!(PropertyNamer::method_to_property("setID"), "ID");
        assert!(PropertyNamer::is_getter("isA"));
        assert!(!PropertyNamer::is_getter("is"));
        assert!(!PropertyNamer::is_setter("set"));
        assert!(!PropertyNamer::is_valid_property("$jacoco"));
        assert!(!PropertyNamer::is_valid_property("class"));
        assert!(PropertyNamer::is_valid_property("name"));
    }

    #[test]
    fn copy_walks_ancestors_and_skips_missing() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Base")
                .extends(TypeRef::concrete("object"))
                .with_field(FieldDescriptor::new("id", TypeRef::concrete("long"))),
        );
        schema.register(
            TypeDescriptor::new("app.User")
                .extends(TypeRef::concrete("app.Base"))
                .with_field(FieldDescriptor::new("name", TypeRef::concrete("string"))),
        );
        let source = DynObject::new("app.User")
            .with("id", JsonValue::from(9))
            .with("name", JsonValue::from("ada"));
        let mut dest = DynObject::new("app.User");
        copy_properties(&schema, "app.User", &source, &mut dest);
        assert_eq!(dest.read("id"), Some(JsonValue::from(9)));
        assert_eq!(dest.read("name"), Some(JsonValue::from("ada")));
    }
}
