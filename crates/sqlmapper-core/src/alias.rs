//! Case-insensitive type-alias registry.

use std::collections::HashMap;

use sqlmapper_reflect::{TypeDescriptor, TypeSchema};

use crate::error::{Error, Result};

/// Maps short alias strings to schema type names.
///
/// Aliases are keyed case-insensitively. Re-registering an alias with a
/// different target is an error; with the same target it is idempotent.
#[derive(Debug, Clone)]
pub struct TypeAliasRegistry {
    aliases: HashMap<String, String>,
}

impl Default for TypeAliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeAliasRegistry {
    /// A registry seeded with the primitive, collection, and result-set
    /// aliases. Boxed and unboxed spellings map to the same schema type.
    pub fn new() -> Self {
        let mut registry = Self {
            aliases: HashMap::new(),
        };
        let seed = |registry: &mut Self, alias: &str, value: &str| {
            registry
                .register(alias, value)
                .expect("seed aliases cannot conflict");
        };

        seed(&mut registry, "string", "string");

        for (alias, value) in [
            ("byte", "byte"),
            ("char", "char"),
            ("character", "char"),
            ("long", "long"),
            ("short", "short"),
            ("int", "int"),
            ("integer", "int"),
            ("double", "double"),
            ("float", "float"),
            ("boolean", "boolean"),
        ] {
            seed(&mut registry, alias, value);
            seed(&mut registry, &format!("{}[]", alias), &format!("{}[]", value));
            seed(&mut registry, &format!("_{}", alias), value);
            seed(
                &mut registry,
                &format!("_{}[]", alias),
                &format!("{}[]", value),
            );
        }

        for (alias, value) in [
            ("date", "date"),
            ("decimal", "decimal"),
            ("bigdecimal", "decimal"),
            ("biginteger", "biginteger"),
            ("object", "object"),
        ] {
            seed(&mut registry, alias, value);
            seed(&mut registry, &format!("{}[]", alias), &format!("{}[]", value));
        }

        for name in ["map", "hashmap", "list", "arraylist", "collection", "iterator"] {
            seed(&mut registry, name, name);
        }
        seed(&mut registry, "ResultSet", "resultset");

        registry
    }

    /// Register an alias for a type name.
    pub fn register(&mut self, alias: &str, type_name: &str) -> Result<()> {
        if alias.is_empty() {
            return Err(Error::type_alias(alias, "The alias cannot be empty"));
        }
        let key = alias.to_lowercase();
        if let Some(existing) = self.aliases.get(&key) {
            if existing != type_name {
                return Err(Error::type_alias(
                    alias,
                    format!(
                        "The alias '{}' is already mapped to the value '{}'",
                        alias, existing
                    ),
                ));
            }
            return Ok(());
        }
        self.aliases.insert(key, type_name.to_string());
        Ok(())
    }

    /// Register a descriptor under its declared alias, or its simple name
    /// when no alias is declared.
    pub fn register_type(&mut self, descriptor: &TypeDescriptor) -> Result<()> {
        let alias = descriptor
            .alias
            .clone()
            .unwrap_or_else(|| descriptor.simple_name().to_string());
        self.register(&alias, &descriptor.name)
    }

    /// Register every concrete, non-anonymous, non-inner type under a dotted
    /// package prefix, optionally restricted to subtypes of `super_type`.
    pub fn register_package(
        &mut self,
        prefix: &str,
        super_type: Option<&str>,
        schema: &TypeSchema,
    ) -> Result<()> {
        for descriptor in schema.types_in_package(prefix) {
            if descriptor.is_anonymous || descriptor.is_inner || descriptor.is_interface {
                continue;
            }
            if let Some(required) = super_type {
                if !schema.is_assignable(required, &descriptor.name) {
                    continue;
                }
            }
            self.register_type(&descriptor)?;
        }
        Ok(())
    }

    /// Resolve an alias to a type name. An unregistered alias is accepted
    /// when it names a schema type directly; otherwise resolution fails.
    pub fn resolve(&self, alias: &str, schema: &TypeSchema) -> Result<String> {
        let key = alias.to_lowercase();
        if let Some(found) = self.aliases.get(&key) {
            return Ok(found.clone());
        }
        if schema.contains(alias) {
            return Ok(alias.to_string());
        }
        Err(Error::type_alias(
            alias,
            format!("Could not resolve type alias '{}'", alias),
        ))
    }

    /// Resolve an optional alias attribute.
    pub fn resolve_optional(
        &self,
        alias: Option<&str>,
        schema: &TypeSchema,
    ) -> Result<Option<String>> {
        match alias {
            Some(alias) => self.resolve(alias, schema).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_reflect::TypeRef;

    #[test]
    fn resolution_is_case_insensitive() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(TypeDescriptor::new("com.example.User"));
        let mut registry = TypeAliasRegistry::new();
        registry.register("user", "com.example.User").unwrap();
        assert_eq!(registry.resolve("USER", &schema).unwrap(), "com.example.User");
        assert_eq!(registry.resolve("User", &schema).unwrap(), "com.example.User");
    }

    #[test]
    fn unknown_alias_falls_back_to_schema_then_errors() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(TypeDescriptor::new("com.example.Order"));
        let registry = TypeAliasRegistry::new();
        assert_eq!(
            registry.resolve("com.example.Order", &schema).unwrap(),
            "com.example.Order"
        );
        assert!(matches!(
            registry.resolve("unknown", &schema),
            Err(Error::TypeAlias(_))
        ));
    }

    #[test]
    fn conflicting_registration_is_rejected_but_idempotent_is_fine() {
        let mut registry = TypeAliasRegistry::new();
        registry.register("user", "com.example.User").unwrap();
        registry.register("user", "com.example.User").unwrap();
        assert!(registry.register("USER", "com.example.Other").is_err());
    }

    #[test]
    fn seeded_aliases_cover_primitives_and_collections() {
        let schema = TypeSchema::with_builtins();
        let registry = TypeAliasRegistry::new();
        assert_eq!(registry.resolve("integer", &schema).unwrap(), "int");
        assert_eq!(registry.resolve("_int", &schema).unwrap(), "int");
        assert_eq!(registry.resolve("int[]", &schema).unwrap(), "int[]");
        assert_eq!(registry.resolve("bigdecimal", &schema).unwrap(), "decimal");
        assert_eq!(registry.resolve("arraylist", &schema).unwrap(), "arraylist");
        assert_eq!(registry.resolve("resultset", &schema).unwrap(), "resultset");
    }

    #[test]
    fn package_scan_registers_concrete_types_only() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(TypeDescriptor::new("app.model.User").extends(TypeRef::concrete("object")));
        schema.register(
            TypeDescriptor::new("app.model.Listener")
                .interface()
                .extends(TypeRef::concrete("object")),
        );
        schema.register(
            TypeDescriptor::new("app.model.Hidden")
                .inner()
                .extends(TypeRef::concrete("object")),
        );
        let mut registry = TypeAliasRegistry::new();
        registry.register_package("app.model", None, &schema).unwrap();
        assert_eq!(registry.resolve("User", &schema).unwrap(), "app.model.User");
        assert!(registry.resolve("Listener", &schema).is_err());
        assert!(registry.resolve("Hidden", &schema).is_err());
    }
}
