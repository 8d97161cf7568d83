//! JDBC type codes and the type-handler registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The JDBC column type a mapping may pin a column or parameter to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum JdbcType {
    ARRAY,
    BIT,
    TINYINT,
    SMALLINT,
    INTEGER,
    BIGINT,
    FLOAT,
    REAL,
    DOUBLE,
    NUMERIC,
    DECIMAL,
    CHAR,
    VARCHAR,
    LONGVARCHAR,
    DATE,
    TIME,
    TIMESTAMP,
    BINARY,
    VARBINARY,
    LONGVARBINARY,
    NULL,
    OTHER,
    BLOB,
    CLOB,
    BOOLEAN,
    CURSOR,
    NVARCHAR,
    NCHAR,
    NCLOB,
    STRUCT,
    ROWID,
    UNDEFINED,
    SQLXML,
    DATETIMEOFFSET,
    TIME_WITH_TIMEZONE,
    TIMESTAMP_WITH_TIMEZONE,
}

impl JdbcType {
    /// Parse the attribute spelling used in mapper documents.
    pub fn from_name(name: &str) -> Result<Self> {
        let parsed = match name {
            "ARRAY" => JdbcType::ARRAY,
            "BIT" => JdbcType::BIT,
            "TINYINT" => JdbcType::TINYINT,
            "SMALLINT" => JdbcType::SMALLINT,
            "INTEGER" => JdbcType::INTEGER,
            "BIGINT" => JdbcType::BIGINT,
            "FLOAT" => JdbcType::FLOAT,
            "REAL" => JdbcType::REAL,
            "DOUBLE" => JdbcType::DOUBLE,
            "NUMERIC" => JdbcType::NUMERIC,
            "DECIMAL" => JdbcType::DECIMAL,
            "CHAR" => JdbcType::CHAR,
            "VARCHAR" => JdbcType::VARCHAR,
            "LONGVARCHAR" => JdbcType::LONGVARCHAR,
            "DATE" => JdbcType::DATE,
            "TIME" => JdbcType::TIME,
            "TIMESTAMP" => JdbcType::TIMESTAMP,
            "BINARY" => JdbcType::BINARY,
            "VARBINARY" => JdbcType::VARBINARY,
            "LONGVARBINARY" => JdbcType::LONGVARBINARY,
            "NULL" => JdbcType::NULL,
            "OTHER" => JdbcType::OTHER,
            "BLOB" => JdbcType::BLOB,
            "CLOB" => JdbcType::CLOB,
            "BOOLEAN" => JdbcType::BOOLEAN,
            "CURSOR" => JdbcType::CURSOR,
            "NVARCHAR" => JdbcType::NVARCHAR,
            "NCHAR" => JdbcType::NCHAR,
            "NCLOB" => JdbcType::NCLOB,
            "STRUCT" => JdbcType::STRUCT,
            "ROWID" => JdbcType::ROWID,
            "UNDEFINED" => JdbcType::UNDEFINED,
            "SQLXML" => JdbcType::SQLXML,
            "DATETIMEOFFSET" => JdbcType::DATETIMEOFFSET,
            "TIME_WITH_TIMEZONE" => JdbcType::TIME_WITH_TIMEZONE,
            "TIMESTAMP_WITH_TIMEZONE" => JdbcType::TIMESTAMP_WITH_TIMEZONE,
            other => {
                return Err(Error::builder(format!(
                    "Error resolving JdbcType. Cause: no JDBC type named '{}'",
                    other
                )));
            }
        };
        Ok(parsed)
    }
}

/// A registered type handler: converts between a host type and a column
/// type. Execution is external, so the registry tracks handler identity and
/// applicability only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandlerSpec {
    pub handler: String,
    pub java_type: Option<String>,
    pub jdbc_type: Option<JdbcType>,
}

/// Registry of type handlers keyed by host type and optional JDBC type.
#[derive(Debug, Default)]
pub struct TypeHandlerRegistry {
    by_type: HashMap<(String, Option<JdbcType>), TypeHandlerSpec>,
    all: Vec<TypeHandlerSpec>,
}

impl TypeHandlerRegistry {
    /// A registry pre-seeded with the built-in scalar handlers.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for (java_type, jdbc_type) in [
            ("string", JdbcType::VARCHAR),
            ("byte", JdbcType::TINYINT),
            ("short", JdbcType::SMALLINT),
            ("int", JdbcType::INTEGER),
            ("long", JdbcType::BIGINT),
            ("float", JdbcType::REAL),
            ("double", JdbcType::DOUBLE),
            ("boolean", JdbcType::BOOLEAN),
            ("date", JdbcType::TIMESTAMP),
            ("decimal", JdbcType::DECIMAL),
            ("biginteger", JdbcType::NUMERIC),
        ] {
            registry.register(TypeHandlerSpec {
                handler: format!("{}-handler", java_type),
                java_type: Some(java_type.to_string()),
                jdbc_type: Some(jdbc_type),
            });
        }
        registry
    }

    pub fn register(&mut self, spec: TypeHandlerSpec) {
        if let Some(java_type) = spec.java_type.clone() {
            self.by_type.insert((java_type, spec.jdbc_type), spec.clone());
        }
        self.all.push(spec);
    }

    /// Find a handler for a host type, preferring an exact JDBC pairing and
    /// falling back to the type-only registration.
    pub fn handler_for(
        &self,
        java_type: &str,
        jdbc_type: Option<JdbcType>,
    ) -> Option<&TypeHandlerSpec> {
        self.by_type
            .get(&(java_type.to_string(), jdbc_type))
            .or_else(|| self.by_type.get(&(java_type.to_string(), None)))
    }

    pub fn has_handler_for(&self, java_type: &str) -> bool {
        self.all
            .iter()
            .any(|spec| spec.java_type.as_deref() == Some(java_type))
    }

    pub fn handlers(&self) -> &[TypeHandlerSpec] {
        &self.all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jdbc_type_parsing() {
        assert_eq!(JdbcType::from_name("VARCHAR").unwrap(), JdbcType::VARCHAR);
        assert!(JdbcType::from_name("varchar").is_err());
        assert!(JdbcType::from_name("NOPE").is_err());
    }

    #[test]
    fn handler_lookup_falls_back_to_type_only() {
        let mut registry = TypeHandlerRegistry::new();
        registry.register(TypeHandlerSpec {
            handler: "uuid-handler".to_string(),
            java_type: Some("uuid".to_string()),
            jdbc_type: None,
        });
        assert!(registry
            .handler_for("uuid", Some(JdbcType::VARCHAR))
            .is_some());
        assert!(registry
            .handler_for("string", Some(JdbcType::VARCHAR))
            .is_some());
        assert!(registry.handler_for("nope", None).is_none());
    }
}
