//! SQL sources, bound SQL, and the language-driver seam.
//!
//! Dynamic SQL assembly is an external collaborator; the core ships the
//! static source plus placeholder extraction: `#{prop,attr=value,…}` tokens
//! become positional `?` markers paired with [`ParameterMapping`]s.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::mapping::parameter::{ParameterMapping, ParameterMode};
use crate::types::JdbcType;
use crate::value::Value;

/// The executable form of a statement for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub parameter_mappings: Vec<ParameterMapping>,
    pub parameter_object: Value,
}

/// Produces [`BoundSql`] for a parameter object.
pub trait SqlSource: Send + Sync {
    fn bound_sql(&self, parameter: &Value) -> BoundSql;
}

/// A fully static source: the SQL text and its extracted parameters.
#[derive(Debug, Clone)]
pub struct StaticSqlSource {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
}

impl StaticSqlSource {
    pub fn new(sql: impl Into<String>, parameter_mappings: Vec<ParameterMapping>) -> Self {
        Self {
            sql: sql.into(),
            parameter_mappings,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }
}

impl SqlSource for StaticSqlSource {
    fn bound_sql(&self, parameter: &Value) -> BoundSql {
        BoundSql {
            sql: self.sql.clone(),
            parameter_mappings: self.parameter_mappings.clone(),
            parameter_object: parameter.clone(),
        }
    }
}

/// Replace `#{…}` placeholder tokens with `?` markers, extracting one
/// [`ParameterMapping`] per token. Token grammar: a property path followed
/// by comma-separated `key=value` attributes (`javaType`, `jdbcType`,
/// `mode`, `numericScale`, `typeHandler`).
pub fn parse_inline_parameters(sql: &str) -> Result<(String, Vec<ParameterMapping>)> {
    let mut output = String::with_capacity(sql.len());
    let mut mappings = Vec::new();
    let mut rest = sql;
    while let Some(start) = rest.find("#{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            Error::builder(format!(
                "Unterminated parameter placeholder in SQL near '{}'",
                &rest[start..rest.len().min(start + 40)]
            ))
        })?;
        mappings.push(parse_parameter_token(after[..end].trim())?);
        output.push('?');
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok((output, mappings))
}

fn parse_parameter_token(token: &str) -> Result<ParameterMapping> {
    if token.is_empty() {
        return Err(Error::builder("Empty parameter placeholder '#{}' in SQL"));
    }
    let mut parts = token.split(',').map(str::trim);
    let property = parts.next().unwrap_or_default();
    let mut mapping = ParameterMapping::new(property, "object");
    for part in parts {
        let (key, value) = part.split_once('=').ok_or_else(|| {
            Error::builder(format!(
                "Malformed attribute '{}' in parameter placeholder '#{{{}}}'",
                part, token
            ))
        })?;
        match key.trim() {
            "javaType" => mapping.java_type = value.trim().to_string(),
            "jdbcType" => mapping.jdbc_type = Some(JdbcType::from_name(value.trim())?),
            "mode" => {
                mapping.mode = match value.trim() {
                    "IN" => ParameterMode::In,
                    "OUT" => ParameterMode::Out,
                    "INOUT" => ParameterMode::InOut,
                    other => {
                        return Err(Error::builder(format!(
                            "Unknown parameter mode '{}' in placeholder '#{{{}}}'",
                            other, token
                        )));
                    }
                }
            }
            "numericScale" => {
                mapping.numeric_scale = Some(value.trim().parse().map_err(|_| {
                    Error::builder(format!(
                        "numericScale must be an integer in placeholder '#{{{}}}'",
                        token
                    ))
                })?);
            }
            "typeHandler" => mapping.type_handler = Some(value.trim().to_string()),
            "resultMap" => mapping.result_map_id = Some(value.trim().to_string()),
            other => {
                return Err(Error::builder(format!(
                    "Unknown attribute '{}' in parameter placeholder '#{{{}}}'",
                    other, token
                )));
            }
        }
    }
    Ok(mapping)
}

/// Compiles statement scripts into [`SqlSource`]s.
pub trait LanguageDriver: Send + Sync {
    fn create_sql_source(&self, script: &str) -> Result<Arc<dyn SqlSource>>;
}

/// The default driver: placeholder extraction over the assembled script
/// text.
#[derive(Debug, Default)]
pub struct XmlLanguageDriver;

impl LanguageDriver for XmlLanguageDriver {
    fn create_sql_source(&self, script: &str) -> Result<Arc<dyn SqlSource>> {
        let (sql, mappings) = parse_inline_parameters(script.trim())?;
        Ok(Arc::new(StaticSqlSource::new(sql, mappings)))
    }
}

/// Named language drivers plus the configured default.
pub struct LanguageDriverRegistry {
    drivers: HashMap<String, Arc<dyn LanguageDriver>>,
    default_driver: String,
}

impl Default for LanguageDriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDriverRegistry {
    pub fn new() -> Self {
        let mut drivers: HashMap<String, Arc<dyn LanguageDriver>> = HashMap::new();
        let driver: Arc<dyn LanguageDriver> = Arc::new(XmlLanguageDriver);
        drivers.insert("xml".to_string(), driver.clone());
        drivers.insert("raw".to_string(), driver);
        Self {
            drivers,
            default_driver: "xml".to_string(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn LanguageDriver>) {
        self.drivers.insert(name.into(), driver);
    }

    pub fn set_default(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !self.drivers.contains_key(&name) {
            return Err(Error::builder(format!(
                "Unknown scripting language '{}'",
                name
            )));
        }
        self.default_driver = name;
        Ok(())
    }

    pub fn default_driver_name(&self) -> &str {
        &self.default_driver
    }

    /// Resolve a driver by name, falling back to the default when `None`.
    pub fn driver(&self, name: Option<&str>) -> Result<Arc<dyn LanguageDriver>> {
        let name = name.unwrap_or(&self.default_driver);
        self.drivers.get(name).cloned().ok_or_else(|| {
            Error::builder(format!("Unknown scripting language '{}'", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_become_markers() {
        let (sql, mappings) =
            parse_inline_parameters("SELECT * FROM users WHERE id = #{id} AND name = #{name}")
                .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id = ? AND name = ?");
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].property, "id");
        assert_eq!(mappings[1].property, "name");
    }

    #[test]
    fn placeholder_attributes_are_parsed() {
        let (_, mappings) = parse_inline_parameters(
            "CALL total(#{amount, jdbcType=DECIMAL, mode=OUT, numericScale=2})",
        )
        .unwrap();
        let mapping = &mappings[0];
        assert_eq!(mapping.property, "amount");
        assert_eq!(mapping.jdbc_type, Some(JdbcType::DECIMAL));
        assert_eq!(mapping.mode, ParameterMode::Out);
        assert_eq!(mapping.numeric_scale, Some(2));
    }

    #[test]
    fn malformed_placeholders_error() {
        assert!(parse_inline_parameters("WHERE id = #{id").is_err());
        assert!(parse_inline_parameters("WHERE id = #{}").is_err());
        assert!(parse_inline_parameters("WHERE id = #{id, jdbcType=NOPE}").is_err());
        assert!(parse_inline_parameters("WHERE id = #{id, shape=round}").is_err());
    }

    #[test]
    fn static_source_binds_parameters() {
        let driver = XmlLanguageDriver;
        let source = driver
            .create_sql_source("SELECT 1 WHERE a = #{a}")
            .unwrap();
        let bound = source.bound_sql(&Value::from(5));
        assert_eq!(bound.sql, "SELECT 1 WHERE a = ?");
        assert_eq!(bound.parameter_mappings.len(), 1);
        assert_eq!(bound.parameter_object, Value::from(5));
    }

    #[test]
    fn registry_default_and_lookup() {
        let mut registry = LanguageDriverRegistry::new();
        assert!(registry.driver(None).is_ok());
        assert!(registry.driver(Some("raw")).is_ok());
        assert!(registry.driver(Some("groovy")).is_err());
        assert!(registry.set_default("raw").is_ok());
        assert_eq!(registry.default_driver_name(), "raw");
        assert!(registry.set_default("groovy").is_err());
    }
}
