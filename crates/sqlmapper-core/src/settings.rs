//! Global configuration settings.

use crate::error::{Error, Result};
use crate::mapping::statement::ResultSetType;
use crate::types::JdbcType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoMappingBehavior {
    None,
    #[default]
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoMappingUnknownColumnBehavior {
    #[default]
    None,
    Warning,
    Failing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorType {
    #[default]
    Simple,
    Reuse,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalCacheScope {
    #[default]
    Session,
    Statement,
}

/// The recognized global settings with their defaults.
///
/// [`Settings::apply`] is the validated assignment surface used by the
/// `<settings>` section: unknown keys and malformed values abort the parse.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_enabled: bool,
    pub lazy_loading_enabled: bool,
    pub aggressive_lazy_loading: bool,
    pub multiple_result_sets_enabled: bool,
    pub use_column_label: bool,
    pub use_generated_keys: bool,
    pub auto_mapping_behavior: AutoMappingBehavior,
    pub auto_mapping_unknown_column_behavior: AutoMappingUnknownColumnBehavior,
    pub default_executor_type: ExecutorType,
    pub default_statement_timeout: Option<u64>,
    pub default_fetch_size: Option<u32>,
    pub default_result_set_type: Option<ResultSetType>,
    pub map_underscore_to_camel_case: bool,
    pub safe_row_bounds_enabled: bool,
    pub safe_result_handler_enabled: bool,
    pub local_cache_scope: LocalCacheScope,
    pub jdbc_type_for_null: JdbcType,
    pub lazy_load_trigger_methods: Vec<String>,
    pub default_scripting_language: Option<String>,
    pub default_enum_type_handler: Option<String>,
    pub call_setters_on_nulls: bool,
    pub return_instance_for_empty_row: bool,
    pub shrink_whitespaces_in_sql: bool,
    pub arg_name_based_constructor_auto_mapping: bool,
    pub nullable_on_for_each: bool,
    pub log_prefix: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            lazy_loading_enabled: false,
            aggressive_lazy_loading: false,
            multiple_result_sets_enabled: true,
            use_column_label: true,
            use_generated_keys: false,
            auto_mapping_behavior: AutoMappingBehavior::Partial,
            auto_mapping_unknown_column_behavior: AutoMappingUnknownColumnBehavior::None,
            default_executor_type: ExecutorType::Simple,
            default_statement_timeout: None,
            default_fetch_size: None,
            default_result_set_type: None,
            map_underscore_to_camel_case: false,
            safe_row_bounds_enabled: false,
            safe_result_handler_enabled: true,
            local_cache_scope: LocalCacheScope::Session,
            jdbc_type_for_null: JdbcType::OTHER,
            lazy_load_trigger_methods: ["equals", "clone", "hashCode", "toString"]
                .map(String::from)
                .to_vec(),
            default_scripting_language: None,
            default_enum_type_handler: None,
            call_setters_on_nulls: false,
            return_instance_for_empty_row: false,
            shrink_whitespaces_in_sql: false,
            arg_name_based_constructor_auto_mapping: false,
            nullable_on_for_each: false,
            log_prefix: None,
        }
    }
}

impl Settings {
    /// Assign one setting from its document spelling.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "cacheEnabled" => self.cache_enabled = parse_bool(key, value)?,
            "lazyLoadingEnabled" => self.lazy_loading_enabled = parse_bool(key, value)?,
            "aggressiveLazyLoading" => self.aggressive_lazy_loading = parse_bool(key, value)?,
            "multipleResultSetsEnabled" => {
                self.multiple_result_sets_enabled = parse_bool(key, value)?;
            }
            "useColumnLabel" => self.use_column_label = parse_bool(key, value)?,
            "useGeneratedKeys" => self.use_generated_keys = parse_bool(key, value)?,
            "autoMappingBehavior" => {
                self.auto_mapping_behavior = match value {
                    "NONE" => AutoMappingBehavior::None,
                    "PARTIAL" => AutoMappingBehavior::Partial,
                    "FULL" => AutoMappingBehavior::Full,
                    other => return Err(bad_value(key, other)),
                };
            }
            "autoMappingUnknownColumnBehavior" => {
                self.auto_mapping_unknown_column_behavior = match value {
                    "NONE" => AutoMappingUnknownColumnBehavior::None,
                    "WARNING" => AutoMappingUnknownColumnBehavior::Warning,
                    "FAILING" => AutoMappingUnknownColumnBehavior::Failing,
                    other => return Err(bad_value(key, other)),
                };
            }
            "defaultExecutorType" => {
                self.default_executor_type = match value {
                    "SIMPLE" => ExecutorType::Simple,
                    "REUSE" => ExecutorType::Reuse,
                    "BATCH" => ExecutorType::Batch,
                    other => return Err(bad_value(key, other)),
                };
            }
            "defaultStatementTimeout" => {
                self.default_statement_timeout = Some(parse_int(key, value)?);
            }
            "defaultFetchSize" => {
                self.default_fetch_size = Some(parse_int(key, value)? as u32);
            }
            "defaultResultSetType" => {
                self.default_result_set_type = Some(ResultSetType::from_name(value)?);
            }
            "mapUnderscoreToCamelCase" => {
                self.map_underscore_to_camel_case = parse_bool(key, value)?;
            }
            "safeRowBoundsEnabled" => self.safe_row_bounds_enabled = parse_bool(key, value)?,
            "safeResultHandlerEnabled" => {
                self.safe_result_handler_enabled = parse_bool(key, value)?;
            }
            "localCacheScope" => {
                self.local_cache_scope = match value {
                    "SESSION" => LocalCacheScope::Session,
                    "STATEMENT" => LocalCacheScope::Statement,
                    other => return Err(bad_value(key, other)),
                };
            }
            "jdbcTypeForNull" => self.jdbc_type_for_null = JdbcType::from_name(value)?,
            "lazyLoadTriggerMethods" => {
                self.lazy_load_trigger_methods = value
                    .split(',')
                    .map(|method| method.trim().to_string())
                    .filter(|method| !method.is_empty())
                    .collect();
            }
            "defaultScriptingLanguage" => {
                self.default_scripting_language = Some(value.to_string());
            }
            "defaultEnumTypeHandler" => {
                self.default_enum_type_handler = Some(value.to_string());
            }
            "callSettersOnNulls" => self.call_setters_on_nulls = parse_bool(key, value)?,
            "returnInstanceForEmptyRow" => {
                self.return_instance_for_empty_row = parse_bool(key, value)?;
            }
            "shrinkWhitespacesInSql" => {
                self.shrink_whitespaces_in_sql = parse_bool(key, value)?;
            }
            "argNameBasedConstructorAutoMapping" => {
                self.arg_name_based_constructor_auto_mapping = parse_bool(key, value)?;
            }
            "nullableOnForEach" => self.nullable_on_for_each = parse_bool(key, value)?,
            "logPrefix" => self.log_prefix = Some(value.to_string()),
            unknown => {
                return Err(Error::builder(format!(
                    "The setting '{}' is not known. Make sure you spelled it correctly (case sensitive).",
                    unknown
                )));
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(bad_value(key, other)),
    }
}

fn parse_int(key: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| bad_value(key, value))
}

fn bad_value(key: &str, value: &str) -> Error {
    Error::builder(format!("Invalid value '{}' for setting '{}'", value, key))
}

/// Collapse runs of whitespace into single spaces.
pub fn shrink_whitespaces(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let settings = Settings::default();
        assert!(settings.cache_enabled);
        assert!(!settings.lazy_loading_enabled);
        assert_eq!(settings.auto_mapping_behavior, AutoMappingBehavior::Partial);
        assert_eq!(settings.default_executor_type, ExecutorType::Simple);
        assert_eq!(settings.jdbc_type_for_null, JdbcType::OTHER);
        assert_eq!(settings.lazy_load_trigger_methods.len(), 4);
    }

    #[test]
    fn apply_known_keys() {
        let mut settings = Settings::default();
        settings.apply("mapUnderscoreToCamelCase", "true").unwrap();
        settings.apply("defaultExecutorType", "BATCH").unwrap();
        settings.apply("localCacheScope", "STATEMENT").unwrap();
        settings
            .apply("lazyLoadTriggerMethods", "equals, hashCode")
            .unwrap();
        assert!(settings.map_underscore_to_camel_case);
        assert_eq!(settings.default_executor_type, ExecutorType::Batch);
        assert_eq!(settings.local_cache_scope, LocalCacheScope::Statement);
        assert_eq!(settings.lazy_load_trigger_methods, vec!["equals", "hashCode"]);
    }

    #[test]
    fn unknown_key_and_bad_values_abort() {
        let mut settings = Settings::default();
        let err = settings.apply("cacheEnabld", "true").unwrap_err();
        assert!(err.to_string().contains("not known"));
        assert!(settings.apply("cacheEnabled", "yes").is_err());
        assert!(settings.apply("defaultStatementTimeout", "soon").is_err());
    }

    #[test]
    fn whitespace_shrinking() {
        assert_eq!(
            shrink_whitespaces("SELECT *\n   FROM users\t WHERE id = ?"),
            "SELECT * FROM users WHERE id = ?"
        );
    }
}
