//! Namespace-scoped build helper shared by the mapper and statement
//! builders.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use sqlmapper_core::cache::{Cache, CacheBuilder};
use sqlmapper_core::config::Configuration;
use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::{
    Discriminator, KeyGeneratorKind, MappedStatement, ParameterMap, ParameterMapping,
    ParameterMode, ResultFlag, ResultMap, ResultMapping, ResultSetType, SqlCommandType, SqlSource,
    StatementType,
};
use sqlmapper_core::parsing::Properties;
use sqlmapper_core::types::JdbcType;

/// Everything a statement element contributes besides its SQL source.
#[derive(Debug, Clone)]
pub struct StatementAttributes {
    pub id: String,
    pub statement_type: StatementType,
    pub sql_command_type: SqlCommandType,
    pub fetch_size: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub parameter_map: Option<String>,
    pub parameter_type: Option<String>,
    pub result_map: Option<String>,
    pub result_type: Option<String>,
    pub result_set_type: Option<ResultSetType>,
    pub flush_cache: bool,
    pub use_cache: bool,
    pub result_ordered: bool,
    pub key_generator: KeyGeneratorKind,
    pub key_property: Option<String>,
    pub key_column: Option<String>,
    pub database_id: Option<String>,
    pub lang: String,
    pub result_sets: Option<String>,
    pub dirty_select: bool,
}

/// Builds and registers mapping objects on behalf of one mapper document,
/// carrying the namespace, the namespace cache, and the unresolved
/// cache-ref flag.
pub struct MapperBuilderAssistant {
    resource: String,
    current_namespace: Option<String>,
    current_cache: Option<Arc<dyn Cache>>,
    unresolved_cache_ref: bool,
}

impl MapperBuilderAssistant {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            current_namespace: None,
            current_cache: None,
            unresolved_cache_ref: false,
        }
    }

    /// Rebuild the assistant for a pending retry, recovering the cache
    /// state from the registry. Fails incomplete while the namespace's
    /// cache-ref has not resolved.
    pub fn recovered(
        configuration: &Configuration,
        namespace: &str,
        resource: &str,
    ) -> Result<Self> {
        let mut assistant = Self::new(resource);
        assistant.current_namespace = Some(namespace.to_string());
        if let Some(referenced) = configuration.cache_ref(namespace) {
            if !configuration.has_cache(referenced) {
                return Err(Error::incomplete(format!(
                    "No cache for namespace '{}' could be found",
                    referenced
                )));
            }
            // an own <cache> declared after the ref takes precedence
            let effective = if configuration.has_cache(namespace) {
                configuration.cache(namespace)?
            } else {
                configuration.cache(referenced)?
            };
            assistant.current_cache = Some(effective);
        } else if configuration.has_cache(namespace) {
            assistant.current_cache = Some(configuration.cache(namespace)?);
        }
        Ok(assistant)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn current_namespace(&self) -> Result<&str> {
        self.current_namespace
            .as_deref()
            .ok_or_else(|| Error::builder("The mapper namespace has not been set"))
    }

    pub fn set_current_namespace(&mut self, namespace: &str) -> Result<()> {
        if namespace.is_empty() {
            return Err(Error::builder_in(
                "The mapper element requires a namespace attribute to be specified",
                &self.resource,
            ));
        }
        if let Some(current) = &self.current_namespace {
            if current != namespace {
                return Err(Error::builder(format!(
                    "Wrong namespace. Expected '{}' but found '{}'",
                    current, namespace
                )));
            }
        }
        self.current_namespace = Some(namespace.to_string());
        Ok(())
    }

    /// Normalize an id to `namespace.localId`. As a reference, a dotted id
    /// is accepted as-is; as a definition it is rejected.
    pub fn apply_current_namespace(&self, base: &str, is_reference: bool) -> Result<String> {
        let namespace = self.current_namespace()?;
        if is_reference {
            if base.contains('.') {
                return Ok(base.to_string());
            }
        } else {
            if base.starts_with(&format!("{}.", namespace)) {
                return Ok(base.to_string());
            }
            if base.contains('.') {
                return Err(Error::builder(format!(
                    "Dots are not allowed in element names, please remove it from {}",
                    base
                )));
            }
        }
        Ok(format!("{}.{}", namespace, base))
    }

    pub fn unresolved_cache_ref(&self) -> bool {
        self.unresolved_cache_ref
    }

    pub fn current_cache(&self) -> Option<&Arc<dyn Cache>> {
        self.current_cache.as_ref()
    }

    /// Adopt another namespace's cache. A missing target marks the
    /// reference unresolved and fails incomplete.
    pub fn use_cache_ref(
        &mut self,
        configuration: &Configuration,
        namespace: &str,
    ) -> Result<Arc<dyn Cache>> {
        self.unresolved_cache_ref = true;
        if !configuration.has_cache(namespace) {
            return Err(Error::incomplete(format!(
                "No cache for namespace '{}' could be found",
                namespace
            )));
        }
        let cache = configuration.cache(namespace)?;
        self.current_cache = Some(cache.clone());
        self.unresolved_cache_ref = false;
        Ok(cache)
    }

    /// Build this namespace's cache and register it.
    #[allow(clippy::too_many_arguments)]
    pub fn use_new_cache(
        &mut self,
        configuration: &mut Configuration,
        implementation: Option<String>,
        eviction: Option<String>,
        flush_interval: Option<Duration>,
        size: Option<usize>,
        read_write: bool,
        blocking: bool,
        properties: Properties,
    ) -> Result<Arc<dyn Cache>> {
        let namespace = self.current_namespace()?.to_string();
        let mut builder = CacheBuilder::new(namespace)
            .clear_interval(flush_interval)
            .size(size)
            .read_write(read_write)
            .blocking(blocking)
            .properties(properties);
        if let Some(implementation) = implementation {
            builder = builder.implementation(implementation);
        }
        if let Some(eviction) = eviction {
            builder = builder.eviction(eviction);
        }
        let cache: Arc<dyn Cache> = Arc::from(builder.build()?);
        configuration.add_cache(cache.clone())?;
        self.current_cache = Some(cache.clone());
        Ok(cache)
    }

    pub fn add_parameter_map(
        &self,
        configuration: &mut Configuration,
        id: &str,
        type_name: String,
        parameter_mappings: Vec<ParameterMapping>,
    ) -> Result<Arc<ParameterMap>> {
        let id = self.apply_current_namespace(id, false)?;
        let parameter_map = Arc::new(ParameterMap::new(id, type_name, parameter_mappings));
        configuration.add_parameter_map(parameter_map.clone())?;
        Ok(parameter_map)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build_parameter_mapping(
        &self,
        configuration: &Configuration,
        parameter_type: &str,
        property: &str,
        java_type: Option<String>,
        jdbc_type: Option<JdbcType>,
        result_map: Option<String>,
        mode: ParameterMode,
        type_handler: Option<String>,
        numeric_scale: Option<u32>,
    ) -> Result<ParameterMapping> {
        let result_map = match result_map {
            Some(id) => Some(self.apply_current_namespace(&id, true)?),
            None => None,
        };
        let java_type =
            self.resolve_parameter_java_type(configuration, parameter_type, property, java_type, jdbc_type)?;
        Ok(ParameterMapping::new(property, java_type)
            .mode(mode)
            .jdbc_type(jdbc_type)
            .numeric_scale(numeric_scale)
            .type_handler(type_handler)
            .result_map_id(result_map))
    }

    /// Register a result map, merging an `extends` parent when declared.
    #[allow(clippy::too_many_arguments)]
    pub fn add_result_map(
        &self,
        configuration: &mut Configuration,
        id: &str,
        type_name: String,
        extends: Option<String>,
        discriminator: Option<Discriminator>,
        mut result_mappings: Vec<ResultMapping>,
        auto_mapping: Option<bool>,
    ) -> Result<Arc<ResultMap>> {
        let id = self.apply_current_namespace(id, false)?;
        if let Some(extends) = extends {
            let extends = self.apply_current_namespace(&extends, true)?;
            if !configuration.has_result_map(&extends) {
                return Err(Error::incomplete(format!(
                    "Could not find a parent resultmap with id '{}'",
                    extends
                )));
            }
            let parent = configuration.result_map(&extends)?;
            let mut extended: Vec<ResultMapping> = parent
                .result_mappings
                .iter()
                .filter(|inherited| {
                    !result_mappings
                        .iter()
                        .any(|own| own.same_property(inherited))
                })
                .cloned()
                .collect();
            // the child's constructor takes over completely
            let declares_constructor = result_mappings
                .iter()
                .any(|mapping| mapping.has_flag(ResultFlag::Constructor));
            if declares_constructor {
                extended.retain(|mapping| !mapping.has_flag(ResultFlag::Constructor));
            }
            result_mappings.extend(extended);
        }
        let result_map = Arc::new(
            ResultMap::builder(id, type_name, result_mappings)
                .discriminator(discriminator)
                .auto_mapping(auto_mapping)
                .build(),
        );
        configuration.add_result_map(result_map.clone())?;
        Ok(result_map)
    }

    pub fn build_discriminator(
        &self,
        configuration: &Configuration,
        result_type: &str,
        column: String,
        java_type: Option<String>,
        jdbc_type: Option<JdbcType>,
        type_handler: Option<String>,
        discriminator_map: BTreeMap<String, String>,
    ) -> Result<Discriminator> {
        let mapping = self.build_result_mapping(
            configuration,
            result_type,
            None,
            Some(column),
            java_type,
            jdbc_type,
            None,
            None,
            None,
            None,
            type_handler,
            Vec::new(),
            None,
            None,
            false,
        )?;
        let mut namespaced = BTreeMap::new();
        for (value, map_id) in discriminator_map {
            namespaced.insert(value, self.apply_current_namespace(&map_id, true)?);
        }
        Ok(Discriminator::new(mapping, namespaced))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build_result_mapping(
        &self,
        configuration: &Configuration,
        result_type: &str,
        property: Option<String>,
        column: Option<String>,
        java_type: Option<String>,
        jdbc_type: Option<JdbcType>,
        nested_select: Option<String>,
        nested_result_map: Option<String>,
        not_null_columns: Option<String>,
        column_prefix: Option<String>,
        type_handler: Option<String>,
        flags: Vec<ResultFlag>,
        result_set: Option<String>,
        foreign_column: Option<String>,
        lazy: bool,
    ) -> Result<ResultMapping> {
        let java_type =
            self.resolve_result_java_type(configuration, result_type, property.as_deref(), java_type)?;
        let composites = if nested_select.is_none() && foreign_column.is_none() {
            Vec::new()
        } else {
            self.parse_composite_column_name(column.as_deref())?
        };
        let nested_select = match nested_select {
            Some(id) => Some(self.apply_current_namespace(&id, true)?),
            None => None,
        };
        let nested_result_map = match nested_result_map {
            Some(id) => Some(self.apply_current_namespace(&id, true)?),
            None => None,
        };
        Ok(ResultMapping::new(property, column, java_type)
            .jdbc_type(jdbc_type)
            .type_handler(type_handler)
            .nested_select_id(nested_select)
            .nested_result_map_id(nested_result_map)
            .not_null_columns(parse_multiple_column_names(not_null_columns.as_deref()))
            .column_prefix(column_prefix)
            .flags(flags)
            .composites(composites)
            .result_set(result_set)
            .foreign_column(foreign_column)
            .lazy(lazy))
    }

    /// Split a composite column expression `{prop=col, prop2=col2}` into
    /// component mappings. An odd token count is malformed.
    pub fn parse_composite_column_name(
        &self,
        column: Option<&str>,
    ) -> Result<Vec<ResultMapping>> {
        let mut composites = Vec::new();
        if let Some(column) = column {
            if column.contains('=') || column.contains(',') {
                let tokens: Vec<&str> = column
                    .split(|c| ['{', '}', '=', ',', ' '].contains(&c))
                    .filter(|token| !token.is_empty())
                    .collect();
                if tokens.len() % 2 != 0 {
                    return Err(Error::builder(format!(
                        "Malformed composite column expression '{}': properties and columns must come in pairs",
                        column
                    )));
                }
                for pair in tokens.chunks(2) {
                    composites.push(ResultMapping::new(
                        Some(pair[0].to_string()),
                        Some(pair[1].to_string()),
                        "object",
                    ));
                }
            }
        }
        Ok(composites)
    }

    /// Build and register a mapped statement. Fails incomplete while this
    /// namespace's cache-ref is unresolved, or while a referenced result or
    /// parameter map is missing.
    pub fn add_mapped_statement(
        &self,
        configuration: &mut Configuration,
        sql_source: Arc<dyn SqlSource>,
        attributes: StatementAttributes,
    ) -> Result<Arc<MappedStatement>> {
        if self.unresolved_cache_ref {
            return Err(Error::incomplete("Cache-ref not yet resolved"));
        }
        let id = self.apply_current_namespace(&attributes.id, false)?;
        debug!("building mapped statement '{}'", id);

        let result_maps = self.statement_result_maps(
            configuration,
            attributes.result_map.as_deref(),
            attributes.result_type.as_deref(),
            &id,
        )?;
        let parameter_map = self.statement_parameter_map(
            configuration,
            attributes.parameter_map.as_deref(),
            attributes.parameter_type.as_deref(),
            &id,
        )?;

        let mut builder =
            MappedStatement::builder(id, sql_source, attributes.sql_command_type)
                .resource(self.resource.clone())
                .statement_type(attributes.statement_type)
                .fetch_size(attributes.fetch_size)
                .timeout_ms(attributes.timeout_ms)
                .result_maps(result_maps)
                .result_set_type(attributes.result_set_type)
                .flush_cache_required(attributes.flush_cache)
                .use_cache(attributes.use_cache)
                .result_ordered(attributes.result_ordered)
                .key_generator(attributes.key_generator)
                .key_properties(split_csv(attributes.key_property.as_deref()))
                .key_columns(split_csv(attributes.key_column.as_deref()))
                .database_id(attributes.database_id)
                .lang(attributes.lang)
                .result_sets(split_csv(attributes.result_sets.as_deref()))
                .cache(self.current_cache.clone())
                .dirty_select(attributes.dirty_select);
        if let Some(parameter_map) = parameter_map {
            builder = builder.parameter_map(parameter_map);
        }
        let statement = builder.build();
        configuration.add_mapped_statement(statement.clone())?;
        Ok(statement)
    }

    fn statement_result_maps(
        &self,
        configuration: &Configuration,
        result_map: Option<&str>,
        result_type: Option<&str>,
        statement_id: &str,
    ) -> Result<Vec<Arc<ResultMap>>> {
        if let Some(result_map) = result_map {
            let result_map = self.apply_current_namespace(result_map, true)?;
            let mut result_maps = Vec::new();
            for name in result_map.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                match configuration.result_map(name) {
                    Ok(found) => result_maps.push(found),
                    Err(_) => {
                        return Err(Error::incomplete(format!(
                            "Could not find result map '{}' referenced from '{}'",
                            name, statement_id
                        )));
                    }
                }
            }
            Ok(result_maps)
        } else if let Some(result_type) = result_type {
            let inline = Arc::new(
                ResultMap::builder(
                    format!("{}-Inline", statement_id),
                    result_type.to_string(),
                    Vec::new(),
                )
                .build(),
            );
            Ok(vec![inline])
        } else {
            Ok(Vec::new())
        }
    }

    fn statement_parameter_map(
        &self,
        configuration: &Configuration,
        parameter_map: Option<&str>,
        parameter_type: Option<&str>,
        statement_id: &str,
    ) -> Result<Option<Arc<ParameterMap>>> {
        if let Some(parameter_map) = parameter_map {
            let parameter_map = self.apply_current_namespace(parameter_map, true)?;
            match configuration.parameter_map(&parameter_map) {
                Ok(found) => Ok(Some(found)),
                Err(_) => Err(Error::incomplete(format!(
                    "Could not find parameter map '{}'",
                    parameter_map
                ))),
            }
        } else if let Some(parameter_type) = parameter_type {
            Ok(Some(Arc::new(ParameterMap::new(
                format!("{}-Inline", statement_id),
                parameter_type.to_string(),
                Vec::new(),
            ))))
        } else {
            Ok(None)
        }
    }

    fn resolve_result_java_type(
        &self,
        configuration: &Configuration,
        result_type: &str,
        property: Option<&str>,
        java_type: Option<String>,
    ) -> Result<String> {
        if let Some(java_type) = java_type {
            return configuration.resolve_type(&java_type);
        }
        if let Some(property) = property {
            if let Ok(meta) = configuration.meta_type(result_type) {
                if let Ok(setter_type) = meta.setter_type(property) {
                    return Ok(setter_type);
                }
            }
        }
        Ok("object".to_string())
    }

    fn resolve_parameter_java_type(
        &self,
        configuration: &Configuration,
        parameter_type: &str,
        property: &str,
        java_type: Option<String>,
        jdbc_type: Option<JdbcType>,
    ) -> Result<String> {
        if let Some(java_type) = java_type {
            return configuration.resolve_type(&java_type);
        }
        if jdbc_type == Some(JdbcType::CURSOR) {
            return Ok("resultset".to_string());
        }
        if configuration
            .schema()
            .is_assignable("map", parameter_type)
        {
            return Ok("object".to_string());
        }
        if let Ok(meta) = configuration.meta_type(parameter_type) {
            if let Ok(getter_type) = meta.getter_type(property) {
                return Ok(getter_type);
            }
        }
        Ok("object".to_string())
    }
}

fn parse_multiple_column_names(column_name: Option<&str>) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();
    if let Some(column_name) = column_name {
        for token in column_name
            .split(|c| ['{', '}', ',', ' '].contains(&c))
            .filter(|token| !token.is_empty())
        {
            columns.insert(token.to_string());
        }
    }
    columns
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::mapping::StaticSqlSource;
    use sqlmapper_reflect::TypeSchema;

    fn assistant() -> MapperBuilderAssistant {
        let mut assistant = MapperBuilderAssistant::new("mapper/user.xml");
        assistant.set_current_namespace("app.UserMapper").unwrap();
        assistant
    }

    fn configuration() -> Configuration {
        Configuration::new(Arc::new(TypeSchema::with_builtins()))
    }

    fn select_attributes(id: &str) -> StatementAttributes {
        StatementAttributes {
            id: id.to_string(),
            statement_type: StatementType::Prepared,
            sql_command_type: SqlCommandType::Select,
            fetch_size: None,
            timeout_ms: None,
            parameter_map: None,
            parameter_type: None,
            result_map: None,
            result_type: Some("map".to_string()),
            result_set_type: None,
            flush_cache: false,
            use_cache: true,
            result_ordered: false,
            key_generator: KeyGeneratorKind::None,
            key_property: None,
            key_column: None,
            database_id: None,
            lang: "xml".to_string(),
            result_sets: None,
            dirty_select: false,
        }
    }

    #[test]
    fn namespace_normalization_rules() {
        let assistant = assistant();
        assert_eq!(
            assistant.apply_current_namespace("findById", false).unwrap(),
            "app.UserMapper.findById"
        );
        assert_eq!(
            assistant
                .apply_current_namespace("app.UserMapper.findById", false)
                .unwrap(),
            "app.UserMapper.findById"
        );
        assert_eq!(
            assistant.apply_current_namespace("other.map", true).unwrap(),
            "other.map"
        );
        assert!(assistant.apply_current_namespace("other.map", false).is_err());
    }

    #[test]
    fn namespace_cannot_be_rebound() {
        let mut assistant = assistant();
        assert!(assistant.set_current_namespace("app.UserMapper").is_ok());
        assert!(assistant.set_current_namespace("app.Other").is_err());
        assert!(assistant.set_current_namespace("").is_err());
    }

    #[test]
    fn extends_merge_drops_parent_constructor_and_redeclared_properties() {
        let mut config = configuration();
        let assistant = assistant();
        let parent_mappings = vec![
            ResultMapping::new(Some("id".into()), Some("pk".into()), "object")
                .flags(vec![ResultFlag::Id]),
            ResultMapping::new(Some("name".into()), Some("name".into()), "object"),
            ResultMapping::new(Some("x".into()), Some("x".into()), "object")
                .flags(vec![ResultFlag::Constructor]),
        ];
        assistant
            .add_result_map(&mut config, "parent", "object".into(), None, None, parent_mappings, None)
            .unwrap();

        let child_mappings = vec![
            ResultMapping::new(Some("email".into()), Some("email".into()), "object"),
            ResultMapping::new(Some("y".into()), Some("y".into()), "object")
                .flags(vec![ResultFlag::Constructor]),
        ];
        let child = assistant
            .add_result_map(
                &mut config,
                "child",
                "object".into(),
                Some("parent".into()),
                None,
                child_mappings,
                None,
            )
            .unwrap();

        let properties: Vec<_> = child
            .result_mappings
            .iter()
            .map(|m| m.property.clone().unwrap())
            .collect();
        assert_eq!(properties, vec!["email", "y", "id", "name"]);
    }

    #[test]
    fn missing_extends_parent_is_incomplete() {
        let mut config = configuration();
        let assistant = assistant();
        let err = assistant
            .add_result_map(
                &mut config,
                "child",
                "object".into(),
                Some("absent".into()),
                None,
                vec![],
                None,
            )
            .unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn composite_column_pairs_and_odd_tokens() {
        let assistant = assistant();
        let composites = assistant
            .parse_composite_column_name(Some("{userId=id, orgId=org}"))
            .unwrap();
        assert_eq!(composites.len(), 2);
        assert_eq!(composites[0].property.as_deref(), Some("userId"));
        assert_eq!(composites[1].column.as_deref(), Some("org"));
        assert!(assistant
            .parse_composite_column_name(Some("{userId=id, orgId}"))
            .is_err());
        assert!(assistant.parse_composite_column_name(Some("plain")).unwrap().is_empty());
    }

    #[test]
    fn statement_gated_on_unresolved_cache_ref() {
        let mut config = configuration();
        let mut assistant = assistant();
        let err = match assistant.use_cache_ref(&config, "app.OtherMapper") {
            Err(e) => e,
            Ok(_) => panic!("expected use_cache_ref to fail"),
        };
        assert!(err.is_incomplete());
        assert!(assistant.unresolved_cache_ref());

        let source = Arc::new(StaticSqlSource::new("SELECT 1", vec![]));
        let err = match assistant.add_mapped_statement(&mut config, source, select_attributes("findAll")) {
            Err(e) => e,
            Ok(_) => panic!("expected add_mapped_statement to fail"),
        };
        assert!(err.is_incomplete());
    }

    #[test]
    fn statement_attaches_namespace_cache() {
        let mut config = configuration();
        let mut assistant = assistant();
        assistant
            .use_new_cache(&mut config, None, None, None, None, true, false, Properties::new())
            .unwrap();
        let source = Arc::new(StaticSqlSource::new("SELECT 1", vec![]));
        let statement = assistant
            .add_mapped_statement(&mut config, source, select_attributes("findAll"))
            .unwrap();
        assert_eq!(statement.id, "app.UserMapper.findAll");
        assert_eq!(statement.cache.as_ref().unwrap().id(), "app.UserMapper");
        assert_eq!(statement.result_maps.len(), 1);
        assert_eq!(
            statement.result_maps[0].id,
            "app.UserMapper.findAll-Inline"
        );
    }

    #[test]
    fn missing_result_map_reference_is_incomplete() {
        let mut config = configuration();
        let assistant = assistant();
        let mut attributes = select_attributes("findAll");
        attributes.result_map = Some("userMap".to_string());
        attributes.result_type = None;
        let source = Arc::new(StaticSqlSource::new("SELECT 1", vec![]));
        let err = match assistant.add_mapped_statement(&mut config, source, attributes) {
            Err(e) => e,
            Ok(_) => panic!("expected add_mapped_statement to fail"),
        };
        assert!(err.is_incomplete());
    }
}
