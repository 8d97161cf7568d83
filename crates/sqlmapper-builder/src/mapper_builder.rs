//! Per-namespace mapper document parser.

use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;

use sqlmapper_core::config::Configuration;
use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::{ParameterMode, ResultFlag, ResultMapping};
use sqlmapper_core::parsing::{Element, XNode};
use sqlmapper_core::types::JdbcType;

use crate::assistant::MapperBuilderAssistant;
use crate::deferred::{CacheRefResolver, ResultMapResolver, StatementResolver};
use crate::statement_builder::parse_statement_node;
use crate::xml::parse_document;

const STATEMENT_ELEMENTS: [&str; 4] = ["select", "insert", "update", "delete"];

/// Parses one `<mapper>` document into the configuration, enqueueing
/// forward references and draining the pending queues afterwards.
pub struct XmlMapperBuilder {
    resource: String,
    document: Element,
}

impl XmlMapperBuilder {
    pub fn from_xml(xml: &str, resource: impl Into<String>) -> Result<Self> {
        let resource = resource.into();
        let document = parse_document(xml)
            .map_err(|e| Error::builder_in(format!("Error parsing mapper XML: {}", e), &resource))?;
        if document.name() != "mapper" {
            return Err(Error::builder_in(
                format!("Expected a <mapper> root element, found <{}>", document.name()),
                &resource,
            ));
        }
        Ok(Self { resource, document })
    }

    pub fn parse(&self, configuration: &mut Configuration) -> Result<()> {
        if !configuration.is_resource_loaded(&self.resource) {
            let mut assistant = MapperBuilderAssistant::new(&self.resource);
            self.configuration_element(configuration, &mut assistant)
                .map_err(|e| {
                    if e.is_incomplete() {
                        e
                    } else {
                        Error::builder_in(format!("Error parsing mapper XML: {}", e), &self.resource)
                    }
                })?;
            configuration.add_loaded_resource(self.resource.clone());
            self.bind_mapper_for_namespace(configuration, &assistant)?;
        }
        configuration.drain_pending()
    }

    fn configuration_element(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
    ) -> Result<()> {
        let namespace = self
            .document
            .attribute("namespace")
            .unwrap_or_default()
            .to_string();
        assistant.set_current_namespace(&namespace)?;

        self.cache_ref_element(configuration, assistant)?;
        self.cache_element(configuration, assistant)?;
        self.parameter_map_elements(configuration, assistant)?;
        self.result_map_elements(configuration, assistant)?;
        self.sql_elements(configuration, assistant)?;
        self.statement_elements(configuration, assistant)?;
        Ok(())
    }

    fn cache_ref_element(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
    ) -> Result<()> {
        let Some(element) = self.document.first_child("cache-ref") else {
            return Ok(());
        };
        let variables = configuration.variables().clone();
        let referenced = XNode::new(element, &variables).required_attribute("namespace")?;
        let namespace = assistant.current_namespace()?.to_string();
        configuration.add_cache_ref(namespace.clone(), referenced.clone());
        match assistant.use_cache_ref(configuration, &referenced) {
            Ok(_) => Ok(()),
            Err(e) if e.is_incomplete() => {
                configuration.add_incomplete_cache_ref(Box::new(CacheRefResolver {
                    namespace,
                    referenced,
                }));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn cache_element(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
    ) -> Result<()> {
        let Some(element) = self.document.first_child("cache") else {
            return Ok(());
        };
        let variables = configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let implementation = node.string_attribute_or("type", "PERPETUAL");
        let eviction = node.string_attribute_or("eviction", "LRU");
        let flush_interval = node
            .int_attribute("flushInterval")?
            .map(|ms| Duration::from_millis(ms as u64));
        let size = node.int_attribute("size")?.map(|size| size as usize);
        let read_write = !node.bool_attribute("readOnly", false)?;
        let blocking = node.bool_attribute("blocking", false)?;
        let properties = node.children_as_properties()?;
        assistant.use_new_cache(
            configuration,
            Some(implementation),
            Some(eviction),
            flush_interval,
            size,
            read_write,
            blocking,
            properties,
        )?;
        Ok(())
    }

    fn parameter_map_elements(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
    ) -> Result<()> {
        let variables = configuration.variables().clone();
        for element in self.document.children_named("parameterMap") {
            let node = XNode::new(element, &variables);
            let id = node.required_attribute("id")?;
            let type_name = configuration.resolve_type(&node.required_attribute("type")?)?;
            let mut mappings = Vec::new();
            for parameter in element.children_named("parameter") {
                let parameter = XNode::new(parameter, &variables);
                let property = parameter.required_attribute("property")?;
                let java_type = match parameter.string_attribute("javaType") {
                    Some(alias) => Some(configuration.resolve_type(&alias)?),
                    None => None,
                };
                let jdbc_type = match parameter.string_attribute("jdbcType") {
                    Some(name) => Some(JdbcType::from_name(&name)?),
                    None => None,
                };
                let mode = match parameter.string_attribute("mode").as_deref() {
                    None | Some("IN") => ParameterMode::In,
                    Some("OUT") => ParameterMode::Out,
                    Some("INOUT") => ParameterMode::InOut,
                    Some(other) => {
                        return Err(Error::builder(format!(
                            "Unknown parameter mode '{}'",
                            other
                        )));
                    }
                };
                let numeric_scale = parameter
                    .int_attribute("numericScale")?
                    .map(|scale| scale as u32);
                mappings.push(assistant.build_parameter_mapping(
                    configuration,
                    &type_name,
                    &property,
                    java_type,
                    jdbc_type,
                    parameter.string_attribute("resultMap"),
                    mode,
                    parameter.string_attribute("typeHandler"),
                    numeric_scale,
                )?);
            }
            assistant.add_parameter_map(configuration, &id, type_name, mappings)?;
        }
        Ok(())
    }

    fn result_map_elements(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
    ) -> Result<()> {
        for element in self.document.children_named("resultMap") {
            self.result_map_element(configuration, assistant, element, None, None, Vec::new())?;
        }
        Ok(())
    }

    /// Parse one result map element (top level or nested). An unresolved
    /// `extends` enqueues a resolver; the fully qualified id is returned
    /// either way so enclosing mappings can reference it.
    fn result_map_element(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
        element: &Element,
        generated_id: Option<&str>,
        enclosing_type: Option<&str>,
        additional_mappings: Vec<ResultMapping>,
    ) -> Result<String> {
        let variables = configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let type_attribute = node
            .string_attribute("type")
            .or_else(|| node.string_attribute("ofType"))
            .or_else(|| node.string_attribute("resultType"))
            .or_else(|| node.string_attribute("javaType"));
        let type_name = match type_attribute {
            Some(alias) => configuration.resolve_type(&alias)?,
            None => self.inherit_enclosing_type(configuration, element, enclosing_type)?,
        };

        let local_id = node
            .string_attribute("id")
            .or_else(|| generated_id.map(String::from))
            .ok_or_else(|| {
                Error::builder(format!(
                    "The <{}> element requires an 'id' attribute",
                    element.name()
                ))
            })?;

        let mut mappings = additional_mappings;
        let mut discriminator = None;
        for child in element.child_elements() {
            match child.name() {
                "constructor" => {
                    for argument in child.child_elements() {
                        let mut flags = vec![ResultFlag::Constructor];
                        if argument.name() == "idArg" {
                            flags.push(ResultFlag::Id);
                        }
                        mappings.push(self.build_mapping_from_context(
                            configuration,
                            assistant,
                            argument,
                            &type_name,
                            flags,
                            &local_id,
                        )?);
                    }
                }
                "discriminator" => {
                    discriminator = Some(self.process_discriminator(
                        configuration,
                        assistant,
                        child,
                        &type_name,
                        &mappings,
                        &local_id,
                    )?);
                }
                _ => {
                    let mut flags = Vec::new();
                    if child.name() == "id" {
                        flags.push(ResultFlag::Id);
                    }
                    mappings.push(self.build_mapping_from_context(
                        configuration,
                        assistant,
                        child,
                        &type_name,
                        flags,
                        &local_id,
                    )?);
                }
            }
        }

        let extends = node.string_attribute("extends");
        let auto_mapping = match node.string_attribute("autoMapping").as_deref() {
            None => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => {
                return Err(Error::builder(format!(
                    "Attribute 'autoMapping' must be 'true' or 'false', found '{}'",
                    other
                )));
            }
        };

        let full_id = assistant.apply_current_namespace(&local_id, false)?;
        match assistant.add_result_map(
            configuration,
            &local_id,
            type_name.clone(),
            extends.clone(),
            discriminator.clone(),
            mappings.clone(),
            auto_mapping,
        ) {
            Ok(result_map) => Ok(result_map.id.clone()),
            Err(e) if e.is_incomplete() => {
                debug!("deferring result map '{}': {}", full_id, e);
                configuration.add_incomplete_result_map(Box::new(ResultMapResolver {
                    namespace: assistant.current_namespace()?.to_string(),
                    resource: assistant.resource().to_string(),
                    id: local_id,
                    type_name,
                    extends,
                    discriminator,
                    result_mappings: mappings,
                    auto_mapping,
                }));
                Ok(full_id)
            }
            Err(e) => Err(e),
        }
    }

    fn inherit_enclosing_type(
        &self,
        configuration: &Configuration,
        element: &Element,
        enclosing_type: Option<&str>,
    ) -> Result<String> {
        if element.name() == "association" && element.attribute("resultMap").is_none() {
            if let (Some(property), Some(enclosing)) =
                (element.attribute("property"), enclosing_type)
            {
                let meta = configuration.meta_type(enclosing)?;
                return Ok(meta.setter_type(property)?);
            }
        } else if element.name() == "case" && element.attribute("resultMap").is_none() {
            if let Some(enclosing) = enclosing_type {
                return Ok(enclosing.to_string());
            }
        }
        Err(Error::builder(format!(
            "Could not determine the result type of a <{}> element",
            element.name()
        )))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_mapping_from_context(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
        element: &Element,
        result_type: &str,
        flags: Vec<ResultFlag>,
        parent_local_id: &str,
    ) -> Result<ResultMapping> {
        let variables = configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let property = if flags.contains(&ResultFlag::Constructor) {
            node.string_attribute("name")
        } else {
            node.string_attribute("property")
        };
        let java_type = node.string_attribute("javaType");
        let jdbc_type = match node.string_attribute("jdbcType") {
            Some(name) => Some(JdbcType::from_name(&name)?),
            None => None,
        };
        let nested_select = node.string_attribute("select");
        let nested_result_map = match node.string_attribute("resultMap") {
            Some(id) => Some(id),
            None => self.process_nested_result_mappings(
                configuration,
                assistant,
                element,
                result_type,
                parent_local_id,
                property.as_deref(),
                Vec::new(),
            )?,
        };
        let lazy_default = configuration.settings().lazy_loading_enabled;
        let lazy = match node.string_attribute("fetchType").as_deref() {
            Some("lazy") => true,
            Some("eager") => false,
            None => lazy_default,
            Some(other) => {
                return Err(Error::builder(format!(
                    "Attribute 'fetchType' must be 'lazy' or 'eager', found '{}'",
                    other
                )));
            }
        };
        let java_type = match java_type {
            Some(alias) => Some(configuration.resolve_type(&alias)?),
            None => None,
        };
        assistant.build_result_mapping(
            configuration,
            result_type,
            property,
            node.string_attribute("column"),
            java_type,
            jdbc_type,
            nested_select,
            nested_result_map,
            node.string_attribute("notNullColumn"),
            node.string_attribute("columnPrefix"),
            node.string_attribute("typeHandler"),
            flags,
            node.string_attribute("resultSet"),
            node.string_attribute("foreignColumn"),
            lazy,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn process_nested_result_mappings(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
        element: &Element,
        enclosing_type: &str,
        parent_local_id: &str,
        property: Option<&str>,
        additional_mappings: Vec<ResultMapping>,
    ) -> Result<Option<String>> {
        if !matches!(element.name(), "association" | "collection" | "case")
            || element.attribute("select").is_some()
        {
            return Ok(None);
        }
        self.validate_collection(configuration, element, enclosing_type)?;
        let discriminator_value = element.attribute("value");
        let generated = format!(
            "{}_{}[{}]",
            parent_local_id,
            element.name(),
            property.or(discriminator_value).unwrap_or("nested")
        );
        let id = self.result_map_element(
            configuration,
            assistant,
            element,
            Some(&generated),
            Some(enclosing_type),
            additional_mappings,
        )?;
        Ok(Some(id))
    }

    fn validate_collection(
        &self,
        configuration: &Configuration,
        element: &Element,
        enclosing_type: &str,
    ) -> Result<()> {
        if element.name() == "collection"
            && element.attribute("resultMap").is_none()
            && element.attribute("javaType").is_none()
        {
            let property = element.attribute("property").unwrap_or_default();
            let meta = configuration.meta_type(enclosing_type)?;
            if !meta.has_setter(property) {
                return Err(Error::builder(format!(
                    "Ambiguous collection type for property '{}'. You must specify 'javaType' or 'resultMap'.",
                    property
                )));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_discriminator(
        &self,
        configuration: &mut Configuration,
        assistant: &mut MapperBuilderAssistant,
        element: &Element,
        result_type: &str,
        current_mappings: &[ResultMapping],
        parent_local_id: &str,
    ) -> Result<sqlmapper_core::mapping::Discriminator> {
        let variables = configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let column = node.required_attribute("column")?;
        let java_type = match node.string_attribute("javaType") {
            Some(alias) => Some(configuration.resolve_type(&alias)?),
            None => None,
        };
        let jdbc_type = match node.string_attribute("jdbcType") {
            Some(name) => Some(JdbcType::from_name(&name)?),
            None => None,
        };
        let type_handler = node.string_attribute("typeHandler");
        let mut discriminator_map = BTreeMap::new();
        for case in element.children_named("case") {
            let case_node = XNode::new(case, &variables);
            let value = case_node.required_attribute("value")?;
            let result_map = match case_node.string_attribute("resultMap") {
                Some(id) => id,
                None => self
                    .process_nested_result_mappings(
                        configuration,
                        assistant,
                        case,
                        result_type,
                        parent_local_id,
                        None,
                        // each nested case inherits the mappings declared
                        // before the discriminator
                        current_mappings.to_vec(),
                    )?
                    .map(Ok)
                    .unwrap_or_else(|| {
                        Err(Error::builder(
                            "A discriminator <case> requires a 'resultMap' attribute or a nested result map",
                        ))
                    })?,
            };
            discriminator_map.insert(value, result_map);
        }
        assistant.build_discriminator(
            configuration,
            result_type,
            column,
            java_type,
            jdbc_type,
            type_handler,
            discriminator_map,
        )
    }

    fn sql_elements(
        &self,
        configuration: &mut Configuration,
        assistant: &MapperBuilderAssistant,
    ) -> Result<()> {
        if let Some(database_id) = configuration.database_id().map(str::to_string) {
            self.sql_elements_pass(configuration, assistant, Some(&database_id))?;
        }
        self.sql_elements_pass(configuration, assistant, None)
    }

    fn sql_elements_pass(
        &self,
        configuration: &mut Configuration,
        assistant: &MapperBuilderAssistant,
        required_database_id: Option<&str>,
    ) -> Result<()> {
        let variables = configuration.variables().clone();
        for element in self.document.children_named("sql") {
            let node = XNode::new(element, &variables);
            let id = node.required_attribute("id")?;
            let id = assistant.apply_current_namespace(&id, false)?;
            let database_id = node.string_attribute("databaseId");
            if fragment_matches_database_id(
                configuration,
                &id,
                database_id.as_deref(),
                required_database_id,
            ) {
                configuration.add_sql_fragment(id, element.clone());
            }
        }
        Ok(())
    }

    fn statement_elements(
        &self,
        configuration: &mut Configuration,
        assistant: &MapperBuilderAssistant,
    ) -> Result<()> {
        if let Some(database_id) = configuration.database_id().map(str::to_string) {
            self.statement_elements_pass(configuration, assistant, Some(&database_id))?;
        }
        self.statement_elements_pass(configuration, assistant, None)
    }

    fn statement_elements_pass(
        &self,
        configuration: &mut Configuration,
        assistant: &MapperBuilderAssistant,
        required_database_id: Option<&str>,
    ) -> Result<()> {
        for element in self.document.child_elements() {
            if !STATEMENT_ELEMENTS.contains(&element.name()) {
                continue;
            }
            match parse_statement_node(configuration, assistant, element, required_database_id) {
                Ok(()) => {}
                Err(e) if e.is_incomplete() => {
                    debug!(
                        "deferring statement '{}': {}",
                        element.attribute("id").unwrap_or("<unnamed>"),
                        e
                    );
                    configuration.add_incomplete_statement(Box::new(StatementResolver {
                        namespace: assistant.current_namespace()?.to_string(),
                        resource: self.resource.clone(),
                        element: element.clone(),
                        required_database_id: required_database_id.map(String::from),
                    }));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn bind_mapper_for_namespace(
        &self,
        configuration: &mut Configuration,
        assistant: &MapperBuilderAssistant,
    ) -> Result<()> {
        let namespace = assistant.current_namespace()?.to_string();
        if configuration.schema().contains(&namespace) && !configuration.has_mapper(&namespace) {
            configuration.add_loaded_resource(format!("namespace:{}", namespace));
            configuration.add_mapper(&namespace)?;
        }
        Ok(())
    }
}

fn fragment_matches_database_id(
    configuration: &Configuration,
    id: &str,
    database_id: Option<&str>,
    required_database_id: Option<&str>,
) -> bool {
    if let Some(required) = required_database_id {
        return database_id == Some(required);
    }
    if database_id.is_some() {
        return false;
    }
    match configuration.sql_fragment(id) {
        None => true,
        Some(existing) => existing.attribute("databaseId").is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::value::Value;
    use sqlmapper_reflect::{MethodDescriptor, TypeDescriptor, TypeRef, TypeSchema};
    use std::sync::Arc;

    fn configuration() -> Configuration {
        let mut schema = TypeSchema::with_builtins();
        schema.register(
            TypeDescriptor::new("app.Author")
                .extends(TypeRef::concrete("object"))
                .with_method(MethodDescriptor::new(
                    "getName",
                    vec![],
                    TypeRef::concrete("string"),
                )),
        );
        schema.register(
            TypeDescriptor::new("app.Post")
                .extends(TypeRef::concrete("object"))
                .with_method(MethodDescriptor::new(
                    "getAuthor",
                    vec![],
                    TypeRef::concrete("app.Author"),
                ))
                .with_method(MethodDescriptor::new(
                    "setAuthor",
                    vec![TypeRef::concrete("app.Author")],
                    TypeRef::concrete("object"),
                )),
        );
        schema.register(TypeDescriptor::new("app.PostMapper").interface());
        Configuration::new(Arc::new(schema))
    }

    fn parse(configuration: &mut Configuration, xml: &str) {
        XmlMapperBuilder::from_xml(xml, "mapper/test.xml")
            .unwrap()
            .parse(configuration)
            .unwrap();
    }

    #[test]
    fn full_mapper_document_round_trip() {
        let mut config = configuration();
        parse(
            &mut config,
            r#"<mapper namespace="app.PostMapper">
                 <cache size="128" readOnly="true"/>
                 <resultMap id="postMap" type="app.Post">
                   <id property="id" column="post_id"/>
                   <result property="title" column="title"/>
                   <association property="author" javaType="app.Author">
                     <id property="id" column="author_id"/>
                     <result property="name" column="author_name"/>
                   </association>
                 </resultMap>
                 <sql id="columns">post_id, title, author_id</sql>
                 <select id="findAll" resultMap="postMap">
                   SELECT <include refid="columns"/> FROM posts
                 </select>
               </mapper>"#,
        );
        assert!(config.has_cache("app.PostMapper"));
        let statement = config.mapped_statement("app.PostMapper.findAll").unwrap();
        assert_eq!(statement.result_maps[0].id, "app.PostMapper.postMap");
        assert!(statement.cache.is_some());
        // the namespace names a schema type, so the mapper was bound
        assert!(config.has_mapper("app.PostMapper"));
        // nested association produced its own registered result map
        let nested_id = "app.PostMapper.postMap_association[author]";
        assert!(config.has_result_map(nested_id));
        let nested = config.result_map(nested_id).unwrap();
        assert_eq!(nested.type_name, "app.Author");
        let outer = config.result_map("app.PostMapper.postMap").unwrap();
        assert!(outer.has_nested_result_maps);
        assert_eq!(config.pending_counts(), (0, 0, 0));
    }

    #[test]
    fn namespace_is_required() {
        let mut config = configuration();
        let builder =
            XmlMapperBuilder::from_xml(r#"<mapper><cache/></mapper>"#, "m.xml").unwrap();
        assert!(builder.parse(&mut config).is_err());
    }

    #[test]
    fn forward_cache_ref_defers_statements_until_target_parses() {
        let mut config = configuration();
        parse(
            &mut config,
            r#"<mapper namespace="app.PostMapper">
                 <cache-ref namespace="app.AuthorMapper"/>
                 <select id="findAll" resultType="map">SELECT * FROM posts</select>
               </mapper>"#,
        );
        // both the cache-ref and the statement are pending
        let (_, cache_refs, statements) = config.pending_counts();
        assert_eq!(cache_refs, 1);
        assert_eq!(statements, 1);
        assert!(!config.has_statement("app.PostMapper.findAll"));

        parse(
            &mut config,
            r#"<mapper namespace="app.AuthorMapper">
                 <cache/>
                 <select id="findAuthors" resultType="map">SELECT * FROM authors</select>
               </mapper>"#,
        );
        assert_eq!(config.pending_counts(), (0, 0, 0));
        let statement = config.mapped_statement("app.PostMapper.findAll").unwrap();
        // the shared cache is the referenced namespace's cache
        assert_eq!(statement.cache.as_ref().unwrap().id(), "app.AuthorMapper");
    }

    #[test]
    fn forward_extends_resolves_on_later_drain() {
        let mut config = configuration();
        parse(
            &mut config,
            r#"<mapper namespace="app.PostMapper">
                 <resultMap id="child" type="map" extends="app.BaseMapper.base">
                   <result property="email" column="email"/>
                 </resultMap>
               </mapper>"#,
        );
        assert_eq!(config.pending_counts().0, 1);
        parse(
            &mut config,
            r#"<mapper namespace="app.BaseMapper">
                 <resultMap id="base" type="map">
                   <id property="id" column="pk"/>
                 </resultMap>
               </mapper>"#,
        );
        assert_eq!(config.pending_counts(), (0, 0, 0));
        let child = config.result_map("app.PostMapper.child").unwrap();
        let properties: Vec<_> = child
            .result_mappings
            .iter()
            .map(|m| m.property.clone().unwrap())
            .collect();
        assert_eq!(properties, vec!["email", "id"]);
    }

    #[test]
    fn discriminator_cases_register_nested_maps() {
        let mut config = configuration();
        parse(
            &mut config,
            r#"<mapper namespace="app.PostMapper">
                 <resultMap id="postMap" type="app.Post">
                   <id property="id" column="post_id"/>
                   <discriminator column="kind" javaType="string">
                     <case value="draft" resultMap="draftMap"/>
                     <case value="published">
                       <result property="publishedAt" column="published_at"/>
                     </case>
                   </discriminator>
                 </resultMap>
                 <resultMap id="draftMap" type="app.Post">
                   <result property="draftNote" column="note"/>
                 </resultMap>
               </mapper>"#,
        );
        let post_map = config.result_map("app.PostMapper.postMap").unwrap();
        let discriminator = post_map.discriminator.as_ref().unwrap();
        assert_eq!(
            discriminator.map_id_for("draft"),
            Some("app.PostMapper.draftMap")
        );
        let published = discriminator.map_id_for("published").unwrap();
        assert!(config.has_result_map(published));
    }

    #[test]
    fn sql_fragments_filter_by_database_id() {
        let mut config = configuration();
        config.set_database_id(Some("h2".to_string()));
        parse(
            &mut config,
            r#"<mapper namespace="app.PostMapper">
                 <sql id="columns" databaseId="h2">h2_id</sql>
                 <sql id="columns">generic_id</sql>
                 <select id="find" resultType="map">
                   SELECT <include refid="columns"/> FROM posts
                 </select>
               </mapper>"#,
        );
        let statement = config.mapped_statement("app.PostMapper.find").unwrap();
        let sql = statement.sql_source.bound_sql(&Value::Null).sql;
        assert!(sql.contains("h2_id"));
        assert!(!sql.contains("generic_id"));
    }

    #[test]
    fn duplicate_resource_is_parsed_once() {
        let mut config = configuration();
        let xml = r#"<mapper namespace="app.PostMapper">
                       <select id="find" resultType="map">SELECT 1</select>
                     </mapper>"#;
        parse(&mut config, xml);
        // a second parse of the same resource is a no-op rather than a
        // duplicate-id failure
        parse(&mut config, xml);
        assert!(config.has_statement("app.PostMapper.find"));
    }
}
