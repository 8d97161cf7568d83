//! Root configuration document parser.
//!
//! Sections are processed in a fixed order: `properties` supplies the
//! `${…}` substitutions every later section consumes, and `environments`
//! runs after the factory sections so data-source construction can observe
//! them.

use std::sync::Arc;

use log::warn;

use sqlmapper_core::config::{ComponentSpec, Configuration};
use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::{Environment, TransactionManagerType, VendorDatabaseIdProvider};
use sqlmapper_core::parsing::{Element, Properties, XNode};
use sqlmapper_core::settings::Settings;
use sqlmapper_core::types::{JdbcType, TypeHandlerSpec};
use sqlmapper_pool::{
    DataSourceFactory, DriverRegistry, PooledDataSourceFactory, UnpooledDataSourceFactory,
};
use sqlmapper_reflect::TypeSchema;

use crate::mapper_builder::XmlMapperBuilder;
use crate::resources::Resources;
use crate::xml::parse_document;

const SECTIONS: [&str; 11] = [
    "properties",
    "settings",
    "typeAliases",
    "plugins",
    "objectFactory",
    "objectWrapperFactory",
    "reflectorFactory",
    "environments",
    "databaseIdProvider",
    "typeHandlers",
    "mappers",
];

/// Parses a `<configuration>` document into a [`Configuration`].
///
/// The builder consumes itself on [`parse`](Self::parse), so each instance
/// can only be used once.
pub struct XmlConfigBuilder {
    configuration: Configuration,
    resources: Resources,
    driver_registry: Arc<DriverRegistry>,
    environment: Option<String>,
    document: Element,
}

impl XmlConfigBuilder {
    pub fn new(schema: Arc<TypeSchema>, xml: &str) -> Result<Self> {
        let document = parse_document(xml)?;
        if document.name() != "configuration" {
            return Err(Error::builder(format!(
                "Expected a <configuration> root element, found <{}>",
                document.name()
            )));
        }
        Ok(Self {
            configuration: Configuration::new(schema),
            resources: Resources::new(),
            driver_registry: Arc::new(DriverRegistry::new()),
            environment: None,
            document,
        })
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_driver_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.driver_registry = registry;
        self
    }

    /// Select an environment id, overriding the document default.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Caller-supplied variables; they override both nested property pairs
    /// and loaded property files.
    pub fn with_variables(mut self, variables: Properties) -> Self {
        self.configuration.set_variables(variables);
        self
    }

    pub fn parse(mut self) -> Result<Configuration> {
        for child in self.document.child_elements() {
            if !SECTIONS.contains(&child.name()) {
                return Err(Error::builder(format!(
                    "Unknown <configuration> section <{}>",
                    child.name()
                )));
            }
        }

        self.properties_element()?;
        let settings_properties = self.settings_as_properties()?;
        self.type_aliases_element()?;
        self.plugins_element()?;
        self.component_element("objectFactory", Configuration::set_object_factory)?;
        self.component_element("objectWrapperFactory", Configuration::set_object_wrapper_factory)?;
        self.component_element("reflectorFactory", Configuration::set_reflector_factory_spec)?;
        self.apply_settings(&settings_properties)?;
        self.environments_element()?;
        self.database_id_provider_element()?;
        self.type_handlers_element()?;
        self.mappers_element()?;

        self.configuration.drain_pending()?;
        Ok(self.configuration)
    }

    fn properties_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("properties") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let mut defaults = node.children_as_properties()?;
        let resource = node.string_attribute("resource");
        let url = node.string_attribute("url");
        if resource.is_some() && url.is_some() {
            return Err(Error::builder(
                "The properties element cannot specify both a URL and a resource based property file reference. Please specify one or the other.",
            ));
        }
        if let Some(name) = resource.or(url) {
            defaults.put_all(&self.resources.load_properties(&name)?);
        }
        // caller-supplied variables win
        defaults.put_all(&variables);
        self.configuration.set_variables(defaults);
        Ok(())
    }

    fn settings_as_properties(&mut self) -> Result<Properties> {
        let Some(element) = self.document.first_child("settings") else {
            return Ok(Properties::new());
        };
        let variables = self.configuration.variables().clone();
        let properties = XNode::new(element, &variables).children_as_properties()?;
        // validate every key up front, before later sections run
        let mut scratch = Settings::default();
        for (key, value) in properties.iter() {
            scratch.apply(key, value)?;
        }
        Ok(properties)
    }

    fn apply_settings(&mut self, properties: &Properties) -> Result<()> {
        for (key, value) in properties.iter() {
            self.configuration.settings_mut().apply(key, value)?;
        }
        if let Some(language) = self
            .configuration
            .settings()
            .default_scripting_language
            .clone()
        {
            self.configuration
                .language_registry_mut()
                .set_default(language)?;
        }
        Ok(())
    }

    fn type_aliases_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("typeAliases") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let schema = self.configuration.schema().clone();
        for child in element.child_elements() {
            let node = XNode::new(child, &variables);
            match child.name() {
                "package" => {
                    let prefix = node.required_attribute("name")?;
                    self.configuration
                        .type_alias_registry_mut()
                        .register_package(&prefix, None, &schema)?;
                }
                "typeAlias" => {
                    let type_name = node.required_attribute("type")?;
                    let descriptor = schema.get(&type_name).cloned().ok_or_else(|| {
                        Error::builder(format!(
                            "Error registering typeAlias: type '{}' is not known to the schema",
                            type_name
                        ))
                    })?;
                    match node.string_attribute("alias") {
                        Some(alias) => self
                            .configuration
                            .type_alias_registry_mut()
                            .register(&alias, &type_name)?,
                        None => self
                            .configuration
                            .type_alias_registry_mut()
                            .register_type(&descriptor)?,
                    }
                }
                other => {
                    return Err(Error::builder(format!(
                        "Unknown <typeAliases> child <{}>",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    fn plugins_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("plugins") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        for child in element.children_named("plugin") {
            let node = XNode::new(child, &variables);
            let interceptor = node.required_attribute("interceptor")?;
            let type_name = self.configuration.resolve_type(&interceptor)?;
            let properties = node.children_as_properties()?;
            self.configuration.add_plugin(ComponentSpec {
                type_name,
                properties,
            });
        }
        Ok(())
    }

    fn component_element(
        &mut self,
        section: &str,
        assign: fn(&mut Configuration, ComponentSpec),
    ) -> Result<()> {
        let Some(element) = self.document.first_child(section) else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let type_name = self
            .configuration
            .resolve_type(&node.required_attribute("type")?)?;
        let properties = node.children_as_properties()?;
        assign(
            &mut self.configuration,
            ComponentSpec {
                type_name,
                properties,
            },
        );
        Ok(())
    }

    fn environments_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("environments") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let wanted = self
            .environment
            .clone()
            .or_else(|| node.string_attribute("default"))
            .ok_or_else(|| Error::builder("No environment was specified"))?;
        for child in element.children_named("environment") {
            let environment = XNode::new(child, &variables);
            let id = environment.required_attribute("id")?;
            if id != wanted {
                continue;
            }
            let transaction_manager = environment
                .first_child("transactionManager")
                .ok_or_else(|| {
                    Error::builder("Environment declaration requires a transactionManager")
                })?;
            let tx_type = transaction_manager.required_attribute("type")?;
            let tx_type = TransactionManagerType::from_name(&tx_type).ok_or_else(|| {
                Error::builder(format!("Unknown transaction manager type '{}'", tx_type))
            })?;
            let data_source = environment.first_child("dataSource").ok_or_else(|| {
                Error::builder("Environment declaration requires a dataSource")
            })?;
            let ds_type = data_source.required_attribute("type")?;
            let properties = data_source.children_as_properties()?;
            let built = match ds_type.as_str() {
                "POOLED" => {
                    PooledDataSourceFactory.build(&properties, self.driver_registry.clone())?
                }
                "UNPOOLED" => {
                    UnpooledDataSourceFactory.build(&properties, self.driver_registry.clone())?
                }
                other => {
                    return Err(Error::builder(format!(
                        "Unknown dataSource type '{}'",
                        other
                    )));
                }
            };
            self.configuration
                .set_environment(Environment::new(id, tx_type, built));
            return Ok(());
        }
        warn!("No environment matched id '{}'", wanted);
        Ok(())
    }

    fn database_id_provider_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("databaseIdProvider") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let node = XNode::new(element, &variables);
        let provider_type = node.required_attribute("type")?;
        if provider_type != "DB_VENDOR" && provider_type != "VENDOR" {
            return Err(Error::builder(format!(
                "Unknown databaseIdProvider type '{}'",
                provider_type
            )));
        }
        let provider = VendorDatabaseIdProvider::new(node.children_as_properties()?);
        let data_source = match self.configuration.environment() {
            Some(environment) => environment.data_source.clone(),
            None => return Ok(()),
        };
        let database_id = provider.database_id(data_source.as_ref())?;
        self.configuration.set_database_id(database_id);
        Ok(())
    }

    fn type_handlers_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("typeHandlers") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let schema = self.configuration.schema().clone();
        for child in element.child_elements() {
            let node = XNode::new(child, &variables);
            match child.name() {
                "package" => {
                    let prefix = node.required_attribute("name")?;
                    for descriptor in schema.types_in_package(&prefix) {
                        if descriptor.is_concrete() && !descriptor.is_anonymous {
                            self.configuration
                                .type_handler_registry_mut()
                                .register(TypeHandlerSpec {
                                    handler: descriptor.name.clone(),
                                    java_type: None,
                                    jdbc_type: None,
                                });
                        }
                    }
                }
                "typeHandler" => {
                    let handler = self
                        .configuration
                        .resolve_type(&node.required_attribute("handler")?)?;
                    let java_type = match node.string_attribute("javaType") {
                        Some(alias) => Some(self.configuration.resolve_type(&alias)?),
                        None => None,
                    };
                    let jdbc_type = match node.string_attribute("jdbcType") {
                        Some(name) => Some(JdbcType::from_name(&name)?),
                        None => None,
                    };
                    self.configuration
                        .type_handler_registry_mut()
                        .register(TypeHandlerSpec {
                            handler,
                            java_type,
                            jdbc_type,
                        });
                }
                other => {
                    return Err(Error::builder(format!(
                        "Unknown <typeHandlers> child <{}>",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    fn mappers_element(&mut self) -> Result<()> {
        let Some(element) = self.document.first_child("mappers") else {
            return Ok(());
        };
        let variables = self.configuration.variables().clone();
        let schema = self.configuration.schema().clone();
        for child in element.child_elements() {
            let node = XNode::new(child, &variables);
            match child.name() {
                "package" => {
                    let prefix = node.required_attribute("name")?;
                    for descriptor in schema.types_in_package(&prefix) {
                        if descriptor.is_interface
                            && !self.configuration.has_mapper(&descriptor.name)
                        {
                            self.configuration.add_mapper(&descriptor.name)?;
                        }
                    }
                }
                "mapper" => {
                    let resource = node.string_attribute("resource");
                    let url = node.string_attribute("url");
                    let class = node.string_attribute("class");
                    let specified =
                        [&resource, &url, &class].iter().filter(|v| v.is_some()).count();
                    if specified != 1 {
                        return Err(Error::builder(
                            "A mapper element may only specify a url, resource or class, but not more than one.",
                        ));
                    }
                    if let Some(name) = resource.or(url) {
                        let xml = self.resources.load(&name)?;
                        XmlMapperBuilder::from_xml(&xml, &name)?
                            .parse(&mut self.configuration)?;
                    } else if let Some(class) = class {
                        if !self.configuration.has_mapper(&class) {
                            self.configuration.add_mapper(&class)?;
                        }
                    }
                }
                other => {
                    return Err(Error::builder(format!(
                        "Unknown <mappers> child <{}>",
                        other
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::settings::ExecutorType;
    use sqlmapper_pool::testing::{TestDriver, TestDriverOptions};
    use sqlmapper_reflect::TypeDescriptor;

    fn schema() -> Arc<TypeSchema> {
        let mut schema = TypeSchema::with_builtins();
        schema.register(TypeDescriptor::new("app.UserMapper").interface());
        schema.register(TypeDescriptor::new("app.model.User"));
        Arc::new(schema)
    }

    fn driver_registry() -> Arc<DriverRegistry> {
        let mut registry = DriverRegistry::new();
        registry.register("test", TestDriver::shared(TestDriverOptions::default()));
        Arc::new(registry)
    }

    #[test]
    fn full_configuration_document() {
        let resources = Resources::new()
            .with_resource("conf/db.properties", "username=root\npassword=secret")
            .with_resource(
                "mappers/user.xml",
                r#"<mapper namespace="app.UserMapper">
                     <select id="findById" resultType="User">
                       SELECT * FROM ${tablePrefix}users WHERE id = #{id}
                     </select>
                   </mapper>"#,
            );
        let xml = r#"
            <configuration>
              <properties resource="conf/db.properties">
                <property name="tablePrefix" value="app_"/>
              </properties>
              <settings>
                <setting name="mapUnderscoreToCamelCase" value="true"/>
                <setting name="defaultExecutorType" value="REUSE"/>
              </settings>
              <typeAliases>
                <typeAlias alias="User" type="app.model.User"/>
              </typeAliases>
              <environments default="dev">
                <environment id="dev">
                  <transactionManager type="JDBC"/>
                  <dataSource type="POOLED">
                    <property name="driver" value="test"/>
                    <property name="url" value="test://db"/>
                    <property name="username" value="${username}"/>
                    <property name="password" value="${password}"/>
                  </dataSource>
                </environment>
              </environments>
              <databaseIdProvider type="DB_VENDOR">
                <property name="TestDB" value="testdb"/>
              </databaseIdProvider>
              <mappers>
                <mapper resource="mappers/user.xml"/>
              </mappers>
            </configuration>"#;
        let config = XmlConfigBuilder::new(schema(), xml)
            .unwrap()
            .with_resources(resources)
            .with_driver_registry(driver_registry())
            .parse()
            .unwrap();

        assert!(config.settings().map_underscore_to_camel_case);
        assert_eq!(config.settings().default_executor_type, ExecutorType::Reuse);
        assert_eq!(config.database_id(), Some("testdb"));
        assert!(config.environment().is_some());
        assert!(config.has_mapper("app.UserMapper"));

        let statement = config.mapped_statement("app.UserMapper.findById").unwrap();
        let sql = statement
            .sql_source
            .bound_sql(&sqlmapper_core::value::Value::Null)
            .sql;
        // ${tablePrefix} substituted, #{id} extracted
        assert!(sql.contains("FROM app_users"));
        assert!(sql.contains("id = ?"));
        assert_eq!(statement.result_maps[0].type_name, "app.model.User");
    }

    #[test]
    fn unknown_setting_aborts_before_environments() {
        let xml = r#"
            <configuration>
              <settings>
                <setting name="cacheEnabledd" value="true"/>
              </settings>
            </configuration>"#;
        let err = match XmlConfigBuilder::new(schema(), xml).unwrap().parse() {
            Err(e) => e,
            Ok(_) => panic!("expected parse to fail"),
        };
        assert!(err.to_string().contains("not known"));
    }

    #[test]
    fn properties_resource_and_url_are_exclusive() {
        let xml = r#"
            <configuration>
              <properties resource="a.properties" url="b.properties"/>
            </configuration>"#;
        assert!(XmlConfigBuilder::new(schema(), xml)
            .unwrap()
            .parse()
            .is_err());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let xml = r#"<configuration><gadgets/></configuration>"#;
        assert!(XmlConfigBuilder::new(schema(), xml)
            .unwrap()
            .parse()
            .is_err());
    }

    #[test]
    fn caller_variables_override_document_properties() {
        let xml = r#"
            <configuration>
              <properties>
                <property name="who" value="document"/>
              </properties>
            </configuration>"#;
        let config = XmlConfigBuilder::new(schema(), xml)
            .unwrap()
            .with_variables(Properties::new().with("who", "caller"))
            .parse()
            .unwrap();
        assert_eq!(config.variables().get("who"), Some("caller"));
    }

    #[test]
    fn mapper_package_binds_interfaces() {
        let mut schema = TypeSchema::with_builtins();
        schema.register(TypeDescriptor::new("app.mappers.UserMapper").interface());
        schema.register(TypeDescriptor::new("app.mappers.Helper"));
        let xml = r#"
            <configuration>
              <mappers><package name="app.mappers"/></mappers>
            </configuration>"#;
        let config = XmlConfigBuilder::new(Arc::new(schema), xml)
            .unwrap()
            .parse()
            .unwrap();
        assert!(config.has_mapper("app.mappers.UserMapper"));
        assert!(!config.has_mapper("app.mappers.Helper"));
    }
}
