//! sqlmapper: the runtime core of a SQL mapping framework.
//!
//! The workspace splits into four layers, re-exported here:
//!
//! - [`reflect`] — schema-driven reflection: property paths, accessor
//!   arbitration, generic type resolution
//! - [`core`] — the mapping model, cache stack, and the [`Configuration`]
//!   registry
//! - [`builder`] — two-phase XML parsing with forward-reference tolerance
//! - [`pool`] — unpooled and pooled data sources
//!
//! [`SqlMapperBuilder`] is the front door: it parses a configuration
//! document (plus the mapper documents it references), drains every pending
//! forward reference, and seals the registry.

pub use sqlmapper_builder as builder;
pub use sqlmapper_core as core;
pub use sqlmapper_pool as pool;
pub use sqlmapper_reflect as reflect;

pub use sqlmapper_builder::{Resources, XmlConfigBuilder, XmlMapperBuilder};
pub use sqlmapper_core::{
    Cache, CacheBuilder, CacheKey, Configuration, Error, JdbcType, MappedStatement, ParameterMap,
    ParameterMapping, Properties, Result, ResultMap, ResultMapping, Settings, SqlCommandType,
    StatementType, Value,
};
pub use sqlmapper_pool::{
    DriverRegistry, PoolConfig, PooledDataSource, UnpooledDataSource,
};
pub use sqlmapper_reflect::{
    DynObject, HostObject, MetaType, Reflector, ReflectorFactory, TypeDescriptor, TypeSchema,
};

use std::sync::Arc;

/// Builds a sealed [`Configuration`] from a configuration document.
pub struct SqlMapperBuilder {
    schema: Arc<TypeSchema>,
    resources: Resources,
    driver_registry: Arc<DriverRegistry>,
    environment: Option<String>,
    variables: Properties,
}

impl SqlMapperBuilder {
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        Self {
            schema,
            resources: Resources::new(),
            driver_registry: Arc::new(DriverRegistry::new()),
            environment: None,
            variables: Properties::new(),
        }
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_driver_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.driver_registry = registry;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_variables(mut self, variables: Properties) -> Self {
        self.variables = variables;
        self
    }

    /// Parse, drain pending references to completion, and seal. Any
    /// reference that never resolves is reported as a builder error naming
    /// the unresolved entries.
    pub fn build(self, xml: &str) -> Result<Arc<Configuration>> {
        let mut builder = XmlConfigBuilder::new(self.schema, xml)?
            .with_resources(self.resources)
            .with_driver_registry(self.driver_registry)
            .with_variables(self.variables);
        if let Some(environment) = self.environment {
            builder = builder.with_environment(environment);
        }
        let mut configuration = builder.parse()?;
        configuration.check_incomplete()?;
        Ok(Arc::new(configuration))
    }
}
