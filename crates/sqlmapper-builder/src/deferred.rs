//! Pending-queue entries for forward references.

use sqlmapper_core::config::{Configuration, Deferred};
use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::mapping::{Discriminator, ResultMapping};
use sqlmapper_core::parsing::Element;

use crate::assistant::MapperBuilderAssistant;
use crate::statement_builder::parse_statement_node;

/// A `cache-ref` whose target namespace has not declared its cache yet.
pub struct CacheRefResolver {
    pub namespace: String,
    pub referenced: String,
}

impl Deferred for CacheRefResolver {
    fn try_resolve(&self, configuration: &mut Configuration) -> Result<()> {
        if configuration.has_cache(&self.referenced) {
            Ok(())
        } else {
            Err(Error::incomplete(format!(
                "No cache for namespace '{}' could be found",
                self.referenced
            )))
        }
    }

    fn describe(&self) -> String {
        format!(
            "cache-ref from '{}' to '{}'",
            self.namespace, self.referenced
        )
    }
}

/// A result map whose `extends` parent (or other reference) is missing.
pub struct ResultMapResolver {
    pub namespace: String,
    pub resource: String,
    pub id: String,
    pub type_name: String,
    pub extends: Option<String>,
    pub discriminator: Option<Discriminator>,
    pub result_mappings: Vec<ResultMapping>,
    pub auto_mapping: Option<bool>,
}

impl Deferred for ResultMapResolver {
    fn try_resolve(&self, configuration: &mut Configuration) -> Result<()> {
        let mut assistant = MapperBuilderAssistant::new(&self.resource);
        assistant.set_current_namespace(&self.namespace)?;
        assistant
            .add_result_map(
                configuration,
                &self.id,
                self.type_name.clone(),
                self.extends.clone(),
                self.discriminator.clone(),
                self.result_mappings.clone(),
                self.auto_mapping,
            )
            .map(|_| ())
    }

    fn describe(&self) -> String {
        format!("result map '{}.{}' in '{}'", self.namespace, self.id, self.resource)
    }
}

/// A statement element blocked on an unresolved cache-ref, result map,
/// parameter map, or SQL fragment.
pub struct StatementResolver {
    pub namespace: String,
    pub resource: String,
    pub element: Element,
    pub required_database_id: Option<String>,
}

impl Deferred for StatementResolver {
    fn try_resolve(&self, configuration: &mut Configuration) -> Result<()> {
        let assistant =
            MapperBuilderAssistant::recovered(configuration, &self.namespace, &self.resource)?;
        parse_statement_node(
            configuration,
            &assistant,
            &self.element,
            self.required_database_id.as_deref(),
        )
    }

    fn describe(&self) -> String {
        let id = self.element.attribute("id").unwrap_or("<unnamed>");
        format!("statement '{}.{}' in '{}'", self.namespace, id, self.resource)
    }
}
