//! The process-wide configuration registry.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::mem;
use std::sync::{Arc, Mutex};

use log::debug;
use serde_json::json;

use sqlmapper_reflect::{MetaType, ReflectorFactory, TypeSchema};

use crate::alias::TypeAliasRegistry;
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::mapping::environment::Environment;
use crate::mapping::parameter::ParameterMap;
use crate::mapping::result_map::ResultMap;
use crate::mapping::sql_source::LanguageDriverRegistry;
use crate::mapping::statement::MappedStatement;
use crate::parsing::{Element, Properties};
use crate::settings::Settings;
use crate::types::TypeHandlerRegistry;
use crate::value::Value;

/// A deferred build step waiting on a forward reference.
///
/// `try_resolve` either completes the registration or fails with an
/// incomplete error, in which case the enclosing drain re-enqueues the
/// entry. Any other error escapes.
pub trait Deferred: Send {
    fn try_resolve(&self, configuration: &mut Configuration) -> Result<()>;

    /// Human-readable description for seal-time diagnostics.
    fn describe(&self) -> String;
}

enum ShortKey {
    Unique(String),
    Ambiguous,
}

/// An id-keyed registry enforcing the duplicate-registration contract and
/// offering a short-name convenience index.
pub struct StrictRegistry<T: ?Sized> {
    name: &'static str,
    entries: HashMap<String, Arc<T>>,
    short_keys: HashMap<String, ShortKey>,
    insertion_order: Vec<String>,
}

impl<T: ?Sized> StrictRegistry<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            short_keys: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    /// Register a value. Re-registering the identical value is idempotent;
    /// a different value under an existing id is an error.
    pub fn insert(&mut self, key: impl Into<String>, value: Arc<T>) -> Result<()> {
        let key = key.into();
        if let Some(existing) = self.entries.get(&key) {
            if Arc::ptr_eq(existing, &value) {
                return Ok(());
            }
            return Err(Error::builder(format!(
                "{} already contains an entry for id '{}'",
                self.name, key
            )));
        }
        if let Some(short) = key.rsplit('.').next() {
            if short != key {
                let update = match self.short_keys.get(short) {
                    None => Some(ShortKey::Unique(key.clone())),
                    Some(ShortKey::Unique(existing)) if existing != &key => {
                        Some(ShortKey::Ambiguous)
                    }
                    _ => None,
                };
                if let Some(entry) = update {
                    self.short_keys.insert(short.to_string(), entry);
                }
            }
        }
        self.insertion_order.push(key.clone());
        self.entries.insert(key, value);
        Ok(())
    }

    /// Resolve an id, accepting the short form when it is unambiguous.
    pub fn get(&self, key: &str) -> Result<Arc<T>> {
        if let Some(found) = self.entries.get(key) {
            return Ok(found.clone());
        }
        match self.short_keys.get(key) {
            Some(ShortKey::Unique(full)) => Ok(self.entries[full].clone()),
            Some(ShortKey::Ambiguous) => Err(Error::builder(format!(
                "'{}' is ambiguous in {} (try using the full namespace-qualified id)",
                key, self.name
            ))),
            None => Err(Error::builder(format!(
                "{} does not contain an entry for '{}'",
                self.name, key
            ))),
        }
    }

    /// Whether the fully qualified id is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.insertion_order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A named pluggable component recorded from the configuration document
/// (plugins, object factories, custom reflector factories).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub type_name: String,
    pub properties: Properties,
}

/// Aggregates every registry the runtime dispatches against. Populated by
/// the builders, then sealed; post-seal readers share it behind an `Arc`.
pub struct Configuration {
    settings: Settings,
    variables: Properties,
    database_id: Option<String>,
    environment: Option<Environment>,
    schema: Arc<TypeSchema>,
    reflector_factory: Arc<ReflectorFactory>,
    type_alias_registry: TypeAliasRegistry,
    type_handler_registry: TypeHandlerRegistry,
    language_registry: LanguageDriverRegistry,

    mapped_statements: StrictRegistry<MappedStatement>,
    caches: StrictRegistry<dyn Cache>,
    result_maps: StrictRegistry<ResultMap>,
    parameter_maps: StrictRegistry<ParameterMap>,

    cache_ref_map: BTreeMap<String, String>,
    loaded_resources: HashSet<String>,
    sql_fragments: HashMap<String, Element>,
    mappers: BTreeSet<String>,

    plugins: Vec<ComponentSpec>,
    object_factory: Option<ComponentSpec>,
    object_wrapper_factory: Option<ComponentSpec>,
    reflector_factory_spec: Option<ComponentSpec>,

    // Each pending queue carries its own lock so late mapper parses cannot
    // corrupt a drain in progress.
    pending_result_maps: Mutex<Vec<Box<dyn Deferred>>>,
    pending_cache_refs: Mutex<Vec<Box<dyn Deferred>>>,
    pending_statements: Mutex<Vec<Box<dyn Deferred>>>,
}

impl Configuration {
    pub fn new(schema: Arc<TypeSchema>) -> Self {
        Self {
            settings: Settings::default(),
            variables: Properties::new(),
            database_id: None,
            environment: None,
            reflector_factory: Arc::new(ReflectorFactory::new(schema.clone())),
            schema,
            type_alias_registry: TypeAliasRegistry::new(),
            type_handler_registry: TypeHandlerRegistry::new(),
            language_registry: LanguageDriverRegistry::new(),
            mapped_statements: StrictRegistry::new("Mapped Statements collection"),
            caches: StrictRegistry::new("Caches collection"),
            result_maps: StrictRegistry::new("Result Maps collection"),
            parameter_maps: StrictRegistry::new("Parameter Maps collection"),
            cache_ref_map: BTreeMap::new(),
            loaded_resources: HashSet::new(),
            sql_fragments: HashMap::new(),
            mappers: BTreeSet::new(),
            plugins: Vec::new(),
            object_factory: None,
            object_wrapper_factory: None,
            reflector_factory_spec: None,
            pending_result_maps: Mutex::new(Vec::new()),
            pending_cache_refs: Mutex::new(Vec::new()),
            pending_statements: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn variables(&self) -> &Properties {
        &self.variables
    }

    pub fn set_variables(&mut self, variables: Properties) {
        self.variables = variables;
    }

    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    pub fn set_database_id(&mut self, database_id: Option<String>) {
        self.database_id = database_id;
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = Some(environment);
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.schema
    }

    pub fn reflector_factory(&self) -> &Arc<ReflectorFactory> {
        &self.reflector_factory
    }

    /// Path facade over a schema type, backed by the shared reflector cache.
    pub fn meta_type(&self, type_name: &str) -> Result<MetaType<'_>> {
        Ok(MetaType::for_type(type_name, &self.reflector_factory)?)
    }

    pub fn type_alias_registry(&self) -> &TypeAliasRegistry {
        &self.type_alias_registry
    }

    pub fn type_alias_registry_mut(&mut self) -> &mut TypeAliasRegistry {
        &mut self.type_alias_registry
    }

    pub fn resolve_type(&self, alias: &str) -> Result<String> {
        self.type_alias_registry.resolve(alias, &self.schema)
    }

    pub fn type_handler_registry(&self) -> &TypeHandlerRegistry {
        &self.type_handler_registry
    }

    pub fn type_handler_registry_mut(&mut self) -> &mut TypeHandlerRegistry {
        &mut self.type_handler_registry
    }

    pub fn language_registry(&self) -> &LanguageDriverRegistry {
        &self.language_registry
    }

    pub fn language_registry_mut(&mut self) -> &mut LanguageDriverRegistry {
        &mut self.language_registry
    }

    // ---- statements -------------------------------------------------------

    pub fn add_mapped_statement(&mut self, statement: Arc<MappedStatement>) -> Result<()> {
        debug!("registering mapped statement '{}'", statement.id);
        self.mapped_statements.insert(statement.id.clone(), statement)
    }

    pub fn mapped_statement(&self, id: &str) -> Result<Arc<MappedStatement>> {
        self.mapped_statements.get(id)
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.mapped_statements.contains(id)
    }

    pub fn statement_ids(&self) -> &[String] {
        self.mapped_statements.ids()
    }

    // ---- caches -----------------------------------------------------------

    pub fn add_cache(&mut self, cache: Arc<dyn Cache>) -> Result<()> {
        let id = cache.id().to_string();
        self.caches.insert(id, cache)
    }

    pub fn cache(&self, namespace: &str) -> Result<Arc<dyn Cache>> {
        self.caches.get(namespace)
    }

    pub fn has_cache(&self, namespace: &str) -> bool {
        self.caches.contains(namespace)
    }

    pub fn cache_ids(&self) -> &[String] {
        self.caches.ids()
    }

    pub fn add_cache_ref(&mut self, namespace: impl Into<String>, referenced: impl Into<String>) {
        self.cache_ref_map.insert(namespace.into(), referenced.into());
    }

    pub fn cache_ref(&self, namespace: &str) -> Option<&str> {
        self.cache_ref_map.get(namespace).map(String::as_str)
    }

    pub fn cache_refs(&self) -> &BTreeMap<String, String> {
        &self.cache_ref_map
    }

    // ---- result maps ------------------------------------------------------

    pub fn add_result_map(&mut self, result_map: Arc<ResultMap>) -> Result<()> {
        self.result_maps.insert(result_map.id.clone(), result_map)
    }

    pub fn result_map(&self, id: &str) -> Result<Arc<ResultMap>> {
        self.result_maps.get(id)
    }

    pub fn has_result_map(&self, id: &str) -> bool {
        self.result_maps.contains(id)
    }

    pub fn result_map_ids(&self) -> &[String] {
        self.result_maps.ids()
    }

    // ---- parameter maps ---------------------------------------------------

    pub fn add_parameter_map(&mut self, parameter_map: Arc<ParameterMap>) -> Result<()> {
        self.parameter_maps
            .insert(parameter_map.id.clone(), parameter_map)
    }

    pub fn parameter_map(&self, id: &str) -> Result<Arc<ParameterMap>> {
        self.parameter_maps.get(id)
    }

    pub fn has_parameter_map(&self, id: &str) -> bool {
        self.parameter_maps.contains(id)
    }

    // ---- resources, fragments, mappers ------------------------------------

    pub fn add_loaded_resource(&mut self, resource: impl Into<String>) {
        self.loaded_resources.insert(resource.into());
    }

    pub fn is_resource_loaded(&self, resource: &str) -> bool {
        self.loaded_resources.contains(resource)
    }

    pub fn sql_fragment(&self, id: &str) -> Option<&Element> {
        self.sql_fragments.get(id)
    }

    pub fn add_sql_fragment(&mut self, id: impl Into<String>, fragment: Element) {
        self.sql_fragments.insert(id.into(), fragment);
    }

    pub fn sql_fragments(&self) -> &HashMap<String, Element> {
        &self.sql_fragments
    }

    /// Bind a mapper type for a namespace. The type must exist in the
    /// schema; rebinding is an error.
    pub fn add_mapper(&mut self, type_name: &str) -> Result<()> {
        if !self.schema.contains(type_name) {
            return Err(Error::builder(format!(
                "Type '{}' is not known to the schema",
                type_name
            )));
        }
        if !self.mappers.insert(type_name.to_string()) {
            return Err(Error::builder(format!(
                "Type '{}' is already known to the mapper registry",
                type_name
            )));
        }
        Ok(())
    }

    pub fn has_mapper(&self, type_name: &str) -> bool {
        self.mappers.contains(type_name)
    }

    // ---- pluggable component specs ----------------------------------------

    pub fn add_plugin(&mut self, spec: ComponentSpec) {
        self.plugins.push(spec);
    }

    pub fn plugins(&self) -> &[ComponentSpec] {
        &self.plugins
    }

    pub fn set_object_factory(&mut self, spec: ComponentSpec) {
        self.object_factory = Some(spec);
    }

    pub fn object_factory(&self) -> Option<&ComponentSpec> {
        self.object_factory.as_ref()
    }

    pub fn set_object_wrapper_factory(&mut self, spec: ComponentSpec) {
        self.object_wrapper_factory = Some(spec);
    }

    pub fn object_wrapper_factory(&self) -> Option<&ComponentSpec> {
        self.object_wrapper_factory.as_ref()
    }

    pub fn set_reflector_factory_spec(&mut self, spec: ComponentSpec) {
        self.reflector_factory_spec = Some(spec);
    }

    pub fn reflector_factory_spec(&self) -> Option<&ComponentSpec> {
        self.reflector_factory_spec.as_ref()
    }

    // ---- pending queues ---------------------------------------------------

    pub fn add_incomplete_result_map(&mut self, entry: Box<dyn Deferred>) {
        self.pending_result_maps
            .lock()
            .expect("pending result maps lock poisoned")
            .push(entry);
    }

    pub fn add_incomplete_cache_ref(&mut self, entry: Box<dyn Deferred>) {
        self.pending_cache_refs
            .lock()
            .expect("pending cache refs lock poisoned")
            .push(entry);
    }

    pub fn add_incomplete_statement(&mut self, entry: Box<dyn Deferred>) {
        self.pending_statements
            .lock()
            .expect("pending statements lock poisoned")
            .push(entry);
    }

    pub fn pending_counts(&self) -> (usize, usize, usize) {
        (
            self.pending_result_maps.lock().expect("lock poisoned").len(),
            self.pending_cache_refs.lock().expect("lock poisoned").len(),
            self.pending_statements.lock().expect("lock poisoned").len(),
        )
    }

    /// One drain pass over every pending queue: result maps, cache refs,
    /// statements. Entries that still cannot resolve stay queued.
    pub fn drain_pending(&mut self) -> Result<()> {
        self.drain_queue(QueueKind::ResultMaps)?;
        self.drain_queue(QueueKind::CacheRefs)?;
        self.drain_queue(QueueKind::Statements)?;
        Ok(())
    }

    fn drain_queue(&mut self, kind: QueueKind) -> Result<()> {
        let pending = {
            let queue = self.queue(kind);
            let mut guard = queue.lock().expect("pending queue lock poisoned");
            mem::take(&mut *guard)
        };
        let mut remaining: Vec<Box<dyn Deferred>> = Vec::new();
        let mut failure: Option<Error> = None;
        for entry in pending {
            if failure.is_some() {
                remaining.push(entry);
                continue;
            }
            match entry.try_resolve(self) {
                Ok(()) => {}
                Err(e) if e.is_incomplete() => remaining.push(entry),
                Err(e) => {
                    remaining.push(entry);
                    failure = Some(e);
                }
            }
        }
        if !remaining.is_empty() {
            self.queue(kind)
                .lock()
                .expect("pending queue lock poisoned")
                .extend(remaining);
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn queue(&self, kind: QueueKind) -> &Mutex<Vec<Box<dyn Deferred>>> {
        match kind {
            QueueKind::ResultMaps => &self.pending_result_maps,
            QueueKind::CacheRefs => &self.pending_cache_refs,
            QueueKind::Statements => &self.pending_statements,
        }
    }

    /// Final drain: a queue that stays non-empty is a configuration error
    /// naming each unresolved entry.
    pub fn check_incomplete(&mut self) -> Result<()> {
        self.drain_pending()?;
        let mut unresolved = Vec::new();
        for kind in [QueueKind::ResultMaps, QueueKind::CacheRefs, QueueKind::Statements] {
            for entry in self
                .queue(kind)
                .lock()
                .expect("pending queue lock poisoned")
                .iter()
            {
                unresolved.push(entry.describe());
            }
        }
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(Error::builder(format!(
                "Configuration has unresolved references: {}",
                unresolved.join("; ")
            )))
        }
    }

    // ---- canonical description --------------------------------------------

    /// A canonical, order-independent description of the registry, used by
    /// the round-trip and order-independence laws.
    pub fn canonical_description(&self) -> serde_json::Value {
        let mut statement_ids: Vec<&String> = self.mapped_statements.ids().iter().collect();
        statement_ids.sort();
        let statements: Vec<serde_json::Value> = statement_ids
            .iter()
            .map(|id| {
                let statement = self.mapped_statements.get(id).expect("registered id");
                json!({
                    "id": statement.id.clone(),
                    "command": statement.sql_command_type.as_str(),
                    "statementType": statement.statement_type.as_str(),
                    "sql": statement.sql_source.bound_sql(&Value::Null).sql,
                    "parameterMap": statement.parameter_map.id.clone(),
                    "resultMaps": statement
                        .result_maps
                        .iter()
                        .map(|m| m.id.clone())
                        .collect::<Vec<_>>(),
                    "flushCache": statement.flush_cache_required,
                    "useCache": statement.use_cache,
                    "resultOrdered": statement.result_ordered,
                    "fetchSize": statement.fetch_size,
                    "timeout": statement.timeout_ms,
                    "databaseId": statement.database_id.clone(),
                    "keyProperties": statement.key_properties.clone(),
                    "keyColumns": statement.key_columns.clone(),
                    "cache": statement.cache.as_ref().map(|c| c.id().to_string()),
                })
            })
            .collect();

        let mut result_map_ids: Vec<&String> = self.result_maps.ids().iter().collect();
        result_map_ids.sort();
        let result_maps: Vec<serde_json::Value> = result_map_ids
            .iter()
            .map(|id| {
                let result_map = self.result_maps.get(id).expect("registered id");
                json!({
                    "id": result_map.id.clone(),
                    "type": result_map.type_name.clone(),
                    "mappings": result_map
                        .result_mappings
                        .iter()
                        .map(|mapping| {
                            json!({
                                "property": mapping.property.clone(),
                                "column": mapping.column.clone(),
                                "javaType": mapping.java_type.clone(),
                                "id": mapping.has_flag(crate::mapping::ResultFlag::Id),
                                "constructor": mapping
                                    .has_flag(crate::mapping::ResultFlag::Constructor),
                                "nestedSelect": mapping.nested_select_id.clone(),
                                "nestedResultMap": mapping.nested_result_map_id.clone(),
                            })
                        })
                        .collect::<Vec<_>>(),
                })
            })
            .collect();

        let mut cache_ids: Vec<&String> = self.caches.ids().iter().collect();
        cache_ids.sort();

        json!({
            "statements": statements,
            "resultMaps": result_maps,
            "caches": cache_ids,
            "cacheRefs": self.cache_ref_map.clone(),
        })
    }
}

#[derive(Clone, Copy)]
enum QueueKind {
    ResultMaps,
    CacheRefs,
    Statements,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::sql_source::StaticSqlSource;
    use crate::mapping::statement::SqlCommandType;

    fn statement(id: &str) -> Arc<MappedStatement> {
        MappedStatement::builder(
            id,
            Arc::new(StaticSqlSource::new("SELECT 1", vec![])),
            SqlCommandType::Select,
        )
        .build()
    }

    fn configuration() -> Configuration {
        Configuration::new(Arc::new(TypeSchema::with_builtins()))
    }

    #[test]
    fn strict_registry_duplicate_semantics() {
        let mut config = configuration();
        let first = statement("ns.find");
        config.add_mapped_statement(first.clone()).unwrap();
        // identical value is idempotent
        config.add_mapped_statement(first).unwrap();
        // different value under the same id fails
        assert!(config.add_mapped_statement(statement("ns.find")).is_err());
    }

    #[test]
    fn short_name_resolution_and_ambiguity() {
        let mut config = configuration();
        config.add_mapped_statement(statement("ns.find")).unwrap();
        assert!(config.mapped_statement("find").is_ok());
        config.add_mapped_statement(statement("other.find")).unwrap();
        let err = match config.mapped_statement("find") {
            Err(e) => e,
            Ok(_) => panic!("expected mapped_statement to fail"),
        };
        assert!(err.to_string().contains("ambiguous"));
        assert!(config.mapped_statement("ns.find").is_ok());
    }

    #[test]
    fn resolve_returns_same_object_every_call() {
        let mut config = configuration();
        config.add_mapped_statement(statement("ns.find")).unwrap();
        let a = config.mapped_statement("ns.find").unwrap();
        let b = config.mapped_statement("ns.find").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    struct CountdownEntry {
        label: String,
        remaining: Mutex<usize>,
    }

    impl Deferred for CountdownEntry {
        fn try_resolve(&self, _configuration: &mut Configuration) -> Result<()> {
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining <= 1 {
                Ok(())
            } else {
                *remaining -= 1;
                Err(Error::incomplete("still waiting"))
            }
        }

        fn describe(&self) -> String {
            self.label.clone()
        }
    }

    #[test]
    fn pending_queue_drains_monotonically() {
        let mut config = configuration();
        config.add_incomplete_statement(Box::new(CountdownEntry {
            label: "stmt".into(),
            remaining: Mutex::new(2),
        }));
        assert_eq!(config.pending_counts().2, 1);
        config.drain_pending().unwrap(); // first pass decrements to 1
        assert_eq!(config.pending_counts().2, 1);
        config.drain_pending().unwrap(); // second pass resolves
        assert_eq!(config.pending_counts().2, 0);
        config.check_incomplete().unwrap();
    }

    #[test]
    fn check_incomplete_reports_stuck_entries() {
        struct Never;
        impl Deferred for Never {
            fn try_resolve(&self, _configuration: &mut Configuration) -> Result<()> {
                Err(Error::incomplete("missing target"))
            }
            fn describe(&self) -> String {
                "cache-ref ns -> missing".to_string()
            }
        }
        let mut config = configuration();
        config.add_incomplete_cache_ref(Box::new(Never));
        let err = config.check_incomplete().unwrap_err();
        assert!(err.to_string().contains("cache-ref ns -> missing"));
    }

    #[test]
    fn canonical_description_is_order_independent() {
        let mut first = configuration();
        first.add_mapped_statement(statement("a.one")).unwrap();
        first.add_mapped_statement(statement("b.two")).unwrap();

        let mut second = configuration();
        second.add_mapped_statement(statement("b.two")).unwrap();
        second.add_mapped_statement(statement("a.one")).unwrap();

        assert_eq!(first.canonical_description(), second.canonical_description());
    }
}
