//! Mapped statements.

use std::sync::Arc;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::mapping::parameter::ParameterMap;
use crate::mapping::result_map::ResultMap;
use crate::mapping::sql_source::SqlSource;

/// The SQL verb a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlCommandType {
    Select,
    Insert,
    Update,
    Delete,
    Flush,
}

impl SqlCommandType {
    pub fn from_element_name(name: &str) -> Result<Self> {
        match name {
            "select" => Ok(SqlCommandType::Select),
            "insert" => Ok(SqlCommandType::Insert),
            "update" => Ok(SqlCommandType::Update),
            "delete" => Ok(SqlCommandType::Delete),
            "flush" => Ok(SqlCommandType::Flush),
            other => Err(Error::builder(format!(
                "Unknown statement element <{}>",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlCommandType::Select => "SELECT",
            SqlCommandType::Insert => "INSERT",
            SqlCommandType::Update => "UPDATE",
            SqlCommandType::Delete => "DELETE",
            SqlCommandType::Flush => "FLUSH",
        }
    }
}

/// How the statement is prepared against the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    Statement,
    #[default]
    Prepared,
    Callable,
}

impl StatementType {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "STATEMENT" => Ok(StatementType::Statement),
            "PREPARED" => Ok(StatementType::Prepared),
            "CALLABLE" => Ok(StatementType::Callable),
            other => Err(Error::builder(format!(
                "Unknown statementType '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Statement => "STATEMENT",
            StatementType::Prepared => "PREPARED",
            StatementType::Callable => "CALLABLE",
        }
    }
}

/// Requested result-set scrollability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
    Default,
}

impl ResultSetType {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "FORWARD_ONLY" => Ok(ResultSetType::ForwardOnly),
            "SCROLL_INSENSITIVE" => Ok(ResultSetType::ScrollInsensitive),
            "SCROLL_SENSITIVE" => Ok(ResultSetType::ScrollSensitive),
            "DEFAULT" => Ok(ResultSetType::Default),
            other => Err(Error::builder(format!(
                "Unknown resultSetType '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSetType::ForwardOnly => "FORWARD_ONLY",
            ResultSetType::ScrollInsensitive => "SCROLL_INSENSITIVE",
            ResultSetType::ScrollSensitive => "SCROLL_SENSITIVE",
            ResultSetType::Default => "DEFAULT",
        }
    }
}

/// Generated-key strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyGeneratorKind {
    #[default]
    None,
    /// Read driver-generated keys after execution.
    Jdbc3,
}

/// An addressable compiled representation of one SQL operation.
/// Immutable after build.
pub struct MappedStatement {
    pub id: String,
    pub resource: String,
    pub sql_command_type: SqlCommandType,
    pub statement_type: StatementType,
    pub sql_source: Arc<dyn SqlSource>,
    pub parameter_map: Arc<ParameterMap>,
    pub result_maps: Vec<Arc<ResultMap>>,
    pub result_set_type: Option<ResultSetType>,
    pub fetch_size: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub flush_cache_required: bool,
    pub use_cache: bool,
    pub result_ordered: bool,
    pub key_generator: KeyGeneratorKind,
    pub key_properties: Vec<String>,
    pub key_columns: Vec<String>,
    pub database_id: Option<String>,
    pub lang: String,
    pub result_sets: Vec<String>,
    pub cache: Option<Arc<dyn Cache>>,
    pub dirty_select: bool,
}

impl MappedStatement {
    pub fn builder(
        id: impl Into<String>,
        sql_source: Arc<dyn SqlSource>,
        sql_command_type: SqlCommandType,
    ) -> MappedStatementBuilder {
        MappedStatementBuilder {
            statement: MappedStatement {
                id: id.into(),
                resource: String::new(),
                sql_command_type,
                statement_type: StatementType::Prepared,
                sql_source,
                parameter_map: Arc::new(ParameterMap::new(
                    "defaultParameterMap",
                    "object",
                    Vec::new(),
                )),
                result_maps: Vec::new(),
                result_set_type: None,
                fetch_size: None,
                timeout_ms: None,
                flush_cache_required: false,
                use_cache: false,
                result_ordered: false,
                key_generator: KeyGeneratorKind::None,
                key_properties: Vec::new(),
                key_columns: Vec::new(),
                database_id: None,
                lang: "xml".to_string(),
                result_sets: Vec::new(),
                cache: None,
                dirty_select: false,
            },
        }
    }

    pub fn has_nested_result_maps(&self) -> bool {
        self.result_maps
            .iter()
            .any(|result_map| result_map.has_nested_result_maps)
    }
}

pub struct MappedStatementBuilder {
    statement: MappedStatement,
}

impl MappedStatementBuilder {
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.statement.resource = resource.into();
        self
    }

    pub fn statement_type(mut self, statement_type: StatementType) -> Self {
        self.statement.statement_type = statement_type;
        self
    }

    pub fn parameter_map(mut self, parameter_map: Arc<ParameterMap>) -> Self {
        self.statement.parameter_map = parameter_map;
        self
    }

    pub fn result_maps(mut self, result_maps: Vec<Arc<ResultMap>>) -> Self {
        self.statement.result_maps = result_maps;
        self
    }

    pub fn result_set_type(mut self, result_set_type: Option<ResultSetType>) -> Self {
        self.statement.result_set_type = result_set_type;
        self
    }

    pub fn fetch_size(mut self, fetch_size: Option<u32>) -> Self {
        self.statement.fetch_size = fetch_size;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.statement.timeout_ms = timeout_ms;
        self
    }

    pub fn flush_cache_required(mut self, flush: bool) -> Self {
        self.statement.flush_cache_required = flush;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.statement.use_cache = use_cache;
        self
    }

    pub fn result_ordered(mut self, result_ordered: bool) -> Self {
        self.statement.result_ordered = result_ordered;
        self
    }

    pub fn key_generator(mut self, key_generator: KeyGeneratorKind) -> Self {
        self.statement.key_generator = key_generator;
        self
    }

    pub fn key_properties(mut self, key_properties: Vec<String>) -> Self {
        self.statement.key_properties = key_properties;
        self
    }

    pub fn key_columns(mut self, key_columns: Vec<String>) -> Self {
        self.statement.key_columns = key_columns;
        self
    }

    pub fn database_id(mut self, database_id: Option<String>) -> Self {
        self.statement.database_id = database_id;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.statement.lang = lang.into();
        self
    }

    pub fn result_sets(mut self, result_sets: Vec<String>) -> Self {
        self.statement.result_sets = result_sets;
        self
    }

    pub fn cache(mut self, cache: Option<Arc<dyn Cache>>) -> Self {
        self.statement.cache = cache;
        self
    }

    pub fn dirty_select(mut self, dirty_select: bool) -> Self {
        self.statement.dirty_select = dirty_select;
        self
    }

    pub fn build(self) -> Arc<MappedStatement> {
        Arc::new(self.statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::sql_source::StaticSqlSource;

    #[test]
    fn enum_parsing() {
        assert_eq!(
            SqlCommandType::from_element_name("select").unwrap(),
            SqlCommandType::Select
        );
        assert!(SqlCommandType::from_element_name("merge").is_err());
        assert_eq!(
            StatementType::from_name("CALLABLE").unwrap(),
            StatementType::Callable
        );
        assert_eq!(
            ResultSetType::from_name("SCROLL_SENSITIVE").unwrap(),
            ResultSetType::ScrollSensitive
        );
        assert!(ResultSetType::from_name("scroll").is_err());
    }

    #[test]
    fn builder_defaults() {
        let source: Arc<dyn SqlSource> = Arc::new(StaticSqlSource::new("SELECT 1", vec![]));
        let statement =
            MappedStatement::builder("ns.find", source, SqlCommandType::Select).build();
        assert_eq!(statement.statement_type, StatementType::Prepared);
        assert_eq!(statement.parameter_map.id, "defaultParameterMap");
        assert!(!statement.flush_cache_required);
        assert_eq!(statement.key_generator, KeyGeneratorKind::None);
        assert_eq!(statement.lang, "xml");
    }
}
