//! The immutable mapping model produced by the builders.

pub mod environment;
pub mod parameter;
pub mod result_map;
pub mod sql_source;
pub mod statement;

pub use environment::{
    Connection, DataSource, Environment, TransactionManagerType, VendorDatabaseIdProvider,
};
pub use parameter::{ParameterMap, ParameterMapping, ParameterMode};
pub use result_map::{Discriminator, ResultFlag, ResultMap, ResultMapBuilder, ResultMapping};
pub use sql_source::{
    parse_inline_parameters, BoundSql, LanguageDriver, LanguageDriverRegistry, SqlSource,
    StaticSqlSource, XmlLanguageDriver,
};
pub use statement::{
    KeyGeneratorKind, MappedStatement, MappedStatementBuilder, ResultSetType, SqlCommandType,
    StatementType,
};
