//! Core types for the sqlmapper SQL mapping framework.
//!
//! This crate provides the registry and model layer shared by the builder
//! and pool crates:
//!
//! - [`Error`]/[`Result`] — the framework-wide error surface
//! - [`Value`] — dynamic SQL values
//! - [`TypeAliasRegistry`] — case-insensitive alias resolution over the
//!   reflection schema
//! - [`cache`] — the namespace cache trait, decorators, and chain builder
//! - [`mapping`] — immutable mapped statements, result maps, parameter
//!   maps, environments
//! - [`Configuration`] — the process-wide registry with forward-reference
//!   pending queues

pub mod alias;
pub mod cache;
pub mod config;
pub mod error;
pub mod mapping;
pub mod parsing;
pub mod settings;
pub mod types;
pub mod value;

pub use alias::TypeAliasRegistry;
pub use cache::{Cache, CacheBuilder, CacheKey};
pub use config::{ComponentSpec, Configuration, Deferred, StrictRegistry};
pub use error::{ConnectionErrorKind, Error, Result};
pub use mapping::{
    BoundSql, Connection, DataSource, Discriminator, Environment, KeyGeneratorKind,
    LanguageDriver, MappedStatement, ParameterMap, ParameterMapping, ParameterMode, ResultFlag,
    ResultMap, ResultMapping, ResultSetType, SqlCommandType, SqlSource, StatementType,
    TransactionManagerType, VendorDatabaseIdProvider,
};
pub use parsing::{Element, Properties, XNode};
pub use settings::Settings;
pub use types::{JdbcType, TypeHandlerRegistry, TypeHandlerSpec};
pub use value::Value;
