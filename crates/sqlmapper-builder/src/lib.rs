//! Two-phase XML builders for sqlmapper.
//!
//! [`XmlConfigBuilder`] parses the root configuration document;
//! [`XmlMapperBuilder`] parses one mapper namespace document. Forward
//! references (caches, result maps, SQL fragments, statements defined in
//! mappers not yet parsed) are tolerated: failing elements are enqueued on
//! the configuration's pending queues and drained after every document.

pub mod assistant;
pub mod config_builder;
pub mod deferred;
pub mod mapper_builder;
pub mod resources;
pub mod statement_builder;
pub mod xml;

pub use assistant::{MapperBuilderAssistant, StatementAttributes};
pub use config_builder::XmlConfigBuilder;
pub use deferred::{CacheRefResolver, ResultMapResolver, StatementResolver};
pub use mapper_builder::XmlMapperBuilder;
pub use resources::Resources;
pub use xml::parse_document;
