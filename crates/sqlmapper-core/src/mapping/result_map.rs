//! Result maps, their mappings, and discriminators.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::JdbcType;

/// Marker flags on a result mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFlag {
    Id,
    Constructor,
}

/// One column-to-property mapping inside a result map.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMapping {
    pub property: Option<String>,
    pub column: Option<String>,
    pub java_type: String,
    pub jdbc_type: Option<JdbcType>,
    pub type_handler: Option<String>,
    /// Fully qualified id of a statement executed to load this property.
    pub nested_select_id: Option<String>,
    /// Fully qualified id of the result map applied to nested columns.
    pub nested_result_map_id: Option<String>,
    pub not_null_columns: BTreeSet<String>,
    pub column_prefix: Option<String>,
    pub flags: Vec<ResultFlag>,
    /// Multi-column key components for composite nested selects.
    pub composites: Vec<ResultMapping>,
    pub result_set: Option<String>,
    pub foreign_column: Option<String>,
    pub lazy: bool,
}

impl ResultMapping {
    pub fn new(property: Option<String>, column: Option<String>, java_type: impl Into<String>) -> Self {
        Self {
            property,
            column,
            java_type: java_type.into(),
            jdbc_type: None,
            type_handler: None,
            nested_select_id: None,
            nested_result_map_id: None,
            not_null_columns: BTreeSet::new(),
            column_prefix: None,
            flags: Vec::new(),
            composites: Vec::new(),
            result_set: None,
            foreign_column: None,
            lazy: false,
        }
    }

    pub fn jdbc_type(mut self, jdbc_type: Option<JdbcType>) -> Self {
        self.jdbc_type = jdbc_type;
        self
    }

    pub fn type_handler(mut self, type_handler: Option<String>) -> Self {
        self.type_handler = type_handler;
        self
    }

    pub fn nested_select_id(mut self, id: Option<String>) -> Self {
        self.nested_select_id = id;
        self
    }

    pub fn nested_result_map_id(mut self, id: Option<String>) -> Self {
        self.nested_result_map_id = id;
        self
    }

    pub fn not_null_columns(mut self, columns: BTreeSet<String>) -> Self {
        self.not_null_columns = columns;
        self
    }

    pub fn column_prefix(mut self, prefix: Option<String>) -> Self {
        self.column_prefix = prefix;
        self
    }

    pub fn flags(mut self, flags: Vec<ResultFlag>) -> Self {
        self.flags = flags;
        self
    }

    pub fn composites(mut self, composites: Vec<ResultMapping>) -> Self {
        self.composites = composites;
        self
    }

    pub fn result_set(mut self, result_set: Option<String>) -> Self {
        self.result_set = result_set;
        self
    }

    pub fn foreign_column(mut self, foreign_column: Option<String>) -> Self {
        self.foreign_column = foreign_column;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn has_flag(&self, flag: ResultFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Redeclaration identity: two mappings collide when they name the same
    /// property.
    pub fn same_property(&self, other: &ResultMapping) -> bool {
        match (&self.property, &other.property) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// A column-value dispatch selecting among alternative result maps.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub result_mapping: ResultMapping,
    /// column value → fully qualified result map id
    pub discriminator_map: BTreeMap<String, String>,
}

impl Discriminator {
    pub fn new(result_mapping: ResultMapping, discriminator_map: BTreeMap<String, String>) -> Self {
        Self {
            result_mapping,
            discriminator_map,
        }
    }

    pub fn map_id_for(&self, value: &str) -> Option<&str> {
        self.discriminator_map.get(value).map(String::as_str)
    }
}

/// A declarative mapping from result columns to a host type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMap {
    pub id: String,
    pub type_name: String,
    pub result_mappings: Vec<ResultMapping>,
    pub id_result_mappings: Vec<ResultMapping>,
    pub constructor_result_mappings: Vec<ResultMapping>,
    pub property_result_mappings: Vec<ResultMapping>,
    pub mapped_columns: BTreeSet<String>,
    pub mapped_properties: BTreeSet<String>,
    pub discriminator: Option<Discriminator>,
    pub has_nested_result_maps: bool,
    pub has_nested_queries: bool,
    pub auto_mapping: Option<bool>,
}

impl ResultMap {
    pub fn builder(
        id: impl Into<String>,
        type_name: impl Into<String>,
        result_mappings: Vec<ResultMapping>,
    ) -> ResultMapBuilder {
        ResultMapBuilder {
            id: id.into(),
            type_name: type_name.into(),
            result_mappings,
            discriminator: None,
            auto_mapping: None,
        }
    }
}

/// Computes the derived views (id/constructor/property partitions, mapped
/// column and property sets, nesting flags) at seal time.
pub struct ResultMapBuilder {
    id: String,
    type_name: String,
    result_mappings: Vec<ResultMapping>,
    discriminator: Option<Discriminator>,
    auto_mapping: Option<bool>,
}

impl ResultMapBuilder {
    pub fn discriminator(mut self, discriminator: Option<Discriminator>) -> Self {
        self.discriminator = discriminator;
        self
    }

    pub fn auto_mapping(mut self, auto_mapping: Option<bool>) -> Self {
        self.auto_mapping = auto_mapping;
        self
    }

    pub fn build(self) -> ResultMap {
        let mut mapped_columns = BTreeSet::new();
        let mut mapped_properties = BTreeSet::new();
        let mut id_result_mappings = Vec::new();
        let mut constructor_result_mappings = Vec::new();
        let mut property_result_mappings = Vec::new();
        let mut has_nested_result_maps = false;
        let mut has_nested_queries = false;

        for mapping in &self.result_mappings {
            has_nested_queries |= mapping.nested_select_id.is_some();
            has_nested_result_maps |=
                mapping.nested_result_map_id.is_some() && mapping.result_set.is_none();
            if let Some(column) = &mapping.column {
                mapped_columns.insert(column.to_uppercase());
            }
            for composite in &mapping.composites {
                if let Some(column) = &composite.column {
                    mapped_columns.insert(column.to_uppercase());
                }
            }
            if let Some(property) = &mapping.property {
                mapped_properties.insert(property.clone());
            }
            if mapping.has_flag(ResultFlag::Constructor) {
                constructor_result_mappings.push(mapping.clone());
            } else {
                property_result_mappings.push(mapping.clone());
            }
            if mapping.has_flag(ResultFlag::Id) {
                id_result_mappings.push(mapping.clone());
            }
        }
        if id_result_mappings.is_empty() {
            id_result_mappings = self.result_mappings.clone();
        }

        ResultMap {
            id: self.id,
            type_name: self.type_name,
            result_mappings: self.result_mappings,
            id_result_mappings,
            constructor_result_mappings,
            property_result_mappings,
            mapped_columns,
            mapped_properties,
            discriminator: self.discriminator,
            has_nested_result_maps,
            has_nested_queries,
            auto_mapping: self.auto_mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(property: &str, column: &str) -> ResultMapping {
        ResultMapping::new(
            Some(property.to_string()),
            Some(column.to_string()),
            "object",
        )
    }

    #[test]
    fn builder_partitions_mappings() {
        let mappings = vec![
            mapping("id", "pk").flags(vec![ResultFlag::Id]),
            mapping("name", "name"),
            mapping("x", "x").flags(vec![ResultFlag::Constructor]),
        ];
        let result_map = ResultMap::builder("ns.map", "app.User", mappings).build();
        assert_eq!(result_map.id_result_mappings.len(), 1);
        assert_eq!(result_map.constructor_result_mappings.len(), 1);
        assert_eq!(result_map.property_result_mappings.len(), 2);
        assert!(result_map.mapped_columns.contains("PK"));
        assert!(result_map.mapped_properties.contains("name"));
        assert!(!result_map.has_nested_result_maps);
    }

    #[test]
    fn no_id_mappings_means_all_are_id_mappings() {
        let result_map =
            ResultMap::builder("ns.map", "app.User", vec![mapping("a", "a"), mapping("b", "b")])
                .build();
        assert_eq!(result_map.id_result_mappings.len(), 2);
    }

    #[test]
    fn nested_flags() {
        let nested = mapping("author", "author_id")
            .nested_result_map_id(Some("ns.author".to_string()));
        let result_map = ResultMap::builder("ns.map", "app.Post", vec![nested]).build();
        assert!(result_map.has_nested_result_maps);
        assert!(!result_map.has_nested_queries);

        let selecting =
            mapping("author", "author_id").nested_select_id(Some("ns.findAuthor".to_string()));
        let result_map = ResultMap::builder("ns.map", "app.Post", vec![selecting]).build();
        assert!(result_map.has_nested_queries);
    }

    #[test]
    fn discriminator_dispatch() {
        let discriminator = Discriminator::new(
            ResultMapping::new(None, Some("kind".to_string()), "string"),
            BTreeMap::from([
                ("1".to_string(), "ns.admin".to_string()),
                ("2".to_string(), "ns.guest".to_string()),
            ]),
        );
        assert_eq!(discriminator.map_id_for("1"), Some("ns.admin"));
        assert_eq!(discriminator.map_id_for("9"), None);
    }
}
