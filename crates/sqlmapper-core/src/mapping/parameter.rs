//! Parameter maps and their mappings.

use crate::types::JdbcType;

/// Direction of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParameterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterMode::In => "IN",
            ParameterMode::Out => "OUT",
            ParameterMode::InOut => "INOUT",
        }
    }
}

/// One bound parameter of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapping {
    pub property: String,
    pub mode: ParameterMode,
    /// Host type of the property; defaults to `object`.
    pub java_type: String,
    pub jdbc_type: Option<JdbcType>,
    pub numeric_scale: Option<u32>,
    pub type_handler: Option<String>,
    /// For CURSOR parameters: the result map interpreting the cursor rows.
    pub result_map_id: Option<String>,
}

impl ParameterMapping {
    pub fn new(property: impl Into<String>, java_type: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mode: ParameterMode::In,
            java_type: java_type.into(),
            jdbc_type: None,
            numeric_scale: None,
            type_handler: None,
            result_map_id: None,
        }
    }

    pub fn mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn jdbc_type(mut self, jdbc_type: Option<JdbcType>) -> Self {
        self.jdbc_type = jdbc_type;
        self
    }

    pub fn numeric_scale(mut self, numeric_scale: Option<u32>) -> Self {
        self.numeric_scale = numeric_scale;
        self
    }

    pub fn type_handler(mut self, type_handler: Option<String>) -> Self {
        self.type_handler = type_handler;
        self
    }

    pub fn result_map_id(mut self, result_map_id: Option<String>) -> Self {
        self.result_map_id = result_map_id;
        self
    }
}

/// A named, ordered set of parameter mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMap {
    pub id: String,
    pub type_name: String,
    pub parameter_mappings: Vec<ParameterMapping>,
}

impl ParameterMap {
    pub fn new(
        id: impl Into<String>,
        type_name: impl Into<String>,
        parameter_mappings: Vec<ParameterMapping>,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            parameter_mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_defaults() {
        let mapping = ParameterMapping::new("id", "long");
        assert_eq!(mapping.mode, ParameterMode::In);
        assert_eq!(mapping.java_type, "long");
        assert!(mapping.jdbc_type.is_none());
    }

    #[test]
    fn builder_chainers() {
        let mapping = ParameterMapping::new("total", "decimal")
            .mode(ParameterMode::Out)
            .jdbc_type(Some(JdbcType::DECIMAL))
            .numeric_scale(Some(2));
        assert_eq!(mapping.mode.as_str(), "OUT");
        assert_eq!(mapping.numeric_scale, Some(2));
    }
}
