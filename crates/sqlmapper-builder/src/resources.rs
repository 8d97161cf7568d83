//! Resource loading with a search-root chain and registered in-memory
//! documents.

use std::collections::HashMap;
use std::path::PathBuf;

use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::parsing::Properties;

/// Loads referenced documents by name.
///
/// Names resolve against registered in-memory resources first, then against
/// each filesystem root in order.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    roots: Vec<PathBuf>,
    virtual_resources: HashMap<String, String>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    /// Register an in-memory document.
    pub fn register(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.virtual_resources.insert(name.into(), content.into());
    }

    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.register(name, content);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        if self.virtual_resources.contains_key(name) {
            return true;
        }
        self.roots.iter().any(|root| root.join(name).is_file())
    }

    pub fn load(&self, name: &str) -> Result<String> {
        if let Some(content) = self.virtual_resources.get(name) {
            return Ok(content.clone());
        }
        for root in &self.roots {
            let path = root.join(name);
            if path.is_file() {
                return std::fs::read_to_string(&path).map_err(Error::from);
            }
        }
        Err(Error::builder(format!(
            "Could not find resource '{}'",
            name
        )))
    }

    /// Load and parse a `key=value` properties document.
    pub fn load_properties(&self, name: &str) -> Result<Properties> {
        parse_properties(&self.load(name)?)
    }
}

/// Parse simple `key=value` lines; `#` and `!` start comments.
pub fn parse_properties(text: &str) -> Result<Properties> {
    let mut properties = Properties::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::builder(format!("Malformed properties line '{}'", line))
        })?;
        properties.set(key.trim(), value.trim());
    }
    Ok(properties)
}
