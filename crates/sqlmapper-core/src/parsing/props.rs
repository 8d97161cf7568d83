//! Property bags and `${…}` placeholder substitution.

use std::collections::BTreeMap;

/// Ordered string key/value pairs used for document variables, data-source
/// settings, and cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Merge `other` into `self`, overriding existing keys.
    pub fn put_all(&mut self, other: &Properties) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries whose key begins with `prefix.`, with the prefix stripped.
    pub fn sub_properties(&self, prefix: &str) -> Properties {
        let dotted = format!("{}.", prefix);
        let mut sub = Properties::new();
        for (key, value) in &self.entries {
            if let Some(stripped) = key.strip_prefix(&dotted) {
                sub.set(stripped, value.clone());
            }
        }
        sub
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Replace `${key}` placeholders with values from `variables`.
///
/// Unknown keys are left as-is so a later pass (or the database) can see the
/// original token.
pub fn parse_placeholders(text: &str, variables: &Properties) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match variables.get(key) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push_str("${");
                        output.push_str(key);
                        output.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str("${");
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_and_unknown_keys() {
        let vars = Properties::new().with("user", "root").with("db", "app");
        assert_eq!(
            parse_placeholders("jdbc://${db}?user=${user}", &vars),
            "jdbc://app?user=root"
        );
        assert_eq!(parse_placeholders("${missing}", &vars), "${missing}");
        assert_eq!(parse_placeholders("no placeholders", &vars), "no placeholders");
    }

    #[test]
    fn sub_properties_strip_prefix() {
        let props = Properties::new()
            .with("driver.encoding", "UTF-8")
            .with("driver.timeout", "5")
            .with("url", "jdbc:x");
        let driver = props.sub_properties("driver");
        assert_eq!(driver.get("encoding"), Some("UTF-8"));
        assert_eq!(driver.get("timeout"), Some("5"));
        assert_eq!(driver.len(), 2);
    }
}
