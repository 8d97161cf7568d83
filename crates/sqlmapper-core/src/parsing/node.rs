//! Owned XML element tree and the variable-substituting node view.
//!
//! The tree is parser-agnostic: the builder crate produces it from a
//! quick-xml event stream, and pending resolvers keep owned clones of the
//! subtrees they may need to retry.

use crate::error::{Error, Result};
use crate::parsing::props::{parse_placeholders, Properties};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Element(Element),
    Text(String),
}

/// One XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlChild>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(XmlChild::Element(child));
    }

    pub fn with_element(mut self, child: Element) -> Self {
        self.push_element(child);
        self
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlChild::Text(text.into()));
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn children(&self) -> &[XmlChild] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            XmlChild::Element(element) => Some(element),
            XmlChild::Text(_) => None,
        })
    }

    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |child| child.name == name)
    }

    /// Direct and nested text content, in document order.
    pub fn deep_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(text) => out.push_str(text),
                XmlChild::Element(element) => element.collect_text(out),
            }
        }
    }
}

/// A view over an [`Element`] that applies `${…}` substitution from the
/// document variables on every attribute and text access.
#[derive(Debug, Clone, Copy)]
pub struct XNode<'a> {
    element: &'a Element,
    variables: &'a Properties,
}

impl<'a> XNode<'a> {
    pub fn new(element: &'a Element, variables: &'a Properties) -> Self {
        Self { element, variables }
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn string_attribute(&self, name: &str) -> Option<String> {
        self.element
            .attribute(name)
            .map(|value| parse_placeholders(value, self.variables))
    }

    pub fn string_attribute_or(&self, name: &str, default: &str) -> String {
        self.string_attribute(name)
            .unwrap_or_else(|| default.to_string())
    }

    /// A required attribute; missing is a builder error.
    pub fn required_attribute(&self, name: &str) -> Result<String> {
        self.string_attribute(name).ok_or_else(|| {
            Error::builder(format!(
                "The <{}> element requires a '{}' attribute",
                self.name(),
                name
            ))
        })
    }

    pub fn bool_attribute(&self, name: &str, default: bool) -> Result<bool> {
        match self.string_attribute(name) {
            None => Ok(default),
            Some(raw) => match raw.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(Error::builder(format!(
                    "Attribute '{}' on <{}> must be 'true' or 'false', found '{}'",
                    name,
                    self.name(),
                    other
                ))),
            },
        }
    }

    pub fn int_attribute(&self, name: &str) -> Result<Option<i64>> {
        match self.string_attribute(name) {
            None => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                Error::builder(format!(
                    "Attribute '{}' on <{}> must be an integer, found '{}'",
                    name,
                    self.name(),
                    raw
                ))
            }),
        }
    }

    pub fn children(&self) -> Vec<XNode<'a>> {
        self.element
            .child_elements()
            .map(|child| XNode::new(child, self.variables))
            .collect()
    }

    pub fn first_child(&self, name: &str) -> Option<XNode<'a>> {
        self.element
            .first_child(name)
            .map(|child| XNode::new(child, self.variables))
    }

    pub fn children_named(&self, name: &'a str) -> Vec<XNode<'a>> {
        self.element
            .children_named(name)
            .map(|child| XNode::new(child, self.variables))
            .collect()
    }

    /// Nested `<property name value>` children as a property bag.
    pub fn children_as_properties(&self) -> Result<Properties> {
        let mut props = Properties::new();
        for child in self.element.children_named("property") {
            let node = XNode::new(child, self.variables);
            let name = node.required_attribute("name")?;
            let value = node.required_attribute("value")?;
            props.set(name, value);
        }
        Ok(props)
    }

    /// All nested text with substitution applied.
    pub fn string_body(&self) -> String {
        parse_placeholders(&self.element.deep_text(), self.variables)
    }
}
