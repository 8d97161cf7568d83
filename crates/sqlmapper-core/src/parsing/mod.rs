//! Document model and property substitution shared by the builders.

pub mod node;
pub mod props;

pub use node::{Element, XNode, XmlChild};
pub use props::{parse_placeholders, Properties};
