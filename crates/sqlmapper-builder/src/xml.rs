//! quick-xml event stream to owned element tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use sqlmapper_core::error::{Error, Result};
use sqlmapper_core::parsing::Element;

/// Parse an XML document into its root element.
///
/// DOCTYPE declarations, comments, and processing instructions are skipped;
/// CDATA sections are preserved as text.
pub fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(element_from(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| {
                    Error::builder("Malformed XML: unexpected closing tag")
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| Error::builder(format!("Malformed XML text: {}", e)))?;
                if let Some(parent) = stack.last_mut() {
                    if !text.is_empty() {
                        parent.push_text(text.into_owned());
                    }
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(String::from_utf8_lossy(&cdata.into_inner()).into_owned());
                }
            }
            Ok(Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::builder(format!("Malformed XML: {}", e))),
        }
    }
    if !stack.is_empty() {
        return Err(Error::builder("Malformed XML: unclosed element"));
    }
    root.ok_or_else(|| Error::builder("The document has no root element"))
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| Error::builder(format!("Malformed XML attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::builder(format!("Malformed XML attribute value: {}", e)))?
            .into_owned();
        element.set_attribute(key, value);
    }
    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_element(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::builder(
            "Malformed XML: more than one root element",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_attributes_and_text() {
        let document = parse_document(
            r#"<?xml version="1.0"?>
            <!DOCTYPE mapper PUBLIC "-//test//DTD Mapper 3.0//EN" "mapper.dtd">
            <mapper namespace="app.UserMapper">
                <!-- a comment -->
                <select id="findById" resultType="user">
                    SELECT * FROM users WHERE id = #{id}
                </select>
                <sql id="columns"><![CDATA[id, name < 3]]></sql>
            </mapper>"#,
        )
        .unwrap();
        assert_eq!(document.name(), "mapper");
        assert_eq!(document.attribute("namespace"), Some("app.UserMapper"));
        let select = document.first_child("select").unwrap();
        assert_eq!(select.attribute("id"), Some("findById"));
        assert!(select.deep_text().contains("WHERE id = #{id}"));
        let sql = document.first_child("sql").unwrap();
        assert!(sql.deep_text().contains("name < 3"));
    }

    #[test]
    fn empty_elements_are_attached() {
        let document =
            parse_document(r#"<mapper namespace="n"><cache readOnly="true"/></mapper>"#).unwrap();
        assert_eq!(
            document.first_child("cache").unwrap().attribute("readOnly"),
            Some("true")
        );
    }

    #[test]
    fn malformed_documents_error() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("").is_err());
    }
}
