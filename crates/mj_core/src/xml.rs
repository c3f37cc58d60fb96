//! Minimal XML element tree built on `quick-xml`.
//!
//! Model documents, `models.xml` and `palette.xml` are all small, so they are
//! read whole into an `XmlElement` tree. Text content is ignored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(String),
    #[error("document has no root element")]
    Empty,
}

/// An element with its attributes and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// This element and all its descendants, depth first.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let element = out[i];
            out.extend(element.children.iter());
            i += 1;
        }
        out
    }
}

/// Parse a document and return its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(element_from(e)?),
            Ok(Event::Empty(ref e)) => {
                let element = element_from(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Syntax("unexpected closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Ok(Event::Eof) => {
                return Err(if stack.is_empty() {
                    XmlError::Empty
                } else {
                    XmlError::Syntax("unexpected end of document".to_string())
                });
            }
            Err(e) => {
                return Err(XmlError::Syntax(format!(
                    "at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
    }
}

fn element_from(e: &BytesStart) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| XmlError::Syntax(format!("invalid UTF-8 in element name: {}", err)))?
        .to_string();

    let mut attrs = HashMap::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| XmlError::Syntax(format!("attribute error: {}", err)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| XmlError::Syntax(format!("invalid UTF-8 in attribute key: {}", err)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Syntax(format!("attribute '{}': {}", key, err)))?
            .into_owned();
        attrs.insert(key, value);
    }

    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <!-- comment -->
            <sequence values="BW">
              <one in="B" out="W" steps="3"/>
              <markov><all in="W" out="B"/></markov>
            </sequence>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "sequence");
        assert_eq!(doc.attr("values"), Some("BW"));
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.children[0].attr("steps"), Some("3"));
        assert_eq!(doc.children[1].children[0].name, "all");
        assert_eq!(doc.descendants().len(), 4);
    }

    #[test]
    fn test_parse_self_closing_root() {
        let doc = parse_document(r#"<one values="BW" in="B" out="W"/>"#).unwrap();
        assert_eq!(doc.name, "one");
        assert!(doc.children.is_empty());
    }

    #[test]
    fn test_unescapes_attribute_values() {
        let doc = parse_document(r#"<rule in="a&amp;b"/>"#).unwrap();
        assert_eq!(doc.attr("in"), Some("a&b"));
    }

    #[test]
    fn test_empty_and_broken_documents() {
        assert_eq!(parse_document("   "), Err(XmlError::Empty));
        assert!(matches!(
            parse_document("<models><model name=\"a\"/>"),
            Err(XmlError::Syntax(_))
        ));
    }
}
