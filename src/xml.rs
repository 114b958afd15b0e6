//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Namespace-preserving XML element tree.
//!
//! The reader attaches `xmlns`/`xmlns:*` declarations to the element that
//! introduced them, so a later tree walk can reproduce the document with
//! declarations at their original scope. Element names are resolved against
//! the declarations in scope while the declarations themselves are kept
//! verbatim.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// One parsed XML element.
#[derive(Clone, Debug, Default)]
pub struct XmlElement {
    /// Tag name as written, including a prefix if one was used.
    pub tag: String,
    /// Local part of the tag name.
    pub local: String,
    /// Resolved namespace URI, if any is in scope.
    pub namespace: Option<String>,
    /// Namespace declarations made on this element, in document order;
    /// an empty prefix is the default namespace.
    pub ns_decls: Vec<(String, String)>,
    /// Ordinary (non-xmlns) attributes.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated trimmed character data.
    pub text: String,
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::RawType {
        path: "/".to_string(),
        expected: format!("well-formed XML ({})", e),
    }
}

impl XmlElement {
    /// Parse an XML document and return its root element.
    pub fn parse(text: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(text);
        let mut scope: Vec<HashMap<String, String>> = vec![HashMap::new()];
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    let elem = begin_element(&start, &mut scope)?;
                    stack.push(elem);
                }
                Event::Empty(start) => {
                    let elem = begin_element(&start, &mut scope)?;
                    scope.pop();
                    attach(&mut stack, &mut root, elem)?;
                }
                Event::End(_) => {
                    scope.pop();
                    let elem = stack.pop().ok_or_else(|| xml_error("unbalanced end tag"))?;
                    attach(&mut stack, &mut root, elem)?;
                }
                Event::Text(t) => {
                    // inter-element whitespace is not character data
                    let text = t.unescape().map_err(xml_error)?;
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if let Some(elem) = stack.last_mut() {
                            elem.text.push_str(trimmed);
                        }
                    }
                }
                Event::CData(t) => {
                    if let Some(elem) = stack.last_mut() {
                        elem.text
                            .push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        root.ok_or_else(|| xml_error("no root element"))
    }

    /// Serialize the element tree, reproducing namespace declarations at
    /// the elements that carry them.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (prefix, uri) in &self.ns_decls {
            if prefix.is_empty() {
                out.push_str(&format!(" xmlns=\"{}\"", escape_attr(uri)));
            } else {
                out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape_attr(uri)));
            }
        }
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape_text(&self.text));
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn attach(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    elem: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(elem);
            Ok(())
        }
        None => {
            if root.is_some() {
                return Err(xml_error("multiple root elements"));
            }
            *root = Some(elem);
            Ok(())
        }
    }
}

fn begin_element(
    start: &quick_xml::events::BytesStart<'_>,
    scope: &mut Vec<HashMap<String, String>>,
) -> Result<XmlElement> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut elem = XmlElement {
        tag: tag.clone(),
        ..Default::default()
    };
    let mut frame: HashMap<String, String> = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        if key == "xmlns" {
            frame.insert(String::new(), value.clone());
            elem.ns_decls.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            frame.insert(prefix.to_string(), value.clone());
            elem.ns_decls.push((prefix.to_string(), value));
        } else {
            elem.attributes.push((key, value));
        }
    }
    // the new scope is the enclosing one extended by this element's decls
    let mut merged = scope.last().cloned().unwrap_or_default();
    merged.extend(frame);
    let (prefix, local) = match tag.split_once(':') {
        Some((p, l)) => (p.to_string(), l.to_string()),
        None => (String::new(), tag),
    };
    elem.local = local;
    elem.namespace = merged.get(&prefix).cloned();
    scope.push(merged);
    Ok(elem)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_scopes() {
        let doc = r#"<a xmlns="urn:one"><b xmlns="urn:two">x</b><c>y</c></a>"#;
        let root = XmlElement::parse(doc).unwrap();
        assert_eq!(root.local, "a");
        assert_eq!(root.namespace.as_deref(), Some("urn:one"));
        assert_eq!(root.children[0].namespace.as_deref(), Some("urn:two"));
        assert_eq!(root.children[1].namespace.as_deref(), Some("urn:one"));
        assert_eq!(root.children[0].text, "x");
    }

    #[test]
    fn declarations_preserved_on_round_trip() {
        let doc = r#"<a xmlns="urn:one"><b xmlns:p="urn:two">p:v</b></a>"#;
        let root = XmlElement::parse(doc).unwrap();
        assert_eq!(root.to_xml_string(), doc);
    }

    #[test]
    fn prefixed_elements() {
        let doc = r#"<p:a xmlns:p="urn:one"><p:b>1</p:b></p:a>"#;
        let root = XmlElement::parse(doc).unwrap();
        assert_eq!(root.local, "a");
        assert_eq!(root.namespace.as_deref(), Some("urn:one"));
        assert_eq!(root.children[0].local, "b");
        assert_eq!(root.children[0].namespace.as_deref(), Some("urn:one"));
    }
}
