//! XML document trees
//!
//! A small in-memory tree built from the event driver. Schema documents are
//! read this way; instance documents are decoded in streaming fashion by
//! [`crate::decoder`] instead.

use crate::error::{Error, Result};
use crate::events::{self, Attributes, ContentHandler};
use crate::namespaces::{NamespaceContext, NamespaceScopes, QName};
use std::io::BufRead;

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes
    pub attributes: Attributes,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace declarations in scope at this element
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: Attributes::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an unqualified attribute value by name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.namespace.is_none() && qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Resolve a QName-valued attribute (e.g. `type="gml:PointPropertyType"`)
    pub fn resolve_attribute_qname(&self, name: &str) -> Result<Option<QName>> {
        match self.get_attribute(name) {
            Some(value) => self.namespaces.resolve(value.trim()).map(Some),
            None => Ok(None),
        }
    }

    /// Iterate over child elements with the given local name
    pub fn children_named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |e| e.local_name() == local_name)
    }

    /// First child element with the given local name
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.local_name() == local_name)
    }
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from a reader
    pub fn parse<R: BufRead>(source: R) -> Result<Self> {
        let mut builder = TreeBuilder::default();
        events::parse(source, &mut builder)?;
        if builder.root.is_none() {
            return Err(Error::Xml("Empty document".to_string()));
        }
        Ok(Document { root: builder.root })
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    root: Option<Element>,
}

impl ContentHandler for TreeBuilder {
    fn start_element(
        &mut self,
        name: &QName,
        attributes: &Attributes,
        scopes: &NamespaceScopes,
    ) -> Result<()> {
        let mut element = Element::new(name.clone());
        element.attributes = attributes.clone();
        element.namespaces = scopes.flatten();
        self.stack.push(element);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if let Some(current) = self.stack.last_mut() {
            match current.text.as_mut() {
                Some(existing) => existing.push_str(text),
                None if !text.trim().is_empty() => current.text = Some(text.to_string()),
                None => {}
            }
        }
        Ok(())
    }

    fn end_element(&mut self, _name: &QName) -> Result<()> {
        if let Some(current) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.children.push(current),
                None => self.root = Some(current),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<root><child>text</child></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "child");
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_parse_with_attributes() {
        let xml = r#"<root attr1="value1" attr2="value2"><child/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.get_attribute("attr1"), Some("value1"));
        assert_eq!(root.get_attribute("attr2"), Some("value2"));
    }

    #[test]
    fn test_resolve_qname_attribute() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                                xmlns:gml="http://www.opengis.net/gml">
            <xs:element name="the_geom" type="gml:PointPropertyType"/>
        </xs:schema>"#;
        let doc = Document::from_string(xml).unwrap();

        let element = doc.root().unwrap().find_child("element").unwrap();
        let type_name = element.resolve_attribute_qname("type").unwrap().unwrap();
        assert_eq!(type_name, QName::gml("PointPropertyType"));
        assert_eq!(element.resolve_attribute_qname("ref").unwrap(), None);
    }

    #[test]
    fn test_find_children() {
        let xml = r#"<root><child1/><child2/><child1/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.children_named("child1").count(), 2);
    }

    #[test]
    fn test_empty_document_fails() {
        assert!(Document::from_string("").is_err());
    }
}
