//! XML namespace handling
//!
//! This module provides qualified names (QNames), prefix mappings and the
//! scoped resolution used while walking a document.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// GML 2 namespace
pub const GML_NAMESPACE: &str = "http://www.opengis.net/gml";

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XSI namespace (xsi:nil, xsi:schemaLocation)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XLink namespace
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName in the GML namespace
    pub fn gml(local_name: impl Into<String>) -> Self {
        Self::namespaced(GML_NAMESPACE, local_name)
    }

    /// Create a QName in the XSD namespace
    pub fn xsd(local_name: impl Into<String>) -> Self {
        Self::namespaced(XSD_NAMESPACE, local_name)
    }

    /// Namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Check whether this name lives in the given namespace
    pub fn is_in(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        // xmlns="" undeclares the default namespace
        self.default_namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace)
        };
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Iterate over declared prefixes
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }

    /// Whether this context declares nothing
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Schema(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

/// Stack of namespace contexts, one per open element
#[derive(Debug, Clone, Default)]
pub struct NamespaceScopes {
    scopes: Vec<NamespaceContext>,
}

impl NamespaceScopes {
    /// Create an empty scope stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an element scope with its own declarations
    pub fn push(&mut self, context: NamespaceContext) {
        self.scopes.push(context);
    }

    /// Leave the innermost element scope
    pub fn pop(&mut self) -> Option<NamespaceContext> {
        self.scopes.pop()
    }

    /// Resolve a prefix, innermost declaration first
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.scopes.iter().rev().find_map(|ctx| ctx.get_namespace(prefix))
    }

    /// Resolve the default namespace in effect
    pub fn default_namespace(&self) -> Option<&str> {
        for ctx in self.scopes.iter().rev() {
            if ctx.default_namespace.is_some() {
                return ctx.get_default_namespace();
            }
        }
        None
    }

    /// Collapse every declaration in scope into one context
    pub fn flatten(&self) -> NamespaceContext {
        let mut flat = NamespaceContext::new();
        for ctx in &self.scopes {
            for (prefix, namespace) in ctx.iter() {
                flat.add_prefix(prefix, namespace);
            }
            if let Some(default) = ctx.get_default_namespace() {
                flat.set_default_namespace(default);
            }
        }
        flat
    }

    /// Resolve an element name. Unprefixed element names take the default namespace.
    pub fn resolve_element(&self, raw: &str) -> Result<QName> {
        match raw.split_once(':') {
            Some(("xml", local)) => Ok(QName::namespaced(
                "http://www.w3.org/XML/1998/namespace",
                local,
            )),
            Some((prefix, local)) => {
                let namespace = self
                    .lookup(prefix)
                    .ok_or_else(|| Error::Xml(format!("Unknown prefix: {}", prefix)))?;
                Ok(QName::namespaced(namespace, local))
            }
            None => Ok(QName::new(self.default_namespace(), raw)),
        }
    }

    /// Resolve an attribute name. Unprefixed attributes have no namespace.
    pub fn resolve_attribute(&self, raw: &str) -> Result<QName> {
        if raw.contains(':') {
            self.resolve_element(raw)
        } else {
            Ok(QName::local(raw))
        }
    }
}
