//! Type declarations
//!
//! A [`TypeDecl`] covers both simple and complex types. Besides the content
//! tree and attributes it records how instances are turned into values
//! ([`ValueKind`]) and, for types that map directly onto a runtime value,
//! the concrete [`Binding`]. Both are inherited along the supertype chain
//! when unset.

use crate::binding::Binding;
use crate::geometry::GeometryKind;
use crate::namespaces::QName;
use serde::Serialize;
use std::fmt;

use super::nodes::SchemaNode;

/// Derivation method (extension or restriction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Derivation {
    /// Derivation by extension: base content followed by own content
    Extension,
    /// Derivation by restriction: own content replaces the base content
    Restriction,
}

impl Derivation {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "extension" => Some(Self::Extension),
            "restriction" => Some(Self::Restriction),
            _ => None,
        }
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extension => write!(f, "extension"),
            Self::Restriction => write!(f, "restriction"),
        }
    }
}

/// Supertype reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseType {
    /// Name of the base type
    pub name: QName,
    /// How this type derives from it
    pub derivation: Derivation,
}

/// How the decoder builds a value from an element of a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Text content parsed with the given binding
    Simple(Binding),
    /// `gml:coordinates` text
    Coordinates,
    /// `gml:coord` with X, Y and optional Z children
    Coord,
    /// Geometry built from child values
    Geometry(GeometryKind),
    /// `gml:Box`, an envelope
    Box,
    /// Wrapper whose value is that of its single child
    Property,
    /// Feature, assembled into an entity
    Feature,
    /// Feature collection
    FeatureCollection,
    /// Any other complex content, assembled like a feature
    Complex,
}

/// Attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Attribute name
    pub name: QName,
    /// Attribute type name
    pub type_name: Option<QName>,
    /// Whether `use="required"`
    pub required: bool,
    /// Default value
    pub default: Option<String>,
}

impl AttributeDecl {
    /// Create an optional attribute
    pub fn new(name: QName, type_name: Option<QName>) -> Self {
        Self {
            name,
            type_name,
            required: false,
            default: None,
        }
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Simple or complex type declaration
#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Declared attributes
    pub attributes: Vec<AttributeDecl>,
    /// Content tree (None for simple types and empty content)
    pub content: Option<SchemaNode>,
    /// Whether the type is abstract
    pub is_abstract: bool,
    /// Supertype, looked up through the registry
    pub base: Option<BaseType>,
    /// Concrete runtime binding, when the type maps directly onto one
    pub binding: Option<Binding>,
    /// Value construction, inherited from the base when unset
    pub kind: Option<ValueKind>,
}

impl TypeDecl {
    /// Create an empty complex type
    pub fn new(name: Option<QName>) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            content: None,
            is_abstract: false,
            base: None,
            binding: None,
            kind: None,
        }
    }

    /// Create a named simple type with the given binding
    pub fn simple(name: QName, binding: Binding) -> Self {
        Self::new(Some(name))
            .with_binding(binding)
            .with_kind(ValueKind::Simple(binding))
    }

    /// Set the content tree
    pub fn with_content(mut self, content: SchemaNode) -> Self {
        self.content = Some(content);
        self
    }

    /// Set the supertype
    pub fn with_base(mut self, name: QName, derivation: Derivation) -> Self {
        self.base = Some(BaseType { name, derivation });
        self
    }

    /// Set the concrete binding
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Set the value kind
    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Mark as abstract
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Add an attribute declaration
    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Display name, `(anonymous)` for inline types
    pub fn display_name(&self) -> String {
        self.name
            .as_ref()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(anonymous)".to_string())
    }
}
