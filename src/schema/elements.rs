//! Element declarations
//!
//! An element declaration names an element, points at its type and carries
//! the flags type resolution needs. The substitution group head and named
//! types are held as QNames and looked up through the registry.

use crate::namespaces::QName;
use std::sync::Arc;

use super::types::TypeDecl;

/// Element form (qualified or unqualified)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementForm {
    /// Element name must be namespace-qualified
    Qualified,
    /// Element name is unqualified
    #[default]
    Unqualified,
}

impl ElementForm {
    /// Parse from string attribute value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }
}

/// Reference from an element to its type
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// Named type, looked up in the registry
    Named(QName),
    /// Anonymous type declared inside the element
    Inline(Arc<TypeDecl>),
}

impl TypeRef {
    /// Name of the referenced type, if it is a named one
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Inline(ty) => ty.name.as_ref(),
        }
    }
}

/// Element declaration
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Element name
    pub name: QName,
    /// Element type
    pub type_ref: TypeRef,
    /// Whether this element is abstract
    pub is_abstract: bool,
    /// Whether this element is nillable
    pub nillable: bool,
    /// Substitution group head element name
    pub substitution_group: Option<QName>,
    /// Default value (for simple content)
    pub default: Option<String>,
}

impl ElementDecl {
    /// Create a new element declaration
    pub fn new(name: QName, type_ref: TypeRef) -> Self {
        Self {
            name,
            type_ref,
            is_abstract: false,
            nillable: false,
            substitution_group: None,
            default: None,
        }
    }

    /// Declaration with a named type
    pub fn typed(name: QName, type_name: QName) -> Self {
        Self::new(name, TypeRef::Named(type_name))
    }

    /// Mark as abstract
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Mark as nillable
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    /// Set the substitution group head
    pub fn with_substitution_group(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Set the default value
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Local name of the element
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }
}
