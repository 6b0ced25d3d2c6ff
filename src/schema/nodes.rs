//! Grouping nodes of the schema model
//!
//! A [`SchemaNode`] is one node of the declarative content tree of a type:
//! - `Sequence` - ordered content
//! - `Choice` - one of several alternatives
//! - `All` - unordered content, resolved like a sequence
//! - `Group` - an inline wrapper or a reference to a named group
//! - `Element` - an element particle (always a leaf)

use crate::namespaces::QName;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::elements::ElementDecl;
use super::particles::Occurs;

/// Model group compositor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ModelType {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl ModelType {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Element particle: a local declaration or a reference to a global one
#[derive(Debug, Clone)]
pub enum ElementParticle {
    /// Locally declared element
    Local(Arc<ElementDecl>),
    /// `ref="..."` to a global element held by the registry
    Ref(QName),
}

impl ElementParticle {
    /// Name the particle matches in instance documents
    pub fn name(&self) -> &QName {
        match self {
            Self::Local(decl) => &decl.name,
            Self::Ref(name) => name,
        }
    }
}

/// Kind of a grouping node
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Ordered content
    Sequence,
    /// Alternatives
    Choice,
    /// Unordered content
    All,
    /// Inline wrapper (`None`, single child) or named group reference
    Group(Option<QName>),
    /// Element leaf
    Element(ElementParticle),
}

/// One node of the content tree
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Node kind
    pub kind: NodeKind,
    /// Occurrence constraints
    pub occurs: Occurs,
    /// Child nodes (always empty for element leaves)
    pub children: Vec<SchemaNode>,
}

impl SchemaNode {
    /// Create a model group node
    pub fn model(model: ModelType) -> Self {
        let kind = match model {
            ModelType::Sequence => NodeKind::Sequence,
            ModelType::Choice => NodeKind::Choice,
            ModelType::All => NodeKind::All,
        };
        Self {
            kind,
            occurs: Occurs::once(),
            children: Vec::new(),
        }
    }

    /// Create a sequence node
    pub fn sequence() -> Self {
        Self::model(ModelType::Sequence)
    }

    /// Create a choice node
    pub fn choice() -> Self {
        Self::model(ModelType::Choice)
    }

    /// Create a reference to a named group
    pub fn group_ref(name: QName, occurs: Occurs) -> Self {
        Self {
            kind: NodeKind::Group(Some(name)),
            occurs,
            children: Vec::new(),
        }
    }

    /// Wrap a node in an inline group
    pub fn group(inner: SchemaNode) -> Self {
        Self {
            kind: NodeKind::Group(None),
            occurs: Occurs::once(),
            children: vec![inner],
        }
    }

    /// Create a leaf for a local element declaration
    pub fn element(decl: ElementDecl, occurs: Occurs) -> Self {
        Self {
            kind: NodeKind::Element(ElementParticle::Local(Arc::new(decl))),
            occurs,
            children: Vec::new(),
        }
    }

    /// Create a leaf referencing a global element
    pub fn element_ref(name: QName, occurs: Occurs) -> Self {
        Self {
            kind: NodeKind::Element(ElementParticle::Ref(name)),
            occurs,
            children: Vec::new(),
        }
    }

    /// Set the occurrence constraints
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Add a child node. Element leaves never take children.
    pub fn push(&mut self, child: SchemaNode) {
        if !self.is_element() {
            self.children.push(child);
        }
    }

    /// Builder form of [`SchemaNode::push`]
    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.push(child);
        self
    }

    /// Model type of a compositor node
    pub fn model_type(&self) -> Option<ModelType> {
        match self.kind {
            NodeKind::Sequence => Some(ModelType::Sequence),
            NodeKind::Choice => Some(ModelType::Choice),
            NodeKind::All => Some(ModelType::All),
            _ => None,
        }
    }

    /// Whether this is an element leaf
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }

    /// The element particle of a leaf
    pub fn as_element(&self) -> Option<&ElementParticle> {
        match &self.kind {
            NodeKind::Element(particle) => Some(particle),
            _ => None,
        }
    }

    /// Find a named child element inside this grouping node.
    ///
    /// Depth-first, first match by local name wins. Named group references
    /// are not followed here; see `SchemaRegistry::find_child_element`.
    pub fn find_child_element(&self, local_name: &str) -> Option<(&ElementParticle, Occurs)> {
        match &self.kind {
            NodeKind::Element(particle) if particle.name().local_name == local_name => {
                Some((particle, self.occurs))
            }
            NodeKind::Element(_) => None,
            _ => self
                .children
                .iter()
                .find_map(|child| child.find_child_element(local_name)),
        }
    }

    /// All element leaves under this node, in document order
    pub fn element_particles(&self) -> Vec<&ElementParticle> {
        let mut out = Vec::new();
        self.collect_particles(&mut out);
        out
    }

    fn collect_particles<'a>(&'a self, out: &mut Vec<&'a ElementParticle>) {
        match &self.kind {
            NodeKind::Element(particle) => out.push(particle),
            _ => self.children.iter().for_each(|c| c.collect_particles(out)),
        }
    }
}
