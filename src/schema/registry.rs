//! Schema registry
//!
//! Owns every global element, named type and named group, plus the memoized
//! [`EntitySchema`] per element identity. A registry is filled once (GML 2
//! built-ins, then application schemas) and shared read-only afterwards;
//! only the entity schema cache mutates.

use crate::binding::Binding;
use crate::entity::EntitySchema;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::resolve::TypeResolver;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::elements::{ElementDecl, TypeRef};
use super::gml;
use super::nodes::{ElementParticle, NodeKind, SchemaNode};
use super::particles::Occurs;
use super::types::{Derivation, TypeDecl, ValueKind};

/// Maximum length of a supertype chain before it is treated as cyclic
pub const MAX_DERIVATION_DEPTH: usize = 64;

/// Registry of schema components
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    elements: IndexMap<QName, Arc<ElementDecl>>,
    types: IndexMap<QName, Arc<TypeDecl>>,
    groups: IndexMap<QName, Arc<SchemaNode>>,
    target_namespaces: Vec<String>,
    entity_schemas: RwLock<HashMap<QName, Arc<EntitySchema>>>,
}

impl SchemaRegistry {
    /// Registry holding the XSD simple types and the GML 2 model
    pub fn new() -> Self {
        let mut registry = Self::empty();
        gml::register_builtins(&mut registry);
        registry
    }

    /// Registry without any components
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a global element
    pub fn add_element(&mut self, decl: ElementDecl) -> Arc<ElementDecl> {
        let decl = Arc::new(decl);
        self.elements.insert(decl.name.clone(), Arc::clone(&decl));
        decl
    }

    /// Register a named type
    pub fn add_type(&mut self, ty: TypeDecl) -> Result<Arc<TypeDecl>> {
        let name = ty
            .name
            .clone()
            .ok_or_else(|| Error::Schema("Cannot register an anonymous type".to_string()))?;
        let ty = Arc::new(ty);
        self.types.insert(name, Arc::clone(&ty));
        Ok(ty)
    }

    /// Register a named model group
    pub fn add_group(&mut self, name: QName, node: SchemaNode) {
        self.groups.insert(name, Arc::new(node));
    }

    /// Record a loaded target namespace
    pub fn add_target_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        if !self.target_namespaces.contains(&namespace) {
            self.target_namespaces.push(namespace);
        }
    }

    /// Target namespaces of the loaded application schemas
    pub fn target_namespaces(&self) -> &[String] {
        &self.target_namespaces
    }

    /// Look up a global element
    pub fn element(&self, name: &QName) -> Option<&Arc<ElementDecl>> {
        self.elements.get(name)
    }

    /// Look up a global element by `{namespace}local` or bare local name
    pub fn element_by_name(&self, name: &str) -> Option<&Arc<ElementDecl>> {
        if let Some(rest) = name.strip_prefix('{') {
            let (namespace, local) = rest.split_once('}')?;
            return self.elements.get(&QName::namespaced(namespace, local));
        }
        self.elements.values().find(|e| e.local_name() == name)
    }

    /// Look up a named type
    pub fn type_decl(&self, name: &QName) -> Option<&Arc<TypeDecl>> {
        self.types.get(name)
    }

    /// Look up a named group
    pub fn group(&self, name: &QName) -> Option<&Arc<SchemaNode>> {
        self.groups.get(name)
    }

    /// Iterate over global elements in registration order
    pub fn elements(&self) -> impl Iterator<Item = &Arc<ElementDecl>> {
        self.elements.values()
    }

    /// Iterate over named types in registration order
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDecl>> {
        self.types.values()
    }

    /// Type of an element declaration
    pub fn type_of(&self, decl: &ElementDecl) -> Option<Arc<TypeDecl>> {
        match &decl.type_ref {
            TypeRef::Named(name) => {
                let ty = self.types.get(name).cloned();
                if ty.is_none() {
                    log::debug!("Element {} refers to unknown type {}", decl.name, name);
                }
                ty
            }
            TypeRef::Inline(ty) => Some(Arc::clone(ty)),
        }
    }

    /// Direct supertype of a type
    pub fn base_of(&self, ty: &TypeDecl) -> Option<Arc<TypeDecl>> {
        ty.base.as_ref().and_then(|b| self.types.get(&b.name).cloned())
    }

    /// Walk the supertype chain (starting with `ty` itself) until `f` yields a value
    fn walk_chain<T>(&self, ty: &TypeDecl, mut f: impl FnMut(&TypeDecl) -> Option<T>) -> Option<T> {
        if let Some(found) = f(ty) {
            return Some(found);
        }
        let mut current = self.base_of(ty);
        for _ in 0..MAX_DERIVATION_DEPTH {
            let next = match current {
                Some(t) => t,
                None => return None,
            };
            if let Some(found) = f(next.as_ref()) {
                return Some(found);
            }
            current = self.base_of(&next);
        }
        log::warn!("Derivation chain of {} is too deep", ty.display_name());
        None
    }

    /// Whether `ty` is, or derives from, the named type
    pub fn derives_from(&self, ty: &TypeDecl, ancestor: &QName) -> bool {
        self.walk_chain(ty, |t| (t.name.as_ref() == Some(ancestor)).then_some(()))
            .is_some()
    }

    /// First concrete binding along the supertype chain
    pub fn concrete_binding(&self, ty: &TypeDecl) -> Option<Binding> {
        self.walk_chain(ty, |t| t.binding)
    }

    /// How values of this type are built; complex content by default
    pub fn value_kind(&self, ty: &TypeDecl) -> ValueKind {
        self.walk_chain(ty, |t| t.kind).unwrap_or(ValueKind::Complex)
    }

    /// Whether an element substitutes (directly or transitively) for `head`
    pub fn substitutes_for(&self, decl: &ElementDecl, head: &QName) -> bool {
        let mut current = decl.substitution_group.clone();
        for _ in 0..MAX_DERIVATION_DEPTH {
            match current {
                Some(ref name) if name == head => return true,
                Some(ref name) => {
                    current = self
                        .elements
                        .get(name)
                        .and_then(|e| e.substitution_group.clone())
                }
                None => return false,
            }
        }
        false
    }

    /// Content of a type including inherited content.
    ///
    /// Extensions see the base content followed by their own; restrictions
    /// see only their own content.
    pub fn effective_content(&self, ty: &TypeDecl) -> Option<SchemaNode> {
        self.effective_content_at(ty, 0)
    }

    fn effective_content_at(&self, ty: &TypeDecl, depth: usize) -> Option<SchemaNode> {
        let own = ty.content.clone();
        let base = match &ty.base {
            Some(base) if base.derivation == Derivation::Extension => base,
            _ => return own,
        };
        if depth >= MAX_DERIVATION_DEPTH {
            log::warn!("Derivation chain of {} is too deep", ty.display_name());
            return own;
        }
        let inherited = self
            .types
            .get(&base.name)
            .and_then(|b| self.effective_content_at(b, depth + 1));

        match (inherited, own) {
            (Some(inherited), Some(own)) => {
                Some(SchemaNode::sequence().with_child(inherited).with_child(own))
            }
            (inherited, own) => inherited.or(own),
        }
    }

    /// Resolve an element particle to its declaration
    pub fn particle_decl(&self, particle: &ElementParticle) -> Option<Arc<ElementDecl>> {
        match particle {
            ElementParticle::Local(decl) => Some(Arc::clone(decl)),
            ElementParticle::Ref(name) => {
                let decl = self.elements.get(name).cloned();
                if decl.is_none() {
                    log::debug!("Unresolved element reference {}", name);
                }
                decl
            }
        }
    }

    /// Find a named child element inside a grouping node, following group
    /// and element references. First match by local name wins.
    pub fn find_child_element(
        &self,
        node: &SchemaNode,
        local_name: &str,
    ) -> Option<(Arc<ElementDecl>, Occurs)> {
        self.find_child_at(node, local_name, 0)
    }

    fn find_child_at(
        &self,
        node: &SchemaNode,
        local_name: &str,
        depth: usize,
    ) -> Option<(Arc<ElementDecl>, Occurs)> {
        if depth > MAX_DERIVATION_DEPTH {
            return None;
        }
        match &node.kind {
            NodeKind::Element(particle) => {
                if particle.name().local_name == local_name {
                    self.particle_decl(particle).map(|d| (d, node.occurs))
                } else {
                    None
                }
            }
            NodeKind::Group(Some(name)) => self
                .groups
                .get(name)
                .and_then(|g| self.find_child_at(g, local_name, depth + 1)),
            _ => node
                .children
                .iter()
                .find_map(|c| self.find_child_at(c, local_name, depth + 1)),
        }
    }

    /// Find a child element declared anywhere in a type's effective content
    pub fn find_element_in_type(
        &self,
        ty: &TypeDecl,
        local_name: &str,
    ) -> Option<(Arc<ElementDecl>, Occurs)> {
        let content = self.effective_content(ty)?;
        self.find_child_element(&content, local_name)
    }

    /// Memoized entity schema of an element
    pub fn entity_schema(&self, decl: &ElementDecl) -> Arc<EntitySchema> {
        if let Some(schema) = self.entity_schemas.read().get(&decl.name) {
            return Arc::clone(schema);
        }

        let schema = Arc::new(TypeResolver::new(self).entity_schema(decl));
        log::debug!(
            "Inferred schema for {} with {} fields",
            decl.name,
            schema.fields().len()
        );
        self.entity_schemas
            .write()
            .insert(decl.name.clone(), Arc::clone(&schema));
        schema
    }

    /// Number of memoized entity schemas
    pub fn cached_schemas(&self) -> usize {
        self.entity_schemas.read().len()
    }
}
