//! Application schema loading
//!
//! Reads an `xs:schema` document into a [`SchemaRegistry`] that already
//! holds the GML 2 model. Imports and includes are skipped since GML is
//! built in; components are referenced by QName and looked up lazily, so
//! declaration order inside the document does not matter.

use crate::binding::Binding;
use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::namespaces::{QName, XSD_NAMESPACE};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use super::elements::{ElementDecl, ElementForm, TypeRef};
use super::nodes::{ModelType, SchemaNode};
use super::particles::parse_occurs;
use super::registry::SchemaRegistry;
use super::types::{AttributeDecl, Derivation, TypeDecl, ValueKind};

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANNOTATION: &str = "annotation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const NOTATION: &str = "notation";
    pub const RESTRICTION: &str = "restriction";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ANY: &str = "any";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const ELEMENT_FORM_DEFAULT: &str = "elementFormDefault";
    pub const FORM: &str = "form";
    pub const NILLABLE: &str = "nillable";
    pub const DEFAULT: &str = "default";
    pub const FIXED: &str = "fixed";
    pub const BASE: &str = "base";
    pub const ABSTRACT: &str = "abstract";
    pub const SUBSTITUTION_GROUP: &str = "substitutionGroup";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const USE: &str = "use";
}

/// Loads application schema documents into a registry
pub struct SchemaLoader<'a> {
    registry: &'a mut SchemaRegistry,
    target_namespace: Option<String>,
    element_form_default: ElementForm,
}

impl<'a> SchemaLoader<'a> {
    /// Create a loader writing into `registry`
    pub fn new(registry: &'a mut SchemaRegistry) -> Self {
        Self {
            registry,
            target_namespace: None,
            element_form_default: ElementForm::default(),
        }
    }

    /// Load a schema from a string
    pub fn load_str(&mut self, xsd: &str) -> Result<()> {
        let doc = Document::from_string(xsd)?;
        self.load_document(&doc)
    }

    /// Load a schema file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("Loading schema {}", path.display());
        let doc = Document::parse(BufReader::new(file))?;
        self.load_document(&doc)
    }

    /// Load a parsed schema document
    pub fn load_document(&mut self, doc: &Document) -> Result<()> {
        let root = doc
            .root()
            .ok_or_else(|| Error::Schema("Schema document has no root element".to_string()))?;
        if root.local_name() != xsd_elements::SCHEMA || root.namespace() != Some(XSD_NAMESPACE) {
            return Err(Error::Schema(format!(
                "Expected xs:schema root element, found {}",
                root.qname
            )));
        }

        self.target_namespace = root
            .get_attribute(xsd_attrs::TARGET_NAMESPACE)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        self.element_form_default = root
            .get_attribute(xsd_attrs::ELEMENT_FORM_DEFAULT)
            .and_then(ElementForm::parse)
            .unwrap_or_default();

        for child in &root.children {
            self.parse_schema_child(child)?;
        }

        if let Some(namespace) = self.target_namespace.clone() {
            self.registry.add_target_namespace(namespace);
        }
        Ok(())
    }

    /// Parse a child element of xs:schema
    fn parse_schema_child(&mut self, elem: &Element) -> Result<()> {
        match elem.local_name() {
            xsd_elements::ELEMENT => {
                let decl = self.parse_element(elem, true)?;
                self.registry.add_element(decl);
            }
            xsd_elements::COMPLEX_TYPE => {
                let name = self.global_name(elem, "complexType")?;
                let ty = self.parse_complex_type(elem, Some(name))?;
                self.registry.add_type(ty)?;
            }
            xsd_elements::SIMPLE_TYPE => {
                let name = self.global_name(elem, "simpleType")?;
                let ty = self.parse_simple_type(elem, Some(name))?;
                self.registry.add_type(ty)?;
            }
            xsd_elements::GROUP => {
                let name = self.global_name(elem, "group")?;
                let content = elem
                    .children
                    .iter()
                    .find(|c| ModelType::from_tag(c.local_name()).is_some());
                let node = match content {
                    Some(model) => self.parse_particle(model)?,
                    None => None,
                };
                self.registry
                    .add_group(name, node.unwrap_or_else(SchemaNode::sequence));
            }
            xsd_elements::IMPORT | xsd_elements::INCLUDE | xsd_elements::REDEFINE => {
                log::debug!("Skipping xs:{} (GML is built in)", elem.local_name());
            }
            xsd_elements::ANNOTATION
            | xsd_elements::ATTRIBUTE
            | xsd_elements::ATTRIBUTE_GROUP
            | xsd_elements::NOTATION => {}
            other => log::warn!("Unknown schema child element: {}", other),
        }
        Ok(())
    }

    fn global_name(&self, elem: &Element, what: &str) -> Result<QName> {
        let name = elem.get_attribute(xsd_attrs::NAME).ok_or_else(|| {
            Error::Schema(format!("Global {} missing 'name' attribute", what))
        })?;
        Ok(QName::new(self.target_namespace.clone(), name))
    }

    fn resolve(&self, elem: &Element, attr: &str) -> Result<Option<QName>> {
        elem.resolve_attribute_qname(attr)
    }

    /// Parse an element declaration (global or local)
    fn parse_element(&self, elem: &Element, global: bool) -> Result<ElementDecl> {
        let name = elem
            .get_attribute(xsd_attrs::NAME)
            .ok_or_else(|| Error::Schema("Element declaration missing 'name' attribute".to_string()))?;

        let qualified = global
            || elem
                .get_attribute(xsd_attrs::FORM)
                .and_then(ElementForm::parse)
                .unwrap_or(self.element_form_default)
                == ElementForm::Qualified;
        let namespace = if qualified {
            self.target_namespace.clone()
        } else {
            None
        };
        let qname = QName::new(namespace, name);

        let type_ref = match self.resolve(elem, xsd_attrs::TYPE)? {
            Some(type_name) => TypeRef::Named(type_name),
            None => match self.parse_inline_type(elem)? {
                Some(ty) => TypeRef::Inline(Arc::new(ty)),
                None => TypeRef::Named(QName::xsd("anyType")),
            },
        };

        let mut decl = ElementDecl::new(qname, type_ref)
            .with_nillable(is_true(elem.get_attribute(xsd_attrs::NILLABLE)))
            .with_abstract(is_true(elem.get_attribute(xsd_attrs::ABSTRACT)));

        if let Some(default) = elem
            .get_attribute(xsd_attrs::DEFAULT)
            .or_else(|| elem.get_attribute(xsd_attrs::FIXED))
        {
            decl = decl.with_default(default);
        }
        if let Some(head) = self.resolve(elem, xsd_attrs::SUBSTITUTION_GROUP)? {
            decl = decl.with_substitution_group(head);
        }

        Ok(decl)
    }

    fn parse_inline_type(&self, elem: &Element) -> Result<Option<TypeDecl>> {
        for child in &elem.children {
            match child.local_name() {
                xsd_elements::COMPLEX_TYPE => return self.parse_complex_type(child, None).map(Some),
                xsd_elements::SIMPLE_TYPE => return self.parse_simple_type(child, None).map(Some),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Parse a complex type (named or anonymous)
    fn parse_complex_type(&self, elem: &Element, name: Option<QName>) -> Result<TypeDecl> {
        let mut ty = TypeDecl::new(name)
            .with_abstract(is_true(elem.get_attribute(xsd_attrs::ABSTRACT)));

        for child in &elem.children {
            match child.local_name() {
                xsd_elements::SEQUENCE
                | xsd_elements::CHOICE
                | xsd_elements::ALL
                | xsd_elements::GROUP => {
                    if let Some(node) = self.parse_particle(child)? {
                        ty = ty.with_content(node);
                    }
                }
                xsd_elements::ATTRIBUTE => {
                    if let Some(attribute) = self.parse_attribute(child)? {
                        ty = ty.with_attribute(attribute);
                    }
                }
                xsd_elements::COMPLEX_CONTENT | xsd_elements::SIMPLE_CONTENT => {
                    ty = self.parse_derivation(child, ty)?;
                }
                _ => {}
            }
        }

        Ok(ty)
    }

    /// Parse complexContent / simpleContent into base, content and attributes
    fn parse_derivation(&self, content: &Element, mut ty: TypeDecl) -> Result<TypeDecl> {
        for derivation_elem in &content.children {
            let Some(derivation) = Derivation::from_tag(derivation_elem.local_name()) else {
                continue;
            };
            let base = self.resolve(derivation_elem, xsd_attrs::BASE)?.ok_or_else(|| {
                Error::Schema(format!(
                    "xs:{} of {} missing 'base' attribute",
                    derivation,
                    ty.display_name()
                ))
            })?;
            ty = ty.with_base(base, derivation);

            for child in &derivation_elem.children {
                match child.local_name() {
                    xsd_elements::SEQUENCE
                    | xsd_elements::CHOICE
                    | xsd_elements::ALL
                    | xsd_elements::GROUP => {
                        if let Some(node) = self.parse_particle(child)? {
                            ty = ty.with_content(node);
                        }
                    }
                    xsd_elements::ATTRIBUTE => {
                        if let Some(attribute) = self.parse_attribute(child)? {
                            ty = ty.with_attribute(attribute);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(ty)
    }

    /// Parse a simple type; restrictions inherit the base binding, lists
    /// and unions are read as text
    fn parse_simple_type(&self, elem: &Element, name: Option<QName>) -> Result<TypeDecl> {
        let ty = TypeDecl::new(name);
        for child in &elem.children {
            match child.local_name() {
                xsd_elements::RESTRICTION => {
                    if let Some(base) = self.resolve(child, xsd_attrs::BASE)? {
                        return Ok(ty.with_base(base, Derivation::Restriction));
                    }
                    if let Some(inner) = child.find_child(xsd_elements::SIMPLE_TYPE) {
                        let inner = self.parse_simple_type(inner, None)?;
                        let binding = inner.binding.unwrap_or(Binding::String);
                        return Ok(ty
                            .with_binding(binding)
                            .with_kind(ValueKind::Simple(binding)));
                    }
                }
                xsd_elements::LIST | xsd_elements::UNION => {
                    return Ok(ty
                        .with_binding(Binding::String)
                        .with_kind(ValueKind::Simple(Binding::String)));
                }
                _ => {}
            }
        }
        Ok(ty
            .with_binding(Binding::String)
            .with_kind(ValueKind::Simple(Binding::String)))
    }

    /// Parse a particle: element, model group or group reference
    fn parse_particle(&self, elem: &Element) -> Result<Option<SchemaNode>> {
        let occurs = parse_occurs(
            elem.get_attribute(xsd_attrs::MIN_OCCURS),
            elem.get_attribute(xsd_attrs::MAX_OCCURS),
        )?;

        let node = match elem.local_name() {
            xsd_elements::ELEMENT => match self.resolve(elem, xsd_attrs::REF)? {
                Some(reference) => SchemaNode::element_ref(reference, occurs),
                None => SchemaNode::element(self.parse_element(elem, false)?, occurs),
            },
            xsd_elements::GROUP => {
                let reference = self.resolve(elem, xsd_attrs::REF)?.ok_or_else(|| {
                    Error::Schema("Local xs:group missing 'ref' attribute".to_string())
                })?;
                SchemaNode::group_ref(reference, occurs)
            }
            tag => match ModelType::from_tag(tag) {
                Some(model) => {
                    let mut node = SchemaNode::model(model).with_occurs(occurs);
                    for child in &elem.children {
                        if let Some(particle) = self.parse_particle(child)? {
                            node.push(particle);
                        }
                    }
                    node
                }
                None => {
                    if tag == xsd_elements::ANY {
                        log::debug!("Ignoring xs:any wildcard");
                    }
                    return Ok(None);
                }
            },
        };
        Ok(Some(node))
    }

    /// Parse an attribute declaration or reference
    fn parse_attribute(&self, elem: &Element) -> Result<Option<AttributeDecl>> {
        let name = match elem.get_attribute(xsd_attrs::NAME) {
            Some(name) => QName::local(name),
            None => match self.resolve(elem, xsd_attrs::REF)? {
                Some(reference) => reference,
                None => return Ok(None),
            },
        };
        let mut attribute = AttributeDecl::new(name, self.resolve(elem, xsd_attrs::TYPE)?);
        if elem.get_attribute(xsd_attrs::USE) == Some("required") {
            attribute = attribute.required();
        }
        attribute.default = elem.get_attribute(xsd_attrs::DEFAULT).map(str::to_string);
        Ok(Some(attribute))
    }
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true") | Some("1"))
}

impl SchemaRegistry {
    /// GML 2 registry extended with one application schema string
    pub fn from_xsd_str(xsd: &str) -> Result<Self> {
        let mut registry = Self::new();
        SchemaLoader::new(&mut registry).load_str(xsd)?;
        Ok(registry)
    }

    /// GML 2 registry extended with one application schema file
    pub fn from_xsd_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut registry = Self::new();
        SchemaLoader::new(&mut registry).load_file(path)?;
        Ok(registry)
    }
}
