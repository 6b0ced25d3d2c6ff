//! Type resolution
//!
//! Infers the ordered field list of an element from its type's content
//! tree. Resolution is total: unresolvable references, empty content and
//! recursive types degrade to the generic [`Binding::Object`].
//!
//! - Sequence / All: children in order, concatenated
//! - Group: transparent
//! - Element: one field, typed by the first concrete binding of its type
//!   chain or by resolving the type's own content
//! - Choice: one field when the alternatives yield one, otherwise a single
//!   [`ChoiceBinding`] field named after the first alternative

use crate::binding::{common_binding, common_of, Binding};
use crate::entity::{ChoiceBinding, EntitySchema, FieldDescriptor};
use crate::namespaces::QName;
use crate::schema::gml;
use crate::schema::{ElementDecl, NodeKind, SchemaNode, SchemaRegistry, TypeDecl, MAX_DERIVATION_DEPTH};
use crate::value::Value;

/// Type or named group on the resolution path
#[derive(Debug, PartialEq)]
enum PathEntry {
    Group(QName),
    Named(QName),
    // Anonymous types are only reachable through their one shared `Arc`
    Anonymous(usize),
}

impl PathEntry {
    fn of(ty: &TypeDecl) -> Self {
        match &ty.name {
            Some(name) => PathEntry::Named(name.clone()),
            None => PathEntry::Anonymous(ty as *const TypeDecl as usize),
        }
    }
}

/// Resolver over one registry; tracks the types being resolved to break cycles
pub struct TypeResolver<'a> {
    registry: &'a SchemaRegistry,
    in_progress: Vec<PathEntry>,
}

impl<'a> TypeResolver<'a> {
    /// Create a resolver
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            in_progress: Vec::new(),
        }
    }

    /// Infer the entity schema of an element
    pub fn entity_schema(&mut self, decl: &ElementDecl) -> EntitySchema {
        let fields = match self.registry.type_of(decl) {
            Some(ty) => self.resolve_type(&ty),
            None => Vec::new(),
        };
        EntitySchema::new(decl.name.clone(), fields)
    }

    /// Fields of a type's effective content
    pub fn resolve_type(&mut self, ty: &TypeDecl) -> Vec<FieldDescriptor> {
        let key = PathEntry::of(ty);
        if self.in_progress.contains(&key) || self.in_progress.len() >= MAX_DERIVATION_DEPTH {
            log::debug!("Recursive type {} resolved as {}", ty.display_name(), Binding::Object);
            return Vec::new();
        }

        self.in_progress.push(key);
        let fields = self
            .registry
            .effective_content(ty)
            .map(|content| self.resolve_node(&content, false))
            .unwrap_or_default();
        self.in_progress.pop();
        fields
    }

    /// Fields of one grouping node; `optional` is set when an enclosing
    /// node may be absent
    pub fn resolve_node(&mut self, node: &SchemaNode, optional: bool) -> Vec<FieldDescriptor> {
        let optional = optional || node.occurs.is_emptiable();
        match &node.kind {
            NodeKind::Sequence | NodeKind::All | NodeKind::Group(None) => node
                .children
                .iter()
                .flat_map(|child| self.resolve_node(child, optional))
                .collect(),
            NodeKind::Group(Some(name)) => {
                let entry = PathEntry::Group(name.clone());
                if self.in_progress.contains(&entry) {
                    log::debug!("Recursive group reference {}", name);
                    return Vec::new();
                }
                let Some(group) = self.registry.group(name) else {
                    log::debug!("Unresolved group reference {}", name);
                    return Vec::new();
                };
                self.in_progress.push(entry);
                let fields = self.resolve_node(group, optional);
                self.in_progress.pop();
                fields
            }
            NodeKind::Element(particle) => {
                let Some(decl) = self.registry.particle_decl(particle) else {
                    return Vec::new();
                };
                if gml::is_bookkeeping(&decl.name) {
                    return Vec::new();
                }
                vec![self.resolve_element(&decl, optional)]
            }
            NodeKind::Choice => self.resolve_choice(node, optional),
        }
    }

    fn resolve_choice(&mut self, node: &SchemaNode, optional: bool) -> Vec<FieldDescriptor> {
        let mut fields: Vec<FieldDescriptor> = node
            .children
            .iter()
            .flat_map(|child| self.resolve_node(child, optional))
            .collect();

        if fields.len() <= 1 {
            return fields;
        }

        let nillable = optional || fields.iter().any(|f| f.nillable);
        let alternatives = fields
            .iter()
            .map(|f| (f.name.clone(), f.binding))
            .collect();
        let choice = ChoiceBinding::new(alternatives);
        log::trace!(
            "Choice of {} alternatives resolved to {}",
            fields.len(),
            choice.binding()
        );

        let first = fields.swap_remove(0);
        vec![FieldDescriptor::choice(first.name, choice).with_nillable(nillable)]
    }

    /// Field for one element declaration
    pub fn resolve_element(&mut self, decl: &ElementDecl, optional: bool) -> FieldDescriptor {
        let binding = self.binding_of(decl);
        let default = decl
            .default
            .as_deref()
            .and_then(|text| match Value::parse_simple(text, binding) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Ignoring default of {}: {}", decl.name, e);
                    None
                }
            })
            .or_else(|| default_for(binding));

        FieldDescriptor::new(decl.local_name(), binding)
            .with_nillable(decl.nillable || optional)
            .with_default(default)
    }

    /// Binding of an element: concrete binding of its type chain, else
    /// the hoisted or merged binding of the type's content
    pub fn binding_of(&mut self, decl: &ElementDecl) -> Binding {
        let Some(ty) = self.registry.type_of(decl) else {
            return Binding::Object;
        };
        if let Some(binding) = self.registry.concrete_binding(&ty) {
            return binding;
        }

        let fields = self.resolve_type(&ty);
        match fields.as_slice() {
            [] => Binding::Object,
            [single] => single.binding,
            // Several fields decode into a nested entity, so the merge includes it
            many => common_binding(
                common_of(many.iter().map(|f| f.binding)).unwrap_or(Binding::Object),
                Binding::Entity,
            ),
        }
    }
}

/// Value of a required simple field left absent
pub fn default_for(binding: Binding) -> Option<Value> {
    match binding {
        Binding::String => Some(Value::String(String::new())),
        Binding::Integer => Some(Value::Integer(0)),
        Binding::Double => Some(Value::Double(0.0)),
        Binding::Decimal => Some(Value::Decimal(rust_decimal::Decimal::ZERO)),
        Binding::Boolean => Some(Value::Boolean(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Derivation, Occurs};
    use pretty_assertions::assert_eq;

    fn local(name: &str, type_name: QName, occurs: Occurs) -> SchemaNode {
        SchemaNode::element(ElementDecl::typed(QName::local(name), type_name), occurs)
    }

    fn feature_type(registry: &mut SchemaRegistry, name: &str, content: SchemaNode) {
        registry
            .add_type(
                TypeDecl::new(Some(QName::local(name)))
                    .with_base(QName::gml("AbstractFeatureType"), Derivation::Extension)
                    .with_content(content),
            )
            .unwrap();
    }

    fn schema_of(registry: &SchemaRegistry, type_name: &str) -> EntitySchema {
        let decl = ElementDecl::typed(QName::local("Feature"), QName::local(type_name));
        TypeResolver::new(registry).entity_schema(&decl)
    }

    fn bindings(schema: &EntitySchema) -> Vec<(String, Binding, bool)> {
        schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.binding, f.nillable))
            .collect()
    }

    #[test]
    fn test_sequence_fields_in_order() {
        let mut registry = SchemaRegistry::new();
        feature_type(
            &mut registry,
            "RoadType",
            SchemaNode::sequence()
                .with_child(local("label", QName::xsd("string"), Occurs::once()))
                .with_child(local("lanes", QName::xsd("int"), Occurs::optional()))
                .with_child(SchemaNode::element_ref(
                    QName::gml("centerLineOf"),
                    Occurs::once(),
                )),
        );

        let schema = schema_of(&registry, "RoadType");
        assert_eq!(
            bindings(&schema),
            vec![
                ("label".to_string(), Binding::String, false),
                ("lanes".to_string(), Binding::Integer, true),
                ("centerLineOf".to_string(), Binding::LineString, false),
            ]
        );
        assert_eq!(schema.default_geometry().unwrap().name, "centerLineOf");
    }

    #[test]
    fn test_bookkeeping_elements_excluded() {
        let mut registry = SchemaRegistry::new();
        feature_type(&mut registry, "EmptyType", SchemaNode::sequence());
        assert!(schema_of(&registry, "EmptyType").is_empty());
    }

    #[test]
    fn test_choice_polygon_multipolygon() {
        let mut registry = SchemaRegistry::new();
        feature_type(
            &mut registry,
            "LakeType",
            SchemaNode::choice()
                .with_child(SchemaNode::element_ref(QName::gml("polygonProperty"), Occurs::once()))
                .with_child(SchemaNode::element_ref(
                    QName::gml("multiPolygonProperty"),
                    Occurs::once(),
                )),
        );

        let schema = schema_of(&registry, "LakeType");
        assert_eq!(schema.len(), 1);
        let field = &schema.fields()[0];
        assert_eq!(field.name, "polygonProperty");
        assert_eq!(field.binding, Binding::MultiPolygon);
        assert!(!field.nillable);
        assert!(field.matches_name("multiPolygonProperty"));
    }

    #[test]
    fn test_choice_point_linestring_is_generic_geometry() {
        let mut registry = SchemaRegistry::new();
        feature_type(
            &mut registry,
            "MarkerType",
            SchemaNode::choice()
                .with_occurs(Occurs::optional())
                .with_child(SchemaNode::element_ref(QName::gml("pointProperty"), Occurs::once()))
                .with_child(SchemaNode::element_ref(
                    QName::gml("lineStringProperty"),
                    Occurs::once(),
                )),
        );

        let schema = schema_of(&registry, "MarkerType");
        let field = &schema.fields()[0];
        assert_eq!(field.binding, Binding::Geometry);
        assert!(field.nillable);
    }

    #[test]
    fn test_single_alternative_choice_unchanged() {
        let mut registry = SchemaRegistry::new();
        feature_type(
            &mut registry,
            "OneType",
            SchemaNode::choice().with_child(local("code", QName::xsd("integer"), Occurs::once())),
        );
        let schema = schema_of(&registry, "OneType");
        assert_eq!(schema.fields()[0].choice, None);
        assert_eq!(schema.fields()[0].binding, Binding::Integer);
    }

    #[test]
    fn test_named_group_is_transparent() {
        let mut registry = SchemaRegistry::new();
        registry.add_group(
            QName::local("Names"),
            SchemaNode::sequence()
                .with_child(local("first", QName::xsd("string"), Occurs::once()))
                .with_child(local("last", QName::xsd("string"), Occurs::once())),
        );
        feature_type(
            &mut registry,
            "PersonType",
            SchemaNode::sequence()
                .with_child(SchemaNode::group_ref(QName::local("Names"), Occurs::optional())),
        );

        let schema = schema_of(&registry, "PersonType");
        assert_eq!(
            bindings(&schema),
            vec![
                ("first".to_string(), Binding::String, true),
                ("last".to_string(), Binding::String, true),
            ]
        );
    }

    #[test]
    fn test_hoisted_and_merged_bindings() {
        let mut registry = SchemaRegistry::new();
        registry
            .add_type(
                TypeDecl::new(Some(QName::local("WrapperType"))).with_content(
                    SchemaNode::sequence()
                        .with_child(local("inner", QName::xsd("double"), Occurs::once())),
                ),
            )
            .unwrap();
        registry
            .add_type(
                TypeDecl::new(Some(QName::local("AddressType"))).with_content(
                    SchemaNode::sequence()
                        .with_child(local("street", QName::xsd("string"), Occurs::once()))
                        .with_child(local("city", QName::xsd("string"), Occurs::once())),
                ),
            )
            .unwrap();
        registry
            .add_type(TypeDecl::new(Some(QName::local("NothingType"))))
            .unwrap();
        feature_type(
            &mut registry,
            "HouseType",
            SchemaNode::sequence()
                .with_child(local("height", QName::local("WrapperType"), Occurs::once()))
                .with_child(local("address", QName::local("AddressType"), Occurs::once()))
                .with_child(local("extra", QName::local("NothingType"), Occurs::once()))
                .with_child(local("lost", QName::local("UndefinedType"), Occurs::once())),
        );

        let schema = schema_of(&registry, "HouseType");
        let found: Vec<Binding> = schema.fields().iter().map(|f| f.binding).collect();
        assert_eq!(
            found,
            vec![Binding::Double, Binding::Object, Binding::Object, Binding::Object]
        );
    }

    #[test]
    fn test_recursive_type_falls_back_to_object() {
        let mut registry = SchemaRegistry::new();
        registry
            .add_type(
                TypeDecl::new(Some(QName::local("NodeType"))).with_content(
                    SchemaNode::sequence()
                        .with_child(local("child", QName::local("NodeType"), Occurs::optional())),
                ),
            )
            .unwrap();
        let decl = ElementDecl::typed(QName::local("node"), QName::local("NodeType"));
        let schema = TypeResolver::new(&registry).entity_schema(&decl);
        assert_eq!(schema.fields()[0].binding, Binding::Object);
    }

    #[test]
    fn test_recursive_anonymous_type_falls_back_to_object() {
        let registry = SchemaRegistry::from_xsd_str(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:app="http://example.com/app"
           targetNamespace="http://example.com/app"
           elementFormDefault="qualified">
  <xs:element name="part">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="label" type="xs:string"/>
        <xs:element ref="app:part" minOccurs="0"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();

        let part = registry
            .element(&QName::namespaced("http://example.com/app", "part"))
            .unwrap();
        let schema = registry.entity_schema(part);
        assert_eq!(
            bindings(&schema),
            vec![
                ("label".to_string(), Binding::String, false),
                ("part".to_string(), Binding::Object, true),
            ]
        );
    }

    #[test]
    fn test_recursive_group_reference_terminates() {
        let mut registry = SchemaRegistry::new();
        registry.add_group(
            QName::local("Loop"),
            SchemaNode::sequence()
                .with_child(local("step", QName::xsd("int"), Occurs::once()))
                .with_child(SchemaNode::group_ref(QName::local("Loop"), Occurs::optional())),
        );
        feature_type(
            &mut registry,
            "LoopType",
            SchemaNode::sequence().with_child(SchemaNode::group_ref(QName::local("Loop"), Occurs::once())),
        );

        let schema = schema_of(&registry, "LoopType");
        assert_eq!(bindings(&schema), vec![("step".to_string(), Binding::Integer, false)]);
    }

    #[test]
    fn test_defaults_and_nillable() {
        let mut registry = SchemaRegistry::new();
        feature_type(
            &mut registry,
            "GaugeType",
            SchemaNode::sequence()
                .with_child(SchemaNode::element(
                    ElementDecl::typed(QName::local("level"), QName::xsd("int")).with_default("7"),
                    Occurs::once(),
                ))
                .with_child(SchemaNode::element(
                    ElementDecl::typed(QName::local("note"), QName::xsd("string")).with_nillable(true),
                    Occurs::once(),
                ))
                .with_child(local("flag", QName::xsd("boolean"), Occurs::once())),
        );

        let schema = schema_of(&registry, "GaugeType");
        assert_eq!(schema.fields()[0].default_value, Some(Value::Integer(7)));
        assert!(schema.fields()[1].nillable);
        assert_eq!(schema.fields()[2].default_value, Some(Value::Boolean(false)));
    }

    #[test]
    fn test_inference_is_deterministic() {
        let mut registry = SchemaRegistry::new();
        feature_type(
            &mut registry,
            "RoadType",
            SchemaNode::sequence()
                .with_child(local("label", QName::xsd("string"), Occurs::once()))
                .with_child(SchemaNode::element_ref(QName::gml("location"), Occurs::once())),
        );
        assert_eq!(schema_of(&registry, "RoadType"), schema_of(&registry, "RoadType"));
    }
}
