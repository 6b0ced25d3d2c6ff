//! Built-in schema components
//!
//! The XSD simple types and the GML 2 feature and geometry model
//! (`feature.xsd` / `geometry.xsd`), registered into every
//! [`SchemaRegistry`] created with [`SchemaRegistry::new`].

use crate::binding::Binding;
use crate::geometry::GeometryKind;
use crate::namespaces::QName;

use super::elements::ElementDecl;
use super::nodes::SchemaNode;
use super::particles::Occurs;
use super::registry::SchemaRegistry;
use super::types::{AttributeDecl, Derivation, TypeDecl, ValueKind};

/// GML elements that carry bookkeeping rather than feature data
pub const BOOKKEEPING_ELEMENTS: [&str; 3] = ["description", "name", "boundedBy"];

/// Whether `name` is one of the GML bookkeeping elements
pub fn is_bookkeeping(name: &QName) -> bool {
    name.is_in(crate::namespaces::GML_NAMESPACE)
        && BOOKKEEPING_ELEMENTS.contains(&name.local_name.as_str())
}

const XSD_SIMPLE_TYPES: &[(&str, Binding)] = &[
    ("string", Binding::String),
    ("normalizedString", Binding::String),
    ("token", Binding::String),
    ("anyURI", Binding::String),
    ("ID", Binding::String),
    ("IDREF", Binding::String),
    ("Name", Binding::String),
    ("NCName", Binding::String),
    ("QName", Binding::String),
    ("language", Binding::String),
    ("time", Binding::String),
    ("duration", Binding::String),
    ("gYear", Binding::String),
    ("anySimpleType", Binding::String),
    ("boolean", Binding::Boolean),
    ("integer", Binding::Integer),
    ("int", Binding::Integer),
    ("long", Binding::Integer),
    ("short", Binding::Integer),
    ("byte", Binding::Integer),
    ("nonNegativeInteger", Binding::Integer),
    ("positiveInteger", Binding::Integer),
    ("nonPositiveInteger", Binding::Integer),
    ("negativeInteger", Binding::Integer),
    ("unsignedLong", Binding::Integer),
    ("unsignedInt", Binding::Integer),
    ("unsignedShort", Binding::Integer),
    ("unsignedByte", Binding::Integer),
    ("decimal", Binding::Decimal),
    ("double", Binding::Double),
    ("float", Binding::Double),
    ("date", Binding::Date),
    ("dateTime", Binding::DateTime),
    ("anyType", Binding::Object),
];

/// Property elements and the geometry element they wrap
const GEOMETRY_PROPERTIES: &[(&str, &str, &str)] = &[
    ("geometryProperty", "GeometryPropertyType", "_Geometry"),
    ("pointProperty", "PointPropertyType", "Point"),
    ("lineStringProperty", "LineStringPropertyType", "LineString"),
    ("polygonProperty", "PolygonPropertyType", "Polygon"),
    ("multiPointProperty", "MultiPointPropertyType", "MultiPoint"),
    ("multiLineStringProperty", "MultiLineStringPropertyType", "MultiLineString"),
    ("multiPolygonProperty", "MultiPolygonPropertyType", "MultiPolygon"),
    ("multiGeometryProperty", "MultiGeometryPropertyType", "MultiGeometry"),
];

/// Aliases of the property elements above, sharing their types
const PROPERTY_ALIASES: &[(&str, &str)] = &[
    ("location", "PointPropertyType"),
    ("centerOf", "PointPropertyType"),
    ("position", "PointPropertyType"),
    ("extentOf", "PolygonPropertyType"),
    ("coverage", "PolygonPropertyType"),
    ("edgeOf", "LineStringPropertyType"),
    ("centerLineOf", "LineStringPropertyType"),
    ("multiLocation", "MultiPointPropertyType"),
    ("multiCenterOf", "MultiPointPropertyType"),
    ("multiPosition", "MultiPointPropertyType"),
    ("multiCenterLineOf", "MultiLineStringPropertyType"),
    ("multiEdgeOf", "MultiLineStringPropertyType"),
    ("multiCoverage", "MultiPolygonPropertyType"),
    ("multiExtentOf", "MultiPolygonPropertyType"),
];

/// Concrete geometry elements: element, type, kind
const GEOMETRIES: &[(&str, &str, GeometryKind)] = &[
    ("Point", "PointType", GeometryKind::Point),
    ("LineString", "LineStringType", GeometryKind::LineString),
    ("LinearRing", "LinearRingType", GeometryKind::LinearRing),
    ("Polygon", "PolygonType", GeometryKind::Polygon),
    ("MultiPoint", "MultiPointType", GeometryKind::MultiPoint),
    ("MultiLineString", "MultiLineStringType", GeometryKind::MultiLineString),
    ("MultiPolygon", "MultiPolygonType", GeometryKind::MultiPolygon),
    ("MultiGeometry", "GeometryCollectionType", GeometryKind::GeometryCollection),
];

/// Member elements of aggregates: element, type, wrapped element
const MEMBERS: &[(&str, &str, &str)] = &[
    ("geometryMember", "GeometryAssociationType", "_Geometry"),
    ("pointMember", "PointMemberType", "Point"),
    ("lineStringMember", "LineStringMemberType", "LineString"),
    ("polygonMember", "PolygonMemberType", "Polygon"),
    ("outerBoundaryIs", "LinearRingMemberType", "LinearRing"),
    ("innerBoundaryIs", "LinearRingMemberType", "LinearRing"),
];

fn gml_ref(local: &str, occurs: Occurs) -> SchemaNode {
    SchemaNode::element_ref(QName::gml(local), occurs)
}

fn register(registry: &mut SchemaRegistry, ty: TypeDecl) {
    // Built-in types are always named.
    if let Err(e) = registry.add_type(ty) {
        log::error!("Failed to register built-in type: {}", e);
    }
}

/// Register the XSD simple types and the GML 2 model
pub fn register_builtins(registry: &mut SchemaRegistry) {
    register_xsd_types(registry);
    register_geometry_model(registry);
    register_feature_model(registry);
}

fn register_xsd_types(registry: &mut SchemaRegistry) {
    for (name, binding) in XSD_SIMPLE_TYPES {
        register(registry, TypeDecl::simple(QName::xsd(*name), *binding));
    }
}

fn register_geometry_model(registry: &mut SchemaRegistry) {
    let geometry_attributes = |ty: TypeDecl| {
        ty.with_attribute(AttributeDecl::new(QName::local("gid"), Some(QName::xsd("ID"))))
            .with_attribute(AttributeDecl::new(
                QName::local("srsName"),
                Some(QName::xsd("anyURI")),
            ))
    };

    // Coordinates
    register(
        registry,
        TypeDecl::new(Some(QName::gml("CoordinatesType")))
            .with_binding(Binding::Coordinates)
            .with_kind(ValueKind::Coordinates)
            .with_attribute(AttributeDecl::new(QName::local("decimal"), None))
            .with_attribute(AttributeDecl::new(QName::local("cs"), None))
            .with_attribute(AttributeDecl::new(QName::local("ts"), None)),
    );
    register(
        registry,
        TypeDecl::new(Some(QName::gml("CoordType")))
            .with_binding(Binding::Coordinates)
            .with_kind(ValueKind::Coord)
            .with_content(
                SchemaNode::sequence()
                    .with_child(gml_ref("X", Occurs::once()))
                    .with_child(gml_ref("Y", Occurs::optional()))
                    .with_child(gml_ref("Z", Occurs::optional())),
            ),
    );
    registry.add_element(ElementDecl::typed(QName::gml("coordinates"), QName::gml("CoordinatesType")));
    registry.add_element(ElementDecl::typed(QName::gml("coord"), QName::gml("CoordType")));
    for axis in ["X", "Y", "Z"] {
        registry.add_element(ElementDecl::typed(QName::gml(axis), QName::xsd("decimal")));
    }

    // Abstract geometry
    register(
        registry,
        geometry_attributes(TypeDecl::new(Some(QName::gml("AbstractGeometryType"))))
            .with_abstract(true)
            .with_binding(Binding::Geometry),
    );
    register(
        registry,
        TypeDecl::new(Some(QName::gml("AbstractGeometryCollectionBaseType")))
            .with_abstract(true)
            .with_base(QName::gml("AbstractGeometryType"), Derivation::Restriction)
            .with_binding(Binding::GeometryCollection),
    );
    registry.add_element(
        ElementDecl::typed(QName::gml("_Geometry"), QName::gml("AbstractGeometryType"))
            .with_abstract(true),
    );
    registry.add_element(
        ElementDecl::typed(
            QName::gml("_GeometryCollection"),
            QName::gml("GeometryCollectionType"),
        )
        .with_abstract(true)
        .with_substitution_group(QName::gml("_Geometry")),
    );

    // Concrete geometries
    let coordinates_choice = |min_coords: u32, max_coords: Option<u32>| {
        SchemaNode::choice()
            .with_child(gml_ref("coord", Occurs::new(min_coords, max_coords)))
            .with_child(gml_ref("coordinates", Occurs::once()))
    };
    for (element, type_name, kind) in GEOMETRIES {
        let content = match kind {
            GeometryKind::Point => coordinates_choice(1, Some(1)),
            GeometryKind::LineString => coordinates_choice(2, None),
            GeometryKind::LinearRing => coordinates_choice(4, None),
            GeometryKind::Polygon => SchemaNode::sequence()
                .with_child(gml_ref("outerBoundaryIs", Occurs::once()))
                .with_child(gml_ref("innerBoundaryIs", Occurs::zero_or_more())),
            GeometryKind::MultiPoint => {
                SchemaNode::sequence().with_child(gml_ref("pointMember", Occurs::one_or_more()))
            }
            GeometryKind::MultiLineString => SchemaNode::sequence()
                .with_child(gml_ref("lineStringMember", Occurs::one_or_more())),
            GeometryKind::MultiPolygon => {
                SchemaNode::sequence().with_child(gml_ref("polygonMember", Occurs::one_or_more()))
            }
            GeometryKind::GeometryCollection => SchemaNode::sequence()
                .with_child(gml_ref("geometryMember", Occurs::one_or_more())),
        };
        let base = if kind.is_aggregate() {
            "AbstractGeometryCollectionBaseType"
        } else {
            "AbstractGeometryType"
        };
        register(
            registry,
            TypeDecl::new(Some(QName::gml(*type_name)))
                .with_base(QName::gml(base), Derivation::Extension)
                .with_binding(kind.binding())
                .with_kind(ValueKind::Geometry(*kind))
                .with_content(content),
        );
        let head = if kind.is_aggregate() && *element != "MultiGeometry" {
            "_GeometryCollection"
        } else {
            "_Geometry"
        };
        registry.add_element(
            ElementDecl::typed(QName::gml(*element), QName::gml(*type_name))
                .with_substitution_group(QName::gml(head)),
        );
    }

    // Box
    register(
        registry,
        geometry_attributes(TypeDecl::new(Some(QName::gml("BoxType"))))
            .with_binding(Binding::Envelope)
            .with_kind(ValueKind::Box)
            .with_content(coordinates_choice(2, Some(2))),
    );
    registry.add_element(ElementDecl::typed(QName::gml("Box"), QName::gml("BoxType")));

    // Members of aggregates and polygon boundaries
    let mut member_types: Vec<&str> = Vec::new();
    for (element, type_name, wrapped) in MEMBERS {
        if !member_types.contains(type_name) {
            member_types.push(*type_name);
            register(
                registry,
                TypeDecl::new(Some(QName::gml(*type_name)))
                    .with_kind(ValueKind::Property)
                    .with_content(SchemaNode::sequence().with_child(gml_ref(wrapped, Occurs::once())))
                    .with_attribute(AttributeDecl::new(
                        QName::namespaced(crate::namespaces::XLINK_NAMESPACE, "href"),
                        None,
                    )),
            );
        }
        registry.add_element(ElementDecl::typed(QName::gml(*element), QName::gml(*type_name)));
    }

    // Geometry properties
    for (element, type_name, wrapped) in GEOMETRY_PROPERTIES {
        register(
            registry,
            TypeDecl::new(Some(QName::gml(*type_name)))
                .with_kind(ValueKind::Property)
                .with_content(SchemaNode::sequence().with_child(gml_ref(wrapped, Occurs::optional()))),
        );
        registry.add_element(ElementDecl::typed(QName::gml(*element), QName::gml(*type_name)));
    }
    for (element, type_name) in PROPERTY_ALIASES {
        registry.add_element(ElementDecl::typed(QName::gml(*element), QName::gml(*type_name)));
    }
}

fn register_feature_model(registry: &mut SchemaRegistry) {
    registry.add_element(ElementDecl::typed(QName::gml("description"), QName::xsd("string")));
    registry.add_element(ElementDecl::typed(QName::gml("name"), QName::xsd("string")));

    register(registry, TypeDecl::simple(QName::gml("NullType"), Binding::String));
    registry.add_element(ElementDecl::typed(QName::gml("null"), QName::gml("NullType")));

    register(
        registry,
        TypeDecl::new(Some(QName::gml("BoundingShapeType")))
            .with_binding(Binding::Envelope)
            .with_kind(ValueKind::Property)
            .with_content(
                SchemaNode::choice()
                    .with_child(gml_ref("Box", Occurs::once()))
                    .with_child(gml_ref("null", Occurs::once())),
            ),
    );
    registry.add_element(ElementDecl::typed(QName::gml("boundedBy"), QName::gml("BoundingShapeType")));

    register(
        registry,
        TypeDecl::new(Some(QName::gml("AbstractFeatureType")))
            .with_abstract(true)
            .with_binding(Binding::Entity)
            .with_kind(ValueKind::Feature)
            .with_attribute(AttributeDecl::new(QName::local("fid"), Some(QName::xsd("ID"))))
            .with_content(
                SchemaNode::sequence()
                    .with_child(gml_ref("description", Occurs::optional()))
                    .with_child(gml_ref("name", Occurs::optional()))
                    .with_child(gml_ref("boundedBy", Occurs::optional())),
            ),
    );
    registry.add_element(
        ElementDecl::typed(QName::gml("_Feature"), QName::gml("AbstractFeatureType"))
            .with_abstract(true),
    );

    register(
        registry,
        TypeDecl::new(Some(QName::gml("FeatureAssociationType")))
            .with_kind(ValueKind::Property)
            .with_content(SchemaNode::sequence().with_child(gml_ref("_Feature", Occurs::optional()))),
    );
    registry.add_element(ElementDecl::typed(
        QName::gml("featureMember"),
        QName::gml("FeatureAssociationType"),
    ));

    register(
        registry,
        TypeDecl::new(Some(QName::gml("AbstractFeatureCollectionBaseType")))
            .with_abstract(true)
            .with_base(QName::gml("AbstractFeatureType"), Derivation::Restriction)
            .with_content(
                SchemaNode::sequence()
                    .with_child(gml_ref("description", Occurs::optional()))
                    .with_child(gml_ref("name", Occurs::optional()))
                    .with_child(gml_ref("boundedBy", Occurs::once())),
            ),
    );
    register(
        registry,
        TypeDecl::new(Some(QName::gml("AbstractFeatureCollectionType")))
            .with_abstract(true)
            .with_base(
                QName::gml("AbstractFeatureCollectionBaseType"),
                Derivation::Extension,
            )
            .with_binding(Binding::Collection)
            .with_kind(ValueKind::FeatureCollection)
            .with_content(
                SchemaNode::sequence().with_child(gml_ref("featureMember", Occurs::zero_or_more())),
            ),
    );
    registry.add_element(
        ElementDecl::typed(
            QName::gml("_FeatureCollection"),
            QName::gml("AbstractFeatureCollectionType"),
        )
        .with_abstract(true)
        .with_substitution_group(QName::gml("_Feature")),
    );
}
