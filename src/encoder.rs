//! Schema-driven encoding
//!
//! [`Encoder`] writes entities, feature collections and geometries back to
//! GML 2 with a `quick_xml` [`Writer`]. Every field of an entity is written
//! as the child element of the same name declared in the entity's type;
//! choice fields use the alternative whose binding fits the value.
//!
//! Namespace prefixes are declared on the outermost element written by each
//! public `encode_*` call. Coordinates use the canonical separators
//! (`decimal="."`, `cs=","`, `ts=" "`).

use crate::assembler::FID_ATTRIBUTE;
use crate::entity::{Entity, EntityCollection, FieldDescriptor};
use crate::error::{Error, Result};
use crate::geometry::{CoordinateFormat, CoordinateSequence, Envelope, Geometry, Polygon, Shape};
use crate::namespaces::{QName, GML_NAMESPACE, XSI_NAMESPACE};
use crate::resolve::TypeResolver;
use crate::schema::{ElementDecl, SchemaRegistry, TypeDecl, ValueKind};
use crate::value::Value;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;
use std::sync::Arc;

/// Encoder bound to a schema registry
#[derive(Debug, Clone)]
pub struct Encoder {
    registry: Arc<SchemaRegistry>,
    /// (prefix, namespace) pairs declared on the root element
    prefixes: Vec<(String, String)>,
    indent: bool,
}

impl Encoder {
    /// Create an encoder; application namespaces get the prefix `app`
    /// (`app1`, `app2`, ... when there are several)
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let mut prefixes = vec![
            ("gml".to_string(), GML_NAMESPACE.to_string()),
            ("xsi".to_string(), XSI_NAMESPACE.to_string()),
        ];
        let targets = registry.target_namespaces();
        for (i, namespace) in targets.iter().enumerate() {
            let prefix = if targets.len() == 1 {
                "app".to_string()
            } else {
                format!("app{}", i + 1)
            };
            prefixes.push((prefix, namespace.clone()));
        }
        Self {
            registry,
            prefixes,
            indent: false,
        }
    }

    /// Bind a prefix to a namespace, replacing an earlier binding of it
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.prefixes.retain(|(_, ns)| *ns != namespace);
        self.prefixes.push((prefix.into(), namespace));
        self
    }

    /// Indent the output of the `*_to_string` helpers
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Encode an entity as the element named by its schema
    pub fn encode_entity<W: Write>(&self, writer: &mut Writer<W>, entity: &Entity) -> Result<()> {
        self.write_entity(writer, entity.schema().name(), None, entity, true)
    }

    /// Encode a feature collection under the element `name`
    pub fn encode_collection<W: Write>(
        &self,
        writer: &mut Writer<W>,
        name: &QName,
        collection: &EntityCollection,
    ) -> Result<()> {
        self.write_collection(writer, name, collection, true)
    }

    /// Encode a geometry element
    pub fn encode_geometry<W: Write>(&self, writer: &mut Writer<W>, geometry: &Geometry) -> Result<()> {
        self.write_geometry(writer, geometry, true)
    }

    /// Entity as an XML document
    pub fn entity_to_string(&self, entity: &Entity) -> Result<String> {
        self.to_document(|encoder, writer| encoder.encode_entity(writer, entity))
    }

    /// Feature collection as an XML document
    pub fn collection_to_string(&self, name: &QName, collection: &EntityCollection) -> Result<String> {
        self.to_document(|encoder, writer| encoder.encode_collection(writer, name, collection))
    }

    /// Geometry as an XML fragment
    pub fn geometry_to_string(&self, geometry: &Geometry) -> Result<String> {
        let mut writer = self.writer();
        self.encode_geometry(&mut writer, geometry)?;
        into_string(writer)
    }

    fn writer(&self) -> Writer<Vec<u8>> {
        if self.indent {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        }
    }

    fn to_document<F>(&self, body: F) -> Result<String>
    where
        F: FnOnce(&Self, &mut Writer<Vec<u8>>) -> Result<()>,
    {
        let mut writer = self.writer();
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        body(self, &mut writer)?;
        into_string(writer)
    }

    fn qualified(&self, name: &QName) -> Result<String> {
        let Some(namespace) = name.namespace() else {
            return Ok(name.local_name.clone());
        };
        self.prefixes
            .iter()
            .find(|(_, ns)| ns == namespace)
            .map(|(prefix, _)| format!("{}:{}", prefix, name.local_name))
            .ok_or_else(|| Error::Encode(format!("No prefix bound to namespace {}", namespace)))
    }

    fn start(&self, name: &QName, root: bool) -> Result<BytesStart<'static>> {
        let mut start = BytesStart::new(self.qualified(name)?);
        if root {
            for (prefix, namespace) in &self.prefixes {
                start.push_attribute((format!("xmlns:{}", prefix).as_str(), namespace.as_str()));
            }
        }
        Ok(start)
    }

    fn end<W: Write>(&self, writer: &mut Writer<W>, name: &QName) -> Result<()> {
        writer.write_event(Event::End(BytesEnd::new(self.qualified(name)?)))?;
        Ok(())
    }

    fn text_element<W: Write>(&self, writer: &mut Writer<W>, name: &QName, text: &str) -> Result<()> {
        writer.write_event(Event::Start(self.start(name, false)?))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(writer, name)
    }

    fn write_entity<W: Write>(
        &self,
        writer: &mut Writer<W>,
        name: &QName,
        ty: Option<Arc<TypeDecl>>,
        entity: &Entity,
        root: bool,
    ) -> Result<()> {
        let registry = &self.registry;
        let ty = ty
            .or_else(|| registry.element(name).and_then(|decl| registry.type_of(decl)))
            .ok_or_else(|| Error::Encode(format!("No declaration for element {}", name)))?;

        let mut start = self.start(name, root)?;
        if let Some(id) = entity.id() {
            start.push_attribute((FID_ATTRIBUTE, id));
        }
        writer.write_event(Event::Start(start))?;
        for (field, value) in entity.schema().fields().iter().zip(entity.values()) {
            self.write_field(writer, &ty, field, value)?;
        }
        self.end(writer, name)
    }

    fn write_field<W: Write>(
        &self,
        writer: &mut Writer<W>,
        ty: &TypeDecl,
        field: &FieldDescriptor,
        value: &Value,
    ) -> Result<()> {
        let registry = &self.registry;
        let child = element_name_for(field, value);
        let (decl, _) = registry.find_element_in_type(ty, child).ok_or_else(|| {
            Error::Encode(format!("No element '{}' in {}", child, ty.display_name()))
        })?;
        let child_ty = registry.type_of(&decl);
        let kind = child_ty
            .as_ref()
            .map_or(ValueKind::Complex, |t| registry.value_kind(t));

        let Some(binding) = value.binding() else {
            if matches!(kind, ValueKind::Simple(_)) && decl.nillable {
                let mut start = self.start(&decl.name, false)?;
                let nil = self.qualified(&QName::namespaced(XSI_NAMESPACE, "nil"))?;
                start.push_attribute((nil.as_str(), "true"));
                writer.write_event(Event::Empty(start))?;
            }
            return Ok(());
        };

        let expected = TypeResolver::new(registry).binding_of(&decl);
        if !expected.is_assignable_from(binding) {
            return Err(Error::Encode(format!(
                "{} value cannot be encoded as {} ({})",
                value.type_name(),
                decl.name,
                expected
            )));
        }
        self.write_value(writer, &decl, child_ty, kind, value)
    }

    fn write_value<W: Write>(
        &self,
        writer: &mut Writer<W>,
        decl: &ElementDecl,
        ty: Option<Arc<TypeDecl>>,
        kind: ValueKind,
        value: &Value,
    ) -> Result<()> {
        let name = &decl.name;
        match (kind, value) {
            (ValueKind::Property, wrapped) => {
                writer.write_event(Event::Start(self.start(name, false)?))?;
                match wrapped {
                    Value::Geometry(geometry) => self.write_geometry(writer, geometry, false)?,
                    Value::Envelope(envelope) => self.write_box(writer, envelope, false)?,
                    Value::Entity(entity) => {
                        self.write_entity(writer, entity.schema().name(), None, entity, false)?
                    }
                    other => {
                        return Err(Error::Encode(format!(
                            "Cannot wrap {} value in {}",
                            other.type_name(),
                            name
                        )))
                    }
                }
                self.end(writer, name)
            }
            (ValueKind::Geometry(_), Value::Geometry(geometry)) => {
                self.write_geometry(writer, geometry, false)
            }
            (ValueKind::Box, Value::Envelope(envelope)) => self.write_box(writer, envelope, false),
            (_, Value::Coordinates(coordinates)) => self.write_coordinates(writer, coordinates),
            (_, Value::Entity(entity)) => self.write_entity(writer, name, ty, entity, false),
            (_, Value::Collection(collection)) => {
                self.write_collection(writer, name, collection, false)
            }
            (_, simple) => match simple.to_text() {
                Some(text) => self.text_element(writer, name, &text),
                None => Err(Error::Encode(format!(
                    "No text form for {} value of {}",
                    simple.type_name(),
                    name
                ))),
            },
        }
    }

    fn write_collection<W: Write>(
        &self,
        writer: &mut Writer<W>,
        name: &QName,
        collection: &EntityCollection,
        root: bool,
    ) -> Result<()> {
        let mut start = self.start(name, root)?;
        if let Some(id) = &collection.id {
            start.push_attribute((FID_ATTRIBUTE, id.as_str()));
        }
        writer.write_event(Event::Start(start))?;

        let bounded_by = QName::gml("boundedBy");
        writer.write_event(Event::Start(self.start(&bounded_by, false)?))?;
        match collection.bounds() {
            Some(envelope) => self.write_box(writer, &envelope, false)?,
            None => self.text_element(writer, &QName::gml("null"), "unknown")?,
        }
        self.end(writer, &bounded_by)?;

        let member = QName::gml("featureMember");
        for entity in &collection.entities {
            writer.write_event(Event::Start(self.start(&member, false)?))?;
            self.write_entity(writer, entity.schema().name(), None, entity, false)?;
            self.end(writer, &member)?;
        }
        self.end(writer, name)
    }

    fn write_geometry<W: Write>(
        &self,
        writer: &mut Writer<W>,
        geometry: &Geometry,
        root: bool,
    ) -> Result<()> {
        let name = QName::gml(geometry.kind().element_name());
        let mut start = self.start(&name, root)?;
        if let Some(srs) = &geometry.srs {
            start.push_attribute(("srsName", srs.to_srs_name().as_str()));
        }
        writer.write_event(Event::Start(start))?;

        match &geometry.shape {
            Shape::Point(c) => self.write_coordinates(writer, &CoordinateSequence::from(vec![*c]))?,
            Shape::LineString(s) | Shape::LinearRing(s) => self.write_coordinates(writer, s)?,
            Shape::Polygon(polygon) => self.write_rings(writer, polygon)?,
            Shape::MultiPoint(points) => {
                for c in points {
                    self.write_member(writer, "pointMember", &Geometry::new(Shape::Point(*c)))?;
                }
            }
            Shape::MultiLineString(lines) => {
                for line in lines {
                    let member = Geometry::new(Shape::LineString(line.clone()));
                    self.write_member(writer, "lineStringMember", &member)?;
                }
            }
            Shape::MultiPolygon(polygons) => {
                for polygon in polygons {
                    let member = Geometry::new(Shape::Polygon(polygon.clone()));
                    self.write_member(writer, "polygonMember", &member)?;
                }
            }
            Shape::GeometryCollection(members) => {
                for member in members {
                    self.write_member(writer, "geometryMember", member)?;
                }
            }
        }
        self.end(writer, &name)
    }

    fn write_member<W: Write>(&self, writer: &mut Writer<W>, member: &str, geometry: &Geometry) -> Result<()> {
        let name = QName::gml(member);
        writer.write_event(Event::Start(self.start(&name, false)?))?;
        self.write_geometry(writer, geometry, false)?;
        self.end(writer, &name)
    }

    fn write_rings<W: Write>(&self, writer: &mut Writer<W>, polygon: &Polygon) -> Result<()> {
        let rings = std::iter::once(("outerBoundaryIs", &polygon.exterior))
            .chain(polygon.interiors.iter().map(|ring| ("innerBoundaryIs", ring)));
        for (boundary, ring) in rings {
            let member = Geometry::new(Shape::LinearRing(ring.clone()));
            self.write_member(writer, boundary, &member)?;
        }
        Ok(())
    }

    fn write_box<W: Write>(&self, writer: &mut Writer<W>, envelope: &Envelope, root: bool) -> Result<()> {
        let name = QName::gml("Box");
        let mut start = self.start(&name, root)?;
        if let Some(srs) = &envelope.srs {
            start.push_attribute(("srsName", srs.to_srs_name().as_str()));
        }
        writer.write_event(Event::Start(start))?;
        self.write_coordinates(writer, &envelope.corners())?;
        self.end(writer, &name)
    }

    fn write_coordinates<W: Write>(
        &self,
        writer: &mut Writer<W>,
        coordinates: &CoordinateSequence,
    ) -> Result<()> {
        let format = CoordinateFormat::canonical();
        let name = QName::gml("coordinates");
        let mut start = self.start(&name, false)?;
        start.push_attribute(("decimal", format.decimal.as_str()));
        start.push_attribute(("cs", format.cs.as_str()));
        start.push_attribute(("ts", format.ts.as_deref().unwrap_or(" ")));
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&format.format(coordinates))))?;
        self.end(writer, &name)
    }
}

/// Child element written for a field: the choice alternative that fits the
/// value, else the field name
fn element_name_for<'f>(field: &'f FieldDescriptor, value: &Value) -> &'f str {
    match (&field.choice, value.binding()) {
        (Some(choice), Some(binding)) => choice
            .alternatives()
            .iter()
            .find(|(_, alternative)| alternative.is_assignable_from(binding))
            .map_or(field.name.as_str(), |(name, _)| name.as_str()),
        _ => field.name.as_str(),
    }
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::decoder::Decoder;
    use crate::entity::{ChoiceBinding, EntityBuilder, EntitySchema};
    use crate::geometry::{Coordinate, CrsHint};
    use pretty_assertions::assert_eq;

    const APP_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:gml="http://www.opengis.net/gml"
           xmlns:app="http://example.com/app"
           targetNamespace="http://example.com/app"
           elementFormDefault="qualified">
  <xs:element name="Parcel" type="app:ParcelType" substitutionGroup="gml:_Feature"/>
  <xs:complexType name="ParcelType">
    <xs:complexContent>
      <xs:extension base="gml:AbstractFeatureType">
        <xs:sequence>
          <xs:element name="owner" type="xs:string" nillable="true"/>
          <xs:element name="area" type="xs:double"/>
          <xs:choice>
            <xs:element ref="gml:polygonProperty"/>
            <xs:element ref="gml:multiPolygonProperty"/>
          </xs:choice>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="Parcels" type="app:ParcelsType" substitutionGroup="gml:_FeatureCollection"/>
  <xs:complexType name="ParcelsType">
    <xs:complexContent>
      <xs:extension base="gml:AbstractFeatureCollectionType"/>
    </xs:complexContent>
  </xs:complexType>
</xs:schema>"#;

    const APP: &str = "http://example.com/app";

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::from_xsd_str(APP_XSD).unwrap())
    }

    fn square(x: f64, y: f64) -> Polygon {
        Polygon::new(CoordinateSequence::from(vec![
            Coordinate::new(x, y),
            Coordinate::new(x + 1.0, y),
            Coordinate::new(x + 1.0, y + 1.0),
            Coordinate::new(x, y),
        ]))
    }

    fn parcel(registry: &SchemaRegistry, id: &str, owner: Value, geometry: Geometry) -> Entity {
        let decl = registry.element(&QName::namespaced(APP, "Parcel")).unwrap();
        EntityBuilder::new(registry.entity_schema(decl))
            .with_id(id)
            .with("owner", owner)
            .unwrap()
            .with("area", 1.0)
            .unwrap()
            .with("polygonProperty", geometry)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_point() {
        let encoder = Encoder::new(registry());
        let point = Geometry::point(1.5, -2.0).with_srs(Some(CrsHint::Epsg(4326)));
        let xml = encoder.geometry_to_string(&point).unwrap();
        assert!(xml.starts_with("<gml:Point xmlns:gml=\"http://www.opengis.net/gml\""));
        assert!(xml.contains(r#"srsName="EPSG:4326""#));
        assert!(xml.contains(
            r#"<gml:coordinates decimal="." cs="," ts=" ">1.5,-2</gml:coordinates></gml:Point>"#
        ));
    }

    #[test]
    fn test_encode_polygon_rings() {
        let encoder = Encoder::new(registry());
        let mut polygon = square(0.0, 0.0);
        polygon = polygon.with_interior(square(0.2, 0.2).exterior);
        let xml = encoder
            .geometry_to_string(&Geometry::new(Shape::Polygon(polygon)))
            .unwrap();
        assert_eq!(xml.matches("<gml:outerBoundaryIs>").count(), 1);
        assert_eq!(xml.matches("<gml:innerBoundaryIs>").count(), 1);
        assert_eq!(xml.matches("<gml:LinearRing>").count(), 2);
    }

    #[test]
    fn test_entity_round_trip() {
        let registry = registry();
        let entity = parcel(
            &registry,
            "parcel.1",
            Value::from("Ada"),
            Geometry::new(Shape::Polygon(square(0.0, 0.0))),
        );

        let xml = Encoder::new(Arc::clone(&registry)).entity_to_string(&entity).unwrap();
        assert!(xml.contains(r#"fid="parcel.1""#));
        // The stored value was widened to a multi polygon
        assert!(xml.contains("<gml:multiPolygonProperty>"));

        let decoded = Decoder::new(registry).decode_str(&xml).unwrap();
        assert_eq!(decoded.as_entity(), Some(&entity));
    }

    #[test]
    fn test_null_simple_field_is_nil() {
        let registry = registry();
        let entity = parcel(
            &registry,
            "parcel.2",
            Value::Null,
            Geometry::new(Shape::Polygon(square(0.0, 0.0))),
        );
        let xml = Encoder::new(Arc::clone(&registry)).entity_to_string(&entity).unwrap();
        assert!(xml.contains(r#"<app:owner xsi:nil="true"/>"#));

        let decoded = Decoder::new(registry).decode_str(&xml).unwrap();
        assert_eq!(decoded.as_entity().unwrap().get("owner"), Some(&Value::Null));
    }

    #[test]
    fn test_collection_bounds_and_members() {
        let registry = registry();
        let mut collection = EntityCollection::new();
        collection.push(parcel(
            &registry,
            "a",
            Value::from("x"),
            Geometry::new(Shape::Polygon(square(0.0, 0.0))),
        ));
        collection.push(parcel(
            &registry,
            "b",
            Value::from("y"),
            Geometry::new(Shape::Polygon(square(4.0, 5.0))),
        ));

        let encoder = Encoder::new(Arc::clone(&registry));
        let name = QName::namespaced(APP, "Parcels");
        let xml = encoder.collection_to_string(&name, &collection).unwrap();
        assert_eq!(xml.matches("<gml:featureMember>").count(), 2);
        assert!(xml.contains("<gml:boundedBy><gml:Box>"));
        assert!(xml.contains(">0,0 5,6</gml:coordinates>"));

        let empty = encoder
            .collection_to_string(&name, &EntityCollection::new())
            .unwrap();
        assert!(empty.contains("<gml:null>unknown</gml:null>"));

        let Value::Collection(decoded) = Decoder::new(registry).decode_str(&xml).unwrap() else {
            panic!("expected a collection");
        };
        assert_eq!(decoded.entities, collection.entities);
    }

    #[test]
    fn test_unencodable_value() {
        let schema = Arc::new(EntitySchema::new(
            QName::namespaced(APP, "Parcel"),
            vec![
                FieldDescriptor::new("owner", Binding::Object),
                FieldDescriptor::choice(
                    "polygonProperty",
                    ChoiceBinding::new(vec![("polygonProperty".to_string(), Binding::Polygon)]),
                ),
            ],
        ));
        let entity = EntityBuilder::new(schema)
            .with("owner", 42i64)
            .unwrap()
            .with("polygonProperty", Geometry::new(Shape::Polygon(square(0.0, 0.0))))
            .unwrap()
            .build()
            .unwrap();

        let err = Encoder::new(registry()).entity_to_string(&entity).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn test_unknown_namespace_and_element() {
        let encoder = Encoder::new(registry());
        let schema = Arc::new(EntitySchema::new(QName::namespaced("urn:other", "Thing"), vec![]));
        let entity = EntityBuilder::new(schema).build().unwrap();
        assert!(matches!(
            encoder.entity_to_string(&entity),
            Err(Error::Encode(_))
        ));

        let renamed = Encoder::new(registry()).with_prefix("p", APP);
        let entity = parcel(
            &registry(),
            "c",
            Value::from("z"),
            Geometry::new(Shape::Polygon(square(0.0, 0.0))),
        );
        let xml = renamed.entity_to_string(&entity).unwrap();
        assert!(xml.contains("<p:Parcel xmlns:gml="));
        assert!(!xml.contains("xmlns:app="));
    }
}
