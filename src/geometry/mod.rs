//! Geometry values
//!
//! This module provides the geometry model decoded from GML 2:
//! - Points, line strings, linear rings and polygons with holes
//! - Multi-point, multi-line, multi-polygon and heterogeneous collections
//! - Envelopes (`gml:Box`)
//! - Coordinate text codec and `srsName` hints

pub mod builder;
pub mod coordinates;
pub mod srs;

pub use coordinates::{Coordinate, CoordinateFormat, CoordinateSequence};
pub use srs::CrsHint;

use crate::binding::Binding;
use serde::Serialize;
use serde_json::json;

/// Geometry kinds the decoder can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GeometryKind {
    /// gml:Point
    Point,
    /// gml:LineString
    LineString,
    /// gml:LinearRing
    LinearRing,
    /// gml:Polygon
    Polygon,
    /// gml:MultiPoint
    MultiPoint,
    /// gml:MultiLineString
    MultiLineString,
    /// gml:MultiPolygon
    MultiPolygon,
    /// gml:MultiGeometry
    GeometryCollection,
}

impl GeometryKind {
    /// Binding of values of this kind
    pub fn binding(self) -> Binding {
        match self {
            GeometryKind::Point => Binding::Point,
            GeometryKind::LineString => Binding::LineString,
            GeometryKind::LinearRing => Binding::LinearRing,
            GeometryKind::Polygon => Binding::Polygon,
            GeometryKind::MultiPoint => Binding::MultiPoint,
            GeometryKind::MultiLineString => Binding::MultiLineString,
            GeometryKind::MultiPolygon => Binding::MultiPolygon,
            GeometryKind::GeometryCollection => Binding::GeometryCollection,
        }
    }

    /// GML element name for this kind
    pub fn element_name(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::LinearRing => "LinearRing",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
            GeometryKind::GeometryCollection => "MultiGeometry",
        }
    }

    /// Member element name of aggregate kinds
    pub fn member_name(self) -> Option<&'static str> {
        match self {
            GeometryKind::MultiPoint => Some("pointMember"),
            GeometryKind::MultiLineString => Some("lineStringMember"),
            GeometryKind::MultiPolygon => Some("polygonMember"),
            GeometryKind::GeometryCollection => Some("geometryMember"),
            _ => None,
        }
    }

    /// Whether this kind aggregates other geometries
    pub fn is_aggregate(self) -> bool {
        self.member_name().is_some()
    }
}

/// Polygon with optional holes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    /// Outer boundary
    pub exterior: CoordinateSequence,
    /// Holes
    pub interiors: Vec<CoordinateSequence>,
}

impl Polygon {
    /// Polygon without holes
    pub fn new(exterior: CoordinateSequence) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    /// Add a hole
    pub fn with_interior(mut self, interior: CoordinateSequence) -> Self {
        self.interiors.push(interior);
        self
    }
}

/// Shape of a geometry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Shape {
    /// Single position
    Point(Coordinate),
    /// Line through at least two positions
    LineString(CoordinateSequence),
    /// Closed line with at least four positions
    LinearRing(CoordinateSequence),
    /// Area
    Polygon(Polygon),
    /// Points
    MultiPoint(Vec<Coordinate>),
    /// Lines
    MultiLineString(Vec<CoordinateSequence>),
    /// Polygons
    MultiPolygon(Vec<Polygon>),
    /// Any geometries
    GeometryCollection(Vec<Geometry>),
}

/// Geometry value with optional reference system hint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    /// Shape and coordinates
    pub shape: Shape,
    /// Parsed `srsName`
    pub srs: Option<CrsHint>,
}

impl Geometry {
    /// Geometry without reference system
    pub fn new(shape: Shape) -> Self {
        Self { shape, srs: None }
    }

    /// Point shortcut
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(Shape::Point(Coordinate::new(x, y)))
    }

    /// Attach a reference system hint
    pub fn with_srs(mut self, srs: Option<CrsHint>) -> Self {
        self.srs = srs;
        self
    }

    /// Kind of this geometry
    pub fn kind(&self) -> GeometryKind {
        match &self.shape {
            Shape::Point(_) => GeometryKind::Point,
            Shape::LineString(_) => GeometryKind::LineString,
            Shape::LinearRing(_) => GeometryKind::LinearRing,
            Shape::Polygon(_) => GeometryKind::Polygon,
            Shape::MultiPoint(_) => GeometryKind::MultiPoint,
            Shape::MultiLineString(_) => GeometryKind::MultiLineString,
            Shape::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Shape::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }

    /// Binding of this geometry
    pub fn binding(&self) -> Binding {
        self.kind().binding()
    }

    /// Number of members of an aggregate, 1 otherwise
    pub fn num_geometries(&self) -> usize {
        match &self.shape {
            Shape::MultiPoint(m) => m.len(),
            Shape::MultiLineString(m) => m.len(),
            Shape::MultiPolygon(m) => m.len(),
            Shape::GeometryCollection(m) => m.len(),
            _ => 1,
        }
    }

    /// Every position of the geometry
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut out = Vec::new();
        self.collect_coordinates(&mut out);
        out
    }

    fn collect_coordinates(&self, out: &mut Vec<Coordinate>) {
        match &self.shape {
            Shape::Point(c) => out.push(*c),
            Shape::LineString(s) | Shape::LinearRing(s) => out.extend(s.iter().copied()),
            Shape::Polygon(p) => collect_polygon(p, out),
            Shape::MultiPoint(points) => out.extend(points.iter().copied()),
            Shape::MultiLineString(lines) => {
                lines.iter().for_each(|l| out.extend(l.iter().copied()))
            }
            Shape::MultiPolygon(polygons) => polygons.iter().for_each(|p| collect_polygon(p, out)),
            Shape::GeometryCollection(members) => {
                members.iter().for_each(|g| g.collect_coordinates(out))
            }
        }
    }

    /// Bounding box of the geometry
    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_coordinates(&self.coordinates()).map(|e| e.with_srs(self.srs.clone()))
    }

    /// Wrap a single geometry into its multi counterpart
    pub fn into_multi(self) -> Option<Geometry> {
        let srs = self.srs;
        let shape = match self.shape {
            Shape::Point(c) => Shape::MultiPoint(vec![c]),
            Shape::LineString(s) | Shape::LinearRing(s) => Shape::MultiLineString(vec![s]),
            Shape::Polygon(p) => Shape::MultiPolygon(vec![p]),
            _ => return None,
        };
        Some(Geometry { shape, srs })
    }

    /// Wrap into a one-member collection (collections are returned unchanged)
    pub fn into_collection(self) -> Geometry {
        if let Shape::GeometryCollection(_) = self.shape {
            return self;
        }
        let srs = self.srs.clone();
        Geometry {
            shape: Shape::GeometryCollection(vec![self]),
            srs,
        }
    }

    /// GeoJSON-style representation
    pub fn to_json(&self) -> serde_json::Value {
        let ring = |s: &CoordinateSequence| -> Vec<Vec<f64>> { s.iter().map(position).collect() };
        let polygon = |p: &Polygon| -> Vec<Vec<Vec<f64>>> {
            std::iter::once(&p.exterior)
                .chain(p.interiors.iter())
                .map(ring)
                .collect()
        };

        let mut value = match &self.shape {
            Shape::Point(c) => json!({"type": "Point", "coordinates": position(c)}),
            Shape::LineString(s) => json!({"type": "LineString", "coordinates": ring(s)}),
            Shape::LinearRing(s) => json!({"type": "LinearRing", "coordinates": ring(s)}),
            Shape::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon(p)}),
            Shape::MultiPoint(points) => json!({
                "type": "MultiPoint",
                "coordinates": points.iter().map(position).collect::<Vec<_>>()
            }),
            Shape::MultiLineString(lines) => json!({
                "type": "MultiLineString",
                "coordinates": lines.iter().map(ring).collect::<Vec<_>>()
            }),
            Shape::MultiPolygon(polygons) => json!({
                "type": "MultiPolygon",
                "coordinates": polygons.iter().map(polygon).collect::<Vec<_>>()
            }),
            Shape::GeometryCollection(members) => json!({
                "type": "GeometryCollection",
                "geometries": members.iter().map(Geometry::to_json).collect::<Vec<_>>()
            }),
        };
        if let (Some(srs), Some(obj)) = (&self.srs, value.as_object_mut()) {
            obj.insert("srsName".to_string(), json!(srs.to_srs_name()));
        }
        value
    }
}

fn position(c: &Coordinate) -> Vec<f64> {
    match c.z {
        Some(z) => vec![c.x, c.y, z],
        None => vec![c.x, c.y],
    }
}

fn collect_polygon(polygon: &Polygon, out: &mut Vec<Coordinate>) {
    out.extend(polygon.exterior.iter().copied());
    for interior in &polygon.interiors {
        out.extend(interior.iter().copied());
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Lower x
    pub min_x: f64,
    /// Lower y
    pub min_y: f64,
    /// Upper x
    pub max_x: f64,
    /// Upper y
    pub max_y: f64,
    /// Parsed `srsName`
    pub srs: Option<CrsHint>,
}

impl Envelope {
    /// Envelope spanning two corners, in any order
    pub fn new(a: Coordinate, b: Coordinate) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
            srs: None,
        }
    }

    /// Smallest envelope holding every position
    pub fn from_coordinates(coordinates: &[Coordinate]) -> Option<Self> {
        let (first, rest) = coordinates.split_first()?;
        let mut envelope = Envelope::new(*first, *first);
        for c in rest {
            envelope.expand_to_include(c);
        }
        Some(envelope)
    }

    /// Attach a reference system hint
    pub fn with_srs(mut self, srs: Option<CrsHint>) -> Self {
        self.srs = srs;
        self
    }

    /// Grow to include a position
    pub fn expand_to_include(&mut self, c: &Coordinate) {
        self.min_x = self.min_x.min(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_x = self.max_x.max(c.x);
        self.max_y = self.max_y.max(c.y);
    }

    /// Union of two envelopes; the reference system of `self` is kept
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            srs: self.srs.clone().or_else(|| other.srs.clone()),
        }
    }

    /// Lower and upper corner
    pub fn corners(&self) -> CoordinateSequence {
        vec![
            Coordinate::new(self.min_x, self.min_y),
            Coordinate::new(self.max_x, self.max_y),
        ]
        .into()
    }

    /// JSON representation `[min_x, min_y, max_x, max_y]`
    pub fn to_json(&self) -> serde_json::Value {
        json!([self.min_x, self.min_y, self.max_x, self.max_y])
    }
}

/// Union of several envelopes
pub fn union_all<I: IntoIterator<Item = Envelope>>(envelopes: I) -> Option<Envelope> {
    envelopes.into_iter().reduce(|a, b| a.union(&b))
}
