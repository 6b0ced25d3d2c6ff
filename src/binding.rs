//! Value bindings and the type lattice
//!
//! Every field of an entity schema has a [`Binding`]: the kind of runtime
//! value it holds. Bindings form a closed lattice rooted at
//! [`Binding::Object`]; choice resolution merges candidate bindings through a
//! small compatibility table first and the lattice second.

use serde::Serialize;
use std::fmt;

/// Runtime value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Binding {
    /// Anything
    Object,
    /// Text
    String,
    /// xs:boolean
    Boolean,
    /// Any numeric value
    Number,
    /// Integral numbers
    Integer,
    /// Floating point numbers
    Double,
    /// Exact decimal numbers
    Decimal,
    /// Calendar date
    Date,
    /// Date and time of day
    DateTime,
    /// Any geometry
    Geometry,
    /// Single position
    Point,
    /// Open or closed line
    LineString,
    /// Closed line with at least four positions
    LinearRing,
    /// Area with optional holes
    Polygon,
    /// Heterogeneous geometry aggregate
    GeometryCollection,
    /// Aggregate of points
    MultiPoint,
    /// Aggregate of lines
    MultiLineString,
    /// Aggregate of polygons
    MultiPolygon,
    /// Bounding box
    Envelope,
    /// Raw coordinate sequence
    Coordinates,
    /// Nested feature
    Entity,
    /// Feature collection
    Collection,
}

impl Binding {
    /// Direct supertype in the lattice
    pub fn parent(self) -> Option<Binding> {
        use Binding::*;
        match self {
            Object => None,
            Integer | Double | Decimal => Some(Number),
            LinearRing => Some(LineString),
            Point | LineString | Polygon | GeometryCollection => Some(Geometry),
            MultiPoint | MultiLineString | MultiPolygon => Some(GeometryCollection),
            String | Boolean | Number | Date | DateTime | Geometry | Envelope | Coordinates
            | Entity | Collection => Some(Object),
        }
    }

    /// This binding followed by all of its supertypes, ending with `Object`
    pub fn ancestors(self) -> impl Iterator<Item = Binding> {
        std::iter::successors(Some(self), |b| b.parent())
    }

    /// Whether a value of binding `other` can be stored where `self` is expected
    pub fn is_assignable_from(self, other: Binding) -> bool {
        other.ancestors().any(|b| b == self)
    }

    /// Whether this is a geometry binding
    pub fn is_geometry(self) -> bool {
        Binding::Geometry.is_assignable_from(self)
    }

    /// Whether values of this binding are plain text in XML
    pub fn is_simple(self) -> bool {
        use Binding::*;
        matches!(
            self,
            String | Boolean | Number | Integer | Double | Decimal | Date | DateTime
        )
    }

    /// The aggregate binding whose members have this binding
    pub fn multi_counterpart(self) -> Option<Binding> {
        match self {
            Binding::Point => Some(Binding::MultiPoint),
            Binding::LineString | Binding::LinearRing => Some(Binding::MultiLineString),
            Binding::Polygon => Some(Binding::MultiPolygon),
            _ => None,
        }
    }

    /// Name used in diagnostics and JSON dumps
    pub fn name(self) -> &'static str {
        use Binding::*;
        match self {
            Object => "Object",
            String => "String",
            Boolean => "Boolean",
            Number => "Number",
            Integer => "Integer",
            Double => "Double",
            Decimal => "Decimal",
            Date => "Date",
            DateTime => "DateTime",
            Geometry => "Geometry",
            Point => "Point",
            LineString => "LineString",
            LinearRing => "LinearRing",
            Polygon => "Polygon",
            GeometryCollection => "GeometryCollection",
            MultiPoint => "MultiPoint",
            MultiLineString => "MultiLineString",
            MultiPolygon => "MultiPolygon",
            Envelope => "Envelope",
            Coordinates => "Coordinates",
            Entity => "Entity",
            Collection => "Collection",
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Special-cased compatible pairs.
///
/// A single geometry kind merges into its multi counterpart, and a generic
/// geometry merges into a geometry collection. Order of the pair does not
/// matter.
pub fn compatible(a: Binding, b: Binding) -> Option<Binding> {
    use Binding::*;
    const TABLE: [(Binding, Binding, Binding); 4] = [
        (Point, MultiPoint, MultiPoint),
        (LineString, MultiLineString, MultiLineString),
        (Polygon, MultiPolygon, MultiPolygon),
        (Geometry, GeometryCollection, GeometryCollection),
    ];

    TABLE
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|(_, _, merged)| *merged)
}

/// Common binding of two candidates: equal, table, lattice walk, `Object`
pub fn common_binding(a: Binding, b: Binding) -> Binding {
    if a == b {
        return a;
    }
    if let Some(merged) = compatible(a, b) {
        return merged;
    }

    // Walk both supertype chains one step at a time until one chain reaches
    // a binding the other has already visited.
    let mut seen_a = vec![a];
    let mut seen_b = vec![b];
    let (mut ca, mut cb) = (Some(a), Some(b));
    while ca.is_some() || cb.is_some() {
        if let Some(x) = ca {
            if seen_b.contains(&x) {
                return x;
            }
            seen_a.push(x);
            ca = x.parent();
        }
        if let Some(y) = cb {
            if seen_a.contains(&y) {
                return y;
            }
            seen_b.push(y);
            cb = y.parent();
        }
    }

    Binding::Object
}

/// Fold [`common_binding`] over several candidates
pub fn common_of<I: IntoIterator<Item = Binding>>(candidates: I) -> Option<Binding> {
    candidates.into_iter().reduce(common_binding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_assignability() {
        assert!(Binding::Geometry.is_assignable_from(Binding::Point));
        assert!(Binding::LineString.is_assignable_from(Binding::LinearRing));
        assert!(Binding::GeometryCollection.is_assignable_from(Binding::MultiPolygon));
        assert!(Binding::Object.is_assignable_from(Binding::Entity));
        assert!(!Binding::Point.is_assignable_from(Binding::Geometry));
        assert!(!Binding::Polygon.is_assignable_from(Binding::MultiPolygon));
        assert!(Binding::Number.is_assignable_from(Binding::Decimal));
    }

    #[test]
    fn test_compatibility_table() {
        assert_eq!(
            compatible(Binding::Polygon, Binding::MultiPolygon),
            Some(Binding::MultiPolygon)
        );
        assert_eq!(
            compatible(Binding::MultiPoint, Binding::Point),
            Some(Binding::MultiPoint)
        );
        assert_eq!(
            compatible(Binding::Geometry, Binding::GeometryCollection),
            Some(Binding::GeometryCollection)
        );
        assert_eq!(compatible(Binding::Point, Binding::LineString), None);
    }

    #[test]
    fn test_common_binding() {
        assert_eq!(
            common_binding(Binding::MultiPolygon, Binding::Polygon),
            Binding::MultiPolygon
        );
        assert_eq!(
            common_binding(Binding::Point, Binding::LineString),
            Binding::Geometry
        );
        assert_eq!(
            common_binding(Binding::LinearRing, Binding::LineString),
            Binding::LineString
        );
        assert_eq!(
            common_binding(Binding::Integer, Binding::Double),
            Binding::Number
        );
        assert_eq!(
            common_binding(Binding::String, Binding::Point),
            Binding::Object
        );
        assert_eq!(
            common_binding(Binding::MultiPoint, Binding::MultiPolygon),
            Binding::GeometryCollection
        );
    }

    #[test]
    fn test_common_of() {
        assert_eq!(common_of(Vec::new()), None);
        assert_eq!(
            common_of([Binding::Polygon, Binding::Polygon, Binding::MultiPolygon]),
            Some(Binding::MultiPolygon)
        );
    }
}
