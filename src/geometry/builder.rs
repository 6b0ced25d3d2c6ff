//! Geometry construction from decoded child values
//!
//! The decoder hands each geometry element's children over as ordered
//! `(name, value)` pairs. Leaf kinds collect coordinates, polygons match
//! their boundaries by element name and aggregates check their members.

use crate::error::DecodeError;
use crate::namespaces::QName;
use crate::value::Value;

use super::{
    Coordinate, CoordinateSequence, CrsHint, Envelope, Geometry, GeometryKind, Polygon, Shape,
};

/// Minimum number of positions in a line string
pub const MIN_LINE_POSITIONS: usize = 2;
/// Minimum number of positions in a linear ring
pub const MIN_RING_POSITIONS: usize = 4;

/// Build a geometry of the given kind
pub fn build_geometry(
    kind: GeometryKind,
    children: Vec<(QName, Value)>,
    srs: Option<CrsHint>,
) -> Result<Geometry, DecodeError> {
    let shape = match kind {
        GeometryKind::Point => {
            let coords = collect_coordinates(children)?;
            match coords.as_slice() {
                [c] => Shape::Point(*c),
                _ => {
                    return Err(DecodeError::new(format!(
                        "Point requires exactly one coordinate, found {}",
                        coords.len()
                    )))
                }
            }
        }
        GeometryKind::LineString => Shape::LineString(line(collect_coordinates(children)?)?),
        GeometryKind::LinearRing => Shape::LinearRing(ring(collect_coordinates(children)?)?),
        GeometryKind::Polygon => Shape::Polygon(polygon(children)?),
        GeometryKind::MultiPoint => Shape::MultiPoint(
            members(kind, children)?
                .into_iter()
                .map(|g| match g.shape {
                    Shape::Point(c) => Ok(c),
                    _ => Err(heterogeneous(kind, &g)),
                })
                .collect::<Result<_, _>>()?,
        ),
        GeometryKind::MultiLineString => Shape::MultiLineString(
            members(kind, children)?
                .into_iter()
                .map(|g| match g.shape {
                    Shape::LineString(s) | Shape::LinearRing(s) => Ok(s),
                    _ => Err(heterogeneous(kind, &g)),
                })
                .collect::<Result<_, _>>()?,
        ),
        GeometryKind::MultiPolygon => Shape::MultiPolygon(
            members(kind, children)?
                .into_iter()
                .map(|g| match g.shape {
                    Shape::Polygon(p) => Ok(p),
                    _ => Err(heterogeneous(kind, &g)),
                })
                .collect::<Result<_, _>>()?,
        ),
        GeometryKind::GeometryCollection => Shape::GeometryCollection(members(kind, children)?),
    };

    Ok(Geometry { shape, srs })
}

/// Build the envelope of a `gml:Box` (exactly two positions)
pub fn build_envelope(
    children: Vec<(QName, Value)>,
    srs: Option<CrsHint>,
) -> Result<Envelope, DecodeError> {
    let coords = collect_coordinates(children)?;
    match coords.as_slice() {
        [a, b] => Ok(Envelope::new(*a, *b).with_srs(srs)),
        _ => Err(DecodeError::new(format!(
            "Box requires exactly two coordinates, found {}",
            coords.len()
        ))),
    }
}

/// Build one position from `gml:coord` children X, Y and Z
pub fn build_coord(children: Vec<(QName, Value)>) -> Result<CoordinateSequence, DecodeError> {
    let mut x = None;
    let mut y = None;
    let mut z = None;
    for (name, value) in children {
        let ordinate = value.as_f64().ok_or_else(|| {
            DecodeError::new(format!("Ordinate {} is not a number", name.local_name))
        })?;
        match name.local_name.as_str() {
            "X" => x = Some(ordinate),
            "Y" => y = Some(ordinate),
            "Z" => z = Some(ordinate),
            other => log::warn!("Ignoring unexpected coord child {}", other),
        }
    }

    let x = x.ok_or_else(|| DecodeError::new("coord requires an X ordinate"))?;
    let coordinate = Coordinate {
        x,
        y: y.unwrap_or(0.0),
        z,
    };
    Ok(vec![coordinate].into())
}

fn collect_coordinates(children: Vec<(QName, Value)>) -> Result<CoordinateSequence, DecodeError> {
    let mut out = CoordinateSequence::new();
    for (name, value) in children {
        match value {
            Value::Coordinates(seq) => out.extend(seq),
            Value::Null => {}
            other => {
                return Err(DecodeError::new(format!(
                    "Expected coordinates in {}, found {}",
                    name.local_name,
                    other.type_name()
                )))
            }
        }
    }
    Ok(out)
}

fn line(coords: CoordinateSequence) -> Result<CoordinateSequence, DecodeError> {
    if coords.len() < MIN_LINE_POSITIONS {
        return Err(DecodeError::new(format!(
            "LineString requires at least {} coordinates, found {}",
            MIN_LINE_POSITIONS,
            coords.len()
        )));
    }
    Ok(coords)
}

fn ring(coords: CoordinateSequence) -> Result<CoordinateSequence, DecodeError> {
    if coords.len() < MIN_RING_POSITIONS {
        return Err(DecodeError::new(format!(
            "LinearRing requires at least {} coordinates, found {}",
            MIN_RING_POSITIONS,
            coords.len()
        )));
    }
    if !coords.is_closed() {
        return Err(DecodeError::new("LinearRing is not closed"));
    }
    Ok(coords)
}

fn boundary(name: &QName, value: Value) -> Result<CoordinateSequence, DecodeError> {
    match value {
        Value::Geometry(g) => match g.shape {
            Shape::LinearRing(s) => Ok(s),
            _ => Err(DecodeError::new(format!(
                "{} must hold a LinearRing, found {}",
                name.local_name,
                g.kind().element_name()
            ))),
        },
        other => Err(DecodeError::new(format!(
            "{} must hold a LinearRing, found {}",
            name.local_name,
            other.type_name()
        ))),
    }
}

fn polygon(children: Vec<(QName, Value)>) -> Result<Polygon, DecodeError> {
    let mut children = children.into_iter();
    let exterior = match children.next() {
        Some((name, value)) if name.local_name == "outerBoundaryIs" => boundary(&name, value)?,
        Some((name, _)) => {
            return Err(DecodeError::new(format!(
                "Polygon must start with outerBoundaryIs, found {}",
                name.local_name
            )))
        }
        None => return Err(DecodeError::new("Polygon requires an outerBoundaryIs")),
    };

    let mut polygon = Polygon::new(exterior);
    for (name, value) in children {
        if name.local_name != "innerBoundaryIs" {
            return Err(DecodeError::new(format!(
                "Unexpected {} in Polygon, expected innerBoundaryIs",
                name.local_name
            )));
        }
        polygon.interiors.push(boundary(&name, value)?);
    }
    Ok(polygon)
}

/// Member geometries of an aggregate; empty member properties are skipped
fn members(kind: GeometryKind, children: Vec<(QName, Value)>) -> Result<Vec<Geometry>, DecodeError> {
    let mut out = Vec::new();
    for (name, value) in children {
        match value {
            Value::Geometry(g) => out.push(g),
            Value::Null => log::debug!("Skipping empty {}", name.local_name),
            other => {
                return Err(DecodeError::new(format!(
                    "{} of {} must hold a geometry, found {}",
                    name.local_name,
                    kind.element_name(),
                    other.type_name()
                )))
            }
        }
    }

    if out.is_empty() {
        return Err(DecodeError::new(format!(
            "{} requires at least one member",
            kind.element_name()
        )));
    }
    Ok(out)
}

fn heterogeneous(kind: GeometryKind, member: &Geometry) -> DecodeError {
    DecodeError::new(format!(
        "{} cannot hold a {} member",
        kind.element_name(),
        member.kind().element_name()
    ))
}
