//! Runtime values
//!
//! Every decoded element yields a [`Value`]: text parsed with an XSD simple
//! type, a geometry, an envelope, a raw coordinate list, a nested entity or
//! a feature collection.

use crate::binding::Binding;
use crate::entity::{Entity, EntityCollection};
use crate::error::DecodeError;
use crate::geometry::{coordinates, CoordinateSequence, Envelope, Geometry};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Date-time value; offsets are kept when the text carries one
#[derive(Debug, Clone, PartialEq)]
pub enum DateTimeValue {
    /// With time zone offset
    Offset(DateTime<FixedOffset>),
    /// Local date-time
    Naive(NaiveDateTime),
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTimeValue::Offset(dt) => write!(f, "{}", dt.to_rfc3339()),
            DateTimeValue::Naive(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

/// A decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent or nil
    Null,
    /// Text
    String(String),
    /// xs:boolean
    Boolean(bool),
    /// Integral number
    Integer(i64),
    /// Floating point number
    Double(f64),
    /// Exact decimal
    Decimal(Decimal),
    /// xs:date
    Date(NaiveDate),
    /// xs:dateTime
    DateTime(DateTimeValue),
    /// Geometry
    Geometry(Geometry),
    /// Bounding box
    Envelope(Envelope),
    /// Coordinate list
    Coordinates(CoordinateSequence),
    /// Nested entity
    Entity(Box<Entity>),
    /// Feature collection
    Collection(Box<EntityCollection>),
}

impl Value {
    /// Runtime binding of the value; `None` for null
    pub fn binding(&self) -> Option<Binding> {
        Some(match self {
            Value::Null => return None,
            Value::String(_) => Binding::String,
            Value::Boolean(_) => Binding::Boolean,
            Value::Integer(_) => Binding::Integer,
            Value::Double(_) => Binding::Double,
            Value::Decimal(_) => Binding::Decimal,
            Value::Date(_) => Binding::Date,
            Value::DateTime(_) => Binding::DateTime,
            Value::Geometry(g) => g.binding(),
            Value::Envelope(_) => Binding::Envelope,
            Value::Coordinates(_) => Binding::Coordinates,
            Value::Entity(_) => Binding::Entity,
            Value::Collection(_) => Binding::Collection,
        })
    }

    /// Short description of the value kind for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.binding().map_or("null", Binding::name)
    }

    /// Whether this is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric value as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Decimal(d) => d.to_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Geometry value
    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Nested entity
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Bounding box of geometry-bearing values
    pub fn envelope(&self) -> Option<Envelope> {
        match self {
            Value::Geometry(g) => g.envelope(),
            Value::Envelope(e) => Some(e.clone()),
            Value::Entity(e) => e.bounds(),
            Value::Collection(c) => c.bounds(),
            _ => None,
        }
    }

    /// Parse element text with a simple binding.
    ///
    /// Blank text is null for every binding except strings.
    pub fn parse_simple(text: &str, binding: Binding) -> Result<Value, DecodeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() && binding != Binding::String {
            return Ok(Value::Null);
        }
        let invalid = || {
            DecodeError::new(format!("Invalid {} value", binding.name().to_lowercase()))
                .with_instance(trimmed)
        };

        Ok(match binding {
            Binding::String | Binding::Object => Value::String(text.to_string()),
            Binding::Boolean => match trimmed {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            Binding::Integer => Value::Integer(trimmed.parse().map_err(|_| invalid())?),
            Binding::Double => Value::Double(parse_double(trimmed).ok_or_else(invalid)?),
            Binding::Decimal => Value::Decimal(Decimal::from_str(trimmed).map_err(|_| invalid())?),
            Binding::Number => match trimmed.parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Double(parse_double(trimmed).ok_or_else(invalid)?),
            },
            Binding::Date => Value::Date(parse_date(trimmed).ok_or_else(invalid)?),
            Binding::DateTime => Value::DateTime(parse_date_time(trimmed).ok_or_else(invalid)?),
            Binding::Coordinates => Value::Coordinates(coordinates::parse_coordinates(trimmed)?),
            other => {
                return Err(DecodeError::new(format!(
                    "{} values cannot be parsed from text",
                    other
                ))
                .with_instance(trimmed))
            }
        })
    }

    /// Text form of simple values, as written by the encoder
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Double(d) => Some(format_double(*d)),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Some(dt.to_string()),
            Value::Coordinates(c) => Some(coordinates::format_coordinates(c)),
            _ => None,
        }
    }

    /// JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => json!(s),
            Value::Boolean(b) => json!(b),
            Value::Integer(i) => json!(i),
            Value::Double(d) => json!(d),
            Value::Decimal(d) => json!(d.to_string()),
            Value::Date(_) | Value::DateTime(_) => json!(self.to_text()),
            Value::Geometry(g) => g.to_json(),
            Value::Envelope(e) => e.to_json(),
            Value::Coordinates(c) => json!(c),
            Value::Entity(e) => e.to_json(),
            Value::Collection(c) => c.to_json(),
        }
    }
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        value.to_string()
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    // xs:date may carry a zone designator, which a calendar date ignores
    let date_part = text
        .strip_suffix('Z')
        .unwrap_or(text)
        .get(..10)
        .unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_date_time(text: &str) -> Option<DateTimeValue> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(DateTimeValue::Offset(dt));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(DateTimeValue::Naive)
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Self {
        Value::Geometry(geometry)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::Entity(Box::new(entity))
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_values() {
        assert_eq!(
            Value::parse_simple(" 42 ", Binding::Integer).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            Value::parse_simple("1", Binding::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Value::parse_simple("2.5", Binding::Double).unwrap(),
            Value::Double(2.5)
        );
        assert_eq!(
            Value::parse_simple("-INF", Binding::Double).unwrap(),
            Value::Double(f64::NEG_INFINITY)
        );
        assert_eq!(
            Value::parse_simple("10.10", Binding::Decimal).unwrap(),
            Value::Decimal(Decimal::from_str("10.10").unwrap())
        );
        assert_eq!(
            Value::parse_simple("7", Binding::Number).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            Value::parse_simple("7.5", Binding::Number).unwrap(),
            Value::Double(7.5)
        );
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(
            Value::parse_simple("2024-02-29", Binding::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(matches!(
            Value::parse_simple("2024-02-29Z", Binding::Date).unwrap(),
            Value::Date(_)
        ));
        assert!(matches!(
            Value::parse_simple("2024-02-29T10:00:00Z", Binding::DateTime).unwrap(),
            Value::DateTime(DateTimeValue::Offset(_))
        ));
        assert!(matches!(
            Value::parse_simple("2024-02-29T10:00:00", Binding::DateTime).unwrap(),
            Value::DateTime(DateTimeValue::Naive(_))
        ));
    }

    #[test]
    fn test_blank_text() {
        assert_eq!(Value::parse_simple("  ", Binding::Integer).unwrap(), Value::Null);
        assert_eq!(
            Value::parse_simple("", Binding::String).unwrap(),
            Value::String(String::new())
        );
    }

    #[test]
    fn test_invalid_simple_values() {
        let err = Value::parse_simple("abc", Binding::Integer).unwrap_err();
        assert_eq!(err.instance.as_deref(), Some("abc"));
        assert!(Value::parse_simple("yes", Binding::Boolean).is_err());
        assert!(Value::parse_simple("2024-13-01", Binding::Date).is_err());
        assert!(Value::parse_simple("1,2", Binding::Point).is_err());
    }

    #[test]
    fn test_bindings() {
        assert_eq!(Value::Null.binding(), None);
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from("x").binding(), Some(Binding::String));
        assert_eq!(
            Value::from(Geometry::point(0.0, 0.0)).binding(),
            Some(Binding::Point)
        );
    }

    #[test]
    fn test_text_round_trip() {
        for (text, binding) in [
            ("true", Binding::Boolean),
            ("-12", Binding::Integer),
            ("0.1", Binding::Double),
            ("3.140", Binding::Decimal),
            ("1999-12-31", Binding::Date),
        ] {
            let value = Value::parse_simple(text, binding).unwrap();
            assert_eq!(value.to_text().as_deref(), Some(text));
        }
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Integer(3).to_json(), json!(3));
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        assert_eq!(Value::from("a").to_json(), json!("a"));
    }
}
