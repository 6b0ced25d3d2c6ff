//! Coordinate text codec
//!
//! `gml:coordinates` text is a list of tuples. Tuples are separated by `ts`
//! (whitespace by default), ordinates by `cs` (`,` by default) and `decimal`
//! marks the decimal point (`.` by default). Encoding always uses the
//! canonical `.` / `,` / space triple.

use crate::error::DecodeError;
use serde::Serialize;

/// Canonical decimal marker
pub const DEFAULT_DECIMAL: &str = ".";
/// Canonical ordinate separator
pub const DEFAULT_CS: &str = ",";
/// Canonical tuple separator
pub const DEFAULT_TS: &str = " ";

/// One position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    /// Easting / longitude
    pub x: f64,
    /// Northing / latitude
    pub y: f64,
    /// Height, when present
    pub z: Option<f64>,
}

impl Coordinate {
    /// Planar coordinate
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Coordinate with height
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Whether two coordinates share the same planar position
    pub fn same_position(&self, other: &Coordinate) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// Ordered list of positions
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct CoordinateSequence(Vec<Coordinate>);

impl CoordinateSequence {
    /// Empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence has no positions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a position
    pub fn push(&mut self, coordinate: Coordinate) {
        self.0.push(coordinate);
    }

    /// Append every position of another sequence
    pub fn extend(&mut self, other: CoordinateSequence) {
        self.0.extend(other.0);
    }

    /// Iterate over positions
    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.0.iter()
    }

    /// Positions as a slice
    pub fn as_slice(&self) -> &[Coordinate] {
        &self.0
    }

    /// First position
    pub fn first(&self) -> Option<&Coordinate> {
        self.0.first()
    }

    /// Whether first and last positions coincide
    pub fn is_closed(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => first.same_position(last),
            _ => false,
        }
    }

    /// Take the positions out
    pub fn into_inner(self) -> Vec<Coordinate> {
        self.0
    }
}

impl From<Vec<Coordinate>> for CoordinateSequence {
    fn from(coordinates: Vec<Coordinate>) -> Self {
        Self(coordinates)
    }
}

impl FromIterator<Coordinate> for CoordinateSequence {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Separator configuration of `gml:coordinates`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateFormat {
    /// Decimal point marker
    pub decimal: String,
    /// Ordinate separator
    pub cs: String,
    /// Tuple separator (None = any whitespace)
    pub ts: Option<String>,
}

impl Default for CoordinateFormat {
    fn default() -> Self {
        Self {
            decimal: DEFAULT_DECIMAL.to_string(),
            cs: DEFAULT_CS.to_string(),
            ts: None,
        }
    }
}

impl CoordinateFormat {
    /// Canonical output format
    pub fn canonical() -> Self {
        Self {
            decimal: DEFAULT_DECIMAL.to_string(),
            cs: DEFAULT_CS.to_string(),
            ts: Some(DEFAULT_TS.to_string()),
        }
    }

    /// Build from the `decimal`, `cs` and `ts` attributes; empty values fall back to defaults
    pub fn from_attributes(decimal: Option<&str>, cs: Option<&str>, ts: Option<&str>) -> Self {
        let mut format = Self::default();
        if let Some(d) = decimal.filter(|d| !d.is_empty()) {
            format.decimal = d.to_string();
        }
        if let Some(c) = cs.filter(|c| !c.is_empty()) {
            format.cs = c.to_string();
        }
        // A whitespace tuple separator means "any whitespace"
        format.ts = ts
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.to_string());
        format
    }

    /// Set the decimal marker
    pub fn with_decimal(mut self, decimal: impl Into<String>) -> Self {
        self.decimal = decimal.into();
        self
    }

    /// Set the ordinate separator
    pub fn with_cs(mut self, cs: impl Into<String>) -> Self {
        self.cs = cs.into();
        self
    }

    /// Set the tuple separator
    pub fn with_ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }

    /// Decode coordinate text.
    ///
    /// One ordinate per tuple sets y to 0, three keep z and longer tuples
    /// keep only the first three.
    pub fn parse(&self, text: &str) -> Result<CoordinateSequence, DecodeError> {
        let tuples: Vec<&str> = match &self.ts {
            None => text.split_whitespace().collect(),
            Some(ts) => text
                .split(ts.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect(),
        };

        let mut sequence = CoordinateSequence::new();
        for tuple in tuples {
            let ordinates = tuple
                .split(self.cs.as_str())
                .map(|o| self.parse_ordinate(o.trim()))
                .collect::<Result<Vec<f64>, DecodeError>>()?;

            let coordinate = match ordinates.as_slice() {
                [x] => Coordinate::new(*x, 0.0),
                [x, y] => Coordinate::new(*x, *y),
                [x, y, z, ..] => Coordinate::xyz(*x, *y, *z),
                [] => return Err(DecodeError::new("Empty coordinate tuple").with_instance(tuple)),
            };
            sequence.push(coordinate);
        }

        Ok(sequence)
    }

    fn parse_ordinate(&self, text: &str) -> Result<f64, DecodeError> {
        let normalized = if self.decimal == DEFAULT_DECIMAL {
            text.to_string()
        } else {
            text.replace(self.decimal.as_str(), ".")
        };
        normalized
            .parse::<f64>()
            .map_err(|_| DecodeError::new("Could not parse ordinate").with_instance(text))
    }

    /// Encode a sequence with this format's separators
    pub fn format(&self, sequence: &CoordinateSequence) -> String {
        let ts = self.ts.as_deref().unwrap_or(DEFAULT_TS);
        sequence
            .iter()
            .map(|c| {
                let mut ordinates = vec![self.format_ordinate(c.x), self.format_ordinate(c.y)];
                if let Some(z) = c.z {
                    ordinates.push(self.format_ordinate(z));
                }
                ordinates.join(&self.cs)
            })
            .collect::<Vec<_>>()
            .join(ts)
    }

    fn format_ordinate(&self, value: f64) -> String {
        // Display gives the shortest text that parses back to the same f64
        let text = value.to_string();
        if self.decimal == DEFAULT_DECIMAL {
            text
        } else {
            text.replace('.', &self.decimal)
        }
    }
}

/// Decode with default separators
pub fn parse_coordinates(text: &str) -> Result<CoordinateSequence, DecodeError> {
    CoordinateFormat::default().parse(text)
}

/// Encode with the canonical separators
pub fn format_coordinates(sequence: &CoordinateSequence) -> String {
    CoordinateFormat::canonical().format(sequence)
}
