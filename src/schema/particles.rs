//! Occurrence bounds
//!
//! Type resolution only asks whether a particle may be absent. The upper
//! bound is still validated against the lower one when loading.

use crate::error::{Error, Result};
use serde::Serialize;

/// `minOccurs` / `maxOccurs` of a particle; `max` is None when unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurs {
    /// Lower bound
    pub min: u32,
    /// Upper bound
    pub max: Option<u32>,
}

impl Occurs {
    /// Explicit bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Exactly once, the XSD default
    pub fn once() -> Self {
        Self::new(1, Some(1))
    }

    /// At most once
    pub fn optional() -> Self {
        Self::new(0, Some(1))
    }

    /// Any number of times
    pub fn zero_or_more() -> Self {
        Self::new(0, None)
    }

    /// At least once
    pub fn one_or_more() -> Self {
        Self::new(1, None)
    }

    /// Whether the particle may be left out
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Read the `minOccurs` / `maxOccurs` attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let min = match min_occurs.map(str::trim) {
        Some(text) => text
            .parse::<u32>()
            .map_err(|_| Error::Schema(format!("Invalid minOccurs '{}'", text)))?,
        None => 1,
    };
    let max = match max_occurs.map(str::trim) {
        Some("unbounded") => None,
        Some(text) => Some(
            text.parse::<u32>()
                .map_err(|_| Error::Schema(format!("Invalid maxOccurs '{}'", text)))?,
        ),
        None => Some(1),
    };

    if max.map_or(false, |max| max < min) {
        return Err(Error::Schema(format!(
            "minOccurs {} exceeds maxOccurs {}",
            min,
            max.unwrap_or_default()
        )));
    }
    Ok(Occurs::new(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(Occurs::default(), Occurs::new(1, Some(1)));
        assert!(Occurs::optional().is_emptiable());
        assert!(Occurs::zero_or_more().is_emptiable());
        assert!(!Occurs::one_or_more().is_emptiable());
    }

    #[test]
    fn test_parse_occurs() {
        assert_eq!(parse_occurs(None, None).unwrap(), Occurs::once());
        assert_eq!(
            parse_occurs(Some("0"), Some("unbounded")).unwrap(),
            Occurs::zero_or_more()
        );
        assert_eq!(parse_occurs(Some(" 2 "), Some("4")).unwrap(), Occurs::new(2, Some(4)));
    }

    #[test]
    fn test_parse_occurs_invalid() {
        assert!(parse_occurs(Some("-1"), None).is_err());
        assert!(parse_occurs(Some("3"), Some("2")).is_err());
        assert!(parse_occurs(Some("2"), None).is_err());
        assert!(parse_occurs(None, Some("many")).is_err());
    }
}
