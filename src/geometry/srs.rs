//! Coordinate reference hints
//!
//! `srsName` attributes are kept as optional, non-authoritative metadata on
//! geometries. EPSG codes are recognized in the usual textual forms; any
//! other non-empty text is preserved verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static EPSG_SHORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^EPSG:(\S*)$").unwrap());

static EPSG_XML: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://www\.opengis\.net/gml/srs/epsg\.xml#(\S*)$").unwrap()
});

static EPSG_URN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^urn:(?:x-)?ogc:def:crs:EPSG:(?:[^:]*:)?(\S*)$").unwrap()
});

static EPSG_HTTP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://www\.opengis\.net/def/crs/EPSG/[^/]*/(\S*)$").unwrap()
});

/// Parsed `srsName`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CrsHint {
    /// EPSG code
    Epsg(u32),
    /// Unrecognized reference system name, kept verbatim
    Text(String),
}

impl CrsHint {
    /// Parse an `srsName` value.
    ///
    /// Returns `None` for blank values and for EPSG forms whose code is not
    /// a number; both are logged.
    pub fn parse(srs_name: &str) -> Option<CrsHint> {
        let text = srs_name.trim();
        if text.is_empty() {
            log::warn!("Ignoring blank srsName");
            return None;
        }

        let code = [&EPSG_SHORT, &EPSG_XML, &EPSG_URN, &EPSG_HTTP]
            .iter()
            .find_map(|re| re.captures(text))
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()).to_string());

        match code {
            Some(code) => match code.parse::<u32>() {
                Ok(n) => Some(CrsHint::Epsg(n)),
                Err(_) => {
                    log::warn!("Ignoring srsName '{}': malformed EPSG code", text);
                    None
                }
            },
            None => Some(CrsHint::Text(text.to_string())),
        }
    }

    /// EPSG code, if this hint carries one
    pub fn epsg(&self) -> Option<u32> {
        match self {
            CrsHint::Epsg(code) => Some(*code),
            CrsHint::Text(_) => None,
        }
    }

    /// Value written back as `srsName`
    pub fn to_srs_name(&self) -> String {
        match self {
            CrsHint::Epsg(code) => format!("EPSG:{}", code),
            CrsHint::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for CrsHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_srs_name())
    }
}
