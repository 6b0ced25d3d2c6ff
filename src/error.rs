//! Error types for gmlschema
//!
//! This module defines all error types used throughout the library:
//! decoding failures, schema violations, streaming failures and the
//! plumbing errors (XML, I/O, configuration) around them.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using gmlschema Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gmlschema operations
#[derive(Error, Debug)]
pub enum Error {
    /// A value cannot be assigned to any field of the entity schema
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Malformed coordinates, missing required child, too few members
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Failure of a streaming session
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Schema loading or lookup error
    #[error("schema error: {0}")]
    Schema(String),

    /// Encoding error (entity to XML conversion)
    #[error("encoding error: {0}")]
    Encode(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Decoding error with element context
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// Error message
    pub message: String,
    /// Path of the element being decoded
    pub path: Option<String>,
    /// Offending text, if any
    pub instance: Option<String>,
}

impl DecodeError {
    /// Create a new decode error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            instance: None,
        }
    }

    /// Set the path of the element that failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the offending text
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref path) = self.path {
            write!(f, " (at {})", path)?;
        }

        if let Some(ref instance) = self.instance {
            write!(f, ": '{}'", instance)?;
        }

        Ok(())
    }
}

impl std::error::Error for DecodeError {}

/// Failures of a streaming session.
///
/// Kept `Clone` so the buffer can report the same failure to every later
/// consumer call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// No insert from the producer within the liveness timeout
    #[error("no entity produced within {0:?}")]
    Timeout(Duration),

    /// Producer inserted into a full buffer
    #[error("buffer overflow (capacity {0})")]
    BufferOverflow(usize),

    /// The session was closed
    #[error("stream cancelled")]
    Cancelled,

    /// The producer failed while decoding
    #[error("producer aborted: {0}")]
    Aborted(String),

    /// `next` called with nothing left to pop
    #[error("no more entities")]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::new("could not parse ordinate")
            .with_path("/roads/road/geom/coordinates")
            .with_instance("1,x");

        let msg = format!("{}", err);
        assert!(msg.contains("could not parse ordinate"));
        assert!(msg.contains("/roads/road/geom/coordinates"));
        assert!(msg.contains("'1,x'"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = DecodeError::new("test").into();
        assert!(matches!(err, Error::Decode(_)));

        let err: Error = StreamError::Cancelled.into();
        assert!(matches!(err, Error::Stream(StreamError::Cancelled)));
    }

    #[test]
    fn test_stream_error_display() {
        let err = StreamError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
        assert_eq!(StreamError::BufferOverflow(8).to_string(), "buffer overflow (capacity 8)");
    }
}
