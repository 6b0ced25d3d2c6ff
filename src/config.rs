//! Decoding configuration
//!
//! [`StreamConfig`] sizes a streaming session (buffer capacity, liveness
//! timeout) and can be read from JSON. [`DecodeHints`] carries the
//! per-session collaborators: an external stop callback, a pre-built
//! entity schema and the name of the element to stream.

use crate::entity::EntitySchema;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default ring buffer capacity
pub const DEFAULT_CAPACITY: usize = 100;
/// Default liveness timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Smallest usable capacity; the producer resumes only below `capacity - 1`
pub const MIN_CAPACITY: usize = 2;

/// Streaming session configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    /// Ring buffer capacity
    capacity: usize,
    /// Liveness timeout in milliseconds
    timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl StreamConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from JSON, e.g. `{"capacity": 50, "timeoutMs": 2000}`
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StreamConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the configured values
    pub fn validate(&self) -> Result<()> {
        if self.capacity < MIN_CAPACITY {
            return Err(Error::Config(format!(
                "capacity must be at least {}, got {}",
                MIN_CAPACITY, self.capacity
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the liveness timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the buffer capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the liveness timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// External stop request, consulted before each element
pub type StopCallback = Arc<dyn Fn() -> bool + Send + Sync>;

/// Per-session decoding hints
#[derive(Clone, Default)]
pub struct DecodeHints {
    /// Ends the parse early when it returns `true`
    pub stop: Option<StopCallback>,
    /// Schema used for streamed entities instead of the inferred one
    pub entity_schema: Option<Arc<EntitySchema>>,
    /// Element streamed as entities; root-level features when unset
    pub stream_element: Option<QName>,
}

impl DecodeHints {
    /// Empty hints
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stop callback
    pub fn with_stop(mut self, stop: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.stop = Some(Arc::new(stop));
        self
    }

    /// Set the entity schema
    pub fn with_entity_schema(mut self, schema: Arc<EntitySchema>) -> Self {
        self.entity_schema = Some(schema);
        self
    }

    /// Set the streamed element
    pub fn with_stream_element(mut self, name: QName) -> Self {
        self.stream_element = Some(name);
        self
    }

    /// Whether the stop callback asks to stop
    pub fn stop_requested(&self) -> bool {
        self.stop.as_ref().map_or(false, |stop| stop())
    }

    /// Whether an element is the one to stream.
    ///
    /// A hint without namespace matches by local name.
    pub fn is_stream_element(&self, name: &QName) -> Option<bool> {
        self.stream_element.as_ref().map(|hint| match hint.namespace() {
            Some(_) => hint == name,
            None => hint.local_name == name.local_name,
        })
    }
}

impl fmt::Debug for DecodeHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeHints")
            .field("stop", &self.stop.as_ref().map(|_| "<callback>"))
            .field("entity_schema", &self.entity_schema.as_ref().map(|s| s.name()))
            .field("stream_element", &self.stream_element)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.capacity(), 100);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = StreamConfig::from_json(r#"{"capacity": 8, "timeoutMs": 250}"#).unwrap();
        assert_eq!(config.capacity(), 8);
        assert_eq!(config.timeout(), Duration::from_millis(250));

        let partial = StreamConfig::from_json(r#"{"capacity": 3}"#).unwrap();
        assert_eq!(partial.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));

        assert!(matches!(
            StreamConfig::from_json("{not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_validation() {
        let err = StreamConfig::new().with_capacity(1).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(StreamConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(StreamConfig::from_json(r#"{"capacity": 0}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, r#"{"capacity": 16}"#).unwrap();
        assert_eq!(StreamConfig::from_file(&path).unwrap().capacity(), 16);
    }

    #[test]
    fn test_hints() {
        let flag = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&flag);
        let hints = DecodeHints::new()
            .with_stop(move || observed.load(Ordering::SeqCst))
            .with_stream_element(QName::local("Road"));

        assert!(!hints.stop_requested());
        flag.store(true, Ordering::SeqCst);
        assert!(hints.stop_requested());

        assert_eq!(
            hints.is_stream_element(&QName::namespaced("http://example.com", "Road")),
            Some(true)
        );
        assert_eq!(hints.is_stream_element(&QName::local("River")), Some(false));
        assert_eq!(DecodeHints::new().is_stream_element(&QName::local("Road")), None);
        assert!(format!("{:?}", hints).contains("<callback>"));
    }
}
