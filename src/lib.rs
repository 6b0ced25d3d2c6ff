//! # gmlschema
//!
//! Schema-driven decoding and encoding of GML 2 feature documents.
//!
//! An application schema (XSD) is loaded into a [`SchemaRegistry`] that
//! already knows the GML 2 feature and geometry model. From it the library
//! infers an [`EntitySchema`] per feature type, decodes instance documents
//! into [`Entity`] values and encodes entities back to XML.
//!
//! ## Features
//!
//! - XSD loading: global and local elements, named and inline complex types,
//!   extension / restriction, sequence / choice / all, named groups
//! - Type resolution with choice merging over a closed binding lattice
//! - GML 2 geometry codec (coordinates, coord, Box, polygons with holes,
//!   aggregates) with `srsName` hints
//! - Streaming: root-level features handed over through a bounded ring
//!   buffer from a producer thread
//! - Encoding with `quick-xml`
//!
//! ## Example
//!
//! ```rust,ignore
//! use gmlschema::{Decoder, FeatureReader, SchemaRegistry, StreamConfig};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(SchemaRegistry::from_xsd_file("roads.xsd")?);
//! let decoder = Decoder::new(registry);
//!
//! let reader = FeatureReader::open(decoder, "roads.gml", &StreamConfig::default())?;
//! for road in reader {
//!     println!("{}", road?.to_json());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod namespaces;
pub mod config;

// Parsing
pub mod events;
pub mod documents;

// Schema model and inference
pub mod schema;
pub mod binding;
pub mod resolve;

// Values
pub mod value;
pub mod geometry;
pub mod entity;

// Decoding and encoding
pub mod assembler;
pub mod decoder;
pub mod stream;
pub mod encoder;

// Re-exports for convenience
pub use binding::Binding;
pub use config::{DecodeHints, StreamConfig};
pub use decoder::{Decoder, EntitySink};
pub use encoder::Encoder;
pub use entity::{ChoiceBinding, Entity, EntityBuilder, EntityCollection, EntitySchema, FieldDescriptor};
pub use error::{DecodeError, Error, Result, StreamError};
pub use geometry::{CrsHint, Envelope, Geometry, GeometryKind};
pub use namespaces::QName;
pub use schema::{SchemaLoader, SchemaRegistry};
pub use stream::{FeatureReader, RingBuffer, StreamState};
pub use value::Value;

/// Version of the gmlschema library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
