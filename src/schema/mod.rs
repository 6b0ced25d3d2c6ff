//! Schema model
//!
//! Declarative description of element content: grouping nodes, element and
//! type declarations, and the [`SchemaRegistry`] holding the global
//! components together with the built-in GML 2 model.

pub mod elements;
pub mod gml;
pub mod loader;
pub mod nodes;
pub mod particles;
pub mod registry;
pub mod types;

pub use elements::{ElementDecl, ElementForm, TypeRef};
pub use loader::SchemaLoader;
pub use nodes::{ElementParticle, ModelType, NodeKind, SchemaNode};
pub use particles::{parse_occurs, Occurs};
pub use registry::{SchemaRegistry, MAX_DERIVATION_DEPTH};
pub use types::{AttributeDecl, BaseType, Derivation, TypeDecl, ValueKind};
