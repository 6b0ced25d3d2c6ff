//! Schema-driven decoding
//!
//! [`Decoder`] consumes parse events, looks up the declaration of every
//! element through the [`SchemaRegistry`] and builds a [`Value`] when the
//! element closes: simple text, coordinates, geometries, envelopes,
//! entities and feature collections.
//!
//! In streaming mode root-level features (no feature ancestor) are handed
//! to an [`EntitySink`] as soon as they are complete instead of being
//! collected into the document value.

use crate::assembler::{self, identifier};
use crate::config::DecodeHints;
use crate::entity::{Entity, EntityCollection, EntitySchema};
use crate::error::{Error, Result};
use crate::events::{self, Attributes, ContentHandler, ParseOutcome};
use crate::geometry::builder::{build_coord, build_envelope, build_geometry};
use crate::geometry::{CoordinateFormat, CrsHint};
use crate::namespaces::{NamespaceScopes, QName, XSI_NAMESPACE};
use crate::schema::{ElementDecl, SchemaRegistry, TypeDecl, ValueKind};
use crate::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Receiver of streamed entities
pub trait EntitySink {
    /// Schema of the streamed entities, announced before the first one
    fn announce(&mut self, schema: &Arc<EntitySchema>) -> Result<()>;

    /// One complete root-level entity
    fn accept(&mut self, entity: Entity) -> Result<()>;

    /// Whether the consumer has stopped the session
    fn is_stopped(&self) -> bool {
        false
    }
}

/// Decoder bound to a schema registry
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: Arc<SchemaRegistry>,
    hints: DecodeHints,
}

impl Decoder {
    /// Create a decoder over a registry
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            hints: DecodeHints::default(),
        }
    }

    /// Set the decoding hints
    pub fn with_hints(mut self, hints: DecodeHints) -> Self {
        self.hints = hints;
        self
    }

    /// Registry used for lookups
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Hints in effect
    pub fn hints(&self) -> &DecodeHints {
        &self.hints
    }

    /// Decode a whole document from a string
    pub fn decode_str(&self, xml: &str) -> Result<Value> {
        self.decode_reader(xml.as_bytes())
    }

    /// Decode a whole document file
    pub fn decode_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let file = File::open(path)?;
        self.decode_reader(BufReader::new(file))
    }

    /// Decode a whole document
    pub fn decode_reader<R: BufRead>(&self, source: R) -> Result<Value> {
        let mut handler = DecodeHandler::new(self, None);
        events::parse(source, &mut handler)?;
        Ok(handler.result.unwrap_or(Value::Null))
    }

    /// Decode a document, streaming root-level entities into `sink`
    pub fn decode_into<R: BufRead>(&self, source: R, sink: &mut dyn EntitySink) -> Result<ParseOutcome> {
        if let Some(schema) = &self.hints.entity_schema {
            sink.announce(schema)?;
        }
        let mut handler = DecodeHandler::new(self, Some(sink));
        events::parse(source, &mut handler)
    }
}

/// One open element
struct Frame {
    name: QName,
    decl: Option<Arc<ElementDecl>>,
    ty: Option<Arc<TypeDecl>>,
    kind: Option<ValueKind>,
    attributes: Attributes,
    text: String,
    children: Vec<(QName, Value)>,
    streamed: bool,
    nil: bool,
}

impl Frame {
    fn is_feature(&self) -> bool {
        self.kind == Some(ValueKind::Feature)
    }
}

struct DecodeHandler<'a> {
    decoder: &'a Decoder,
    sink: Option<&'a mut dyn EntitySink>,
    frames: Vec<Frame>,
    announced: bool,
    result: Option<Value>,
}

impl<'a> DecodeHandler<'a> {
    fn new(decoder: &'a Decoder, sink: Option<&'a mut dyn EntitySink>) -> Self {
        let announced = decoder.hints.entity_schema.is_some();
        Self {
            decoder,
            sink,
            frames: Vec::new(),
            announced,
            result: None,
        }
    }

    fn registry(&self) -> &SchemaRegistry {
        &self.decoder.registry
    }

    /// Declaration of an element: inside the parent's type first, then global
    fn lookup(&self, name: &QName) -> Option<Arc<ElementDecl>> {
        let registry = self.registry();
        self.frames
            .last()
            .and_then(|parent| parent.ty.as_ref())
            .and_then(|ty| registry.find_element_in_type(ty, &name.local_name))
            .map(|(decl, _)| decl)
            .or_else(|| registry.element(name).cloned())
    }

    fn path(&self, name: &QName) -> String {
        let mut path = String::new();
        for frame in &self.frames {
            path.push('/');
            path.push_str(&frame.name.local_name);
        }
        path.push('/');
        path.push_str(&name.local_name);
        path
    }

    fn should_stream(&self, name: &QName, kind: Option<ValueKind>) -> bool {
        if self.sink.is_none() || self.frames.iter().any(|f| f.streamed || f.is_feature()) {
            return false;
        }
        self.decoder
            .hints
            .is_stream_element(name)
            .unwrap_or(kind == Some(ValueKind::Feature))
    }

    fn schema_of(&self, frame: &Frame) -> Option<Arc<EntitySchema>> {
        if frame.streamed {
            if let Some(schema) = &self.decoder.hints.entity_schema {
                return Some(Arc::clone(schema));
            }
        }
        frame.decl.as_ref().map(|decl| self.registry().entity_schema(decl))
    }

    /// Build the value of a closed element
    fn finish(&self, frame: Frame) -> Result<Value> {
        if frame.nil {
            return Ok(Value::Null);
        }

        let srs = || {
            frame
                .attributes
                .get(&QName::local("srsName"))
                .and_then(|s| CrsHint::parse(s))
        };

        let value = match frame.kind {
            Some(ValueKind::Simple(binding)) => Value::parse_simple(&frame.text, binding)?,
            Some(ValueKind::Coordinates) => {
                let attr = |n: &str| frame.attributes.get(&QName::local(n)).map(String::as_str);
                let format = CoordinateFormat::from_attributes(attr("decimal"), attr("cs"), attr("ts"));
                Value::Coordinates(format.parse(&frame.text)?)
            }
            Some(ValueKind::Coord) => Value::Coordinates(build_coord(frame.children)?),
            Some(ValueKind::Geometry(kind)) => {
                let srs = srs();
                Value::Geometry(build_geometry(kind, frame.children, srs)?)
            }
            Some(ValueKind::Box) => {
                let srs = srs();
                Value::Envelope(build_envelope(frame.children, srs)?)
            }
            Some(ValueKind::Property) => frame
                .children
                .into_iter()
                .filter(|(name, _)| *name != QName::gml("null"))
                .map(|(_, value)| value)
                .find(|value| !value.is_null())
                .unwrap_or(Value::Null),
            Some(ValueKind::Feature) => match self.schema_of(&frame) {
                Some(schema) => {
                    let entity = assembler::assemble(schema, frame.children, &frame.attributes)?;
                    Value::Entity(Box::new(entity))
                }
                None => unknown_value(frame),
            },
            Some(ValueKind::Complex) => match self.schema_of(&frame) {
                Some(schema) if schema.len() > 1 || frame.streamed => {
                    let entity = assembler::assemble(schema, frame.children, &frame.attributes)?;
                    Value::Entity(Box::new(entity))
                }
                Some(schema) if schema.len() == 1 => frame
                    .children
                    .into_iter()
                    .map(|(_, value)| value)
                    .next()
                    .unwrap_or(Value::Null),
                _ => text_value(&frame.text),
            },
            Some(ValueKind::FeatureCollection) => {
                let mut collection = EntityCollection::new();
                collection.id = identifier(&frame.attributes);
                for (name, value) in frame.children {
                    match value {
                        Value::Envelope(envelope) if name.local_name == "boundedBy" => {
                            collection.bounded_by = Some(envelope)
                        }
                        Value::Entity(entity) => collection.push(*entity),
                        Value::Null => {}
                        other => log::warn!(
                            "Dropping {} value of {} in feature collection",
                            other.type_name(),
                            name
                        ),
                    }
                }
                Value::Collection(Box::new(collection))
            }
            None => unknown_value(frame),
        };
        Ok(value)
    }
}

fn text_value(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

/// Value of an element without declaration
fn unknown_value(frame: Frame) -> Value {
    if frame.children.is_empty() {
        return text_value(&frame.text);
    }
    if frame.children.iter().all(|(_, v)| matches!(v, Value::Entity(_))) {
        let mut collection = EntityCollection::new();
        collection.id = identifier(&frame.attributes);
        for (_, value) in frame.children {
            if let Value::Entity(entity) = value {
                collection.push(*entity);
            }
        }
        return Value::Collection(Box::new(collection));
    }
    if frame.children.len() == 1 {
        return frame
            .children
            .into_iter()
            .next()
            .map_or(Value::Null, |(_, value)| value);
    }
    log::warn!(
        "Dropping content of undeclared element {} ({} children)",
        frame.name,
        frame.children.len()
    );
    Value::Null
}

/// Attach the element path to decode errors raised without one
fn at_path(err: Error, path: &str) -> Error {
    match err {
        Error::Decode(e) if !e.path.as_deref().map_or(false, |p| p.starts_with('/')) => {
            Error::Decode(e.with_path(path))
        }
        other => other,
    }
}

impl ContentHandler for DecodeHandler<'_> {
    fn start_element(
        &mut self,
        name: &QName,
        attributes: &Attributes,
        _scopes: &NamespaceScopes,
    ) -> Result<()> {
        let decl = self.lookup(name);
        if decl.is_none() {
            log::debug!("No declaration for element {}", name);
        }
        let ty = decl.as_ref().and_then(|d| self.registry().type_of(d));
        let kind = ty.as_ref().map(|t| self.registry().value_kind(t));
        let nil = attributes
            .get(&QName::namespaced(XSI_NAMESPACE, "nil"))
            .map_or(false, |v| v.trim() == "true" || v.trim() == "1");

        let streamed = self.should_stream(name, kind);
        let frame = Frame {
            name: name.clone(),
            decl,
            ty,
            kind,
            attributes: attributes.clone(),
            text: String::new(),
            children: Vec::new(),
            streamed,
            nil,
        };

        if streamed && !self.announced {
            if let Some(schema) = self.schema_of(&frame) {
                if let Some(sink) = self.sink.as_mut() {
                    sink.announce(&schema)?;
                }
                self.announced = true;
            }
        }

        self.frames.push(frame);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if let Some(frame) = self.frames.last_mut() {
            frame.text.push_str(text);
        }
        Ok(())
    }

    fn end_element(&mut self, _name: &QName) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        let name = frame.name.clone();
        let streamed = frame.streamed;
        let path = self.path(&name);

        let value = self.finish(frame).map_err(|e| at_path(e, &path))?;

        if streamed {
            if let Value::Entity(entity) = value {
                if let Some(sink) = self.sink.as_mut() {
                    sink.accept(*entity)?;
                }
            } else {
                log::warn!("Streamed element {} did not decode to an entity", name);
            }
            return Ok(());
        }

        match self.frames.last_mut() {
            Some(parent) => parent.children.push((name, value)),
            None => self.result = Some(value),
        }
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.sink.as_ref().map_or(false, |s| s.is_stopped()) || self.decoder.hints.stop_requested()
    }
}
