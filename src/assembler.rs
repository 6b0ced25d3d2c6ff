//! Entity assembly
//!
//! Matches the parsed child values of one element to the fields of its
//! [`EntitySchema`]. For every `(name, value)` pair, in order:
//!
//! 1. name match: the first field whose name (or choice alternative) equals
//!    the child's local name; the value must be assignable
//! 2. positional match: the field at the pair's index, if still empty and
//!    binding-compatible
//! 3. the first still-empty, binding-compatible field
//! 4. otherwise the value is dropped with a warning
//!
//! Fields left unfilled become null when nillable, take their default
//! otherwise, and are an error when they have neither.

use crate::entity::{Entity, EntityBuilder, EntitySchema};
use crate::error::Result;
use crate::events::Attributes;
use crate::namespaces::{QName, GML_NAMESPACE};
use crate::schema::gml;
use crate::value::Value;
use std::sync::Arc;

/// Identifier attribute of a feature
pub const FID_ATTRIBUTE: &str = "fid";

/// Identifier of an element: `fid` (unqualified or GML), then `gml:id`
pub fn identifier(attributes: &Attributes) -> Option<String> {
    attributes
        .get(&QName::local(FID_ATTRIBUTE))
        .or_else(|| attributes.get(&QName::gml(FID_ATTRIBUTE)))
        .or_else(|| attributes.get(&QName::namespaced(GML_NAMESPACE, "id")))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Build one entity from ordered child values
pub fn assemble(
    schema: Arc<EntitySchema>,
    children: Vec<(QName, Value)>,
    attributes: &Attributes,
) -> Result<Entity> {
    let mut builder = EntityBuilder::new(Arc::clone(&schema));
    builder.set_id(identifier(attributes));

    let mut position = 0;
    for (name, value) in children {
        let local = name.local_name.as_str();

        if let Some(index) = schema.index_of(local) {
            builder.set_at(index, value)?;
            position += 1;
            continue;
        }
        if gml::is_bookkeeping(&name) {
            log::debug!("Skipping {} of {}", name, schema.name());
            continue;
        }

        let index = position;
        position += 1;
        if value.is_null() {
            log::debug!("Dropping null {} of {}", name, schema.name());
            continue;
        }

        let positional = schema
            .field(index)
            .filter(|field| !builder.is_filled(index) && field.accepts(&value))
            .map(|_| index);
        let slot = positional.or_else(|| {
            schema
                .fields()
                .iter()
                .enumerate()
                .find(|(i, field)| !builder.is_filled(*i) && field.accepts(&value))
                .map(|(i, _)| i)
        });

        match slot {
            Some(i) => {
                log::trace!(
                    "Assigned unmatched {} to field '{}' of {}",
                    name,
                    schema.fields()[i].name,
                    schema.name()
                );
                builder.set_at(i, value)?;
            }
            None => log::warn!(
                "Dropping {} value of unmatched element {} in {}",
                value.type_name(),
                name,
                schema.name()
            ),
        }
    }

    builder.build()
}
