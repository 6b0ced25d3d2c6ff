//! Entities and their schemas
//!
//! An [`EntitySchema`] is the ordered field list inferred for one element;
//! an [`Entity`] holds exactly one value per field. Entities are only built
//! through [`EntityBuilder`], which enforces field bindings and fills
//! unset fields from nillability and defaults.

use crate::binding::{common_of, Binding};
use crate::error::{DecodeError, Error, Result};
use crate::geometry::{self, Envelope, Geometry};
use crate::namespaces::QName;
use crate::value::Value;
use serde_json::json;
use std::sync::Arc;

/// Field type synthesized from a choice with several alternatives
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceBinding {
    alternatives: Vec<(String, Binding)>,
    binding: Binding,
}

impl ChoiceBinding {
    /// Build from the alternatives' names and bindings, resolving the common binding
    pub fn new(alternatives: Vec<(String, Binding)>) -> Self {
        let binding = common_of(alternatives.iter().map(|(_, b)| *b)).unwrap_or(Binding::Object);
        Self {
            alternatives,
            binding,
        }
    }

    /// Resolved common binding
    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Alternatives in declaration order
    pub fn alternatives(&self) -> &[(String, Binding)] {
        &self.alternatives
    }

    /// Whether an instance element name is one of the alternatives
    pub fn has_alternative(&self, name: &str) -> bool {
        self.alternatives.iter().any(|(n, _)| n == name)
    }

    /// Whether [`ChoiceBinding::coerce`] would accept the value
    pub fn can_coerce(&self, value: &Value) -> bool {
        let Some(binding) = value.binding() else {
            return true;
        };
        if self.binding.is_assignable_from(binding) {
            return true;
        }
        if !binding.is_geometry() {
            return false;
        }
        binding
            .multi_counterpart()
            .map_or(false, |multi| self.binding.is_assignable_from(multi))
            || self.binding == Binding::GeometryCollection
    }

    /// Normalize a candidate value to the common binding.
    ///
    /// Single geometries are wrapped into their multi counterpart or into a
    /// geometry collection when the common binding requires it.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if !self.can_coerce(&value) {
            return None;
        }
        match value {
            Value::Geometry(g) if !self.binding.is_assignable_from(g.binding()) => {
                let fits_multi = g
                    .binding()
                    .multi_counterpart()
                    .map_or(false, |multi| self.binding.is_assignable_from(multi));
                if fits_multi {
                    g.into_multi().map(Value::Geometry)
                } else {
                    Some(Value::Geometry(g.into_collection()))
                }
            }
            other => Some(other),
        }
    }
}

/// One field of an entity schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name (local name of the child element)
    pub name: String,
    /// Value binding
    pub binding: Binding,
    /// Choice information when the field merges several alternatives
    pub choice: Option<ChoiceBinding>,
    /// Whether the field may stay null
    pub nillable: bool,
    /// Value used when the field is absent
    pub default_value: Option<Value>,
}

impl FieldDescriptor {
    /// Create a required field
    pub fn new(name: impl Into<String>, binding: Binding) -> Self {
        Self {
            name: name.into(),
            binding,
            choice: None,
            nillable: false,
            default_value: None,
        }
    }

    /// Create a choice field; the binding is the choice's common binding
    pub fn choice(name: impl Into<String>, choice: ChoiceBinding) -> Self {
        let binding = choice.binding();
        Self {
            choice: Some(choice),
            ..Self::new(name, binding)
        }
    }

    /// Set nillability
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default_value = default;
        self
    }

    /// Whether an element with this local name belongs in this field
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name
            || self
                .choice
                .as_ref()
                .map_or(false, |c| c.has_alternative(name))
    }

    /// Whether a non-null value can be stored in this field
    pub fn accepts(&self, value: &Value) -> bool {
        match value.binding() {
            None => self.nillable,
            Some(binding) => {
                self.binding.is_assignable_from(binding)
                    || self.choice.as_ref().map_or(false, |c| c.can_coerce(value))
            }
        }
    }

    /// Convert a value for storage, `None` when it is not assignable
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match value.binding() {
            None => Some(Value::Null),
            Some(binding) if self.binding.is_assignable_from(binding) => Some(value),
            Some(_) => self.choice.as_ref().and_then(|c| c.coerce(value)),
        }
    }
}

/// Ordered field list of one element
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    name: QName,
    fields: Vec<FieldDescriptor>,
    default_geometry: Option<usize>,
}

impl EntitySchema {
    /// Create a schema; the default geometry is the first geometry field
    /// that is not the bounding extent
    pub fn new(name: QName, fields: Vec<FieldDescriptor>) -> Self {
        let default_geometry = fields
            .iter()
            .position(|f| f.binding.is_geometry() && f.name != "boundedBy");
        Self {
            name,
            fields,
            default_geometry,
        }
    }

    /// Element name the schema was inferred for
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Fields in order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at an index
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Index of the first field matching an element name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.matches_name(name))
    }

    /// Index of the default geometry field
    pub fn default_geometry_index(&self) -> Option<usize> {
        self.default_geometry
    }

    /// Default geometry field
    pub fn default_geometry(&self) -> Option<&FieldDescriptor> {
        self.default_geometry.and_then(|i| self.fields.get(i))
    }

    /// JSON description used by `inspect`
    pub fn to_json(&self) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = self
            .fields
            .iter()
            .map(|f| {
                let mut field = json!({
                    "name": f.name,
                    "binding": f.binding,
                    "nillable": f.nillable,
                });
                if let Some(choice) = &f.choice {
                    field["choice"] = json!(choice
                        .alternatives()
                        .iter()
                        .map(|(n, b)| json!({"name": n, "binding": b}))
                        .collect::<Vec<_>>());
                }
                if let Some(default) = &f.default_value {
                    field["default"] = default.to_json();
                }
                field
            })
            .collect();

        json!({
            "name": self.name.to_string(),
            "defaultGeometry": self.default_geometry().map(|f| f.name.clone()),
            "fields": fields,
        })
    }
}

/// Decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: Option<String>,
    schema: Arc<EntitySchema>,
    values: Vec<Value>,
}

impl Entity {
    /// Identifier (`fid` / `gml:id`)
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Schema of this entity
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Values, one per schema field
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Value at an index
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the default geometry field
    pub fn default_geometry(&self) -> Option<&Geometry> {
        self.schema
            .default_geometry_index()
            .and_then(|i| self.values.get(i))
            .and_then(Value::as_geometry)
    }

    /// Union of the extents of all geometry-bearing values
    pub fn bounds(&self) -> Option<Envelope> {
        geometry::union_all(self.values.iter().filter_map(Value::envelope))
    }

    /// JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .schema
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.clone(), v.to_json()))
            .collect();
        json!({
            "type": self.schema.name().local_name,
            "id": self.id,
            "properties": properties,
        })
    }
}

/// Builder enforcing the entity invariants
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    schema: Arc<EntitySchema>,
    id: Option<String>,
    slots: Vec<Option<Value>>,
}

impl EntityBuilder {
    /// Start an entity with every field unset
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        let slots = vec![None; schema.len()];
        Self {
            schema,
            id: None,
            slots,
        }
    }

    /// Set the identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the identifier in place
    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// Schema being built
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Whether the field at `index` already holds a value
    pub fn is_filled(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, Option::is_some)
    }

    /// Store a value at an index, coercing through the field's choice binding
    pub fn set_at(&mut self, index: usize, value: Value) -> Result<()> {
        let field = self.schema.field(index).ok_or_else(|| {
            Error::SchemaViolation(format!(
                "Field index {} out of range for {}",
                index,
                self.schema.name()
            ))
        })?;

        let type_name = value.type_name();
        let coerced = field.coerce(value).ok_or_else(|| {
            Error::SchemaViolation(format!(
                "{} value cannot be assigned to field '{}' ({}) of {}",
                type_name,
                field.name,
                field.binding,
                self.schema.name()
            ))
        })?;
        self.slots[index] = Some(coerced);
        Ok(())
    }

    /// Store a value in the field matching `name`
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self.schema.index_of(name).ok_or_else(|| {
            Error::SchemaViolation(format!("{} has no field '{}'", self.schema.name(), name))
        })?;
        self.set_at(index, value)
    }

    /// Builder form of [`EntityBuilder::set`]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value.into())?;
        Ok(self)
    }

    /// Finish the entity.
    ///
    /// Unset or null fields become null when nillable, otherwise take the
    /// field default; a required field without default is an error.
    pub fn build(self) -> Result<Entity> {
        let mut values = Vec::with_capacity(self.slots.len());
        for (field, slot) in self.schema.fields().iter().zip(self.slots) {
            let value = match slot {
                Some(v) if !v.is_null() => v,
                _ if field.nillable => Value::Null,
                _ => match &field.default_value {
                    Some(default) => default.clone(),
                    None => {
                        return Err(DecodeError::new(format!(
                            "Missing required child '{}'",
                            field.name
                        ))
                        .with_path(self.schema.name().local_name.clone())
                        .into())
                    }
                },
            };
            values.push(value);
        }

        Ok(Entity {
            id: self.id,
            schema: self.schema,
            values,
        })
    }
}

/// Non-streaming decode result of a feature collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityCollection {
    /// Collection identifier
    pub id: Option<String>,
    /// Declared `gml:boundedBy` extent
    pub bounded_by: Option<Envelope>,
    /// Member entities in document order
    pub entities: Vec<Entity>,
}

impl EntityCollection {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member
    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the collection has no members
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Union of member extents, or the declared extent when no member has one
    pub fn bounds(&self) -> Option<Envelope> {
        geometry::union_all(self.entities.iter().filter_map(Entity::bounds))
            .or_else(|| self.bounded_by.clone())
    }

    /// JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "boundedBy": self.bounded_by.as_ref().map(Envelope::to_json),
            "features": self.entities.iter().map(Entity::to_json).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polygon, Shape};
    use pretty_assertions::assert_eq;

    fn square() -> Geometry {
        let ring = crate::geometry::coordinates::parse_coordinates("0,0 1,0 1,1 0,0").unwrap();
        Geometry::new(Shape::Polygon(Polygon::new(ring)))
    }

    fn road_schema() -> Arc<EntitySchema> {
        Arc::new(EntitySchema::new(
            QName::local("Road"),
            vec![
                FieldDescriptor::new("boundedBy", Binding::Envelope).with_nillable(true),
                FieldDescriptor::new("label", Binding::String)
                    .with_default(Some(Value::String(String::new()))),
                FieldDescriptor::new("geom", Binding::Point),
                FieldDescriptor::new("lanes", Binding::Integer).with_nillable(true),
            ],
        ))
    }

    #[test]
    fn test_choice_binding_polygon_multipolygon() {
        let choice = ChoiceBinding::new(vec![
            ("polygonProperty".to_string(), Binding::Polygon),
            ("multiPolygonProperty".to_string(), Binding::MultiPolygon),
        ]);
        assert_eq!(choice.binding(), Binding::MultiPolygon);

        let coerced = choice.coerce(Value::Geometry(square())).unwrap();
        assert_eq!(coerced.binding(), Some(Binding::MultiPolygon));

        let multi = Value::Geometry(square().into_multi().unwrap());
        assert_eq!(choice.coerce(multi.clone()), Some(multi));
        assert!(choice.coerce(Value::Geometry(Geometry::point(0.0, 0.0))).is_none());
    }

    #[test]
    fn test_choice_binding_unrelated_falls_back_to_geometry() {
        let choice = ChoiceBinding::new(vec![
            ("pointProperty".to_string(), Binding::Point),
            ("lineStringProperty".to_string(), Binding::LineString),
        ]);
        assert_eq!(choice.binding(), Binding::Geometry);
        let point = Value::Geometry(Geometry::point(1.0, 1.0));
        assert_eq!(choice.coerce(point.clone()), Some(point));
        assert!(!choice.can_coerce(&Value::from("text")));
    }

    #[test]
    fn test_choice_binding_collection_wraps() {
        let choice = ChoiceBinding::new(vec![
            ("geometryProperty".to_string(), Binding::Geometry),
            ("multiGeometryProperty".to_string(), Binding::GeometryCollection),
        ]);
        assert_eq!(choice.binding(), Binding::GeometryCollection);
        let coerced = choice.coerce(Value::Geometry(Geometry::point(0.0, 0.0))).unwrap();
        assert_eq!(coerced.binding(), Some(Binding::GeometryCollection));
    }

    #[test]
    fn test_field_name_matching() {
        let field = FieldDescriptor::choice(
            "polygonProperty",
            ChoiceBinding::new(vec![
                ("polygonProperty".to_string(), Binding::Polygon),
                ("multiPolygonProperty".to_string(), Binding::MultiPolygon),
            ]),
        );
        assert!(field.matches_name("polygonProperty"));
        assert!(field.matches_name("multiPolygonProperty"));
        assert!(!field.matches_name("pointProperty"));
        assert_eq!(field.binding, Binding::MultiPolygon);
    }

    #[test]
    fn test_default_geometry_skips_bounded_by() {
        let schema = road_schema();
        assert_eq!(schema.default_geometry_index(), None);

        let schema = EntitySchema::new(
            QName::local("Lake"),
            vec![
                FieldDescriptor::new("boundedBy", Binding::Envelope),
                FieldDescriptor::new("extent", Binding::Polygon),
            ],
        );
        assert_eq!(schema.default_geometry().unwrap().name, "extent");
    }

    #[test]
    fn test_builder_fills_defaults_and_nulls() {
        let mut builder = EntityBuilder::new(road_schema()).with_id("road.1");
        builder.set("geom", Value::Geometry(Geometry::point(1.0, 2.0))).unwrap();
        let entity = builder.build().unwrap();

        assert_eq!(entity.id(), Some("road.1"));
        assert_eq!(entity.values().len(), 4);
        assert_eq!(entity.get("label"), Some(&Value::String(String::new())));
        assert_eq!(entity.get("lanes"), Some(&Value::Null));
        assert_eq!(entity.get("boundedBy"), Some(&Value::Null));
    }

    #[test]
    fn test_builder_missing_required_geometry() {
        let err = EntityBuilder::new(road_schema()).build().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().contains("geom"));
    }

    #[test]
    fn test_builder_rejects_unassignable() {
        let mut builder = EntityBuilder::new(road_schema());
        let err = builder.set("geom", Value::from("not a point")).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(builder.set("missing", Value::Integer(1)).is_err());
    }

    #[test]
    fn test_entity_bounds_and_json() {
        let entity = EntityBuilder::new(road_schema())
            .with("geom", Geometry::point(3.0, 4.0))
            .unwrap()
            .with("label", "A1")
            .unwrap()
            .build()
            .unwrap();

        let bounds = entity.bounds().unwrap();
        assert_eq!((bounds.min_x, bounds.max_y), (3.0, 4.0));
        assert_eq!(entity.to_json()["properties"]["label"], json!("A1"));
        assert_eq!(entity.to_json()["type"], json!("Road"));

        let mut collection = EntityCollection::new();
        assert!(collection.bounds().is_none());
        collection.push(entity);
        assert_eq!(collection.len(), 1);
        assert!(collection.bounds().is_some());
    }
}
