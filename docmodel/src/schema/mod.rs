pub mod field;
pub mod parser;
pub mod types;

pub use field::{Field, FieldCallback, FieldOption, DEFAULT_FOREIGN_KEY};
pub use parser::{parse_definitions, parse_definitions_str, FieldDefinition, ModelDefinition, ModelDefinitions};
pub use types::FieldType;

use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use crate::filter::Predicate;
use crate::util::normalize_field_name;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::rc::{Rc, Weak};

/// Names of the fields added by [`Schema::timestamps`].
pub const CREATED_AT: &str = "created_at";
pub const MODIFIED_AT: &str = "modified_at";

/// An insertion-ordered set of [`Field`]s describing one model.
///
/// Re-declaring a field under an existing name replaces the previous
/// definition in place: the key keeps its original position, and the new
/// field's default priority is the entry count at the time of the call.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, Field>,
    factory: Weak<ModelFactory>,
}

impl Schema {
    /// A schema that does not belong to any factory.
    pub fn new() -> Self {
        Schema::default()
    }

    pub(crate) fn for_factory(factory: Weak<ModelFactory>) -> Self {
        Schema {
            fields: IndexMap::new(),
            factory,
        }
    }

    /// The factory owning this schema, if it is still alive.
    pub fn factory(&self) -> Option<Rc<ModelFactory>> {
        self.factory.upgrade()
    }

    fn model_name(&self) -> String {
        self.factory()
            .map(|f| f.name().to_string())
            .unwrap_or_else(|| "<detached schema>".to_string())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields in insertion order (not priority order).
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Store a field under `name`.
    ///
    /// Guards the map against inconsistent entries: the key must be a
    /// non-empty name and must match the field's own name.
    pub fn set(&mut self, name: &str, field: Field) -> Result<&mut Self> {
        if name.trim().is_empty() {
            return Err(DocModelError::InvalidFieldName(name.to_string()));
        }
        if field.name() != name {
            return Err(DocModelError::InvalidSchemaValue {
                key: name.to_string(),
                reason: format!("field '{}' cannot be stored under another name", field.name()),
            });
        }
        if self.fields.contains_key(name) {
            log::debug!("Redefining field '{}' on {}", name, self.model_name());
        }
        self.fields.insert(name.to_string(), field);
        Ok(self)
    }

    /// Define a field. The name is normalized to snake_case and the priority
    /// defaults to the current number of entries, so fields sort in
    /// declaration order unless configured otherwise.
    pub fn field(
        &mut self,
        name: &str,
        field_type: FieldType,
        options: impl Into<FieldOption>,
    ) -> Result<&mut Self> {
        let normalized = normalize_field_name(name);
        if normalized.is_empty() {
            return Err(DocModelError::InvalidFieldName(name.to_string()));
        }

        let mut field = Field::new(normalized.clone(), field_type);
        field.priority = self.fields.len() as i64;
        field.configure(options, self)?;

        self.set(&normalized, field)
    }

    pub fn text(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        self.field(name, FieldType::Text, options)
    }

    pub fn number(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        self.field(name, FieldType::Number, options)
    }

    pub fn float(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        self.field(name, FieldType::Float, options)
    }

    pub fn boolean(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        self.field(name, FieldType::Boolean, options)
    }

    pub fn date(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        self.field(name, FieldType::Date, options)
    }

    pub fn datetime(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        self.field(name, FieldType::Datetime, options)
    }

    /// Add the `created_at` and `modified_at` datetime fields.
    pub fn timestamps(&mut self) -> Result<&mut Self> {
        self.datetime(CREATED_AT, ())?;
        self.datetime(MODIFIED_AT, ())
    }

    /// An ID field referencing a single record of `model`.
    ///
    /// The reference is preset before `options` are applied, so an explicit
    /// `reference` in the options wins.
    pub fn has_one(
        &mut self,
        name: &str,
        model: &str,
        options: impl Into<FieldOption>,
    ) -> Result<&mut Self> {
        let options = options.into().after(reference_option(model));
        self.field(name, FieldType::Id, options)
    }

    /// An array field referencing many records of `model`.
    pub fn has_many(
        &mut self,
        name: &str,
        model: &str,
        options: impl Into<FieldOption>,
    ) -> Result<&mut Self> {
        let options = options.into().after(reference_option(model));
        self.field(name, FieldType::Array, options)
    }

    /// Reconfigure an already defined field.
    pub fn configure_field(&mut self, name: &str, options: impl Into<FieldOption>) -> Result<&mut Self> {
        let mut field = self
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| DocModelError::UnknownField {
                model: self.model_name(),
                field: name.to_string(),
            })?;
        field.configure(options, self)?;
        if field.name() != name {
            return Err(DocModelError::InvalidSchemaValue {
                key: name.to_string(),
                reason: "a field cannot be renamed".to_string(),
            });
        }
        self.fields.insert(name.to_string(), field);
        Ok(self)
    }

    /// Assign labels in bulk. Every name must already be defined; nothing is
    /// changed if one is missing.
    pub fn labels<I, K, V>(&mut self, labels: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let labels: Vec<(K, V)> = labels.into_iter().collect();
        if let Some((missing, _)) = labels.iter().find(|(name, _)| !self.contains(name.as_ref())) {
            return Err(DocModelError::UnknownField {
                model: self.model_name(),
                field: missing.as_ref().to_string(),
            });
        }
        for (name, label) in labels {
            if let Some(field) = self.fields.get_mut(name.as_ref()) {
                field.label = label.into();
            }
        }
        Ok(self)
    }

    /// All fields sorted by priority; equal priorities keep insertion order.
    pub fn fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.values().collect();
        fields.sort_by_key(|f| f.priority);
        fields
    }

    /// Field names in priority order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|f| f.name().to_string()).collect()
    }

    /// The priority-ordered fields matching `predicate`.
    pub fn filter(&self, predicate: impl Into<Predicate<Field>>) -> Vec<&Field> {
        let predicate = predicate.into();
        self.fields()
            .into_iter()
            .filter(|field| predicate.matches(field))
            .collect()
    }

    /// The schema descriptor: an array of field descriptors in priority order.
    pub fn to_json(&self) -> Value {
        Value::Array(self.fields().into_iter().map(Field::to_json).collect())
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.fields())
    }
}

fn reference_option(model: &str) -> FieldOption {
    let mut map = Map::new();
    map.insert("reference".to_string(), Value::String(model.to_string()));
    FieldOption::Merge(map)
}
