use super::{FieldOption, FieldType, Schema};
use crate::driver::{Database, Driver};
use crate::error::{DocModelError, Result};
use crate::factory::ModelFactory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::rc::Rc;

/// Top-level shape of a model definitions file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinitions {
    #[serde(default)]
    pub models: IndexMap<String, ModelDefinition>,
}

/// One model: factory options, fields and labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

/// A field entry. Exactly one of `type`, `has_one` or `has_many` is expected;
/// a bare entry is a text field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_one: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_many: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

/// Parse a model definitions YAML file.
pub fn parse_definitions(path: &Path) -> Result<ModelDefinitions> {
    let content = std::fs::read_to_string(path)?;
    parse_definitions_str(&content)
}

/// Parse model definitions from a YAML string.
pub fn parse_definitions_str(content: &str) -> Result<ModelDefinitions> {
    let definitions: ModelDefinitions = serde_yaml::from_str(content)?;
    Ok(definitions)
}

impl ModelDefinitions {
    /// Register every model with `db`, in file order.
    pub fn register<D: Driver>(&self, db: &mut Database<D>) -> Result<Vec<Rc<ModelFactory>>> {
        let mut factories = Vec::with_capacity(self.models.len());
        for (name, definition) in &self.models {
            let factory = db.model(name, |factory, schema| {
                let options = definition.factory_options();
                if !options.is_empty() {
                    factory.configure(options)?;
                }
                definition.apply(schema)
            })?;
            factories.push(factory);
        }
        Ok(factories)
    }
}

impl ModelDefinition {
    fn factory_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        let entries = [
            ("table", &self.table),
            ("slug", &self.slug),
            ("singular", &self.singular),
            ("plural", &self.plural),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                options.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        options
    }

    /// Declare this definition's fields and labels on `schema`.
    pub fn apply(&self, schema: &mut Schema) -> Result<()> {
        if self.timestamps {
            schema.timestamps()?;
        }
        for field in &self.fields {
            field.apply(schema)?;
        }
        schema.labels(self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        Ok(())
    }
}

impl FieldDefinition {
    fn options(&self) -> Result<FieldOption> {
        FieldOption::try_from(self.options.clone()).map_err(|e| match e {
            DocModelError::InvalidFieldOption { reason, .. } => {
                DocModelError::field_option(&self.name, reason)
            }
            other => other,
        })
    }

    /// Declare this field on `schema`.
    pub fn apply(&self, schema: &mut Schema) -> Result<()> {
        let options = self.options()?;
        match (&self.field_type, &self.has_one, &self.has_many) {
            (None, Some(model), None) => schema.has_one(&self.name, model, options)?,
            (None, None, Some(model)) => schema.has_many(&self.name, model, options)?,
            (Some(type_name), None, None) => {
                schema.field(&self.name, type_name.parse::<FieldType>()?, options)?
            }
            (None, None, None) => schema.text(&self.name, options)?,
            _ => {
                return Err(DocModelError::field_option(
                    &self.name,
                    "only one of 'type', 'has_one' or 'has_many' may be given",
                ))
            }
        };
        Ok(())
    }
}
