use super::types::FieldType;
use super::Schema;
use crate::error::{DocModelError, Result};
use crate::filter::Filterable;
use crate::util::value_kind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// The key every reference field resolves against unless configured otherwise.
pub const DEFAULT_FOREIGN_KEY: &str = "_id";

/// A single named, typed entry in a [`Schema`].
///
/// Serializes as the field descriptor:
/// `{name, type, label, priority, required, unique, reference, foreignKey, value}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    pub priority: i64,
    pub required: bool,
    pub unique: bool,
    pub reference: Option<String>,
    pub foreign_key: String,
    #[serde(rename = "value")]
    pub default_value: Value,
}

impl Field {
    /// Create a field with default metadata. The label defaults to the name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Field {
            label: name.clone(),
            name,
            field_type,
            priority: 0,
            required: false,
            unique: false,
            reference: None,
            foreign_key: DEFAULT_FOREIGN_KEY.to_string(),
            default_value: Value::Null,
        }
    }

    /// Create a field from a type tag string, failing if the tag is not a known [`FieldType`].
    pub fn with_type_name(name: impl Into<String>, type_name: &str) -> Result<Self> {
        let field_type = type_name.parse::<FieldType>()?;
        Ok(Field::new(name, field_type))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this field describes a relationship to another model.
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Apply a configuration option. Options are applied in order, so later
    /// entries of a sequence override earlier ones.
    ///
    /// A failed option leaves the field untouched.
    pub fn configure(&mut self, option: impl Into<FieldOption>, schema: &Schema) -> Result<&mut Self> {
        let mut staged = self.clone();
        staged.apply(option.into(), schema)?;
        *self = staged;
        Ok(self)
    }

    fn apply(&mut self, option: FieldOption, schema: &Schema) -> Result<()> {
        match option {
            FieldOption::None => {}
            FieldOption::Sequence(options) => {
                for option in options {
                    self.apply(option, schema)?;
                }
            }
            FieldOption::Flag(flag) => match flag.as_str() {
                "required" => self.required = true,
                "unique" => self.unique = true,
                other => {
                    return Err(DocModelError::field_option(
                        &self.name,
                        format!("'{other}' is not a boolean attribute"),
                    ))
                }
            },
            FieldOption::Priority(priority) => self.priority = priority,
            FieldOption::Callback(callback) => callback(self, schema),
            FieldOption::Merge(map) => {
                for (key, value) in map {
                    self.merge_attribute(&key, value)?;
                }
            }
        }
        Ok(())
    }

    fn merge_attribute(&mut self, key: &str, value: Value) -> Result<()> {
        let field = self.name.clone();
        let mismatch = |expected: &str, value: &Value| {
            DocModelError::field_option(
                &field,
                format!("'{key}' expects {expected}, got {}", value_kind(value)),
            )
        };

        match key {
            "name" => {
                return Err(DocModelError::field_option(&self.name, "'name' cannot be changed"));
            }
            "type" => match value.as_str() {
                Some(tag) => self.field_type = tag.parse()?,
                None => return Err(mismatch("a type tag", &value)),
            },
            "label" => match value {
                Value::String(label) => self.label = label,
                other => return Err(mismatch("a string", &other)),
            },
            "priority" => match value.as_i64() {
                Some(priority) => self.priority = priority,
                None => return Err(mismatch("an integer", &value)),
            },
            "required" => match value.as_bool() {
                Some(flag) => self.required = flag,
                None => return Err(mismatch("a boolean", &value)),
            },
            "unique" => match value.as_bool() {
                Some(flag) => self.unique = flag,
                None => return Err(mismatch("a boolean", &value)),
            },
            "reference" => match value {
                Value::String(model) => self.reference = Some(model),
                Value::Null => self.reference = None,
                other => return Err(mismatch("a model name", &other)),
            },
            "foreignKey" | "foreign_key" => match value {
                Value::String(key) => self.foreign_key = key,
                other => return Err(mismatch("a string", &other)),
            },
            "value" | "default" => self.default_value = value,
            other => {
                return Err(DocModelError::field_option(
                    &self.name,
                    format!("unknown attribute '{other}'"),
                ))
            }
        }
        Ok(())
    }

    /// The field descriptor as a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Filterable for Field {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name.clone())),
            "type" => Some(Value::String(self.field_type.to_string())),
            "label" => Some(Value::String(self.label.clone())),
            "priority" => Some(Value::from(self.priority)),
            "required" => Some(Value::Bool(self.required)),
            "unique" => Some(Value::Bool(self.unique)),
            "reference" => Some(self.reference.clone().map(Value::String).unwrap_or(Value::Null)),
            "foreignKey" | "foreign_key" => Some(Value::String(self.foreign_key.clone())),
            "value" | "default" => Some(self.default_value.clone()),
            _ => None,
        }
    }
}

/// Callback form of a field option. Receives the field being configured and its schema.
pub type FieldCallback = Rc<dyn Fn(&mut Field, &Schema)>;

/// One configuration step for a [`Field`].
#[derive(Clone, Default)]
pub enum FieldOption {
    /// No-op.
    #[default]
    None,
    /// Sets the named boolean attribute (`required`, `unique`) to true.
    Flag(String),
    /// Sets the priority.
    Priority(i64),
    /// Runs arbitrary configuration code.
    Callback(FieldCallback),
    /// Shallow-merges known attributes.
    Merge(Map<String, Value>),
    /// Applies each option in order.
    Sequence(Vec<FieldOption>),
}

impl FieldOption {
    pub fn callback(f: impl Fn(&mut Field, &Schema) + 'static) -> Self {
        FieldOption::Callback(Rc::new(f))
    }

    /// Prepend `first` so that the options in `self` are applied after it.
    pub(crate) fn after(self, first: FieldOption) -> Self {
        FieldOption::Sequence(vec![first, self])
    }
}

impl TryFrom<Value> for FieldOption {
    type Error = DocModelError;

    /// Map dynamic (JSON/YAML) input onto the option variants:
    /// string -> flag, integer -> priority, array -> sequence, object -> merge,
    /// null/false -> no-op. Anything else is rejected.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null | Value::Bool(false) => Ok(FieldOption::None),
            Value::String(flag) => Ok(FieldOption::Flag(flag)),
            Value::Number(ref n) => n.as_i64().map(FieldOption::Priority).ok_or_else(|| {
                DocModelError::field_option("<option>", format!("priority must be an integer, got {n}"))
            }),
            Value::Array(items) => items
                .into_iter()
                .map(FieldOption::try_from)
                .collect::<Result<Vec<_>>>()
                .map(FieldOption::Sequence),
            Value::Object(map) => Ok(FieldOption::Merge(map)),
            Value::Bool(true) => Err(DocModelError::field_option(
                "<option>",
                "'true' is not a recognized option shape",
            )),
        }
    }
}

impl From<()> for FieldOption {
    fn from(_: ()) -> Self {
        FieldOption::None
    }
}

impl From<&str> for FieldOption {
    fn from(flag: &str) -> Self {
        FieldOption::Flag(flag.to_string())
    }
}

impl From<String> for FieldOption {
    fn from(flag: String) -> Self {
        FieldOption::Flag(flag)
    }
}

impl From<i32> for FieldOption {
    fn from(priority: i32) -> Self {
        FieldOption::Priority(i64::from(priority))
    }
}

impl From<i64> for FieldOption {
    fn from(priority: i64) -> Self {
        FieldOption::Priority(priority)
    }
}

impl From<Map<String, Value>> for FieldOption {
    fn from(map: Map<String, Value>) -> Self {
        FieldOption::Merge(map)
    }
}

impl<T: Into<FieldOption>> From<Vec<T>> for FieldOption {
    fn from(options: Vec<T>) -> Self {
        FieldOption::Sequence(options.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldOption>, const N: usize> From<[T; N]> for FieldOption {
    fn from(options: [T; N]) -> Self {
        FieldOption::Sequence(options.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for FieldOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOption::None => f.write_str("None"),
            FieldOption::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            FieldOption::Priority(p) => f.debug_tuple("Priority").field(p).finish(),
            FieldOption::Callback(_) => f.write_str("Callback(..)"),
            FieldOption::Merge(map) => f.debug_tuple("Merge").field(map).finish(),
            FieldOption::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
        }
    }
}
