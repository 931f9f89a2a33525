use crate::error::{DocModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field type enumeration.
/// The tags are metadata only: values are not checked against them on assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Float,
    Boolean,
    Date,
    Datetime,
    Id,
    Array,
}

impl FieldType {
    /// Every valid tag, in declaration order.
    pub const ALL: [FieldType; 8] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Float,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Datetime,
        FieldType::Id,
        FieldType::Array,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Id => "id",
            FieldType::Array => "array",
        }
    }

    /// Whether this type is used for relationship fields (hasOne / hasMany).
    pub fn is_relationship(&self) -> bool {
        matches!(self, FieldType::Id | FieldType::Array)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = DocModelError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| DocModelError::InvalidFieldType(s.to_string()))
    }
}
