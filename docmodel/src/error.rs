use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocModelError {
    #[error("Invalid field type: {0}")]
    InvalidFieldType(String),

    #[error("Invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("Invalid schema value for key '{key}': {reason}")]
    InvalidSchemaValue { key: String, reason: String },

    #[error("Invalid option for field '{field}': {reason}")]
    InvalidFieldOption { field: String, reason: String },

    #[error("Invalid option for model factory '{model}': {reason}")]
    InvalidFactoryOption { model: String, reason: String },

    #[error("Unknown field '{field}' on model {model}")]
    UnknownField { model: String, field: String },

    #[error("Item is not an instance of model: {0}")]
    NotAModelInstance(String),

    #[error("Item is not an instance of {expected} (got {found})")]
    HeterogeneousCollection { expected: String, found: String },

    #[error("{0} not implemented")]
    UnimplementedDriverMethod(String),

    #[error("Model not registered: {0}")]
    UnknownModel(String),

    #[error("Driver is not connected: {0}")]
    NotConnected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl DocModelError {
    pub(crate) fn field_option(field: &str, reason: impl Into<String>) -> Self {
        DocModelError::InvalidFieldOption {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unimplemented(method: &str) -> Self {
        DocModelError::UnimplementedDriverMethod(method.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocModelError>;
