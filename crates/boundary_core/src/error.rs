use thiserror::Error;

/// Raised when a boundary record cannot be turned into a [`crate::BoundaryRule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("boundary record is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {detail}")]
    InvalidValue { field: &'static str, detail: String },
    #[error("malformed boundary configuration: {0}")]
    Malformed(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            detail: detail.into(),
        }
    }

    /// Path of the offending field, when the error is about one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField(field) => Some(field),
            ConfigError::InvalidValue { field, .. } => Some(field),
            ConfigError::NotAnObject | ConfigError::Malformed(_) => None,
        }
    }
}
