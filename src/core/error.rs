use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Immutable entity: {0}")]
    Immutable(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// True for errors the routing layer should surface as client errors.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::TypeMismatch(_) | Self::Immutable(_) | Self::ParseError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
