use chainclaw_types::error::{Classify, ErrorClass};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid data directory: {0}")]
    InvalidConfig(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            StoreError::Database(_) => ErrorClass::Transient,
            StoreError::InvalidConfig(_) => ErrorClass::Config,
            StoreError::Validation(_) => ErrorClass::Config,
            StoreError::NotFound => ErrorClass::Unknown,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
