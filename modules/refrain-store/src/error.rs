use refrain_common::RefrainError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown target: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for RefrainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RefrainError::NotFound(format!("target {id}")),
            StoreError::Database(e) => RefrainError::Store(e.to_string()),
            StoreError::Other(e) => RefrainError::Other(e),
        }
    }
}
