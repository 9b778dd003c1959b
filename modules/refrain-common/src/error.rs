use thiserror::Error;

pub type Result<T> = std::result::Result<T, RefrainError>;

#[derive(Error, Debug)]
pub enum RefrainError {
    /// The target is unknown to the store. Never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A bad argument, rejected before any network or store access.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upstream answered with something that cannot be used at all.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
