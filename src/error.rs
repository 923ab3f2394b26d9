use thiserror::Error;

/// Recoverable failures reported by [`crate::store::TreeStore`].
///
/// A failed operation never leaves the store half-mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
