use thiserror::Error;

/// Errors surfaced by the translation core.
///
/// A cache miss is never an error; lookups return `None` instead.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The durable store could not complete a read or write.
    #[error("translation store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The requested tenant or record does not exist in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// A mutation was rejected before reaching the store.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl TranslationError {
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::StoreUnavailable(err.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for TranslationError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_store_error_keeps_source() {
        let err = TranslationError::store("connection reset");
        assert!(err.to_string().contains("connection reset"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_sqlx_error_maps_to_store_unavailable() {
        let err: TranslationError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, TranslationError::StoreUnavailable(_)));
    }

    #[test]
    fn test_validation_display() {
        let err = TranslationError::validation("Missing required fields");
        assert_eq!(err.to_string(), "invalid input: Missing required fields");
    }
}
