//! Error types shared by the swing scanner crates.

use thiserror::Error;

/// Result type alias using the shared error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for configuration and persistence concerns.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record store error (SQLite, serialization of records)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True when the underlying cause is a decode failure (corrupt file, bad JSON).
    pub fn is_decode(&self) -> bool {
        match self {
            Self::Json(_) => true,
            Self::WithContext { source, .. } => source.is_decode(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::Persistence("table missing".into());
        let with_ctx = err.with_context("loading watchlist");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert_eq!(
            with_ctx.to_string(),
            "loading watchlist: Persistence error: table missing"
        );
    }

    #[test]
    fn test_is_decode_through_context() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = Error::from(json_err).with_context("reading series");
        assert!(err.is_decode());
        assert!(!Error::Config("x".into()).is_decode());
    }
}
