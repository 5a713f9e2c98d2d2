use crate::search::SearchError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Search layer errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Search(err) if err.is_io() => "SEARCH_ENGINE_ERROR",
            AppError::Search(_) => "SEARCH_ERROR",
        }
    }

    /// Process exit code used by the command line tool
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Configuration(_) | AppError::Validation(_) => 2,
            AppError::Search(err) if err.is_io() => 3,
            _ => 1,
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Configuration("test".to_string()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            AppError::Validation("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AppError::from(SearchError::InvalidArgument("x".to_string())).error_code(),
            "SEARCH_ERROR"
        );
    }

    #[test]
    fn test_engine_errors_map_to_engine_exit_code() {
        let err = AppError::from(SearchError::Http {
            status: 503,
            body: "unavailable".to_string(),
        });
        assert_eq!(err.error_code(), "SEARCH_ENGINE_ERROR");
        assert_eq!(err.exit_code(), 3);
        assert_eq!(AppError::Configuration("bad".into()).exit_code(), 2);
        assert_eq!(AppError::Validation("bad".into()).exit_code(), 2);
    }
}
