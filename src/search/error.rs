//! Error types for search operations

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while building, executing or administering searches
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The engine answered a query with an `error` object
    #[error("Search engine error: {error_type}: {reason}")]
    Engine { error_type: String, reason: String },

    /// The engine answered with a non-2xx status
    #[error("Search engine returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The engine could not be reached
    #[error("Search engine request failed: {0}")]
    Network(String),

    /// The engine answered with something that is not a search response
    #[error("Invalid search engine response: {0}")]
    InvalidResponse(String),

    /// Caller supplied arguments that cannot produce a query
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl SearchError {
    /// Whether this error came from talking to the engine
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            SearchError::Engine { .. }
                | SearchError::Http { .. }
                | SearchError::Network(_)
                | SearchError::InvalidResponse(_)
        )
    }

    /// Short label used for the `kind` metric label
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Engine { .. } => "engine",
            SearchError::Http { .. } => "http",
            SearchError::Network(_) => "network",
            SearchError::InvalidResponse(_) => "invalid_response",
            SearchError::InvalidArgument(_) => "invalid_argument",
            SearchError::Serialization(_) => "serialization",
            SearchError::Configuration(_) => "configuration",
        }
    }

    /// Build an [`SearchError::Engine`] from the `error` object of a response body.
    ///
    /// The engine reports either a bare string or an object carrying `type` and
    /// a `root_cause` list; the first root cause reason wins over the top-level
    /// reason.
    pub(crate) fn from_engine_body(error: &serde_json::Value) -> Self {
        if let Some(message) = error.as_str() {
            return SearchError::Engine {
                error_type: "unknown".to_string(),
                reason: message.to_string(),
            };
        }

        let error_type = error
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let reason = error
            .get("root_cause")
            .and_then(|v| v.as_array())
            .and_then(|causes| causes.first())
            .and_then(|cause| cause.get("reason"))
            .or_else(|| error.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("no reason given")
            .to_string();

        SearchError::Engine { error_type, reason }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Network(format!("request timed out: {}", err))
        } else if err.is_connect() {
            SearchError::Network(format!("failed to connect: {}", err))
        } else {
            SearchError::Network(err.to_string())
        }
    }
}
