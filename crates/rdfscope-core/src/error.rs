//! Error types for rdfscope

use thiserror::Error;

/// Result type alias using rdfscope's Error
pub type Result<T> = std::result::Result<T, Error>;

/// rdfscope error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Node errors (E001-E099)
    #[error("Node without ID passed. Resolve the node or attach an `@id` before querying.")]
    InvalidNode,

    #[error("Could not find data for node '{0}' in any endpoint.")]
    NodeNotFound(String),

    // Endpoint errors (E100-E199)
    #[error("No endpoints defined. Add an [[endpoints]] entry with `rdfscope config path`.")]
    NoEndpoints,

    #[error("Endpoint '{endpoint}' failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // Search errors (E200-E299)
    #[error("Search failed: {0}")]
    SearchFailed(String),

    // Generic errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a transport error tagged with the endpoint that produced it
    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidNode => "E001",
            Self::NodeNotFound(_) => "E002",
            Self::NoEndpoints => "E100",
            Self::Transport { .. } => "E101",
            Self::NetworkError(_) => "E102",
            Self::Timeout(_) => "E103",
            Self::SearchFailed(_) => "E200",
            Self::Json(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NoEndpoints => Some("rdfscope config path".to_string()),
            Self::NodeNotFound(id) => Some(format!("rdfscope incoming {}", id)),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::Transport { endpoint, .. } => {
                Some(format!("Check that endpoint '{}' is reachable", endpoint))
            }
            Self::Timeout(_) => Some("rdfscope config set http.timeout_secs 60".to_string()),
            _ => None,
        }
    }
}
