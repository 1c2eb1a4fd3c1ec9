// searchplan-core/src/error.rs
use thiserror::Error;

/// Errors raised while binding, normalizing or planning a search.
///
/// Every variant is fatal for the compilation that produced it: the plan is
/// never applied to a cursor once one of these has been returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Malformed condition '{key}': {reason}")]
    MalformedCondition { key: String, reason: String },

    #[error("Scope '{scope}' not found on model '{model}'")]
    ScopeNotFound { scope: String, model: String },

    #[error("Missing model argument: {0}")]
    MissingModelArgument(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SearchError {
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        SearchError::MalformedCondition {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SearchError {
    fn from(err: toml::de::Error) -> Self {
        SearchError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
