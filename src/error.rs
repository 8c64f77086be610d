//! Error types for schema loading and merging

use thiserror::Error;

use crate::report::LoadingReport;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema construction errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Malformed JSON pointer '{input}': {reason}")]
    MalformedPointer { input: String, reason: String },

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("Schema loading failed: {}", .0.summary())]
    Loading(LoadingReport),

    #[error("Document not found: {uri}")]
    DocumentNotFound { uri: String },

    #[error("Unresolved reference: {uri}")]
    UnresolvedReference { uri: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    pub(crate) fn malformed_pointer(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPointer {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// The loading report carried by a [`SchemaError::Loading`] failure
    pub fn report(&self) -> Option<&LoadingReport> {
        match self {
            Self::Loading(report) => Some(report),
            _ => None,
        }
    }
}

/// Failure of a single keyword-level merge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("no merge strategy for keyword '{keyword}'")]
    Unsupported { keyword: String },

    #[error("cannot merge '{keyword}': {reason}")]
    Incompatible { keyword: String, reason: String },
}
