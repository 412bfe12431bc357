use thiserror::Error;

use crate::pipelines::ResolveError;

/// The failure taxonomy of a tool request.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required form field is missing or malformed, nothing was processed.
    #[error("{0}")]
    Validation(String),

    /// The request was well formed but could not be turned into a plan.
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// Decoding, encoding or publishing failed.
    #[error(transparent)]
    Processing(#[from] anyhow::Error),
}

impl ToolError {
    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("Missing required field: {}", field))
    }

    pub fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::Validation(format!("Invalid value for field {}: {}", field, reason))
    }
}
