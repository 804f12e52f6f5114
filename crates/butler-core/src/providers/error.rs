//! Provider error types

use thiserror::Error;

/// Errors that can occur during provider operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// API request failed
    #[error("{provider} API error: {message}")]
    Api { provider: String, message: String },

    /// The response did not follow the block protocol
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// Request was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Provider named by the error, if any
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Api { provider, .. } | Self::InvalidResponse { provider, .. } => Some(provider),
            Self::Cancelled | Self::Other(_) => None,
        }
    }

    /// Error text without the provider prefix
    pub fn detail(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::InvalidResponse { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
