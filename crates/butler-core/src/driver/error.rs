//! Response driver error types

use thiserror::Error;

use crate::providers::ProviderError;

/// Errors that abort a response
///
/// Tool failures never show up here; they are rendered into the transcript.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The model provider failed
    #[error("{provider} API error: {message}")]
    Provider { provider: String, message: String },

    /// The provider's event stream broke the block protocol
    #[error("Provider stream protocol violation: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Wrap a provider failure, attributing it to `fallback` when the error
    /// does not name a provider itself
    pub fn from_provider(fallback: &str, error: ProviderError) -> Self {
        DriverError::Provider {
            provider: error.provider().unwrap_or(fallback).to_string(),
            message: error.detail(),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
