//! Registry error types

use thiserror::Error;

/// Errors returned by registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Server {0} already exists")]
    DuplicateServer(String),

    #[error("Server {0} is protected and cannot be removed")]
    ProtectedServer(String),

    #[error("Server {0} not found")]
    ServerNotFound(String),

    #[error("Invalid server name {0:?}: must be non-empty and must not contain '_'")]
    InvalidServerName(String),

    #[error("Server {0} is not running")]
    ServerNotRunning(String),

    #[error("Tool {tool} not found on server {server}")]
    ToolNotFound { server: String, tool: String },

    #[error("Tool {tool} failed on server {server}: {message}")]
    ToolCallFailed {
        server: String,
        tool: String,
        message: String,
    },

    #[error("Background lifecycle task failed: {0}")]
    TaskFailed(String),

    #[error("Reading {uri} from server {server} failed: {message}")]
    ResourceReadFailed {
        server: String,
        uri: String,
        message: String,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
