//! Transport trait definition

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::{Resource, ResourceContent, Tool, ToolOutput};

/// Failure reported by a transport. Only a message is carried; transports
/// do not share a structured error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Process-spawning, protocol-speaking boundary to capability servers
///
/// Every call is addressed by the registry's server name. Implementations:
/// - `RmcpTransport`: child process over stdio via the rmcp SDK
/// - `MockTransport`: in-memory, scriptable, for tests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Spawn the server process and complete the protocol handshake
    async fn connect(
        &self,
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> TransportResult<()>;

    /// List the tools the server exposes
    async fn list_tools(&self, name: &str) -> TransportResult<Vec<Tool>>;

    /// List the resources the server exposes. Servers without resource
    /// support fail here.
    async fn list_resources(&self, name: &str) -> TransportResult<Vec<Resource>>;

    /// Invoke a tool by its bare name
    async fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> TransportResult<ToolOutput>;

    /// Read a resource by URI
    async fn read_resource(&self, name: &str, uri: &str) -> TransportResult<ResourceContent>;

    /// Shut the server down. Disconnecting an unknown server succeeds.
    async fn disconnect(&self, name: &str) -> TransportResult<()>;
}
