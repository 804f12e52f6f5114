//! Registry event records

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Resource, ResourceContent, ServerConfig, ServerStatus, Tool, ToolOutput};

/// Name of an event channel listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistryEventKind {
    ServerStatusChanged,
    ServerStarted,
    ServerStopped,
    ServerAdded,
    ServerRemoved,
    ServerConfigUpdated,
    ToolCalled,
    ToolError,
    ResourceRead,
    ResourceError,
}

impl RegistryEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryEventKind::ServerStatusChanged => "serverStatusChanged",
            RegistryEventKind::ServerStarted => "serverStarted",
            RegistryEventKind::ServerStopped => "serverStopped",
            RegistryEventKind::ServerAdded => "serverAdded",
            RegistryEventKind::ServerRemoved => "serverRemoved",
            RegistryEventKind::ServerConfigUpdated => "serverConfigUpdated",
            RegistryEventKind::ToolCalled => "toolCalled",
            RegistryEventKind::ToolError => "toolError",
            RegistryEventKind::ResourceRead => "resourceRead",
            RegistryEventKind::ResourceError => "resourceError",
        }
    }
}

impl std::fmt::Display for RegistryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of something the registry did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    #[serde(rename_all = "camelCase")]
    ServerStatusChanged {
        server_name: String,
        status: ServerStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ServerStarted {
        server_name: String,
        tools: Vec<Tool>,
        resources: Vec<Resource>,
    },
    #[serde(rename_all = "camelCase")]
    ServerStopped { server_name: String },
    #[serde(rename_all = "camelCase")]
    ServerAdded { server_name: String, config: ServerConfig },
    #[serde(rename_all = "camelCase")]
    ServerRemoved { server_name: String },
    #[serde(rename_all = "camelCase")]
    ServerConfigUpdated { server_name: String, config: ServerConfig },
    #[serde(rename_all = "camelCase")]
    ToolCalled {
        server_name: String,
        tool_name: String,
        arguments: Value,
        result: ToolOutput,
    },
    #[serde(rename_all = "camelCase")]
    ToolError {
        server_name: String,
        tool_name: String,
        arguments: Value,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    ResourceRead {
        server_name: String,
        uri: String,
        result: ResourceContent,
    },
    #[serde(rename_all = "camelCase")]
    ResourceError {
        server_name: String,
        uri: String,
        error: String,
    },
}

impl RegistryEvent {
    pub fn kind(&self) -> RegistryEventKind {
        match self {
            RegistryEvent::ServerStatusChanged { .. } => RegistryEventKind::ServerStatusChanged,
            RegistryEvent::ServerStarted { .. } => RegistryEventKind::ServerStarted,
            RegistryEvent::ServerStopped { .. } => RegistryEventKind::ServerStopped,
            RegistryEvent::ServerAdded { .. } => RegistryEventKind::ServerAdded,
            RegistryEvent::ServerRemoved { .. } => RegistryEventKind::ServerRemoved,
            RegistryEvent::ServerConfigUpdated { .. } => RegistryEventKind::ServerConfigUpdated,
            RegistryEvent::ToolCalled { .. } => RegistryEventKind::ToolCalled,
            RegistryEvent::ToolError { .. } => RegistryEventKind::ToolError,
            RegistryEvent::ResourceRead { .. } => RegistryEventKind::ResourceRead,
            RegistryEvent::ResourceError { .. } => RegistryEventKind::ResourceError,
        }
    }

    /// Server the event concerns
    pub fn server_name(&self) -> &str {
        match self {
            RegistryEvent::ServerStatusChanged { server_name, .. }
            | RegistryEvent::ServerStarted { server_name, .. }
            | RegistryEvent::ServerStopped { server_name }
            | RegistryEvent::ServerAdded { server_name, .. }
            | RegistryEvent::ServerRemoved { server_name }
            | RegistryEvent::ServerConfigUpdated { server_name, .. }
            | RegistryEvent::ToolCalled { server_name, .. }
            | RegistryEvent::ToolError { server_name, .. }
            | RegistryEvent::ResourceRead { server_name, .. }
            | RegistryEvent::ResourceError { server_name, .. } => server_name,
        }
    }

    pub(crate) fn status(server_name: &str, status: ServerStatus, error: Option<String>) -> Self {
        RegistryEvent::ServerStatusChanged {
            server_name: server_name.to_string(),
            status,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let event = RegistryEvent::status("git", ServerStatus::Error, Some("spawn failed".into()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "serverStatusChanged");
        assert_eq!(json["serverName"], "git");
        assert_eq!(json["status"], "error");
        assert_eq!(json["type"], event.kind().as_str());
    }

    #[test]
    fn test_server_name_accessor() {
        let event = RegistryEvent::ServerStopped { server_name: "fs".into() };
        assert_eq!(event.server_name(), "fs");
        assert_eq!(event.kind(), RegistryEventKind::ServerStopped);
    }
}
