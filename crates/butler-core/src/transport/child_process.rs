//! Child-process transport using the official rmcp SDK
//!
//! Spawns each capability server as a child process and speaks MCP over
//! its stdio. Wire payloads are bridged into the engine's own types via
//! serde, so the rest of the crate never sees rmcp types.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::{
    model::{
        CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation,
        ReadResourceRequestParams,
    },
    service::{Peer, RunningService},
    transport::TokioChildProcess,
    RoleClient, ServiceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::process::Command;

use super::traits::{Transport, TransportError, TransportResult};
use crate::logging::Logger;
use crate::{log_debug, log_info, log_warn};
use crate::types::{Resource, ResourceContent, Tool, ToolOutput};

type ClientService = RunningService<RoleClient, ClientInfo>;

/// Transport that runs capability servers as local child processes
pub struct RmcpTransport {
    clients: Mutex<HashMap<String, ClientService>>,
    logger: Arc<dyn Logger>,
}

impl RmcpTransport {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            logger,
        }
    }

    fn client_info() -> ClientInfo {
        ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "butler".to_string(),
                title: Some("Butler Editor".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        }
    }

    /// Clone the peer handle so no lock is held across the request
    fn peer(&self, name: &str) -> TransportResult<Peer<RoleClient>> {
        self.clients
            .lock()
            .get(name)
            .map(|service| service.peer().clone())
            .ok_or_else(|| TransportError::new(format!("Server {} is not connected", name)))
    }

    /// Names of currently connected servers
    pub fn connected_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Re-decode an rmcp wire type as one of ours
fn bridge<S: Serialize, T: DeserializeOwned>(value: &S) -> TransportResult<T> {
    let json = serde_json::to_value(value).map_err(|e| TransportError::new(e.to_string()))?;
    serde_json::from_value(json).map_err(|e| TransportError::new(format!("Malformed server payload: {}", e)))
}

#[async_trait]
impl Transport for RmcpTransport {
    async fn connect(
        &self,
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> TransportResult<()> {
        log_info!(self.logger, "[RmcpTransport] Starting server {}: {} {:?}", name, command, args);

        let mut cmd = Command::new(command);
        cmd.args(args).envs(env);

        let process = TokioChildProcess::new(cmd)?;
        let service = Self::client_info()
            .serve(process)
            .await
            .map_err(|e| TransportError::new(format!("Initialization failed: {}", e)))?;

        // A reconnect under the same name replaces the old session
        let previous = self.clients.lock().insert(name.to_string(), service);
        if let Some(previous) = previous {
            log_warn!(self.logger, "[RmcpTransport] Replacing live session for {}", name);
            report_replaced_close(self.logger.as_ref(), name, previous.cancel().await);
        }

        log_info!(self.logger, "[RmcpTransport] Connected to {}", name);
        Ok(())
    }

    async fn list_tools(&self, name: &str) -> TransportResult<Vec<Tool>> {
        let tools = self
            .peer(name)?
            .list_all_tools()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        log_debug!(self.logger, "[RmcpTransport] {} listed {} tools", name, tools.len());
        tools.iter().map(|t| bridge(t)).collect()
    }

    async fn list_resources(&self, name: &str) -> TransportResult<Vec<Resource>> {
        let resources = self
            .peer(name)?
            .list_all_resources()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        resources.iter().map(|r| bridge(r)).collect()
    }

    async fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> TransportResult<ToolOutput> {
        log_info!(self.logger, "[RmcpTransport] Calling tool {} on {}", tool, name);

        let params = CallToolRequestParams {
            meta: None,
            name: tool.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let result = self
            .peer(name)?
            .call_tool(params)
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        bridge(&result)
    }

    async fn read_resource(&self, name: &str, uri: &str) -> TransportResult<ResourceContent> {
        let params: ReadResourceRequestParams = serde_json::from_value(serde_json::json!({ "uri": uri }))
            .map_err(|e| TransportError::new(e.to_string()))?;

        let result = self
            .peer(name)?
            .read_resource(params)
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        bridge(&result)
    }

    async fn disconnect(&self, name: &str) -> TransportResult<()> {
        let service = self.clients.lock().remove(name);
        match service {
            Some(service) => {
                log_info!(self.logger, "[RmcpTransport] Closing connection to {}", name);
                service
                    .cancel()
                    .await
                    .map_err(|e| TransportError::new(e.to_string()))?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Teardown of a replaced session is best-effort; a failure is only logged
fn report_replaced_close<T, E: std::fmt::Display>(logger: &dyn Logger, name: &str, result: Result<T, E>) {
    if let Err(e) = result {
        log_warn!(logger, "[RmcpTransport] Failed to close replaced session for {}: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use serde_json::json;

    #[test]
    fn test_bridge_tool_payload() {
        let wire = json!({
            "name": "read_file",
            "description": "Read a file",
            "inputSchema": { "type": "object", "properties": { "path": { "type": "string" } } }
        });
        let tool: Tool = bridge(&wire).unwrap();
        assert_eq!(tool.name, "read_file");
        assert_eq!(tool.input_schema["properties"]["path"]["type"], "string");
    }

    #[test]
    fn test_bridge_rejects_malformed() {
        let err = bridge::<_, Resource>(&json!({ "name": "no uri" })).unwrap_err();
        assert!(err.message().starts_with("Malformed server payload"));
    }

    #[derive(Default)]
    struct RecordingLogger {
        warnings: parking_lot::Mutex<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn debug(&self, _message: &str) {}
        fn info(&self, _message: &str) {}
        fn warn(&self, message: &str) {
            self.warnings.lock().push(message.to_string());
        }
        fn error(&self, _message: &str) {}
    }

    #[test]
    fn test_replaced_session_close_failure_is_logged() {
        let logger = RecordingLogger::default();
        report_replaced_close(&logger, "fs", Ok::<(), String>(()));
        assert!(logger.warnings.lock().is_empty());

        report_replaced_close(&logger, "fs", Err::<(), _>("task panicked"));
        assert_eq!(
            *logger.warnings.lock(),
            vec!["[RmcpTransport] Failed to close replaced session for fs: task panicked".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_server() {
        let transport = RmcpTransport::new(Arc::new(NoOpLogger));
        assert!(transport.list_tools("nope").await.is_err());
        assert!(transport.disconnect("nope").await.is_ok());
        assert!(transport.connected_servers().is_empty());
    }

    #[tokio::test]
    async fn test_connect_missing_binary_fails() {
        let transport = RmcpTransport::new(Arc::new(NoOpLogger));
        let result = transport
            .connect("ghost", "/nonexistent/butler-test-binary", &[], &HashMap::new())
            .await;
        assert!(result.is_err());
        assert!(transport.connected_servers().is_empty());
    }
}
