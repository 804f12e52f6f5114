//! Mock transport for testing
//!
//! Scriptable, in-memory stand-in for real capability servers. Records
//! every call so tests can assert on what the registry did.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::traits::{Transport, TransportError, TransportResult};
use crate::types::{Resource, ResourceContent, Tool, ToolOutput};

/// Scripted behaviour of one fake server
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    tools: Vec<Tool>,
    /// `None` means the server does not support resource listing
    resources: Option<Vec<Resource>>,
    tool_results: HashMap<String, Result<ToolOutput, String>>,
    resource_contents: HashMap<String, ResourceContent>,
    connect_error: Option<String>,
    list_tools_error: Option<String>,
    disconnect_error: Option<String>,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            resources: Some(vec![]),
            ..Default::default()
        }
    }

    /// Expose a tool that answers with `output`
    pub fn with_tool(mut self, tool: Tool, output: ToolOutput) -> Self {
        self.tool_results.insert(tool.name.clone(), Ok(output));
        self.tools.push(tool);
        self
    }

    /// Expose a tool whose invocation fails at the transport level
    pub fn with_failing_tool(mut self, tool: Tool, message: impl Into<String>) -> Self {
        self.tool_results.insert(tool.name.clone(), Err(message.into()));
        self.tools.push(tool);
        self
    }

    pub fn with_resource(mut self, resource: Resource, content: ResourceContent) -> Self {
        self.resource_contents.insert(resource.uri.clone(), content);
        self.resources.get_or_insert_with(Vec::new).push(resource);
        self
    }

    /// Make `list_resources` fail
    pub fn without_resource_support(mut self) -> Self {
        self.resources = None;
        self
    }

    pub fn failing_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    pub fn failing_list_tools(mut self, message: impl Into<String>) -> Self {
        self.list_tools_error = Some(message.into());
        self
    }

    pub fn failing_disconnect(mut self, message: impl Into<String>) -> Self {
        self.disconnect_error = Some(message.into());
        self
    }
}

/// A call observed by the mock transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect { name: String, command: String, args: Vec<String> },
    ListTools { name: String },
    ListResources { name: String },
    CallTool { name: String, tool: String, arguments: Value },
    ReadResource { name: String, uri: String },
    Disconnect { name: String },
}

/// In-memory transport. Unknown server names connect successfully and
/// expose nothing.
#[derive(Debug, Default)]
pub struct MockTransport {
    servers: Mutex<HashMap<String, MockServer>>,
    connected: Mutex<HashSet<String>>,
    calls: Mutex<Vec<TransportCall>>,
    connect_delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scripted server
    pub fn with_server(self, name: impl Into<String>, server: MockServer) -> Self {
        self.servers.lock().insert(name.into(), server);
        self
    }

    /// Sleep inside `connect`, to widen race windows in tests
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Replace a server's script at runtime
    pub fn set_server(&self, name: impl Into<String>, server: MockServer) {
        self.servers.lock().insert(name.into(), server);
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Connect calls observed for one server
    pub fn connects_for(&self, name: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Connect { name: n, args, .. } if n == name => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.connected.lock().contains(name)
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }

    fn script(&self, name: &str) -> MockServer {
        self.servers.lock().get(name).cloned().unwrap_or_else(MockServer::new)
    }

    fn ensure_connected(&self, name: &str) -> TransportResult<()> {
        if self.is_connected(name) {
            Ok(())
        } else {
            Err(TransportError::new(format!("Server {} is not connected", name)))
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        name: &str,
        command: &str,
        args: &[String],
        _env: &HashMap<String, String>,
    ) -> TransportResult<()> {
        self.record(TransportCall::Connect {
            name: name.to_string(),
            command: command.to_string(),
            args: args.to_vec(),
        });

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.script(name).connect_error {
            return Err(TransportError::new(message));
        }

        self.connected.lock().insert(name.to_string());
        Ok(())
    }

    async fn list_tools(&self, name: &str) -> TransportResult<Vec<Tool>> {
        self.record(TransportCall::ListTools { name: name.to_string() });
        self.ensure_connected(name)?;

        let script = self.script(name);
        match script.list_tools_error {
            Some(message) => Err(TransportError::new(message)),
            None => Ok(script.tools),
        }
    }

    async fn list_resources(&self, name: &str) -> TransportResult<Vec<Resource>> {
        self.record(TransportCall::ListResources { name: name.to_string() });
        self.ensure_connected(name)?;

        self.script(name)
            .resources
            .ok_or_else(|| TransportError::new("Method not found: resources/list"))
    }

    async fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> TransportResult<ToolOutput> {
        self.record(TransportCall::CallTool {
            name: name.to_string(),
            tool: tool.to_string(),
            arguments: arguments.clone(),
        });
        self.ensure_connected(name)?;

        match self.script(name).tool_results.remove(tool) {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new(format!("Unknown tool: {}", tool))),
        }
    }

    async fn read_resource(&self, name: &str, uri: &str) -> TransportResult<ResourceContent> {
        self.record(TransportCall::ReadResource {
            name: name.to_string(),
            uri: uri.to_string(),
        });
        self.ensure_connected(name)?;

        self.script(name)
            .resource_contents
            .remove(uri)
            .ok_or_else(|| TransportError::new(format!("Resource not found: {}", uri)))
    }

    async fn disconnect(&self, name: &str) -> TransportResult<()> {
        self.record(TransportCall::Disconnect { name: name.to_string() });

        if let Some(message) = self.script(name).disconnect_error {
            return Err(TransportError::new(message));
        }

        self.connected.lock().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_tool_call() {
        let transport = MockTransport::new().with_server(
            "fs",
            MockServer::new().with_tool(Tool::new("read_file", "Read a file"), ToolOutput::text("hello")),
        );

        transport.connect("fs", "npx", &[], &HashMap::new()).await.unwrap();
        let tools = transport.list_tools("fs").await.unwrap();
        assert_eq!(tools.len(), 1);

        let output = transport
            .call_tool("fs", "read_file", json!({"path": "/a"}))
            .await
            .unwrap();
        assert_eq!(output.to_text(), "hello");
        assert!(matches!(
            transport.calls().last(),
            Some(TransportCall::CallTool { tool, .. }) if tool == "read_file"
        ));
    }

    #[tokio::test]
    async fn test_calls_require_connection() {
        let transport = MockTransport::new();
        let err = transport.list_tools("ghost").await.unwrap_err();
        assert!(err.message().contains("not connected"));

        // Disconnecting an unknown server is fine
        transport.disconnect("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_resource_support_toggle() {
        let transport = MockTransport::new()
            .with_server("git", MockServer::new().without_resource_support());
        transport.connect("git", "npx", &[], &HashMap::new()).await.unwrap();
        assert!(transport.list_resources("git").await.is_err());
    }
}
