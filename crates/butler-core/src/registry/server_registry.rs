//! Server registry and lifecycle controller
//!
//! The registry is the single owner of every `ServerInstance`. It drives
//! the start/stop/restart state machine through a `Transport`, aggregates
//! tools and resources of running servers, and publishes every transition
//! on its `EventBus`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::catalog::{is_valid_server_name, ServerResources, ServerTools};
use super::error::{RegistryError, RegistryResult};
use super::templates::{filesystem_server, FILESYSTEM_SERVER};
use crate::events::{EventBus, ListenerId, RegistryEvent, RegistryEventKind};
use crate::logging::Logger;
use crate::transport::Transport;
use crate::types::{
    Resource, ResourceContent, ServerConfig, ServerConfigPatch, ServerInstance, ServerStatus, Tool,
    ToolOutput,
};

/// Settling delay between stop and start on restart
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(500);

/// Tunables for the registry
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Pause between the stop and start halves of a restart, so the old
    /// process is reaped before a new one binds the same resources
    pub restart_delay: Duration,
    /// Root the filesystem server falls back to when no workspace is open
    pub default_root: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY,
            default_root: "/".to_string(),
        }
    }
}

impl RegistryOptions {
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_default_root(mut self, root: impl Into<String>) -> Self {
        self.default_root = root.into();
        self
    }
}

/// Follow-up chosen by `set_workspace_root`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceRootAction {
    Start,
    Restart,
    Stop,
    None,
}

/// Handle to the lifecycle work triggered by a workspace-root change.
///
/// Awaiting `wait` gives the post-condition; dropping the handle lets the
/// work finish in the background.
#[derive(Debug)]
pub struct WorkspaceRootTask {
    action: WorkspaceRootAction,
    handle: Option<JoinHandle<RegistryResult<bool>>>,
}

impl WorkspaceRootTask {
    fn done(action: WorkspaceRootAction) -> Self {
        Self { action, handle: None }
    }

    /// Which lifecycle operation was triggered
    pub fn action(&self) -> WorkspaceRootAction {
        self.action
    }

    /// Wait for the triggered operation to finish
    pub async fn wait(self) -> RegistryResult<bool> {
        match self.handle {
            Some(handle) => handle
                .await
                .map_err(|e| RegistryError::TaskFailed(e.to_string()))?,
            None => Ok(true),
        }
    }
}

/// Registry of configured capability servers
pub struct ServerRegistry {
    servers: RwLock<HashMap<String, ServerInstance>>,
    /// One async mutex per server so lifecycle operations on the same
    /// server never interleave
    lifecycle_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    transport: Arc<dyn Transport>,
    events: EventBus,
    options: RegistryOptions,
    logger: Arc<dyn Logger>,
}

impl ServerRegistry {
    /// Create a registry with default options. The reserved filesystem
    /// server is configured (stopped) from the start.
    pub fn new(transport: Arc<dyn Transport>, logger: Arc<dyn Logger>) -> Self {
        Self::with_options(transport, logger, RegistryOptions::default())
    }

    pub fn with_options(
        transport: Arc<dyn Transport>,
        logger: Arc<dyn Logger>,
        options: RegistryOptions,
    ) -> Self {
        let mut servers = HashMap::new();
        servers.insert(
            FILESYSTEM_SERVER.to_string(),
            ServerInstance::new(filesystem_server(&options.default_root)),
        );

        Self {
            servers: RwLock::new(servers),
            lifecycle_locks: Mutex::new(HashMap::new()),
            transport,
            events: EventBus::new(Arc::clone(&logger)),
            options,
            logger,
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn add_event_listener<F>(&self, kind: RegistryEventKind, handler: F) -> ListenerId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.events.add_event_listener(kind, handler)
    }

    pub fn remove_event_listener(&self, kind: RegistryEventKind, id: ListenerId) -> bool {
        self.events.remove_event_listener(kind, id)
    }

    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<RegistryEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Register a new server in `stopped` state
    pub fn add_server(&self, config: ServerConfig) -> RegistryResult<()> {
        if !is_valid_server_name(&config.name) {
            return Err(RegistryError::InvalidServerName(config.name));
        }

        {
            let mut servers = self.servers.write();
            if servers.contains_key(&config.name) {
                return Err(RegistryError::DuplicateServer(config.name));
            }
            servers.insert(config.name.clone(), ServerInstance::new(config.clone()));
        }

        self.logger.info(&format!("[ServerRegistry] Added server {}", config.name));
        self.events.emit(RegistryEvent::ServerAdded {
            server_name: config.name.clone(),
            config,
        });
        Ok(())
    }

    /// Remove a server, stopping it first if needed
    pub async fn remove_server(&self, name: &str) -> RegistryResult<()> {
        if name == FILESYSTEM_SERVER {
            return Err(RegistryError::ProtectedServer(name.to_string()));
        }

        let status = self
            .get_server_status(name)
            .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;

        if status != ServerStatus::Stopped {
            self.stop_server(name).await?;
        }

        if self.servers.write().remove(name).is_none() {
            return Err(RegistryError::ServerNotFound(name.to_string()));
        }
        self.lifecycle_locks.lock().remove(name);

        self.logger.info(&format!("[ServerRegistry] Removed server {}", name));
        self.events.emit(RegistryEvent::ServerRemoved {
            server_name: name.to_string(),
        });
        Ok(())
    }

    /// Shallow-merge `patch` into a server's config. Does not restart.
    pub fn update_server_config(
        &self,
        name: &str,
        patch: ServerConfigPatch,
    ) -> RegistryResult<ServerConfig> {
        let config = {
            let mut servers = self.servers.write();
            let server = servers
                .get_mut(name)
                .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;
            server.config.apply(patch);
            server.config.clone()
        };

        self.events.emit(RegistryEvent::ServerConfigUpdated {
            server_name: name.to_string(),
            config: config.clone(),
        });
        Ok(config)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn lifecycle_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.lifecycle_locks
                .lock()
                .entry(name.to_string())
                .or_default(),
        )
    }

    /// Move a server to `status`. Anything but `running` drops the derived
    /// tool and resource lists.
    fn set_status(&self, name: &str, status: ServerStatus, error: Option<String>) -> RegistryResult<()> {
        let mut servers = self.servers.write();
        let server = servers
            .get_mut(name)
            .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;

        debug_assert!(
            server.status.can_transition_to(status),
            "illegal transition {} -> {} for {}",
            server.status,
            status,
            name
        );

        server.status = status;
        server.error = error;
        if status != ServerStatus::Running {
            server.tools.clear();
            server.resources.clear();
        }
        Ok(())
    }

    /// Connect and fetch capabilities. Resource listing is optional for
    /// servers, so its failure yields an empty list.
    async fn connect_and_discover(
        &self,
        config: &ServerConfig,
    ) -> Result<(Vec<Tool>, Vec<Resource>), String> {
        let name = config.name.as_str();

        self.transport
            .connect(name, &config.command, &config.args, &config.env)
            .await
            .map_err(|e| e.to_string())?;

        let tools = match self.transport.list_tools(name).await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(disconnect_err) = self.transport.disconnect(name).await {
                    self.logger.warn(&format!(
                        "[ServerRegistry] Cleanup disconnect of {} failed: {}",
                        name, disconnect_err
                    ));
                }
                return Err(e.to_string());
            }
        };

        let resources = match self.transport.list_resources(name).await {
            Ok(resources) => resources,
            Err(e) => {
                self.logger.debug(&format!(
                    "[ServerRegistry] {} does not list resources: {}",
                    name, e
                ));
                Vec::new()
            }
        };

        Ok((tools, resources))
    }

    /// Start a server. Returns `Ok(false)` if it ended in `error`; the
    /// message is stored on the instance.
    pub async fn start_server(&self, name: &str) -> RegistryResult<bool> {
        let lock = self.lifecycle_lock(name);
        let _guard = lock.lock().await;

        let config = {
            let servers = self.servers.read();
            let server = servers
                .get(name)
                .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;
            if server.status == ServerStatus::Running {
                return Ok(true);
            }
            server.config.clone()
        };

        self.set_status(name, ServerStatus::Starting, None)?;
        self.events
            .emit(RegistryEvent::status(name, ServerStatus::Starting, None));
        self.logger.info(&format!(
            "[ServerRegistry] Starting {}: {} {:?}",
            name, config.command, config.args
        ));

        match self.connect_and_discover(&config).await {
            Ok((tools, resources)) => {
                {
                    let mut servers = self.servers.write();
                    let server = servers
                        .get_mut(name)
                        .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;
                    server.status = ServerStatus::Running;
                    server.error = None;
                    server.tools = tools.clone();
                    server.resources = resources.clone();
                    server.last_started = Some(Utc::now());
                }

                self.logger.info(&format!(
                    "[ServerRegistry] {} running with {} tools, {} resources",
                    name,
                    tools.len(),
                    resources.len()
                ));
                self.events
                    .emit(RegistryEvent::status(name, ServerStatus::Running, None));
                self.events.emit(RegistryEvent::ServerStarted {
                    server_name: name.to_string(),
                    tools,
                    resources,
                });
                Ok(true)
            }
            Err(message) => {
                self.logger.error(&format!(
                    "[ServerRegistry] Failed to start {}: {}",
                    name, message
                ));
                self.set_status(name, ServerStatus::Error, Some(message.clone()))?;
                self.events.emit(RegistryEvent::status(
                    name,
                    ServerStatus::Error,
                    Some(message),
                ));
                Ok(false)
            }
        }
    }

    /// Stop a server. Returns `Ok(false)` if the disconnect failed and the
    /// server ended in `error`.
    pub async fn stop_server(&self, name: &str) -> RegistryResult<bool> {
        let lock = self.lifecycle_lock(name);
        let _guard = lock.lock().await;

        let status = self
            .get_server_status(name)
            .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;
        if status == ServerStatus::Stopped {
            return Ok(true);
        }

        match self.transport.disconnect(name).await {
            Ok(()) => {
                self.set_status(name, ServerStatus::Stopped, None)?;
                self.logger.info(&format!("[ServerRegistry] Stopped {}", name));
                self.events
                    .emit(RegistryEvent::status(name, ServerStatus::Stopped, None));
                self.events.emit(RegistryEvent::ServerStopped {
                    server_name: name.to_string(),
                });
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                self.logger.error(&format!(
                    "[ServerRegistry] Failed to stop {}: {}",
                    name, message
                ));
                if status != ServerStatus::Error {
                    self.set_status(name, ServerStatus::Error, Some(message.clone()))?;
                } else if let Some(server) = self.servers.write().get_mut(name) {
                    server.error = Some(message.clone());
                }
                self.events.emit(RegistryEvent::status(
                    name,
                    ServerStatus::Error,
                    Some(message),
                ));
                Ok(false)
            }
        }
    }

    /// Full stop, settling delay, then start. Start is attempted even if
    /// the server was already stopped.
    pub async fn restart_server(&self, name: &str) -> RegistryResult<bool> {
        self.stop_server(name).await?;
        tokio::time::sleep(self.options.restart_delay).await;
        self.start_server(name).await
    }

    /// Point the filesystem server at a new workspace root.
    ///
    /// The config change is applied immediately; the resulting start,
    /// restart or stop runs as a spawned task. Must be called from within
    /// a Tokio runtime.
    pub fn set_workspace_root(self: &Arc<Self>, path: Option<String>) -> WorkspaceRootTask {
        let root = path
            .clone()
            .unwrap_or_else(|| self.options.default_root.clone());

        let updated = {
            let mut servers = self.servers.write();
            servers.get_mut(FILESYSTEM_SERVER).map(|server| {
                match server.config.args.last_mut() {
                    Some(last) => *last = root.clone(),
                    None => server.config.args.push(root.clone()),
                }
                (server.config.clone(), server.status)
            })
        };

        let Some((config, status)) = updated else {
            self.logger
                .warn("[ServerRegistry] Filesystem server missing, ignoring workspace root");
            return WorkspaceRootTask::done(WorkspaceRootAction::None);
        };

        self.logger.info(&format!(
            "[ServerRegistry] Workspace root set to {}",
            root
        ));
        self.events.emit(RegistryEvent::ServerConfigUpdated {
            server_name: FILESYSTEM_SERVER.to_string(),
            config,
        });

        let action = match (&path, status) {
            (None, ServerStatus::Running) => WorkspaceRootAction::Stop,
            (None, _) => WorkspaceRootAction::None,
            // An in-flight start connects with the old root
            (Some(_), ServerStatus::Running | ServerStatus::Starting) => WorkspaceRootAction::Restart,
            (Some(_), _) => WorkspaceRootAction::Start,
        };

        if action == WorkspaceRootAction::None {
            return WorkspaceRootTask::done(action);
        }

        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move {
            match action {
                WorkspaceRootAction::Start => registry.start_server(FILESYSTEM_SERVER).await,
                WorkspaceRootAction::Restart => registry.restart_server(FILESYSTEM_SERVER).await,
                WorkspaceRootAction::Stop => registry.stop_server(FILESYSTEM_SERVER).await,
                WorkspaceRootAction::None => Ok(true),
            }
        });

        WorkspaceRootTask {
            action,
            handle: Some(handle),
        }
    }

    // ------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------

    fn ensure_running(&self, name: &str) -> RegistryResult<ServerInstance> {
        let servers = self.servers.read();
        let server = servers
            .get(name)
            .ok_or_else(|| RegistryError::ServerNotFound(name.to_string()))?;
        if !server.is_running() {
            return Err(RegistryError::ServerNotRunning(name.to_string()));
        }
        Ok(server.clone())
    }

    /// Invoke a tool on a running server
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> RegistryResult<ToolOutput> {
        let server = self.ensure_running(server_name)?;
        if server.find_tool(tool_name).is_none() {
            return Err(RegistryError::ToolNotFound {
                server: server_name.to_string(),
                tool: tool_name.to_string(),
            });
        }

        self.logger.info(&format!(
            "[ServerRegistry] Calling {} on {}",
            tool_name, server_name
        ));

        match self
            .transport
            .call_tool(server_name, tool_name, arguments.clone())
            .await
        {
            Ok(result) => {
                self.events.emit(RegistryEvent::ToolCalled {
                    server_name: server_name.to_string(),
                    tool_name: tool_name.to_string(),
                    arguments,
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                self.logger.error(&format!(
                    "[ServerRegistry] Tool {} on {} failed: {}",
                    tool_name, server_name, e
                ));
                self.events.emit(RegistryEvent::ToolError {
                    server_name: server_name.to_string(),
                    tool_name: tool_name.to_string(),
                    arguments,
                    error: e.to_string(),
                });
                Err(RegistryError::ToolCallFailed {
                    server: server_name.to_string(),
                    tool: tool_name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Read a resource from a running server
    pub async fn read_resource(&self, server_name: &str, uri: &str) -> RegistryResult<ResourceContent> {
        self.ensure_running(server_name)?;

        match self.transport.read_resource(server_name, uri).await {
            Ok(result) => {
                self.events.emit(RegistryEvent::ResourceRead {
                    server_name: server_name.to_string(),
                    uri: uri.to_string(),
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                self.logger.error(&format!(
                    "[ServerRegistry] Reading {} from {} failed: {}",
                    uri, server_name, e
                ));
                self.events.emit(RegistryEvent::ResourceError {
                    server_name: server_name.to_string(),
                    uri: uri.to_string(),
                    error: e.to_string(),
                });
                Err(RegistryError::ResourceReadFailed {
                    server: server_name.to_string(),
                    uri: uri.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of every server, ordered by name
    pub fn get_servers(&self) -> Vec<ServerInstance> {
        let mut servers: Vec<ServerInstance> = self.servers.read().values().cloned().collect();
        servers.sort_by(|a, b| a.config.name.cmp(&b.config.name));
        servers
    }

    pub fn get_server(&self, name: &str) -> Option<ServerInstance> {
        self.servers.read().get(name).cloned()
    }

    pub fn get_running_servers(&self) -> Vec<ServerInstance> {
        self.get_servers()
            .into_iter()
            .filter(ServerInstance::is_running)
            .collect()
    }

    pub fn get_server_status(&self, name: &str) -> Option<ServerStatus> {
        self.servers.read().get(name).map(|s| s.status)
    }

    pub fn get_server_error(&self, name: &str) -> Option<String> {
        self.servers.read().get(name).and_then(|s| s.error.clone())
    }

    /// Tools grouped by running server
    pub fn get_available_tools(&self) -> Vec<ServerTools> {
        self.get_running_servers()
            .into_iter()
            .map(|s| ServerTools {
                server_name: s.config.name,
                tools: s.tools,
            })
            .collect()
    }

    /// Resources grouped by running server
    pub fn get_available_resources(&self) -> Vec<ServerResources> {
        self.get_running_servers()
            .into_iter()
            .map(|s| ServerResources {
                server_name: s.config.name,
                resources: s.resources,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Stop every live server concurrently, then drop all state and
    /// listeners
    pub async fn cleanup(&self) {
        let live: Vec<String> = self
            .get_servers()
            .into_iter()
            .filter(|s| s.status != ServerStatus::Stopped)
            .map(|s| s.config.name)
            .collect();

        self.logger.info(&format!(
            "[ServerRegistry] Cleaning up {} live servers",
            live.len()
        ));

        let results = join_all(live.iter().map(|name| self.stop_server(name))).await;
        for (name, result) in live.iter().zip(results) {
            if !matches!(result, Ok(true)) {
                self.logger
                    .warn(&format!("[ServerRegistry] {} did not stop cleanly", name));
            }
        }

        self.servers.write().clear();
        self.lifecycle_locks.lock().clear();
        self.events.clear();
    }
}

impl std::fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRegistry")
            .field("servers", &self.servers.read().len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::transport::{MockServer, MockTransport, TransportCall};
    use crate::types::ServerCategory;
    use serde_json::json;

    fn echo_server() -> MockServer {
        MockServer::new()
            .with_tool(Tool::new("echo", "Echo the input"), ToolOutput::text("ok"))
            .with_failing_tool(Tool::new("explode", "Always fails"), "kaboom")
            .with_resource(
                Resource::new("file:///notes", "Notes"),
                ResourceContent::text("file:///notes", "hello"),
            )
    }

    fn setup(transport: MockTransport) -> (Arc<ServerRegistry>, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let registry = ServerRegistry::with_options(
            transport.clone(),
            Arc::new(NoOpLogger),
            RegistryOptions::default().with_restart_delay(Duration::from_millis(5)),
        );
        (Arc::new(registry), transport)
    }

    fn config(name: &str) -> ServerConfig {
        ServerConfig::new(name, "npx", ServerCategory::Custom).with_args(["-y", "test-server"])
    }

    fn collect_kinds(registry: &ServerRegistry) -> Arc<Mutex<Vec<RegistryEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [
            RegistryEventKind::ServerStatusChanged,
            RegistryEventKind::ServerStarted,
            RegistryEventKind::ServerStopped,
            RegistryEventKind::ServerAdded,
            RegistryEventKind::ServerRemoved,
            RegistryEventKind::ToolCalled,
            RegistryEventKind::ToolError,
            RegistryEventKind::ResourceRead,
            RegistryEventKind::ResourceError,
        ] {
            let seen = Arc::clone(&seen);
            registry.add_event_listener(kind, move |e| seen.lock().push(e.clone()));
        }
        seen
    }

    #[test]
    fn test_filesystem_server_is_preconfigured() {
        let (registry, _) = setup(MockTransport::new());
        let fs = registry.get_server(FILESYSTEM_SERVER).unwrap();
        assert_eq!(fs.status, ServerStatus::Stopped);
        assert_eq!(fs.config.args.last().map(String::as_str), Some("/"));
    }

    #[test]
    fn test_add_server_rejects_duplicates_and_bad_names() {
        let (registry, _) = setup(MockTransport::new());
        let events = collect_kinds(&registry);

        registry.add_server(config("echo")).unwrap();
        assert_eq!(
            registry.add_server(config("echo")),
            Err(RegistryError::DuplicateServer("echo".into()))
        );
        assert_eq!(
            registry.add_server(config("my_server")),
            Err(RegistryError::InvalidServerName("my_server".into()))
        );
        assert_eq!(
            registry.add_server(config("")),
            Err(RegistryError::InvalidServerName("".into()))
        );

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), RegistryEventKind::ServerAdded);
        assert_eq!(
            registry.get_server_status("echo"),
            Some(ServerStatus::Stopped)
        );
    }

    #[tokio::test]
    async fn test_start_server_discovers_capabilities() {
        let (registry, _) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        let events = collect_kinds(&registry);

        assert!(registry.start_server("echo").await.unwrap());

        let server = registry.get_server("echo").unwrap();
        assert_eq!(server.status, ServerStatus::Running);
        assert_eq!(server.tools.len(), 2);
        assert_eq!(server.resources.len(), 1);
        assert!(server.last_started.is_some());
        assert!(server.error.is_none());

        let events = events.lock();
        assert!(matches!(
            events[0],
            RegistryEvent::ServerStatusChanged { status: ServerStatus::Starting, .. }
        ));
        assert!(matches!(
            events[1],
            RegistryEvent::ServerStatusChanged { status: ServerStatus::Running, .. }
        ));
        assert!(matches!(&events[2], RegistryEvent::ServerStarted { tools, .. } if tools.len() == 2));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (registry, transport) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();

        let events = collect_kinds(&registry);
        assert!(registry.start_server("echo").await.unwrap());

        assert!(events.lock().is_empty());
        assert_eq!(transport.connects_for("echo").len(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_sets_error() {
        let (registry, _) = setup(
            MockTransport::new().with_server("bad", MockServer::new().failing_connect("spawn npx ENOENT")),
        );
        registry.add_server(config("bad")).unwrap();
        let events = collect_kinds(&registry);

        assert!(!registry.start_server("bad").await.unwrap());

        assert_eq!(registry.get_server_status("bad"), Some(ServerStatus::Error));
        assert_eq!(
            registry.get_server_error("bad").as_deref(),
            Some("spawn npx ENOENT")
        );
        let events = events.lock();
        assert!(matches!(
            events.last(),
            Some(RegistryEvent::ServerStatusChanged { status: ServerStatus::Error, error: Some(msg), .. })
                if msg == "spawn npx ENOENT"
        ));
        assert!(!events
            .iter()
            .any(|e| e.kind() == RegistryEventKind::ServerStarted));
    }

    #[tokio::test]
    async fn test_list_tools_failure_sets_error_and_disconnects() {
        let (registry, transport) = setup(
            MockTransport::new().with_server("bad", MockServer::new().failing_list_tools("timeout")),
        );
        registry.add_server(config("bad")).unwrap();

        assert!(!registry.start_server("bad").await.unwrap());
        assert_eq!(registry.get_server_status("bad"), Some(ServerStatus::Error));
        assert!(registry.get_server("bad").unwrap().tools.is_empty());
        assert!(!transport.is_connected("bad"));
    }

    #[tokio::test]
    async fn test_resource_listing_failure_still_runs() {
        let server = MockServer::new()
            .with_tool(Tool::new("git_status", "status"), ToolOutput::text("clean"))
            .without_resource_support();
        let (registry, _) = setup(MockTransport::new().with_server("git", server));
        registry.add_server(config("git")).unwrap();

        assert!(registry.start_server("git").await.unwrap());

        let git = registry.get_server("git").unwrap();
        assert_eq!(git.status, ServerStatus::Running);
        assert!(git.resources.is_empty());
        assert_eq!(git.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_error_is_not_terminal() {
        let (registry, transport) = setup(
            MockTransport::new().with_server("flaky", MockServer::new().failing_connect("busy")),
        );
        registry.add_server(config("flaky")).unwrap();
        assert!(!registry.start_server("flaky").await.unwrap());

        transport.set_server("flaky", echo_server());
        assert!(registry.start_server("flaky").await.unwrap());
        assert_eq!(registry.get_server_status("flaky"), Some(ServerStatus::Running));
        assert!(registry.get_server_error("flaky").is_none());
    }

    #[tokio::test]
    async fn test_stop_server_clears_capabilities() {
        let (registry, _) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();
        let events = collect_kinds(&registry);

        assert!(registry.stop_server("echo").await.unwrap());

        let server = registry.get_server("echo").unwrap();
        assert_eq!(server.status, ServerStatus::Stopped);
        assert!(server.tools.is_empty());
        assert!(server.resources.is_empty());

        let kinds: Vec<_> = events.lock().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![RegistryEventKind::ServerStatusChanged, RegistryEventKind::ServerStopped]
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (registry, transport) = setup(MockTransport::new());
        registry.add_server(config("echo")).unwrap();
        let events = collect_kinds(&registry);

        assert!(registry.stop_server("echo").await.unwrap());
        assert!(events.lock().is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_failure_sets_error() {
        let (registry, _) = setup(MockTransport::new().with_server(
            "stuck",
            echo_server().failing_disconnect("process did not exit"),
        ));
        registry.add_server(config("stuck")).unwrap();
        registry.start_server("stuck").await.unwrap();

        assert!(!registry.stop_server("stuck").await.unwrap());
        let server = registry.get_server("stuck").unwrap();
        assert_eq!(server.status, ServerStatus::Error);
        assert_eq!(server.error.as_deref(), Some("process did not exit"));
        assert!(server.tools.is_empty());
    }

    #[tokio::test]
    async fn test_restart_always_stops_then_starts() {
        let (registry, transport) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();

        // Already stopped: the stop half is a no-op but start still runs
        assert!(registry.restart_server("echo").await.unwrap());
        assert_eq!(registry.get_server_status("echo"), Some(ServerStatus::Running));

        assert!(registry.restart_server("echo").await.unwrap());
        let calls: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, TransportCall::Connect { .. } | TransportCall::Disconnect { .. }))
            .collect();
        assert!(matches!(calls[0], TransportCall::Connect { .. }));
        assert!(matches!(calls[1], TransportCall::Disconnect { .. }));
        assert!(matches!(calls[2], TransportCall::Connect { .. }));
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_settling_delay() {
        let transport = Arc::new(MockTransport::new().with_server("echo", echo_server()));
        let registry = ServerRegistry::with_options(
            transport,
            Arc::new(NoOpLogger),
            RegistryOptions::default(),
        );
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();

        let before = tokio::time::Instant::now();
        registry.restart_server("echo").await.unwrap();
        assert!(before.elapsed() >= DEFAULT_RESTART_DELAY);
    }

    #[tokio::test]
    async fn test_remove_protected_server() {
        let (registry, _) = setup(MockTransport::new());
        assert_eq!(
            registry.remove_server(FILESYSTEM_SERVER).await,
            Err(RegistryError::ProtectedServer(FILESYSTEM_SERVER.into()))
        );

        registry.start_server(FILESYSTEM_SERVER).await.unwrap();
        assert_eq!(
            registry.remove_server(FILESYSTEM_SERVER).await,
            Err(RegistryError::ProtectedServer(FILESYSTEM_SERVER.into()))
        );
        assert!(registry.get_server(FILESYSTEM_SERVER).is_some());
    }

    #[tokio::test]
    async fn test_remove_running_server_stops_it() {
        let (registry, transport) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();
        let events = collect_kinds(&registry);

        registry.remove_server("echo").await.unwrap();

        assert!(registry.get_server("echo").is_none());
        assert!(!transport.is_connected("echo"));
        let kinds: Vec<_> = events.lock().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.last(), Some(&RegistryEventKind::ServerRemoved));
        assert!(kinds.contains(&RegistryEventKind::ServerStopped));

        assert_eq!(
            registry.remove_server("echo").await,
            Err(RegistryError::ServerNotFound("echo".into()))
        );
    }

    #[tokio::test]
    async fn test_update_config_does_not_restart() {
        let (registry, transport) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();

        let updated = registry
            .update_server_config("echo", ServerConfigPatch::new().args(["--verbose"]))
            .unwrap();
        assert_eq!(updated.args, vec!["--verbose"]);
        assert_eq!(updated.command, "npx");
        assert_eq!(transport.connects_for("echo").len(), 1);
        assert_eq!(registry.get_server_status("echo"), Some(ServerStatus::Running));

        assert_eq!(
            registry.update_server_config("ghost", ServerConfigPatch::new()),
            Err(RegistryError::ServerNotFound("ghost".into()))
        );
    }

    #[tokio::test]
    async fn test_call_tool_guards() {
        let (registry, _) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();

        assert_eq!(
            registry.call_tool("echo", "echo", json!({})).await,
            Err(RegistryError::ServerNotRunning("echo".into()))
        );
        assert_eq!(
            registry.call_tool("ghost", "echo", json!({})).await,
            Err(RegistryError::ServerNotFound("ghost".into()))
        );

        registry.start_server("echo").await.unwrap();
        assert_eq!(
            registry.call_tool("echo", "missing", json!({})).await,
            Err(RegistryError::ToolNotFound {
                server: "echo".into(),
                tool: "missing".into()
            })
        );
    }

    #[tokio::test]
    async fn test_call_tool_emits_after_transport() {
        let (registry, _) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();
        let events = collect_kinds(&registry);

        let output = registry.call_tool("echo", "echo", json!({"x": 1})).await.unwrap();
        assert_eq!(output.to_text(), "ok");

        let err = registry.call_tool("echo", "explode", json!({})).await.unwrap_err();
        assert!(matches!(err, RegistryError::ToolCallFailed { ref message, .. } if message == "kaboom"));

        let events = events.lock();
        assert!(matches!(
            &events[0],
            RegistryEvent::ToolCalled { tool_name, arguments, .. }
                if tool_name == "echo" && arguments == &json!({"x": 1})
        ));
        assert!(matches!(
            &events[1],
            RegistryEvent::ToolError { error, .. } if error == "kaboom"
        ));
    }

    #[tokio::test]
    async fn test_read_resource() {
        let (registry, _) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();

        assert_eq!(
            registry.read_resource("echo", "file:///notes").await,
            Err(RegistryError::ServerNotRunning("echo".into()))
        );

        registry.start_server("echo").await.unwrap();
        let events = collect_kinds(&registry);

        let content = registry.read_resource("echo", "file:///notes").await.unwrap();
        assert_eq!(content.to_text(), "hello");
        assert!(registry.read_resource("echo", "file:///missing").await.is_err());

        let kinds: Vec<_> = events.lock().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![RegistryEventKind::ResourceRead, RegistryEventKind::ResourceError]
        );
    }

    #[tokio::test]
    async fn test_available_tools_only_from_running_servers() {
        let (registry, _) = setup(
            MockTransport::new()
                .with_server("echo", echo_server())
                .with_server("git", MockServer::new().with_tool(Tool::new("git_log", "log"), ToolOutput::text(""))),
        );
        registry.add_server(config("echo")).unwrap();
        registry.add_server(config("git")).unwrap();
        registry.start_server("git").await.unwrap();

        let tools = registry.get_available_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].server_name, "git");

        registry.start_server("echo").await.unwrap();
        let names: Vec<_> = registry
            .get_available_tools()
            .into_iter()
            .map(|g| g.server_name)
            .collect();
        assert_eq!(names, vec!["echo", "git"]);

        let resources = registry.get_available_resources();
        assert_eq!(resources[0].resources.len(), 1);
        assert!(resources[1].resources.is_empty());
        assert_eq!(registry.get_running_servers().len(), 2);
    }

    #[tokio::test]
    async fn test_set_workspace_root_starts_stopped_server() {
        let (registry, transport) = setup(MockTransport::new());

        let task = registry.set_workspace_root(Some("/work/project".into()));
        assert_eq!(task.action(), WorkspaceRootAction::Start);
        // Config is rewritten synchronously
        assert_eq!(
            registry.get_server(FILESYSTEM_SERVER).unwrap().config.args.last().map(String::as_str),
            Some("/work/project")
        );

        assert!(task.wait().await.unwrap());
        assert_eq!(
            registry.get_server_status(FILESYSTEM_SERVER),
            Some(ServerStatus::Running)
        );
        let connects = transport.connects_for(FILESYSTEM_SERVER);
        assert_eq!(connects.last().unwrap().last().unwrap(), "/work/project");
    }

    #[tokio::test]
    async fn test_set_workspace_root_restarts_running_server() {
        let (registry, transport) = setup(MockTransport::new());
        registry.start_server(FILESYSTEM_SERVER).await.unwrap();

        let task = registry.set_workspace_root(Some("/other".into()));
        assert_eq!(task.action(), WorkspaceRootAction::Restart);
        assert!(task.wait().await.unwrap());

        let connects = transport.connects_for(FILESYSTEM_SERVER);
        assert_eq!(connects.len(), 2);
        assert_eq!(connects[1].last().unwrap(), "/other");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_workspace_root_during_start_applies_new_root() {
        let (registry, transport) =
            setup(MockTransport::new().with_connect_delay(Duration::from_millis(50)));

        let starting = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.start_server(FILESYSTEM_SERVER).await })
        };
        while registry.get_server_status(FILESYSTEM_SERVER) != Some(ServerStatus::Starting) {
            tokio::task::yield_now().await;
        }

        let task = registry.set_workspace_root(Some("/work/new".into()));
        assert_eq!(task.action(), WorkspaceRootAction::Restart);

        assert!(starting.await.unwrap().unwrap());
        assert!(task.wait().await.unwrap());

        let connects = transport.connects_for(FILESYSTEM_SERVER);
        assert_eq!(connects.len(), 2);
        assert_eq!(connects[0].last().unwrap(), "/");
        assert_eq!(connects[1].last().unwrap(), "/work/new");
        assert_eq!(
            registry.get_server_status(FILESYSTEM_SERVER),
            Some(ServerStatus::Running)
        );
    }

    #[tokio::test]
    async fn test_clearing_workspace_root() {
        let (registry, _) = setup(MockTransport::new());

        let task = registry.set_workspace_root(None);
        assert_eq!(task.action(), WorkspaceRootAction::None);
        assert!(task.wait().await.unwrap());

        registry.start_server(FILESYSTEM_SERVER).await.unwrap();
        let task = registry.set_workspace_root(None);
        assert_eq!(task.action(), WorkspaceRootAction::Stop);
        task.wait().await.unwrap();
        assert_eq!(
            registry.get_server_status(FILESYSTEM_SERVER),
            Some(ServerStatus::Stopped)
        );
        assert_eq!(
            registry.get_server(FILESYSTEM_SERVER).unwrap().config.args.last().map(String::as_str),
            Some("/")
        );
    }

    #[tokio::test]
    async fn test_concurrent_starts_connect_once() {
        let (registry, transport) = setup(
            MockTransport::new()
                .with_server("echo", echo_server())
                .with_connect_delay(Duration::from_millis(20)),
        );
        registry.add_server(config("echo")).unwrap();

        let (a, b) = tokio::join!(registry.start_server("echo"), registry.start_server("echo"));
        assert!(a.unwrap() && b.unwrap());
        assert_eq!(transport.connects_for("echo").len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_stops_everything() {
        let (registry, transport) = setup(MockTransport::new().with_server("echo", echo_server()));
        registry.add_server(config("echo")).unwrap();
        registry.start_server("echo").await.unwrap();
        registry.start_server(FILESYSTEM_SERVER).await.unwrap();
        let mut rx = registry.subscribe();

        registry.cleanup().await;

        assert!(!transport.is_connected("echo"));
        assert!(!transport.is_connected(FILESYSTEM_SERVER));
        assert!(registry.get_servers().is_empty());
        assert_eq!(
            registry.events().listener_count(RegistryEventKind::ServerStopped),
            0
        );

        // Stop events were delivered before the channel closed
        let mut stopped = 0;
        while let Some(event) = rx.recv().await {
            if event.kind() == RegistryEventKind::ServerStopped {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 2);
    }
}
