//! Butler Core
//!
//! Tool-use orchestration engine for an AI code assistant.
//! This crate manages external capability servers (MCP servers over
//! stdio) and drives model responses that call their tools.
//!
//! ## Components
//!
//! - `registry`: server configs, start/stop/restart lifecycle, the
//!   namespaced tool catalog
//! - `events`: every registry transition as an immutable event
//! - `driver`: one model turn with tool calls spliced into the transcript
//! - `providers`: the model boundary (`genai` in production)
//! - `transport`: the server boundary (`rmcp` child processes in production)
//!
//! ```rust,ignore
//! use butler_core::{ResponseDriver, RmcpTransport, ServerRegistry, TracingLogger};
//!
//! let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());
//! let transport = Arc::new(RmcpTransport::new(logger.clone()));
//! let registry = Arc::new(ServerRegistry::new(transport, logger.clone()));
//!
//! registry.set_workspace_root(Some("/home/me/project".into())).wait().await?;
//!
//! let driver = ResponseDriver::new(provider, registry.clone(), logger, DriverOptions::default());
//! let answer = driver.respond(CodeRequest::new(code, "rust", "What does this do?")).await?;
//! ```

pub mod config;
pub mod driver;
pub mod events;
pub mod logging;
pub mod providers;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use types::{
    ChatMessage, ContentBlock, MessageRole, ProviderEvent, Resource, ResourceContent,
    ServerCategory, ServerConfig, ServerConfigPatch, ServerInstance, ServerStatus, Tool, ToolCall,
    ToolOutput, TranscriptEntry, TranscriptSegment,
};

pub use logging::{init_tracing, Logger, NoOpLogger, TracingLogger};

pub use config::{ConfigError, ConfigLoader, EngineConfig, FileConfigLoader, MemoryConfigLoader};

pub use events::{EventBus, ListenerId, RegistryEvent, RegistryEventKind};

pub use registry::{
    RegistryError, RegistryOptions, RegistryResult, ServerRegistry, WorkspaceRootAction,
    WorkspaceRootTask, FILESYSTEM_SERVER,
};

pub use transport::{MockTransport, RmcpTransport, Transport, TransportError};

pub use providers::{
    create_provider, GenaiProvider, ModelProvider, ModelRequest, ProviderError, ScriptedProvider,
};

pub use driver::{CodeRequest, DriverError, DriverOptions, ResponseDriver, TranscriptStream};
