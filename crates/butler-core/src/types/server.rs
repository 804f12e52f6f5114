//! Capability server configuration and runtime instance types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resource::Resource;
use super::tool::Tool;

/// Category of a capability server, used for grouping in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerCategory {
    Filesystem,
    Database,
    Web,
    Git,
    Custom,
}

impl std::fmt::Display for ServerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerCategory::Filesystem => write!(f, "filesystem"),
            ServerCategory::Database => write!(f, "database"),
            ServerCategory::Web => write!(f, "web"),
            ServerCategory::Git => write!(f, "git"),
            ServerCategory::Custom => write!(f, "custom"),
        }
    }
}

/// Lifecycle status of a capability server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

impl ServerStatus {
    /// Whether the lifecycle controller may move from `self` to `next`.
    ///
    /// Restart goes through `stopped` first, so `starting` is only reachable
    /// from `stopped` or `error`.
    pub fn can_transition_to(self, next: ServerStatus) -> bool {
        use ServerStatus::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Error, Starting)
                | (Starting, Running)
                | (Starting, Error)
                | (Running, Error)
                | (Starting, Stopped)
                | (Running, Stopped)
                | (Error, Stopped)
        )
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Stopped => write!(f, "stopped"),
            ServerStatus::Starting => write!(f, "starting"),
            ServerStatus::Running => write!(f, "running"),
            ServerStatus::Error => write!(f, "error"),
        }
    }
}

/// Configuration for a capability server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique server name (registry key)
    pub name: String,
    /// Executable to launch
    pub command: String,
    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the server process
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Server category
    pub category: ServerCategory,
}

impl ServerConfig {
    /// Create a new server configuration with no arguments
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        category: ServerCategory,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: vec![],
            env: HashMap::new(),
            description: String::new(),
            category,
        }
    }

    /// Set the arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Shallow-merge a patch into this config. Unset fields are left alone.
    pub fn apply(&mut self, patch: ServerConfigPatch) {
        if let Some(command) = patch.command {
            self.command = command;
        }
        if let Some(args) = patch.args {
            self.args = args;
        }
        if let Some(env) = patch.env {
            self.env = env;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
    }
}

/// Partial server configuration for `update_server_config`
///
/// The name is the registry key and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ServerCategory>,
}

impl ServerConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Runtime state of a configured server
///
/// The registry owns these; callers only ever see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInstance {
    pub config: ServerConfig,
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tools: Vec<Tool>,
    pub resources: Vec<Resource>,
    #[serde(rename = "lastStarted", skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
}

impl ServerInstance {
    /// Create a stopped instance for a config
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            status: ServerStatus::Stopped,
            error: None,
            tools: vec![],
            resources: vec![],
            last_started: None,
        }
    }

    /// Server name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_running(&self) -> bool {
        self.status == ServerStatus::Running
    }

    /// Look up a tool by its bare name
    pub fn find_tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_edges() {
        use ServerStatus::*;
        assert!(Stopped.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Error));
        assert!(Running.can_transition_to(Error));
        assert!(Error.can_transition_to(Starting));
        assert!(Error.can_transition_to(Stopped));

        assert!(!Stopped.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Stopped.can_transition_to(Error));
    }

    #[test]
    fn test_patch_is_shallow_merge() {
        let mut config = ServerConfig::new("git", "npx", ServerCategory::Git)
            .with_args(["-y", "@modelcontextprotocol/server-git"])
            .with_description("Git operations");

        config.apply(ServerConfigPatch::new().args(["--repo", "/src"]));

        assert_eq!(config.args, vec!["--repo", "/src"]);
        assert_eq!(config.command, "npx");
        assert_eq!(config.description, "Git operations");
        assert_eq!(config.category, ServerCategory::Git);
    }

    #[test]
    fn test_config_serialization() {
        let config = ServerConfig::new("sqlite", "npx", ServerCategory::Database);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"category\":\"database\""));
        assert!(!json.contains("\"env\""));

        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_new_instance_is_stopped() {
        let instance = ServerInstance::new(ServerConfig::new("web", "npx", ServerCategory::Web));
        assert_eq!(instance.status, ServerStatus::Stopped);
        assert!(instance.tools.is_empty());
        assert!(instance.last_started.is_none());
        assert!(!instance.is_running());
    }
}
