//! Configuration loader trait

use async_trait::async_trait;

use super::engine::EngineConfig;

/// Source of engine settings
///
/// Implementations:
/// - `FileConfigLoader`: YAML file (~/.config/butler/config.yaml)
/// - `MemoryConfigLoader`: In-memory for testing
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// Load the current settings. A source with nothing stored yields
    /// `EngineConfig::default()`.
    async fn load(&self) -> ConfigResult<EngineConfig>;

    /// Persist settings
    async fn save(&self, config: &EngineConfig) -> ConfigResult<()>;
}

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
