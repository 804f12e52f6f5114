//! In-memory configuration loader

use async_trait::async_trait;
use parking_lot::RwLock;

use super::engine::EngineConfig;
use super::traits::{ConfigLoader, ConfigResult};

/// In-memory configuration loader for testing
#[derive(Debug, Default)]
pub struct MemoryConfigLoader {
    config: RwLock<EngineConfig>,
}

impl MemoryConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the stored settings
    pub fn set(&self, config: EngineConfig) {
        *self.config.write() = config;
    }
}

#[async_trait]
impl ConfigLoader for MemoryConfigLoader {
    async fn load(&self) -> ConfigResult<EngineConfig> {
        Ok(self.config.read().clone())
    }

    async fn save(&self, config: &EngineConfig) -> ConfigResult<()> {
        self.set(config.clone());
        Ok(())
    }
}
