//! Engine settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::DriverOptions;
use crate::logging::init_tracing;
use crate::registry::RegistryOptions;

pub const DEFAULT_PROVIDER: &str = "anthropic";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_LOG_FILTER: &str = "butler_core=info";

/// Settings for the registry, the driver and logging
///
/// Every field is optional in YAML; missing ones take their default.
///
/// ```yaml
/// restart_delay_ms: 500
/// default_root: /
/// provider: anthropic
/// model: claude-sonnet-4-20250514
/// max_tokens: 4000
/// log_filter: butler_core=debug
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause between stop and start on restart
    pub restart_delay_ms: u64,
    /// Filesystem server root when no workspace is open
    pub default_root: String,
    /// Provider id handed to `GenaiProvider`
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 500,
            default_root: "/".to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions::default()
            .with_restart_delay(self.restart_delay())
            .with_default_root(self.default_root.clone())
    }

    /// Install the global `tracing` subscriber with `log_filter`.
    /// Returns `false` if one was already installed.
    pub fn init_logging(&self) -> bool {
        init_tracing(&self.log_filter)
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("model: gpt-4o\nmax_tokens: 1024\n").unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.restart_delay_ms, 500);
        assert_eq!(config.default_root, "/");
    }

    #[test]
    fn test_converts_into_component_options() {
        let config = EngineConfig {
            restart_delay_ms: 50,
            default_root: "/home/dev".into(),
            ..Default::default()
        };

        let registry = config.registry_options();
        assert_eq!(registry.restart_delay, Duration::from_millis(50));
        assert_eq!(registry.default_root, "/home/dev");

        let driver = config.driver_options();
        assert_eq!(driver.model, DEFAULT_MODEL);
        assert_eq!(driver.max_tokens, DEFAULT_MAX_TOKENS);
    }
}
