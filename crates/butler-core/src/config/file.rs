//! File-based configuration loader (YAML)
//!
//! Reads the user-level settings file (~/.config/butler/config.yaml).

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::engine::EngineConfig;
use super::traits::{ConfigError, ConfigLoader, ConfigResult};

/// YAML file configuration loader
///
/// # Example
///
/// ```no_run
/// use butler_core::config::{ConfigLoader, FileConfigLoader};
///
/// # async fn run() -> butler_core::config::ConfigResult<()> {
/// let config = FileConfigLoader::user().load().await?;
/// println!("model: {}", config.model);
/// # Ok(())
/// # }
/// ```
pub struct FileConfigLoader {
    path: PathBuf,
    cache: RwLock<Option<EngineConfig>>,
}

impl FileConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// User-level loader (~/.config/butler/config.yaml)
    pub fn user() -> Self {
        // XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("butler").join("config.yaml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> ConfigResult<EngineConfig> {
        if !self.path.exists() {
            return Ok(EngineConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(EngineConfig::default());
        }

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", self.path.display(), e)))
    }

    /// Drop the cache and read from disk again
    pub fn reload(&self) -> ConfigResult<EngineConfig> {
        let config = self.read()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }
}

impl std::fmt::Debug for FileConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigLoader")
            .field("path", &self.path)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load(&self) -> ConfigResult<EngineConfig> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }
        self.reload()
    }

    async fn save(&self, config: &EngineConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(config)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize YAML: {}", e)))?;
        fs::write(&self.path, content)?;

        *self.cache.write() = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loader = FileConfigLoader::new(dir.path().join("config.yaml"));

        assert!(!loader.exists());
        assert_eq!(loader.load().await.unwrap(), EngineConfig::default());
    }

    #[tokio::test]
    async fn test_reads_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "provider: openai\nmodel: gpt-4o\nrestart_delay_ms: 100\n").unwrap();

        let config = FileConfigLoader::new(&path).load().await.unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.restart_delay_ms, 100);
        assert_eq!(config.max_tokens, 4000);
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "max_tokens: [not, a, number]\n").unwrap();

        let err = FileConfigLoader::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let loader = FileConfigLoader::new(&path);

        let config = EngineConfig {
            default_root: "/srv/project".into(),
            ..Default::default()
        };
        loader.save(&config).await.unwrap();
        assert!(loader.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("/srv/project"));

        let fresh = FileConfigLoader::new(&path);
        assert_eq!(fresh.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_is_cached_until_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "model: first\n").unwrap();

        let loader = FileConfigLoader::new(&path);
        assert_eq!(loader.load().await.unwrap().model, "first");

        fs::write(&path, "model: second\n").unwrap();
        assert_eq!(loader.load().await.unwrap().model, "first");
        assert_eq!(loader.reload().unwrap().model, "second");
    }
}
