//! Engine configuration
//!
//! Supports multiple configuration sources:
//! - `FileConfigLoader`: YAML file-based (user level)
//! - `MemoryConfigLoader`: In-memory for testing

mod engine;
mod file;
mod memory;
mod traits;

pub use engine::{EngineConfig, DEFAULT_LOG_FILTER, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use file::FileConfigLoader;
pub use memory::MemoryConfigLoader;
pub use traits::{ConfigError, ConfigLoader, ConfigResult};
