//! Model provider implementations
//!
//! ## Architecture
//!
//! Providers expose one streaming interface: a sequence of block events
//! (`ProviderEvent`). The batch form (`complete`) is derived from it by
//! `collect_blocks`, so every provider supports both.
//!
//! The production provider uses the `genai` crate, which handles:
//! - Streaming SSE parsing
//! - Provider-specific protocols (Anthropic, OpenAI, Gemini, etc.)
//! - Tool calling
//!
//! The `ScriptedProvider` replays fixed turns for tests.

mod error;
mod genai_adapter;
mod genai_provider;
mod scripted;
mod traits;

pub use error::{ProviderError, ProviderResult};
pub use genai_adapter::{is_genai_native, is_genai_supported, GenaiEventMapper, ProviderConfig};
pub use genai_provider::GenaiProvider;
pub use scripted::{ScriptedProvider, ScriptedTurn};
pub use traits::{collect_blocks, ModelProvider, ModelRequest, ProviderEventStream};

use crate::logging::Logger;
use std::sync::Arc;

/// Create a provider for the given provider ID
///
/// `scripted` yields an echoing `ScriptedProvider`; anything else goes
/// through `GenaiProvider`, with unknown IDs treated as OpenAI-compatible.
pub fn create_provider(provider_id: &str, logger: Arc<dyn Logger>) -> Arc<dyn ModelProvider> {
    match provider_id.to_lowercase().as_str() {
        "scripted" => Arc::new(ScriptedProvider::new(logger)),
        _ => Arc::new(GenaiProvider::new(provider_id, logger)),
    }
}

/// List all supported provider IDs
pub fn supported_providers() -> Vec<&'static str> {
    vec![
        "anthropic",
        "openai",
        "gemini",
        "ollama",
        "groq",
        "xai",
        "deepseek",
        "cohere",
        "fireworks",
        "together",
        "azure",
        "openrouter",
        "mistral",
        "scripted",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_create_provider() {
        assert_eq!(create_provider("scripted", Arc::new(NoOpLogger)).name(), "scripted");
        assert_eq!(create_provider("anthropic", Arc::new(NoOpLogger)).name(), "anthropic");
    }

    #[test]
    fn test_supported_providers_are_routable() {
        for id in supported_providers() {
            assert!(id == "scripted" || is_genai_supported(id), "{} is not routable", id);
        }
    }
}
