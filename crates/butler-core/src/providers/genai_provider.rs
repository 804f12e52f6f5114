//! GenaiProvider - Unified provider using the genai crate
//!
//! Handles all genai-supported providers (Anthropic, OpenAI, Gemini, etc.)
//! as well as OpenAI-compatible ones (Azure, OpenRouter, Mistral) via the
//! ServiceTargetResolver.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::ChatStreamEvent;

use crate::logging::Logger;

use super::error::{ProviderError, ProviderResult};
use super::genai_adapter::{
    create_client, is_genai_supported, to_genai_options, to_genai_request, GenaiEventMapper,
    ProviderConfig,
};
use super::traits::{ModelProvider, ModelRequest, ProviderEventStream};

/// Unified provider using genai for all supported LLM APIs
pub struct GenaiProvider {
    config: ProviderConfig,
    logger: Arc<dyn Logger>,
}

impl GenaiProvider {
    pub fn new(provider_id: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(ProviderConfig::new(provider_id), logger)
    }

    /// Create with an explicit key or endpoint
    pub fn with_config(config: ProviderConfig, logger: Arc<dyn Logger>) -> Self {
        Self { config, logger }
    }

    /// Check if this provider can handle the given provider ID
    pub fn supports(provider_id: &str) -> bool {
        is_genai_supported(provider_id)
    }

    /// Extract model name from a model string (e.g., "openai/gpt-4" -> "gpt-4")
    pub fn extract_model_name(model: &str) -> &str {
        model.split('/').nth(1).unwrap_or(model)
    }
}

impl std::fmt::Debug for GenaiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiProvider")
            .field("provider", &self.config.provider)
            .field("api_base", &self.config.api_base)
            .finish()
    }
}

#[async_trait]
impl ModelProvider for GenaiProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn stream(&self, request: ModelRequest) -> ProviderResult<ProviderEventStream> {
        let model_name = Self::extract_model_name(&request.model).to_string();
        self.logger.info(&format!(
            "[GenaiProvider] stream called: provider={}, model={}, tools={}",
            self.config.provider,
            model_name,
            request.tools.len()
        ));

        let client = create_client(&self.config);
        let chat_req = to_genai_request(&request);
        let options = to_genai_options(&request);

        let chat_stream = client
            .exec_chat_stream(&model_name, chat_req, Some(&options))
            .await
            .map_err(|e| ProviderError::api(self.config.provider.clone(), e.to_string()))?;

        self.logger.info("[GenaiProvider] Stream started successfully");

        let logger = Arc::clone(&self.logger);
        let provider_id = self.config.provider.clone();
        let mut inner = Box::pin(chat_stream.stream);

        let stream = async_stream::stream! {
            let mut mapper = GenaiEventMapper::new();
            while let Some(result) = inner.next().await {
                match result {
                    Ok(event) => {
                        match &event {
                            ChatStreamEvent::Chunk(c) => logger.debug(&format!(
                                "[GenaiProvider] Stream event: Chunk ({} chars)",
                                c.content.len()
                            )),
                            ChatStreamEvent::ToolCallChunk(c) => logger.debug(&format!(
                                "[GenaiProvider] Stream event: ToolCallChunk ({})",
                                c.tool_call.fn_name
                            )),
                            ChatStreamEvent::End(_) => logger.info("[GenaiProvider] Stream event: End"),
                            _ => {}
                        }
                        for mapped in mapper.map(event) {
                            yield Ok(mapped);
                        }
                    }
                    Err(e) => {
                        logger.error(&format!("[GenaiProvider] Stream error: {}", e));
                        yield Err(ProviderError::api(provider_id.clone(), e.to_string()));
                        return;
                    }
                }
            }
            for mapped in mapper.finish() {
                yield Ok(mapped);
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_extract_model_name() {
        assert_eq!(GenaiProvider::extract_model_name("openai/gpt-4"), "gpt-4");
        assert_eq!(
            GenaiProvider::extract_model_name("claude-sonnet-4-20250514"),
            "claude-sonnet-4-20250514"
        );
    }

    #[test]
    fn test_supports() {
        assert!(GenaiProvider::supports("anthropic"));
        assert!(GenaiProvider::supports("openrouter"));
        assert!(!GenaiProvider::supports("unknown_provider"));
    }

    #[test]
    fn test_name_is_provider_id() {
        let provider = GenaiProvider::new("anthropic", Arc::new(NoOpLogger));
        assert_eq!(provider.name(), "anthropic");

        let provider = GenaiProvider::with_config(
            ProviderConfig::new("azure").with_api_base("https://example.openai.azure.com/"),
            Arc::new(NoOpLogger),
        );
        assert_eq!(provider.name(), "azure");
    }
}
