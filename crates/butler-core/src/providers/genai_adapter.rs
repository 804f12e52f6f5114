//! Adapter between butler-core types and genai types
//!
//! genai streams text as chunks and tool calls as `ToolCallChunk`s, and
//! repeats the tool calls on `End` (with `capture_tool_calls`).
//! `GenaiEventMapper` turns that into the block protocol of `ProviderEvent`
//! while keeping text and tool calls in arrival order.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions, ChatRequest, ChatStreamEvent,
    Tool as GenaiTool, ToolCall as GenaiToolCall,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};

use super::traits::ModelRequest;
use crate::types::{ChatMessage, MessageRole, ProviderEvent, Tool};

// ============================================================================
// Request Conversion: butler -> genai
// ============================================================================

pub fn to_genai_message(msg: ChatMessage) -> GenaiMessage {
    match msg.role {
        MessageRole::User => GenaiMessage::user(msg.content),
        MessageRole::Assistant => GenaiMessage::assistant(msg.content),
    }
}

pub fn to_genai_tool(tool: Tool) -> GenaiTool {
    GenaiTool::new(&tool.name)
        .with_description(&tool.description)
        .with_schema(tool.input_schema)
}

/// Build the chat request for one model turn
pub fn to_genai_request(request: &ModelRequest) -> ChatRequest {
    let messages = request
        .messages
        .iter()
        .cloned()
        .map(to_genai_message)
        .collect::<Vec<_>>();

    let mut chat_req = ChatRequest::new(messages);
    if !request.system_prompt.is_empty() {
        chat_req = chat_req.with_system(request.system_prompt.clone());
    }
    if !request.tools.is_empty() {
        chat_req = chat_req.with_tools(request.tools.iter().cloned().map(to_genai_tool).collect::<Vec<_>>());
    }
    chat_req
}

pub fn to_genai_options(request: &ModelRequest) -> GenaiOptions {
    GenaiOptions::default()
        .with_max_tokens(request.max_tokens)
        // Final tool calls are repeated on the End event
        .with_capture_tool_calls(true)
}

// ============================================================================
// Response Conversion: genai -> butler
// ============================================================================

/// JSON text of genai tool arguments.
///
/// OpenAI-style adapters hand over the raw argument string, Anthropic and
/// Gemini a parsed value.
fn arguments_text(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Stateful translation of genai stream events into block events.
///
/// A tool call is held until the stream moves past it, since some adapters
/// send a growing snapshot of the same call on every argument delta. Calls
/// captured on `End` are only replayed when no chunk announced them.
#[derive(Debug, Default)]
pub struct GenaiEventMapper {
    text_open: bool,
    pending: Option<GenaiToolCall>,
    emitted: HashSet<String>,
}

impl GenaiEventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events to emit for one genai event, in order
    pub fn map(&mut self, event: ChatStreamEvent) -> Vec<ProviderEvent> {
        match event {
            ChatStreamEvent::Chunk(chunk) => {
                if chunk.content.is_empty() {
                    return Vec::new();
                }
                let mut events = self.flush_pending();
                if !self.text_open {
                    self.text_open = true;
                    events.push(ProviderEvent::text_start());
                }
                events.push(ProviderEvent::text(chunk.content));
                events
            }
            ChatStreamEvent::ToolCallChunk(chunk) => {
                let mut events = self.close_text();
                let same_call = self
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.call_id == chunk.tool_call.call_id);
                if !same_call {
                    events.extend(self.flush_pending());
                }
                if !self.emitted.contains(&chunk.tool_call.call_id) {
                    self.pending = Some(chunk.tool_call);
                }
                events
            }
            ChatStreamEvent::End(end) => {
                let mut events = self.close_text();
                if let Some(tool_calls) = end.captured_tool_calls() {
                    // The captured call is final; prefer it over the last snapshot
                    if let Some(pending) = self.pending.as_mut() {
                        if let Some(captured) = tool_calls.iter().find(|tc| tc.call_id == pending.call_id) {
                            *pending = (*captured).clone();
                        }
                    }
                    events.extend(self.flush_pending());
                    for tc in tool_calls {
                        if self.emitted.insert(tc.call_id.clone()) {
                            events.extend(tool_events(tc));
                        }
                    }
                }
                events.extend(self.finish());
                events
            }
            _ => Vec::new(),
        }
    }

    /// Close whatever is still open. Used when the stream ends without `End`.
    pub fn finish(&mut self) -> Vec<ProviderEvent> {
        let mut events = self.close_text();
        events.extend(self.flush_pending());
        events
    }

    fn close_text(&mut self) -> Vec<ProviderEvent> {
        if std::mem::take(&mut self.text_open) {
            vec![ProviderEvent::stop()]
        } else {
            Vec::new()
        }
    }

    fn flush_pending(&mut self) -> Vec<ProviderEvent> {
        match self.pending.take() {
            Some(tc) => {
                self.emitted.insert(tc.call_id.clone());
                tool_events(&tc)
            }
            None => Vec::new(),
        }
    }
}

fn tool_events(tc: &GenaiToolCall) -> Vec<ProviderEvent> {
    vec![
        ProviderEvent::tool_start(tc.call_id.clone(), tc.fn_name.clone()),
        ProviderEvent::arguments(arguments_text(&tc.fn_arguments)),
        ProviderEvent::stop(),
    ]
}

// ============================================================================
// Client Creation
// ============================================================================

/// Provider configuration for routing
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier (e.g., "anthropic", "openai", "openrouter")
    pub provider: String,
    /// API key; when unset the provider's environment variable is used
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key: None,
            api_base: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }
}

/// Environment variable holding the API key of a provider
pub fn provider_to_env_key(provider: &str) -> String {
    match provider.to_lowercase().as_str() {
        "gemini" | "google" => "GEMINI_API_KEY".to_string(),
        "azure" => "AZURE_OPENAI_API_KEY".to_string(),
        other => format!("{}_API_KEY", other.to_uppercase()),
    }
}

/// Create a genai Client with key and endpoint resolution for `config`
pub fn create_client(config: &ProviderConfig) -> Client {
    let auth_provider = config.provider.clone();
    let auth_explicit_key = config.api_key.clone();

    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |_model_iden: ModelIden| -> Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>> {
            let provider = auth_provider.clone();
            let explicit_key = auth_explicit_key.clone();

            Box::pin(async move {
                if let Some(key) = explicit_key {
                    return Ok(Some(AuthData::from_single(key)));
                }
                // None lets genai fall back to the adapter default (also fine for Ollama)
                Ok(std::env::var(provider_to_env_key(&provider))
                    .ok()
                    .map(AuthData::from_single))
            })
        },
    );

    let target_provider = config.provider.clone();
    let target_api_base = config.api_base.clone();

    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { ref model, .. } = target;

            let endpoint = match target_provider.as_str() {
                // OpenAI-compatible providers
                "azure" => target_api_base
                    .as_ref()
                    .map(|u| Endpoint::from_owned(u.clone()))
                    .unwrap_or_else(|| Endpoint::from_static("https://your-resource.openai.azure.com/")),
                "openrouter" => Endpoint::from_static("https://openrouter.ai/api/v1/"),
                "mistral" => Endpoint::from_static("https://api.mistral.ai/v1/"),
                // Native genai providers, optionally behind a custom base
                _ => match &target_api_base {
                    Some(base) => {
                        return Ok(ServiceTarget {
                            endpoint: Endpoint::from_owned(base.clone()),
                            auth: target.auth,
                            model: target.model,
                        })
                    }
                    None => return Ok(target),
                },
            };

            let resolved_model = ModelIden::new(AdapterKind::OpenAI, model.model_name.clone());
            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model: resolved_model,
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}

/// Check if a provider is natively supported by genai
pub fn is_genai_native(provider: &str) -> bool {
    matches!(
        provider.to_lowercase().as_str(),
        "openai"
            | "anthropic"
            | "gemini"
            | "ollama"
            | "groq"
            | "xai"
            | "deepseek"
            | "cohere"
            | "fireworks"
            | "together"
    )
}

/// Check if a provider can be handled by genai (native or via OpenAI-compat)
pub fn is_genai_supported(provider: &str) -> bool {
    is_genai_native(provider)
        || matches!(
            provider.to_lowercase().as_str(),
            "azure" | "openrouter" | "mistral"
        )
}
