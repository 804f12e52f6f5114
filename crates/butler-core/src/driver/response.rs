//! Tool-use response driver
//!
//! Runs one model turn against the current tool catalog and splices tool
//! results into the assistant transcript. The model is not re-invoked with
//! the results.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;

use super::error::{DriverError, DriverResult};
use super::prompt::{
    build_generation_prompt, build_system_prompt, EXPLAIN_CODE_MESSAGE, FIND_BUGS_MESSAGE,
    OPTIMIZE_CODE_MESSAGE,
};
use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::logging::Logger;
use crate::providers::{ModelProvider, ModelRequest};
use crate::registry::{
    build_catalog, catalog_tools, describe_catalog, split_qualified, RegistryError, ServerRegistry,
};
use crate::types::{BlockDelta, BlockStart, ChatMessage, ContentBlock, ProviderEvent, TranscriptSegment};

/// Transcript fragments produced by `respond_stream`
pub type TranscriptStream = Pin<Box<dyn Stream<Item = DriverResult<String>> + Send>>;

/// Model parameters for every request the driver sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// A chat request about the code in the active editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRequest {
    pub code: String,
    pub language: String,
    pub user_message: String,
    pub file_name: Option<String>,
}

impl CodeRequest {
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            user_message: user_message.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Tool call being assembled from argument fragments
#[derive(Debug, Clone, PartialEq)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// What the stream does after one provider event
#[derive(Debug, PartialEq)]
enum Step {
    Text(String),
    Finalize(PendingCall),
    Continue,
}

/// Advance the single-pending-call state machine by one event
fn advance(pending: &mut Option<PendingCall>, event: ProviderEvent) -> DriverResult<Step> {
    match event {
        ProviderEvent::ContentBlockStart(BlockStart::ToolUse { id, name }) => {
            if let Some(open) = pending.as_ref() {
                return Err(DriverError::Protocol(format!(
                    "tool block {} started while {} was still open",
                    name, open.name
                )));
            }
            *pending = Some(PendingCall {
                id,
                name,
                arguments: String::new(),
            });
            Ok(Step::Continue)
        }
        ProviderEvent::ContentBlockStart(BlockStart::Text) => Ok(Step::Continue),
        ProviderEvent::ContentBlockDelta(BlockDelta::Text(text)) => Ok(Step::Text(text)),
        ProviderEvent::ContentBlockDelta(BlockDelta::ArgumentFragment(fragment)) => {
            match pending.as_mut() {
                Some(call) => {
                    call.arguments.push_str(&fragment);
                    Ok(Step::Continue)
                }
                None => Err(DriverError::Protocol(
                    "argument fragment with no open tool block".to_string(),
                )),
            }
        }
        ProviderEvent::ContentBlockStop => Ok(match pending.take() {
            Some(call) => Step::Finalize(call),
            None => Step::Continue,
        }),
    }
}

/// Name shown in transcript blocks: the bare tool name when the qualified
/// name splits, the raw name otherwise
fn display_name(qualified: &str) -> &str {
    split_qualified(qualified).map_or(qualified, |(_, tool)| tool)
}

fn tool_error_message(error: &RegistryError) -> String {
    match error {
        RegistryError::ToolCallFailed { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Route one model tool call through the registry. Never fails; every
/// problem becomes an error segment.
async fn dispatch_tool(
    registry: &ServerRegistry,
    logger: &dyn Logger,
    qualified: &str,
    input: Value,
) -> TranscriptSegment {
    let (server, tool) = match split_qualified(qualified) {
        Ok(parts) => parts,
        Err(e) => {
            logger.warn(&format!("[ResponseDriver] {}", e));
            return TranscriptSegment::tool_error(qualified, e.to_string());
        }
    };

    match registry.call_tool(server, tool, input).await {
        Ok(output) => TranscriptSegment::tool_result(tool, output),
        Err(e) => {
            logger.warn(&format!("[ResponseDriver] Tool {} failed: {}", qualified, e));
            TranscriptSegment::tool_error(tool, tool_error_message(&e))
        }
    }
}

/// Parse the buffered arguments of a finished call and dispatch it
async fn finalize_call(
    registry: &ServerRegistry,
    logger: &dyn Logger,
    call: PendingCall,
) -> TranscriptSegment {
    let input = if call.arguments.trim().is_empty() {
        Ok(Value::Object(Default::default()))
    } else {
        serde_json::from_str::<Value>(&call.arguments)
    };

    match input {
        Ok(input) => {
            logger.debug(&format!(
                "[ResponseDriver] Dispatching {} ({})",
                call.name, call.id
            ));
            dispatch_tool(registry, logger, &call.name, input).await
        }
        Err(e) => invalid_arguments(&call.name, e),
    }
}

fn invalid_arguments(qualified: &str, error: impl std::fmt::Display) -> TranscriptSegment {
    TranscriptSegment::tool_error(
        display_name(qualified),
        format!("Invalid tool arguments: {}", error),
    )
}

/// Drives model responses that may call registry tools
pub struct ResponseDriver {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ServerRegistry>,
    logger: Arc<dyn Logger>,
    options: DriverOptions,
}

impl ResponseDriver {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ServerRegistry>,
        logger: Arc<dyn Logger>,
        options: DriverOptions,
    ) -> Self {
        Self {
            provider,
            registry,
            logger,
            options,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    fn provider_error(&self, error: crate::providers::ProviderError) -> DriverError {
        self.logger.error(&format!("[ResponseDriver] Provider failed: {}", error));
        DriverError::from_provider(self.provider.name(), error)
    }

    /// Model request with the registry's current catalog
    fn build_request(&self, request: &CodeRequest) -> ModelRequest {
        let catalog = build_catalog(&self.registry.get_available_tools());
        let system_prompt = build_system_prompt(
            &request.language,
            &request.code,
            request.file_name.as_deref(),
            &describe_catalog(&catalog),
        );

        self.logger.debug(&format!(
            "[ResponseDriver] Request with {} catalog tools",
            catalog.len()
        ));

        ModelRequest::new(self.options.model.clone(), self.options.max_tokens)
            .with_system_prompt(system_prompt)
            .with_tools(catalog_tools(&catalog))
            .with_message(ChatMessage::user(request.user_message.clone()))
    }

    /// Batch response as ordered transcript segments
    pub async fn respond_segments(&self, request: CodeRequest) -> DriverResult<Vec<TranscriptSegment>> {
        let model_request = self.build_request(&request);
        let blocks = self
            .provider
            .complete(model_request)
            .await
            .map_err(|e| self.provider_error(e))?;

        let mut segments = Vec::with_capacity(blocks.len());
        for block in blocks {
            let segment = match block {
                ContentBlock::Text { text } => TranscriptSegment::Text { text },
                ContentBlock::ToolUse(call) => {
                    dispatch_tool(&self.registry, self.logger.as_ref(), &call.name, call.input).await
                }
                ContentBlock::InvalidToolUse { name, error, .. } => {
                    self.logger
                        .warn(&format!("[ResponseDriver] Invalid arguments for {}: {}", name, error));
                    invalid_arguments(&name, error)
                }
            };
            segments.push(segment);
        }
        Ok(segments)
    }

    /// Batch response rendered as one transcript string
    pub async fn respond(&self, request: CodeRequest) -> DriverResult<String> {
        let segments = self.respond_segments(request).await?;
        Ok(segments.iter().map(TranscriptSegment::render).collect())
    }

    /// Streaming response.
    ///
    /// The catalog is read now; the provider is contacted on first poll.
    /// Each finished tool block is dispatched before the next provider
    /// event is read. Dropping the stream cancels the response.
    pub fn respond_stream(&self, request: CodeRequest) -> TranscriptStream {
        let model_request = self.build_request(&request);
        let provider = Arc::clone(&self.provider);
        let registry = Arc::clone(&self.registry);
        let logger = Arc::clone(&self.logger);

        let stream = async_stream::stream! {
            let provider_name = provider.name().to_string();
            let mut events = match provider.stream(model_request).await {
                Ok(events) => events,
                Err(e) => {
                    logger.error(&format!("[ResponseDriver] Provider failed: {}", e));
                    yield Err(DriverError::from_provider(&provider_name, e));
                    return;
                }
            };

            let mut pending: Option<PendingCall> = None;
            while let Some(item) = events.next().await {
                let event = match item {
                    Ok(event) => event,
                    Err(e) => {
                        logger.error(&format!("[ResponseDriver] Provider stream failed: {}", e));
                        yield Err(DriverError::from_provider(&provider_name, e));
                        return;
                    }
                };

                match advance(&mut pending, event) {
                    Ok(Step::Text(text)) => {
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Ok(Step::Finalize(call)) => {
                        let segment = finalize_call(&registry, logger.as_ref(), call).await;
                        yield Ok(segment.render_streamed());
                    }
                    Ok(Step::Continue) => {}
                    Err(e) => {
                        logger.error(&format!("[ResponseDriver] {}", e));
                        yield Err(e);
                        return;
                    }
                }
            }

            if let Some(call) = pending {
                yield Err(DriverError::Protocol(format!(
                    "stream ended with tool block {} still open",
                    call.name
                )));
            }
        };

        Box::pin(stream)
    }

    // ------------------------------------------------------------------
    // Quick actions
    // ------------------------------------------------------------------

    fn quick_action(code: &str, language: &str, message: &str, file_name: Option<&str>) -> CodeRequest {
        let request = CodeRequest::new(code, language, message);
        match file_name {
            Some(name) => request.with_file_name(name),
            None => request,
        }
    }

    pub async fn explain_code(&self, code: &str, language: &str, file_name: Option<&str>) -> DriverResult<String> {
        self.respond(Self::quick_action(code, language, EXPLAIN_CODE_MESSAGE, file_name))
            .await
    }

    pub async fn find_bugs(&self, code: &str, language: &str, file_name: Option<&str>) -> DriverResult<String> {
        self.respond(Self::quick_action(code, language, FIND_BUGS_MESSAGE, file_name))
            .await
    }

    pub async fn optimize_code(&self, code: &str, language: &str, file_name: Option<&str>) -> DriverResult<String> {
        self.respond(Self::quick_action(code, language, OPTIMIZE_CODE_MESSAGE, file_name))
            .await
    }

    /// Generate code from a prompt. No tools are offered; only text blocks
    /// are returned.
    pub async fn generate_code(
        &self,
        prompt: &str,
        language: &str,
        context: Option<&str>,
    ) -> DriverResult<String> {
        let request = ModelRequest::new(self.options.model.clone(), self.options.max_tokens)
            .with_system_prompt(build_generation_prompt(language, context))
            .with_message(ChatMessage::user(prompt));

        let blocks = self
            .provider
            .complete(request)
            .await
            .map_err(|e| self.provider_error(e))?;

        Ok(blocks
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::ToolUse(_) | ContentBlock::InvalidToolUse { .. } => None,
            })
            .collect())
    }

    /// Send a minimal request to verify the provider is reachable
    pub async fn check_connection(&self) -> bool {
        let request =
            ModelRequest::new(self.options.model.clone(), 10).with_message(ChatMessage::user("Hello"));
        match self.provider.complete(request).await {
            Ok(_) => true,
            Err(e) => {
                self.logger.warn(&format!("[ResponseDriver] Connection check failed: {}", e));
                false
            }
        }
    }
}

impl std::fmt::Debug for ResponseDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDriver")
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .finish()
    }
}
