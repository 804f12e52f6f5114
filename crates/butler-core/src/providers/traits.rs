//! Provider trait definition

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use super::error::{ProviderError, ProviderResult};
use crate::types::{BlockDelta, BlockStart, ChatMessage, ContentBlock, ProviderEvent, Tool, ToolCall};

/// One model turn: prompt, tool catalog and conversation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model identifier as used by the provider's API
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Tools the model may call, with qualified names
    pub tools: Vec<Tool>,
    pub messages: Vec<ChatMessage>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system_prompt: String::new(),
            tools: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Last user message, if any
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Type alias for the streaming response
pub type ProviderEventStream = Pin<Box<dyn Stream<Item = ProviderResult<ProviderEvent>> + Send>>;

/// Model provider boundary
///
/// Implementations only have to produce the event stream; the batch form
/// is derived from it.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic", "scripted")
    fn name(&self) -> &str;

    /// Stream the response as block events
    async fn stream(&self, request: ModelRequest) -> ProviderResult<ProviderEventStream>;

    /// Complete response as ordered content blocks
    async fn complete(&self, request: ModelRequest) -> ProviderResult<Vec<ContentBlock>> {
        let stream = self.stream(request).await?;
        collect_blocks(self.name(), stream).await
    }
}

/// Block being assembled by `collect_blocks`
enum OpenBlock {
    Text(String),
    ToolUse { id: String, name: String, arguments: String },
}

/// Fold a provider event stream into complete content blocks.
///
/// Text deltas outside an open block start an implicit text block.
/// An empty argument buffer means no arguments. Arguments that do not
/// parse are kept raw in `ContentBlock::InvalidToolUse` so the caller can
/// report them and carry on with the following blocks.
pub async fn collect_blocks(
    provider: &str,
    mut stream: ProviderEventStream,
) -> ProviderResult<Vec<ContentBlock>> {
    let invalid = |message: String| ProviderError::invalid_response(provider, message);

    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock> = None;

    while let Some(event) = stream.next().await {
        match event? {
            ProviderEvent::ContentBlockStart(start) => {
                if let Some(previous) = open.take() {
                    match previous {
                        OpenBlock::Text(text) => blocks.push(ContentBlock::text(text)),
                        OpenBlock::ToolUse { name, .. } => {
                            return Err(invalid(format!("block started while tool {} was open", name)));
                        }
                    }
                }
                open = Some(match start {
                    BlockStart::Text => OpenBlock::Text(String::new()),
                    BlockStart::ToolUse { id, name } => OpenBlock::ToolUse {
                        id,
                        name,
                        arguments: String::new(),
                    },
                });
            }
            ProviderEvent::ContentBlockDelta(BlockDelta::Text(fragment)) => match open.as_mut() {
                Some(OpenBlock::Text(text)) => text.push_str(&fragment),
                Some(OpenBlock::ToolUse { name, .. }) => {
                    return Err(invalid(format!("text delta inside tool block {}", name)));
                }
                None => open = Some(OpenBlock::Text(fragment)),
            },
            ProviderEvent::ContentBlockDelta(BlockDelta::ArgumentFragment(fragment)) => {
                match open.as_mut() {
                    Some(OpenBlock::ToolUse { arguments, .. }) => arguments.push_str(&fragment),
                    _ => return Err(invalid("argument fragment outside a tool block".to_string())),
                }
            }
            ProviderEvent::ContentBlockStop => match open.take() {
                Some(OpenBlock::Text(text)) => blocks.push(ContentBlock::text(text)),
                Some(OpenBlock::ToolUse { id, name, arguments }) => {
                    if arguments.trim().is_empty() {
                        blocks.push(ContentBlock::tool_use(ToolCall::new(id, name, serde_json::json!({}))));
                    } else {
                        match serde_json::from_str(&arguments) {
                            Ok(input) => blocks.push(ContentBlock::tool_use(ToolCall::new(id, name, input))),
                            Err(e) => blocks.push(ContentBlock::InvalidToolUse {
                                id,
                                name,
                                arguments,
                                error: e.to_string(),
                            }),
                        }
                    }
                }
                None => {}
            },
        }
    }

    match open {
        Some(OpenBlock::Text(text)) => blocks.push(ContentBlock::text(text)),
        Some(OpenBlock::ToolUse { name, .. }) => {
            return Err(invalid(format!("stream ended inside tool block {}", name)));
        }
        None => {}
    }

    Ok(blocks)
}
