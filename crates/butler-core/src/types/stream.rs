//! Provider response types: content blocks, stream events, transcript segments

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolOutput};

/// A complete content block of a batch provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Free text
    Text { text: String },
    /// Tool invocation requested by the model
    ToolUse(ToolCall),
    /// Tool invocation whose arguments are not valid JSON
    InvalidToolUse {
        id: String,
        name: String,
        arguments: String,
        error: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(call: ToolCall) -> Self {
        ContentBlock::ToolUse(call)
    }
}

/// Kind of block opened by a `content_block_start` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text,
    ToolUse { id: String, name: String },
}

/// Payload of a `content_block_delta` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Text fragment
    Text(String),
    /// Fragment of the JSON-encoded tool arguments
    ArgumentFragment(String),
}

/// Incremental event of a streaming provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProviderEvent {
    ContentBlockStart(BlockStart),
    ContentBlockDelta(BlockDelta),
    ContentBlockStop,
}

impl ProviderEvent {
    pub fn text_start() -> Self {
        ProviderEvent::ContentBlockStart(BlockStart::Text)
    }

    pub fn text(text: impl Into<String>) -> Self {
        ProviderEvent::ContentBlockDelta(BlockDelta::Text(text.into()))
    }

    pub fn tool_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        ProviderEvent::ContentBlockStart(BlockStart::ToolUse {
            id: id.into(),
            name: name.into(),
        })
    }

    pub fn arguments(fragment: impl Into<String>) -> Self {
        ProviderEvent::ContentBlockDelta(BlockDelta::ArgumentFragment(fragment.into()))
    }

    pub fn stop() -> Self {
        ProviderEvent::ContentBlockStop
    }

    /// Expand a complete block into the event sequence a stream would carry
    pub fn from_block(block: ContentBlock) -> Vec<ProviderEvent> {
        match block {
            ContentBlock::Text { text } => {
                vec![Self::text_start(), Self::text(text), Self::stop()]
            }
            ContentBlock::ToolUse(call) => vec![
                Self::tool_start(call.id, call.name),
                Self::arguments(call.input.to_string()),
                Self::stop(),
            ],
            ContentBlock::InvalidToolUse { id, name, arguments, .. } => vec![
                Self::tool_start(id, name),
                Self::arguments(arguments),
                Self::stop(),
            ],
        }
    }
}

/// One piece of the assistant transcript produced by the response driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptSegment {
    Text { text: String },
    ToolResult { tool: String, output: ToolOutput },
    ToolError { tool: String, message: String },
}

impl TranscriptSegment {
    /// Error segment for a failed or unparseable tool call
    pub fn tool_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        TranscriptSegment::ToolError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Result segment; a server-flagged error result becomes an error segment
    pub fn tool_result(tool: impl Into<String>, output: ToolOutput) -> Self {
        if output.is_error {
            Self::tool_error(tool, output.to_text())
        } else {
            TranscriptSegment::ToolResult {
                tool: tool.into(),
                output,
            }
        }
    }

    /// Render for the batch transcript
    pub fn render(&self) -> String {
        match self {
            TranscriptSegment::Text { text } => text.clone(),
            TranscriptSegment::ToolResult { tool, output } => {
                format!("[Tool Result: {}]\n{}\n", tool, output.to_text())
            }
            TranscriptSegment::ToolError { tool, message } => {
                format!("[Tool Error: {}] {}\n", tool, message)
            }
        }
    }

    /// Render as a streamed fragment, set apart from surrounding text
    pub fn render_streamed(&self) -> String {
        match self {
            TranscriptSegment::Text { text } => text.clone(),
            _ => format!("\n\n{}\n", self.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_serialization() {
        let block = ContentBlock::text("Hello");
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":\"text\""));

        let tool = ContentBlock::tool_use(ToolCall::new("t1", "fs_read_file", json!({"path": "/a"})));
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "fs_read_file");
    }

    #[test]
    fn test_from_block_tool_use() {
        let events = ProviderEvent::from_block(ContentBlock::tool_use(ToolCall::new(
            "t1",
            "git_status",
            json!({}),
        )));
        assert_eq!(
            events,
            vec![
                ProviderEvent::tool_start("t1", "git_status"),
                ProviderEvent::arguments("{}"),
                ProviderEvent::stop(),
            ]
        );
    }

    #[test]
    fn test_segment_rendering() {
        let ok = TranscriptSegment::tool_result("echo", ToolOutput::text("ok"));
        assert_eq!(ok.render(), "[Tool Result: echo]\nok\n");
        assert_eq!(ok.render_streamed(), "\n\n[Tool Result: echo]\nok\n\n");

        let err = TranscriptSegment::tool_error("echo", "boom");
        assert_eq!(err.render(), "[Tool Error: echo] boom\n");
        assert_eq!(err.render_streamed(), "\n\n[Tool Error: echo] boom\n\n");
    }

    #[test]
    fn test_flagged_output_becomes_error() {
        let seg = TranscriptSegment::tool_result("read_file", ToolOutput::error("ENOENT"));
        assert_eq!(seg, TranscriptSegment::tool_error("read_file", "ENOENT"));
    }
}
