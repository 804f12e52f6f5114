//! Core types for capability servers and model interactions
//!
//! This module contains all the shared types used across the registry,
//! the transports, the providers and the response driver.

mod message;
mod resource;
mod server;
mod stream;
mod tool;

pub use message::{ChatMessage, MessageRole, TranscriptEntry};
pub use resource::{Resource, ResourceContent, ResourceContentItem};
pub use server::{ServerCategory, ServerConfig, ServerConfigPatch, ServerInstance, ServerStatus};
pub use stream::{BlockDelta, BlockStart, ContentBlock, ProviderEvent, TranscriptSegment};
pub use tool::{Tool, ToolCall, ToolContent, ToolOutput};
