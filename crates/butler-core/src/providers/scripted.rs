//! Scripted provider for testing
//!
//! Plays back pre-recorded turns without network dependencies. Each call
//! to `stream` consumes the next turn; once the script is exhausted the
//! provider echoes the last user message.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use super::error::{ProviderError, ProviderResult};
use super::traits::{ModelProvider, ModelRequest, ProviderEventStream};
use crate::logging::Logger;
use crate::types::{ContentBlock, ProviderEvent};

/// One scripted response
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Stream these items in order
    Events(Vec<ProviderResult<ProviderEvent>>),
    /// Fail before any event is produced
    Fail(ProviderError),
}

/// Deterministic provider for tests
pub struct ScriptedProvider {
    name: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ModelRequest>>,
    logger: Arc<dyn Logger>,
}

impl ScriptedProvider {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            name: "scripted".to_string(),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Name reported in errors
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Next turn streams raw events
    pub fn then_events(self, events: Vec<ProviderEvent>) -> Self {
        self.push(ScriptedTurn::Events(events.into_iter().map(Ok).collect()))
    }

    /// Next turn streams complete blocks, each as start/delta/stop
    pub fn then_blocks(self, blocks: Vec<ContentBlock>) -> Self {
        let events = blocks.into_iter().flat_map(ProviderEvent::from_block).collect();
        self.then_events(events)
    }

    /// Next turn streams `events`, then fails mid-stream
    pub fn then_error_after(self, events: Vec<ProviderEvent>, error: ProviderError) -> Self {
        let mut items: Vec<_> = events.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.push(ScriptedTurn::Events(items))
    }

    /// Next turn fails to start
    pub fn then_fail(self, error: ProviderError) -> Self {
        self.push(ScriptedTurn::Fail(error))
    }

    fn push(self, turn: ScriptedTurn) -> Self {
        self.turns.lock().push_back(turn);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Turns not yet consumed
    pub fn remaining(&self) -> usize {
        self.turns.lock().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ModelRequest) -> ProviderResult<ProviderEventStream> {
        let turn = self.turns.lock().pop_front();
        let echo = format!(
            "Echo: {}",
            request.last_user_message().unwrap_or("Hello from ScriptedProvider!")
        );
        self.requests.lock().push(request);

        let items = match turn {
            Some(ScriptedTurn::Events(items)) => {
                self.logger.debug(&format!(
                    "[ScriptedProvider] Playing turn with {} events",
                    items.len()
                ));
                items
            }
            Some(ScriptedTurn::Fail(error)) => {
                self.logger.debug(&format!("[ScriptedProvider] Failing turn: {}", error));
                return Err(error);
            }
            None => {
                self.logger.debug("[ScriptedProvider] Script exhausted, echoing");
                ProviderEvent::from_block(ContentBlock::text(echo))
                    .into_iter()
                    .map(Ok)
                    .collect()
            }
        };

        Ok(Box::pin(stream::iter(items)))
    }
}
