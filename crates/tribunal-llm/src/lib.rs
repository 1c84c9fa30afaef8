//! Tribunal-LLM: completion backends for reviewer and supervisor agents
//!
//! The review pipeline only ever needs one capability from a model provider:
//! turn a fully rendered prompt into a response string. This crate defines
//! that contract ([`CompletionBackend`]) and ships an OpenAI-compatible HTTP
//! implementation plus in-memory fakes for tests.

pub mod error;
pub mod fakes;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{LlmError, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};

/// A single prompt addressed to one configured agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Identifier of the agent configuration issuing the request.
    pub agent_id: String,
    /// Provider model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Fully rendered prompt text.
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(agent_id: &str, model: &str, temperature: f32, prompt: String) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            model: model.to_string(),
            temperature,
            prompt,
        }
    }
}

/// Prompt in, response text out.
///
/// Implementations may fail transiently; callers own retry policy.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Complete `request.prompt` and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
