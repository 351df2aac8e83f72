//! Model client
//!
//! `ModelClient` is the seam between the pipeline and the hosted API. The
//! pipeline only ever hands it a finished `PromptEnvelope`.

pub mod anthropic;
pub mod retry;

use std::time::Duration;

use crate::domain::{Config, PromptEnvelope};
use crate::error::ModelError;

pub use anthropic::AnthropicClient;

/// Per-request generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl ModelConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Sends an envelope to a text-generation backend.
///
/// Implementations must be shareable across the folder worker pool.
pub trait ModelClient: Send + Sync {
    fn generate(
        &self,
        envelope: &PromptEnvelope,
        config: &ModelConfig,
    ) -> Result<String, ModelError>;
}
