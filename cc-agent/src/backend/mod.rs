//! LLM Backend abstraction layer.
//!
//! Provides a clean trait-based interface for the inference providers
//! validation relies on:
//! - Anthropic Messages API (reasoning)
//! - OpenAI-compatible chat completions (reasoning: vLLM, Ollama, OpenAI, ...)
//! - Hugging Face text generation (calibrated forecasting)
//! - Mock backend for testing

pub mod anthropic;
pub mod huggingface;
pub mod mock;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicBackend;
pub use huggingface::HuggingFaceBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};

use reqwest::Client;
use std::time::Duration;

/// HTTP client shared by the network backends.
///
/// The per-request deadline is enforced by the callers with
/// `tokio::time::timeout`; this only bounds connection setup.
pub(crate) fn http_client() -> Result<Client, LlmError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| LlmError::Unavailable(format!("Failed to create HTTP client: {e}")))
}
