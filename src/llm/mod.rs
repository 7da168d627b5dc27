//! AI collaborator interface and the Gemini implementation
//!
//! The dispatcher only talks to [`LlmProvider`]; everything Gemini-specific
//! lives in [`gemini`].

/// Google Gemini REST provider
pub mod gemini;
mod http_utils;
/// Image normalization before vision requests
pub mod image_prep;

use crate::conversation::ConversationTurn;
use thiserror::Error;

pub use gemini::GeminiProvider;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// The model returned no candidates
    #[error("Empty response: {0}")]
    EmptyResponse(String),
}

/// Result of an image generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Encoded image, absent when the model returned text only
    pub image: Option<Vec<u8>>,
    /// Model commentary, or the reason no image was produced
    pub description: String,
}

/// Interface of the generative-AI backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-prompt text generation
    async fn generate_response(&self, prompt: &str) -> Result<String, LlmError>;

    /// Multi-turn generation over the most recent turns of a conversation
    async fn chat_with_context(&self, turns: &[ConversationTurn]) -> Result<String, LlmError>;

    /// Describe an image; an empty prompt selects the default analysis prompt
    async fn analyze_image(&self, image_bytes: Vec<u8>, prompt: &str) -> Result<String, LlmError>;

    /// Generate an image from a text prompt
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, LlmError>;

    /// Normalize an image before analysis.
    ///
    /// Must not fail: on any problem the input is returned unchanged.
    fn preprocess_image(&self, image_bytes: Vec<u8>) -> Vec<u8> {
        image_prep::preprocess_image(image_bytes)
    }
}
