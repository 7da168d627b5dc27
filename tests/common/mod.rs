//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gemini_relay::bot::dispatch::Outcome;
use gemini_relay::bot::DispatchController;
use gemini_relay::config::Settings;
use gemini_relay::conversation::{ConversationTurn, Role};
use gemini_relay::llm::{GeneratedImage, LlmError, LlmProvider};
use gemini_relay::state::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const ADMIN_ID: i64 = 42;

pub fn settings() -> Settings {
    Settings {
        telegram_bot_token: "123456789:test".to_string(),
        gemini_api_key: "test-key".to_string(),
        admin_id: ADMIN_ID,
        ..Settings::default()
    }
}

pub fn state_with(settings: Settings) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(settings)))
}

/// Record `outcome` as delivered, as the Telegram handlers do after sending
pub async fn delivered(controller: &DispatchController, user_id: i64, outcome: &Outcome) {
    controller
        .settle(user_id, outcome.clone(), |_| async { Ok(()) })
        .await
        .expect("delivery succeeds");
}

/// Handle a text message and deliver the reply
pub async fn chat(controller: &DispatchController, user_id: i64, text: &str) -> Outcome {
    let outcome = controller.handle_text(user_id, text).await;
    delivered(controller, user_id, &outcome).await;
    outcome
}

/// Provider that echoes prompts and counts which entry point was used
#[derive(Default)]
pub struct EchoProvider {
    pub single_calls: AtomicUsize,
    pub context_calls: AtomicUsize,
    pub image_bytes: Option<Vec<u8>>,
}

impl EchoProvider {
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn context_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn generate_response(&self, prompt: &str) -> Result<String, LlmError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("reply to {prompt}"))
    }

    async fn chat_with_context(&self, turns: &[ConversationTurn]) -> Result<String, LlmError> {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        let last = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        Ok(format!("reply to {last}"))
    }

    async fn analyze_image(&self, image_bytes: Vec<u8>, _prompt: &str) -> Result<String, LlmError> {
        Ok(format!("an image of {} bytes", image_bytes.len()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, LlmError> {
        Ok(GeneratedImage {
            image: self.image_bytes.clone(),
            description: format!("drawn {prompt}"),
        })
    }

    fn preprocess_image(&self, image_bytes: Vec<u8>) -> Vec<u8> {
        image_bytes
    }
}

/// Provider whose every call fails with a network error
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn generate_response(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::NetworkError("timeout".to_string()))
    }

    async fn chat_with_context(&self, _turns: &[ConversationTurn]) -> Result<String, LlmError> {
        Err(LlmError::NetworkError("timeout".to_string()))
    }

    async fn analyze_image(&self, _image_bytes: Vec<u8>, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::NetworkError("timeout".to_string()))
    }

    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, LlmError> {
        Err(LlmError::NetworkError("timeout".to_string()))
    }

    fn preprocess_image(&self, image_bytes: Vec<u8>) -> Vec<u8> {
        image_bytes
    }
}
