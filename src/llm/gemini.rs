use crate::config::{
    CONTEXT_TURNS, GEMINI_IMAGE_GEN_MODEL, GEMINI_TEXT_MODEL, GEMINI_VISION_MODEL,
};
use crate::conversation::{ConversationTurn, Role};
use crate::llm::http_utils::{
    create_http_client, extract_text_content, first_candidate_parts, send_json_request,
};
use crate::llm::{GeneratedImage, LlmError, LlmProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, instrument};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_IMAGE_ANALYSIS_PROMPT: &str = "Analyze this image in detail. Describe what you see, \
including objects, people, activities, colors, composition, and any notable aspects. \
Provide a comprehensive analysis.";

const EMPTY_CHAT_FALLBACK: &str = "Sorry, I couldn't generate a response.";
const EMPTY_ANALYSIS_FALLBACK: &str = "Sorry, I couldn't analyze this image.";

/// LLM provider implementation for Google Gemini
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    api_base: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: create_http_client(),
            api_key,
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    /// Point the provider at another API base (proxies, test servers)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn generate_content(&self, model_id: &str, body: &Value) -> Result<Value, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingConfig("GEMINI_API_KEY".to_string()));
        }

        let url = format!("{}/models/{model_id}:generateContent", self.api_base);
        send_json_request(
            &self.http_client,
            &url,
            body,
            &[("x-goog-api-key", self.api_key.as_str())],
        )
        .await
    }
}

/// Maps the most recent turns onto Gemini `contents`
fn build_chat_contents(turns: &[ConversationTurn]) -> Vec<Value> {
    let start = turns.len().saturating_sub(CONTEXT_TURNS);
    turns[start..]
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            json!({"role": role, "parts": [{"text": turn.content}]})
        })
        .collect()
}

fn text_or_fallback(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

/// Splits an image-generation response into image bytes and description
fn parse_generated_image(response: &Value) -> Result<GeneratedImage, LlmError> {
    let parts = first_candidate_parts(response)?;
    if parts.is_empty() {
        return Ok(GeneratedImage {
            image: None,
            description: "No image content received".to_string(),
        });
    }

    let mut description = String::new();
    let mut image = None;
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            description.push_str(text);
        } else if let Some(data) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|d| d.get("data"))
            .and_then(Value::as_str)
        {
            let bytes = BASE64
                .decode(data)
                .map_err(|e| LlmError::JsonError(format!("Invalid image data: {e}")))?;
            image = Some(bytes);
        }
    }

    Ok(match image {
        Some(bytes) => GeneratedImage {
            image: Some(bytes),
            description: text_or_fallback(description, "Image generated successfully"),
        },
        None => GeneratedImage {
            image: None,
            description: "No image data received".to_string(),
        },
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[instrument(skip_all)]
    async fn generate_response(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}]
        });

        let response = self.generate_content(GEMINI_TEXT_MODEL, &body).await?;
        Ok(text_or_fallback(
            extract_text_content(&response)?,
            EMPTY_CHAT_FALLBACK,
        ))
    }

    #[instrument(skip_all, fields(turns = turns.len()))]
    async fn chat_with_context(&self, turns: &[ConversationTurn]) -> Result<String, LlmError> {
        let body = json!({ "contents": build_chat_contents(turns) });

        let response = self.generate_content(GEMINI_TEXT_MODEL, &body).await?;
        Ok(text_or_fallback(
            extract_text_content(&response)?,
            EMPTY_CHAT_FALLBACK,
        ))
    }

    #[instrument(skip_all, fields(bytes = image_bytes.len()))]
    async fn analyze_image(&self, image_bytes: Vec<u8>, prompt: &str) -> Result<String, LlmError> {
        let prompt = if prompt.is_empty() {
            DEFAULT_IMAGE_ANALYSIS_PROMPT
        } else {
            prompt
        };

        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "image/jpeg",
                            "data": BASE64.encode(&image_bytes)
                        }
                    },
                    {"text": prompt}
                ]
            }]
        });

        let response = self.generate_content(GEMINI_VISION_MODEL, &body).await?;
        Ok(text_or_fallback(
            extract_text_content(&response)?,
            EMPTY_ANALYSIS_FALLBACK,
        ))
    }

    #[instrument(skip_all)]
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, LlmError> {
        let body = json!({
            "contents": [{"parts": [{"text": format!("Generate an image: {prompt}")}]}],
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}
        });

        let response = self.generate_content(GEMINI_IMAGE_GEN_MODEL, &body).await?;
        let generated = parse_generated_image(&response)?;
        debug!(
            has_image = generated.image.is_some(),
            "Image generation finished"
        );
        Ok(generated)
    }
}
