//! Per-event orchestration between limiter, history, AI and counters
//!
//! Nothing here knows about Telegram: handlers translate an [`Outcome`]
//! into messages, so the whole flow can be driven from tests. Successes
//! are only counted once [`DispatchController::settle`] sees the reply
//! delivered; a failed delivery counts as an error instead.

use crate::config::ALLOWED_IMAGE_TYPES;
use crate::conversation::ConversationTurn;
use crate::llm::LlmProvider;
use crate::state::AppState;
use crate::utils::{
    format_duration_dhm, format_message, sanitize_filename, truncate_text, validate_image_type,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Telegram caps photo captions at 1024 characters
const CAPTION_MAX_LENGTH: usize = 1024;
/// Characters of the prompt used in a generated file name
const FILE_NAME_PROMPT_CHARS: usize = 50;

/// Reply to `/clear`
pub const CLEARED_TEXT: &str = "🗑️ Conversation context cleared! Starting fresh.";

/// A request refused by policy before any AI work.
///
/// Rejections never touch the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Too many requests inside the rate-limit window
    RateLimited,
    /// Declared image size above the configured maximum
    ImageTooLarge,
    /// `/generate` without a prompt
    EmptyPrompt,
    /// Image document with a MIME type outside the allow-list
    UnsupportedImageType,
}

impl Rejection {
    /// Fixed user-facing text
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::RateLimited => "⚠️ You're sending requests too quickly. Please wait a moment.",
            Self::ImageTooLarge => "❌ Image is too large. Maximum size is 20MB.",
            Self::EmptyPrompt => {
                "Please provide a prompt for image generation.\n\
                 Example: /generate a beautiful sunset over mountains"
            }
            Self::UnsupportedImageType => {
                "❌ Unsupported image format. Please send a JPEG, PNG or WebP image."
            }
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// What the transport should send back for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// MarkdownV2-ready chat reply
    Reply(String),
    /// MarkdownV2-ready image analysis
    Analysis(String),
    /// Generated image with a plain-text caption
    Photo {
        /// Encoded image bytes
        image: Vec<u8>,
        /// Caption, already capped to the Telegram limit
        caption: String,
        /// File name derived from the prompt
        file_name: String,
    },
    /// Refused by policy; send the rejection text as-is
    Rejected(Rejection),
    /// MarkdownV2-ready error reply after a collaborator failure
    Failed(String),
}

/// Counter bumped once a successful outcome reaches the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Success {
    Message,
    ImageAnalyzed,
    ImageGenerated,
}

impl Outcome {
    const fn success(&self) -> Option<Success> {
        match self {
            Self::Reply(_) => Some(Success::Message),
            Self::Analysis(_) => Some(Success::ImageAnalyzed),
            Self::Photo { .. } => Some(Success::ImageGenerated),
            Self::Rejected(_) | Self::Failed(_) => None,
        }
    }
}

/// Metadata of an inbound image known before downloading it
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    /// Size declared by the transport, if any
    pub declared_size: Option<u64>,
    /// MIME type for documents; photos carry none
    pub mime_type: Option<String>,
    /// User caption
    pub caption: Option<String>,
}

/// Drives one inbound event end to end.
///
/// The only component that mutates the counters.
#[derive(Clone)]
pub struct DispatchController {
    state: Arc<AppState>,
    llm: Arc<dyn LlmProvider>,
}

impl DispatchController {
    /// Create a controller over shared state and an AI collaborator
    #[must_use]
    pub fn new(state: Arc<AppState>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { state, llm }
    }

    /// Shared state
    #[must_use]
    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    fn format(&self, text: &str) -> String {
        format_message(text, self.state.settings.max_message_length)
    }

    async fn admit(&self, user_id: i64) -> Result<(), Rejection> {
        if self.state.limiter.allow(user_id, Instant::now()).await {
            Ok(())
        } else {
            warn!("Rate limit hit for user {user_id}");
            Err(Rejection::RateLimited)
        }
    }

    /// Answer a text message, keeping conversation context.
    pub async fn handle_text(&self, user_id: i64, text: &str) -> Outcome {
        if let Err(rejection) = self.admit(user_id).await {
            return Outcome::Rejected(rejection);
        }

        let conversations = &self.state.conversations;
        let len = conversations
            .append(user_id, ConversationTurn::user(text))
            .await;

        let result = if len > 1 {
            let history = conversations.history(user_id).await;
            self.llm.chat_with_context(&history).await
        } else {
            self.llm.generate_response(text).await
        };

        match result {
            Ok(response) => {
                conversations
                    .append(user_id, ConversationTurn::assistant(&response))
                    .await;
                info!("Answered message from user {user_id} (context: {len} turns)");
                Outcome::Reply(self.format(&response))
            }
            Err(e) => {
                error!("Error handling message from user {user_id}: {e}");
                self.state.counters.record_error();
                Outcome::Failed(self.format(&format!("❌ Sorry, I encountered an error: {e}")))
            }
        }
    }

    /// Analyze an image.
    ///
    /// `download` is only invoked once the request passed every policy check.
    pub async fn handle_image<F, Fut>(
        &self,
        user_id: i64,
        request: ImageRequest,
        download: F,
    ) -> Outcome
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send,
    {
        if let Err(rejection) = self.admit(user_id).await {
            return Outcome::Rejected(rejection);
        }

        if let Some(mime) = request.mime_type.as_deref() {
            if !validate_image_type(mime, ALLOWED_IMAGE_TYPES) {
                warn!("Unsupported image type {mime} from user {user_id}");
                return Outcome::Rejected(Rejection::UnsupportedImageType);
            }
        }

        if request
            .declared_size
            .is_some_and(|size| size > self.state.settings.max_image_size)
        {
            warn!("Oversized image from user {user_id}: {:?} bytes", request.declared_size);
            return Outcome::Rejected(Rejection::ImageTooLarge);
        }

        let caption = request.caption.unwrap_or_default();
        match self.analyze(download, &caption).await {
            Ok(analysis) => {
                info!("Analyzed image for user {user_id}");
                let mut text = format!("🔍 Image Analysis\n\n{analysis}");
                if !caption.is_empty() {
                    text = format!("📝 Your caption: {caption}\n\n{text}");
                }
                Outcome::Analysis(self.format(&text))
            }
            Err(e) => {
                error!("Error analyzing image from user {user_id}: {e}");
                self.state.counters.record_error();
                Outcome::Failed(self.format(&format!("❌ Error analyzing image: {e}")))
            }
        }
    }

    async fn analyze<F, Fut>(&self, download: F, caption: &str) -> anyhow::Result<String>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send,
    {
        let raw = download().await?;

        let llm = Arc::clone(&self.llm);
        let processed = tokio::task::spawn_blocking(move || llm.preprocess_image(raw)).await?;

        let prompt = if caption.is_empty() {
            String::new()
        } else {
            format!("User caption: {caption}\n\nPlease analyze this image.")
        };

        Ok(self.llm.analyze_image(processed, &prompt).await?)
    }

    /// Generate an image from `prompt`.
    pub async fn handle_generate(&self, user_id: i64, prompt: &str) -> Outcome {
        if let Err(rejection) = self.admit(user_id).await {
            return Outcome::Rejected(rejection);
        }

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Outcome::Rejected(Rejection::EmptyPrompt);
        }

        match self.llm.generate_image(prompt).await {
            Ok(generated) => match generated.image {
                Some(image) => {
                    info!("Generated image for user {user_id}");
                    let caption = format!(
                        "🎨 Generated Image\n\nPrompt: {prompt}\n\n{}",
                        generated.description
                    );
                    let file_name = format!(
                        "{}.png",
                        sanitize_filename(&truncate_text(prompt, FILE_NAME_PROMPT_CHARS, ""))
                    );
                    Outcome::Photo {
                        image,
                        caption: truncate_text(&caption, CAPTION_MAX_LENGTH, "…"),
                        file_name,
                    }
                }
                None => {
                    warn!("No image returned for user {user_id}");
                    self.state.counters.record_error();
                    Outcome::Failed(self.format(&format!(
                        "❌ Failed to generate image: {}",
                        generated.description
                    )))
                }
            },
            Err(e) => {
                error!("Error generating image for user {user_id}: {e}");
                self.state.counters.record_error();
                Outcome::Failed(self.format(&format!("❌ Error generating image: {e}")))
            }
        }
    }

    /// Hand `outcome` to the transport and record how it went.
    ///
    /// Successful outcomes bump their counter only after `deliver`
    /// returns `Ok`; a delivery error counts as an error instead. Failed
    /// outcomes were already counted when they were produced.
    ///
    /// # Errors
    ///
    /// Returns the delivery error so the transport can tell the user.
    pub async fn settle<F, Fut>(
        &self,
        user_id: i64,
        outcome: Outcome,
        deliver: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(Outcome) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let success = outcome.success();
        let counters = &self.state.counters;

        match deliver(outcome).await {
            Ok(()) => {
                match success {
                    Some(Success::Message) => counters.record_message(),
                    Some(Success::ImageAnalyzed) => counters.record_image_analyzed(),
                    Some(Success::ImageGenerated) => counters.record_image_generated(),
                    None => {}
                }
                Ok(())
            }
            Err(e) => {
                if success.is_some() {
                    error!("Failed to deliver reply to user {user_id}: {e}");
                    counters.record_error();
                }
                Err(e)
            }
        }
    }

    /// Forget the user's conversation. Always succeeds.
    pub async fn clear(&self, user_id: i64) -> &'static str {
        self.state.conversations.clear(user_id).await;
        info!("Conversation context cleared for user {user_id}");
        CLEARED_TEXT
    }

    /// Plain-text status report for `/status`
    #[must_use]
    pub fn status_text(&self) -> String {
        let counters = &self.state.counters;
        let snapshot = counters.snapshot();
        format!(
            "🤖 Bot Status\n\n\
             ✅ Status: Online\n\
             ⏰ Uptime: {}\n\
             📊 Messages: {}\n\
             🖼️ Images Analyzed: {}\n\
             🎨 Images Generated: {}\n\
             ❌ Errors: {}\n\
             🚀 Started: {}",
            format_duration_dhm(counters.uptime()),
            snapshot.messages_processed,
            snapshot.images_analyzed,
            snapshot.images_generated,
            snapshot.errors,
            counters.started_at().format("%Y-%m-%d %H:%M:%S")
        )
    }
}
