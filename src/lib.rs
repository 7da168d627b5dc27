#![deny(missing_docs)]
//! Gemini Relay
//!
//! A Telegram bot that relays chat, image analysis and image generation
//! requests to Google Gemini, with per-user rate limiting, conversation
//! context, an admin panel and a JSON status server.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Per-user conversation history
pub mod conversation;
/// Per-user rate limiting
pub mod limiter;
/// AI collaborator interface and Gemini provider
pub mod llm;
/// Tracing setup with secret redaction
pub mod logging;
/// Shared process state
pub mod state;
/// Usage counters
pub mod stats;
/// Status HTTP server
pub mod status;
/// Host metrics for the admin panel
pub mod system;
pub mod utils;
