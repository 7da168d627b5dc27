//! Status & Metrics API
//!
//! Read-only JSON endpoints over the shared bot state.

use crate::config::BotInfo;
use crate::state::AppState;
use crate::stats::CountersSnapshot;
use crate::utils::format_duration_dhm;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BOT_NAME: &str = "Advanced Gemini AI Bot";
const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Paths listed by the 404 fallback
pub const AVAILABLE_ENDPOINTS: [&str; 6] = [
    "/status",
    "/health",
    "/metrics",
    "/webhook",
    "/api/info",
    "/api/stats/summary",
];

// ===== Response Types =====

/// Counter values plus the number of active users
#[derive(Debug, Serialize)]
pub struct Statistics {
    /// Counter snapshot
    #[serde(flatten)]
    pub counters: CountersSnapshot,
    /// Users with a non-empty history
    pub active_users: usize,
}

/// `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always `online` while the server answers
    pub status: &'static str,
    /// Whole seconds since start
    pub uptime_seconds: u64,
    /// `{d}d {h}h {m}m`
    pub uptime_formatted: String,
    /// Public configuration
    pub bot_info: BotInfo,
    /// Usage statistics
    pub statistics: Statistics,
    /// Response time
    pub timestamp: DateTime<Utc>,
}

/// Configuration state of the external services
#[derive(Debug, Serialize)]
pub struct Services {
    /// Bot runtime
    pub bot: &'static str,
    /// `configured` or `missing`
    pub gemini_api: &'static str,
    /// `configured` or `missing`
    pub telegram_api: &'static str,
}

/// `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: &'static str,
    /// Response time
    pub timestamp: DateTime<Utc>,
    /// Service configuration
    pub services: Services,
}

/// `GET /metrics`
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// Whole seconds since start
    pub uptime_seconds: u64,
    /// Answered text messages
    pub messages_total: u64,
    /// Analyzed images
    pub images_analyzed_total: u64,
    /// Generated images
    pub images_generated_total: u64,
    /// Collaborator failures
    pub errors_total: u64,
    /// Users with a non-empty history
    pub active_users: usize,
    /// Stored turns across all users
    pub context_size_total: usize,
}

/// `GET /api/stats/summary`
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// Always `true` while the server answers
    pub online: bool,
    /// Uptime in hours, two decimals
    pub uptime_hours: f64,
    /// Answered text messages
    pub total_messages: u64,
    /// Analyzed plus generated images
    pub total_images_processed: u64,
    /// Users with a non-empty history
    pub active_users: usize,
    /// Errors per processed message, percent, two decimals
    pub error_rate: f64,
    /// Response time
    pub last_updated: DateTime<Utc>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

const fn configured(value: &str) -> &'static str {
    if value.is_empty() {
        "missing"
    } else {
        "configured"
    }
}

// ===== Handlers =====

/// GET /status - Bot status and statistics
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let uptime = state.counters.uptime();
    Json(StatusResponse {
        status: "online",
        uptime_seconds: uptime.as_secs(),
        uptime_formatted: format_duration_dhm(uptime),
        bot_info: state.settings.bot_info(),
        statistics: Statistics {
            counters: state.counters.snapshot(),
            active_users: state.conversations.active_users().await,
        },
        timestamp: Utc::now(),
    })
}

/// GET /health - Liveness and service configuration
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        services: Services {
            bot: "running",
            gemini_api: configured(&state.settings.gemini_api_key),
            telegram_api: configured(&state.settings.telegram_bot_token),
        },
    })
}

/// GET /metrics - Counters for monitoring
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let snapshot = state.counters.snapshot();
    Json(MetricsResponse {
        uptime_seconds: state.counters.uptime().as_secs(),
        messages_total: snapshot.messages_processed,
        images_analyzed_total: snapshot.images_analyzed,
        images_generated_total: snapshot.images_generated,
        errors_total: snapshot.errors,
        active_users: state.conversations.active_users().await,
        context_size_total: state.conversations.total_turns().await,
    })
}

/// GET /api/stats/summary - Condensed statistics
pub async fn summary_handler(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let snapshot = state.counters.snapshot();
    Json(SummaryResponse {
        online: true,
        uptime_hours: round2(state.counters.uptime().as_secs_f64() / 3600.0),
        total_messages: snapshot.messages_processed,
        total_images_processed: snapshot.images_analyzed + snapshot.images_generated,
        active_users: state.conversations.active_users().await,
        error_rate: round2(snapshot.error_rate()),
        last_updated: Utc::now(),
    })
}

/// GET /api/info - Static API description
pub async fn info_handler() -> Json<Value> {
    Json(json!({
        "api_version": API_VERSION,
        "bot_name": BOT_NAME,
        "description": "Telegram bot with Gemini AI integration",
        "features": [
            "AI-powered conversations",
            "Image generation with Gemini",
            "Image analysis and recognition",
            "Admin control panel",
            "Real-time status monitoring",
            "Rate limiting"
        ],
        "endpoints": {
            "status": "/status",
            "health": "/health",
            "metrics": "/metrics",
            "webhook": "/webhook",
            "api_info": "/api/info",
            "stats_summary": "/api/stats/summary"
        },
        "timestamp": Utc::now(),
    }))
}

/// POST /webhook - Acknowledge a pushed payload.
///
/// Updates are consumed via long polling; the payload is only logged.
pub async fn webhook_handler(body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            info!("Received webhook payload ({} bytes)", body.len());
            debug!("Webhook payload: {payload}");
            (
                StatusCode::OK,
                Json(json!({"status": "received", "timestamp": Utc::now()})),
            )
        }
        Err(e) => {
            warn!("Rejected webhook payload: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "error": e.to_string()})),
            )
        }
    }
}

/// GET /favicon.ico - No icon
pub async fn favicon_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Fallback - 404 with the list of endpoints
pub async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "message": "The requested endpoint was not found.",
            "available_endpoints": AVAILABLE_ENDPOINTS,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn state() -> Arc<AppState> {
        let settings = Settings {
            telegram_bot_token: "123:abc".to_string(),
            ..Settings::default()
        };
        Arc::new(AppState::new(Arc::new(settings)))
    }

    #[tokio::test]
    async fn test_health_reports_missing_key() {
        let response = health_handler(State(state())).await;
        assert_eq!(response.services.gemini_api, "missing");
        assert_eq!(response.services.telegram_api, "configured");
    }

    #[tokio::test]
    async fn test_summary_combines_image_counters() {
        let state = state();
        state.counters.record_image_analyzed();
        state.counters.record_image_generated();
        state.counters.record_message();
        state.counters.record_message();
        state.counters.record_message();
        state.counters.record_error();

        let response = summary_handler(State(state)).await;
        assert_eq!(response.total_images_processed, 2);
        assert!((response.error_rate - 33.33).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_flatten_counters() {
        let statistics = Statistics {
            counters: CountersSnapshot {
                messages_processed: 3,
                ..CountersSnapshot::default()
            },
            active_users: 1,
        };
        let value = serde_json::to_value(&statistics).expect("serializes");
        assert_eq!(value["messages_processed"], 3);
        assert_eq!(value["active_users"], 1);
    }
}
