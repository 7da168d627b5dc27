use dotenvy::dotenv;
use gemini_relay::bot::runner::run_bot;
use gemini_relay::config::Settings;
use gemini_relay::llm::{GeminiProvider, LlmProvider};
use gemini_relay::logging::init_logging;
use gemini_relay::state::AppState;
use gemini_relay::status::StatusServer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    init_logging().map_err(|e| {
        eprintln!("Failed to compile log redaction patterns: {e}");
        e
    })?;

    info!("Starting Gemini Relay bot...");

    let settings = init_settings();
    let state = Arc::new(AppState::new(settings.clone()));

    let llm: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(settings.gemini_api_key.clone()));
    info!("Gemini provider initialized.");

    let shutdown = CancellationToken::new();
    let server_task = StatusServer::new(state.clone()).spawn(shutdown.clone());

    run_bot(state, llm).await;

    shutdown.cancel();
    if let Err(e) = server_task.await {
        error!("Status server task failed: {e}");
    }

    info!("Shutdown complete.");
    Ok(())
}

fn init_settings() -> Arc<Settings> {
    match Settings::load() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
