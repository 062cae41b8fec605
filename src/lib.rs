pub mod api;
pub mod assistant;
pub mod config;
pub mod pipeline;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{start_api_server, ApiContext};
use crate::assistant::MedicalAssistant;
use crate::config::AppConfig;
use crate::pipeline::extraction::{DocumentNormalizer, LazyExtractors};
use crate::pipeline::structuring::{GeminiClient, StructuredExecutor};

/// Load configuration, wire the assistant and serve the HTTP API until Ctrl-C.
pub async fn run() -> Result<(), String> {
    // A missing .env file is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cfg = AppConfig::from_env().map_err(|e| e.to_string())?;

    let model = GeminiClient::new(&cfg.api_base, &cfg.model, &cfg.api_key, cfg.timeout_secs)
        .map_err(|e| e.to_string())?
        .with_temperature(cfg.temperature);
    let executor = StructuredExecutor::new(Arc::new(model)).with_max_tool_rounds(cfg.max_tool_rounds);

    let extractors = Arc::new(LazyExtractors::builtin(cfg.extractor_init_timeout));
    let normalizer = DocumentNormalizer::new(extractors).with_max_bytes(cfg.max_upload_bytes);

    let assistant = Arc::new(MedicalAssistant::new(executor, normalizer));
    assistant.prewarm();

    tracing::info!(
        model = assistant.model_name(),
        max_upload_bytes = cfg.max_upload_bytes,
        max_tool_rounds = cfg.max_tool_rounds,
        "Assistant ready"
    );

    let server = start_api_server(
        ApiContext::new(assistant, cfg.max_upload_bytes),
        cfg.bind_addr,
    )
    .await?;
    tracing::info!(addr = %server.local_addr(), "Listening; press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }

    server.stop().await;
    Ok(())
}
