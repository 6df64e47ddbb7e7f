use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use pawlegal_agent::{AzureOpenAiBackend, OllamaBackend};
use pawlegal_core::{agent::ChatBackend, config::Config};
use pawlegal_server::{build_router, logging::BroadcastLayer, AppState};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _) = broadcast::channel::<String>(1024);
    let log_ring = Arc::new(Mutex::new(VecDeque::new()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pawlegal_server=info,pawlegal_core=info,pawlegal_agent=info,pawlegal_domains=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Config::from_env()?;
    config.validate_for_backend()?;
    for key in config.missing_credentials() {
        warn!("{key} is not set; knowledge base lookups will fail");
    }

    let backend: Arc<dyn ChatBackend> = match config.backend.as_str() {
        "ollama" => Arc::new(
            OllamaBackend::new(&config.ollama_url, &config.ollama_model)
                .with_timeout(config.agent_timeout_s),
        ),
        _ => Arc::new(
            AzureOpenAiBackend::new(&config.azure_endpoint, &config.azure_api_key)
                .with_api_version(&config.azure_api_version)
                .with_timeout(config.agent_timeout_s),
        ),
    };
    info!(backend = backend.name(), "chat backend selected");

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    let state = Arc::new(AppState::from_config(config, backend).with_log_channel(log_tx, log_ring));
    let app = build_router(state);

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
