pub mod logging;
pub mod page;
pub mod routes;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Instant,
};

use axum::{
    routing::{get, post},
    Router,
};
use pawlegal_core::{
    agent::ChatBackend, config::Config, conversation::AgentSettings, script::ScriptOptions,
};
use pawlegal_domains::{knowledge::KnowledgeBaseClient, legal::LegalDatabaseClient};
use tokio::sync::{broadcast, Semaphore};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Largest accepted form submission (description plus uploaded case files).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn ChatBackend>,
    pub legal: Arc<LegalDatabaseClient>,
    pub knowledge: Arc<KnowledgeBaseClient>,
    pub agent_settings: AgentSettings,
    pub script_options: ScriptOptions,
    /// Caps concurrent script runs.
    pub run_slots: Arc<Semaphore>,
    pub start_time: Instant,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: Arc<Mutex<VecDeque<String>>>,
}

impl AppState {
    /// State wired from configuration, with the given chat backend.
    pub fn from_config(config: Config, backend: Arc<dyn ChatBackend>) -> Self {
        let (log_tx, _) = broadcast::channel(1024);
        Self {
            legal: Arc::new(
                LegalDatabaseClient::new()
                    .with_base_url(&config.legal_db_base_url)
                    .with_cache_capacity(config.legal_db_cache_entries),
            ),
            knowledge: Arc::new(KnowledgeBaseClient::new(
                &config.knowledge_base_endpoint,
                &config.knowledge_base_api_key,
                &config.knowledge_base_openai_key,
            )),
            agent_settings: AgentSettings::from_config(&config),
            script_options: ScriptOptions {
                max_continuations: config.agent_max_continuations,
            },
            run_slots: Arc::new(Semaphore::new(config.max_concurrent_runs as usize)),
            config: Arc::new(config),
            backend,
            start_time: Instant::now(),
            log_tx,
            log_ring: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn with_agent_settings(mut self, settings: AgentSettings) -> Self {
        self.agent_settings = settings;
        self
    }

    pub fn with_log_channel(
        mut self,
        tx: broadcast::Sender<String>,
        ring: Arc<Mutex<VecDeque<String>>>,
    ) -> Self {
        self.log_tx = tx;
        self.log_ring = ring;
        self
    }

    /// Script runs currently holding a slot.
    pub fn active_runs(&self) -> usize {
        (self.config.max_concurrent_runs as usize)
            .saturating_sub(self.run_slots.available_permits())
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        // Health / status
        .route("/api/health", get(routes::health))
        .route("/api/status", get(routes::status))
        // Script runs
        .route("/api/recommendations", post(routes::create_recommendations))
        // SSE logs
        .route("/api/logs", get(routes::sse_logs))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}
