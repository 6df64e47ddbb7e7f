use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, Json,
    },
};
use pawlegal_core::{
    conversation::Conversation,
    prompts,
    script::run_script,
    sources::SourceLog,
    types::Recommendations,
};
use pawlegal_domains::AssistantTools;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::{page::INDEX_HTML, AppState};

pub(crate) type ApiError = (StatusCode, Json<Value>);

// ── Error helpers ─────────────────────────────────────────────────────────

pub(crate) fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("internal error: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("An error occurred: {e}") })),
    )
}

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.into() })))
}

// ── Form parsing ──────────────────────────────────────────────────────────

/// Fields of the case information form.
#[derive(Debug, Default)]
pub(crate) struct CaseForm {
    pub purpose: String,
    pub case_texts: Vec<String>,
}

async fn field_text(field: Field<'_>) -> Result<(Option<String>, String), ApiError> {
    let file_name = field.file_name().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| bad_request(format!("Could not read form data: {e}")))?;
    let label = file_name.clone().unwrap_or_else(|| "field".into());
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|_| bad_request(format!("{label} is not UTF-8 text")))?;
    Ok((file_name, text))
}

pub(crate) async fn read_case_form(mut multipart: Multipart) -> Result<CaseForm, ApiError> {
    let mut form = CaseForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "purpose" => form.purpose = field_text(field).await?.1,
            "case_file" => {
                let (file_name, text) = field_text(field).await?;
                // Browsers send an empty part when no file was chosen.
                if text.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                    continue;
                }
                form.case_texts.push(text);
            }
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }
    Ok(form)
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "backend": state.backend.name(),
        "uptime_s": state.start_time.elapsed().as_secs(),
        "active_runs": state.active_runs(),
        "max_concurrent_runs": state.config.max_concurrent_runs,
        "knowledge_base_configured": state.knowledge.is_configured(),
        "legal_database": state.legal.base_url(),
        "missing_configuration": state.config.missing_credentials(),
    }))
}

/// Run the five-step script for one case description.
pub(crate) async fn create_recommendations(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Recommendations>, ApiError> {
    let form = read_case_form(multipart).await?;
    let situation = form.purpose.trim();
    if situation.is_empty() {
        return Err(bad_request("Please provide a description of your case."));
    }

    let _slot = Arc::clone(&state.run_slots)
        .acquire_owned()
        .await
        .map_err(internal)?;

    info!(
        situation_len = situation.len(),
        uploads = form.case_texts.len(),
        backend = state.backend.name(),
        "starting legal assistant run"
    );

    let sources = SourceLog::new();
    let tools = Arc::new(AssistantTools::new(
        Arc::clone(&state.legal),
        Arc::clone(&state.knowledge),
        sources.clone(),
    ));
    let mut conversation = Conversation::new(
        Arc::clone(&state.backend),
        tools,
        prompts::SYSTEM_PROMPT,
        state.agent_settings.clone(),
    );

    let recommendations = run_script(
        &mut conversation,
        &sources,
        situation,
        &form.case_texts,
        &state.script_options,
    )
    .await
    .map_err(|e| internal(format!("{e:#}")))?;

    info!(
        sources = recommendations.urls.len(),
        complaint_len = recommendations.complaint.len(),
        "legal assistant run finished"
    );
    Ok(Json(recommendations))
}

// SSE logs

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    // Subscribe before snapshotting ring to avoid race
    let live_rx = state.log_tx.subscribe();
    let history: Vec<String> = state
        .log_ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    tokio::spawn(async move {
        for line in history {
            if tx.send(line).is_err() {
                return;
            }
        }
        let mut live_rx = live_rx;
        loop {
            match live_rx.recv().await {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
    let stream = UnboundedReceiverStream::new(rx)
        .map(|data| Ok::<_, std::convert::Infallible>(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    )
}
