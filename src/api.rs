// src/api.rs
//! HTTP surface over the orchestrator. JSON in, JSON (or an HTML panel) out.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::MarketError;
use crate::models::{IconDetail, IconSummary, ImportDecision};
use crate::orchestrator::{Orchestrator, PreviewView, SessionOutcome, SessionRegistry};
use crate::render::{HtmlPanel, PanelView, RenderTarget};
use crate::settings::Settings;
use crate::sources;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let debounce = std::time::Duration::from_millis(orchestrator.settings().debounce_ms);
        Self {
            orchestrator,
            sessions: Arc::new(SessionRegistry::new(debounce)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/sources", get(list_sources))
        .route("/search", get(search))
        .route("/panel", get(panel))
        .route("/detail", post(detail))
        .route("/preview", post(preview))
        .route("/import", post(import))
        .route("/avatar", get(avatar))
        .route("/admin/reload-settings", post(admin_reload_settings))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body: `{error: <kind>, message: <localized>}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn from_market(err: &MarketError, message: String) -> Self {
        let status = match err {
            MarketError::Transport(_) | MarketError::Upstream { .. } | MarketError::Parse(_) => {
                StatusCode::BAD_GATEWAY
            }
            MarketError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MarketError::UnknownSource(_) => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            kind: err.kind(),
            message,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.kind, "message": self.message })),
        )
            .into_response()
    }
}

/// Localize a failure of a detail/preview/import call against `source_id`.
fn source_failure(orch: &Orchestrator, source_id: &str, err: MarketError) -> ApiError {
    let i18n = orch.i18n();
    let message = match &err {
        MarketError::UnknownSource(id) => i18n.t("unknownSource", &[("source", id)]),
        MarketError::Validation(msg) => msg.clone(),
        _ => {
            let name = sources::find(source_id).map_or(source_id, |s| s.name);
            i18n.t("downloadFailed", &[("source", name), ("msg", &err.to_string())])
        }
    };
    warn!(source = source_id, kind = err.kind(), error = %err, "request failed");
    ApiError::from_market(&err, message)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceInfo {
    id: &'static str,
    name: &'static str,
    origin: &'static str,
    dir: &'static str,
    enabled: bool,
    max_per_source: u32,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let settings = state.orchestrator.settings();
    Json(
        state
            .orchestrator
            .descriptors()
            .into_iter()
            .map(|s| SourceInfo {
                id: s.id,
                name: s.name,
                origin: s.origin,
                dir: s.dir,
                enabled: settings.is_enabled(s.id),
                max_per_source: settings.max_per_source(s.id),
            })
            .collect(),
    )
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchEntry {
    items: Vec<IconSummary>,
    error: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<BTreeMap<String, SearchEntry>> {
    let orch = &state.orchestrator;
    let results = orch.search_enabled(&query.q).await;
    Json(
        results
            .into_iter()
            .map(|(id, outcome)| {
                let error = outcome
                    .error
                    .as_ref()
                    .map(|e| orch.describe_source_error(&id, e));
                let entry = SearchEntry {
                    items: outcome.items.as_ref().clone(),
                    error,
                };
                (id, entry)
            })
            .collect(),
    )
}

#[derive(Deserialize)]
struct PanelQuery {
    #[serde(default)]
    q: String,
    #[serde(default = "default_session")]
    session: String,
}

fn default_session() -> String {
    "default".to_string()
}

async fn panel(State(state): State<AppState>, Query(query): Query<PanelQuery>) -> Response {
    let orch = &state.orchestrator;
    let session = state.sessions.session(&query.session);
    let i18n = orch.i18n();
    let view = match session.search(orch, &query.q).await {
        SessionOutcome::Ready(results) => {
            PanelView::from_results(
                &query.q,
                &results,
                &orch.enabled_sources(),
                &orch.settings(),
                &i18n,
            )
        }
        SessionOutcome::Cleared => PanelView::cleared(&i18n),
        SessionOutcome::Superseded => {
            return (StatusCode::CONFLICT, "superseded by a newer search").into_response()
        }
    };
    Html(HtmlPanel.render(&view)).into_response()
}

#[derive(Deserialize)]
struct IconRequest {
    source: String,
    summary: IconSummary,
    #[serde(default)]
    decision: ImportDecision,
}

async fn detail(
    State(state): State<AppState>,
    Json(req): Json<IconRequest>,
) -> Result<Json<IconDetail>, ApiError> {
    let orch = &state.orchestrator;
    orch.get_detail(&req.source, &req.summary)
        .await
        .map(|d| Json(d.as_ref().clone()))
        .map_err(|e| source_failure(orch, &req.source, e))
}

async fn preview(
    State(state): State<AppState>,
    Json(req): Json<IconRequest>,
) -> Result<Json<PreviewView>, ApiError> {
    let orch = &state.orchestrator;
    orch.preview(&req.source, &req.summary, &req.decision)
        .await
        .map(Json)
        .map_err(|e| source_failure(orch, &req.source, e))
}

async fn import(
    State(state): State<AppState>,
    Json(req): Json<IconRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let orch = &state.orchestrator;
    let persisted = orch
        .import_icon(&req.source, &req.summary, &req.decision)
        .await
        .map_err(|e| source_failure(orch, &req.source, e))?;
    Ok(Json(match persisted {
        Some(p) => json!({
            "imported": true,
            "path": p.path,
            "fileName": p.file_name,
            "root": p.root,
            "bytes": p.bytes,
        }),
        None => json!({ "imported": false }),
    }))
}

#[derive(Deserialize)]
struct AvatarQuery {
    #[serde(default)]
    url: String,
}

async fn avatar(
    State(state): State<AppState>,
    Query(query): Query<AvatarQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let data_uri = state
        .orchestrator
        .avatar_data_uri(&query.url)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            ApiError::from_market(&e, msg)
        })?;
    Ok(Json(json!({ "dataUri": data_uri })))
}

async fn admin_reload_settings(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let settings = Settings::load_default().map_err(|e| ApiError::internal(format!("{e:#}")))?;
    let enabled: Vec<&str> = settings.enabled_sources().iter().map(|s| s.id).collect();
    state.orchestrator.reload_settings(settings);
    info!(?enabled, "settings reloaded via admin endpoint");
    Ok(Json(json!({ "reloaded": true, "enabledSources": enabled })))
}
