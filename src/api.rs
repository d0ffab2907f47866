use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::archive::AUTO_WATCH_FOLDER_ID;
use crate::ingest::types::Article;
use crate::scheduler::{AutoWatchService, CycleReport};
use crate::store::{ModuleStore, ARCHIVE, MESSAGES};
use crate::watchlist::{self, AddOutcome, StoredWatch, WatchItem, WatchType};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AutoWatchService>,
    pub store: Arc<dyn ModuleStore>,
    /// Used by `POST /watch/run` when the body names no recipient.
    pub default_recipient: String,
}

impl AppState {
    pub fn new(service: Arc<AutoWatchService>, default_recipient: impl Into<String>) -> Self {
        Self {
            store: service.store(),
            service,
            default_recipient: default_recipient.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/watches", get(list_watches).post(create_watch))
        .route("/watches/{id}", delete(delete_watch).patch(toggle_watch))
        .route("/watch/run", post(force_run))
        .route("/search", get(search))
        .route("/archive", get(list_archive))
        .route("/messages", get(list_messages))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Store failures surface as 500 with the error chain as body.
struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = ?self.0, "api request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

async fn list_watches(State(state): State<AppState>) -> Json<Vec<StoredWatch>> {
    Json(watchlist::load_watches(state.store.as_ref()).await)
}

#[derive(Deserialize)]
struct NewWatch {
    #[serde(rename = "type")]
    kind: WatchType,
    value: String,
}

async fn create_watch(
    State(state): State<AppState>,
    Json(body): Json<NewWatch>,
) -> Result<Response, ApiError> {
    if body.value.trim().is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "watch value must not be empty").into_response());
    }
    let item = WatchItem::new(body.kind, body.value.trim());
    Ok(match watchlist::add_watch(state.store.as_ref(), item).await? {
        AddOutcome::Added(w) => (StatusCode::CREATED, Json(w)).into_response(),
        AddOutcome::Duplicate(w) => (StatusCode::OK, Json(w)).into_response(),
    })
}

async fn delete_watch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    watchlist::remove_watch(state.store.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ActiveFlag {
    active: bool,
}

async fn toggle_watch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActiveFlag>,
) -> Result<StatusCode, ApiError> {
    let found = watchlist::set_active(state.store.as_ref(), &id, body.active).await?;
    Ok(if found {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}

#[derive(Deserialize, Default)]
struct RunReq {
    #[serde(default)]
    recipient: Option<String>,
}

/// Body is optional; an empty or unparsable body runs for the default recipient.
async fn force_run(State(state): State<AppState>, body: Bytes) -> Json<CycleReport> {
    let req: RunReq = serde_json::from_slice(&body).unwrap_or_default();
    let recipient = req
        .recipient
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.default_recipient.clone());
    Json(state.service.force_run(&recipient).await)
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    limit: Option<usize>,
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<Article>>, (StatusCode, &'static str)> {
    if q.q.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missing query parameter `q`"));
    }
    Ok(Json(state.service.search_literature(&q.q, q.limit).await))
}

async fn list_archive(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let rows = state.store.fetch(ARCHIVE).await?;
    Ok(Json(
        rows.into_iter()
            .filter(|r| r.get("folderId").and_then(Value::as_str) == Some(AUTO_WATCH_FOLDER_ID))
            .collect(),
    ))
}

#[derive(Deserialize)]
struct MessagesQuery {
    #[serde(default)]
    recipient: Option<String>,
}

async fn list_messages(
    State(state): State<AppState>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let rows = state.store.fetch(MESSAGES).await?;
    Ok(Json(match q.recipient {
        Some(r) => rows
            .into_iter()
            .filter(|m| m.get("recipient").and_then(Value::as_str) == Some(r.as_str()))
            .collect(),
        None => rows,
    }))
}
