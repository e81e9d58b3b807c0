//! HTTP routes over [`TranslationService`].
//!
//! # Routes
//!
//! - `GET  /health`
//! - `GET  /api/translations/:tenant_id?category=` list stored records
//! - `POST /api/translations/:tenant_id` add or replace one translation
//! - `POST /api/translations/:tenant_id/import` bulk import
//! - `GET  /api/translations/:tenant_id/stats` counts by category and approval
//! - `GET  /api/translations/:tenant_id/keys/:key` one stored record
//! - `GET  /api/translations/:tenant_id/lookup/:key` cached value only
//! - `POST /api/translations/:tenant_id/translate` translate a JSON payload
//! - `POST /api/accounts/:tenant_id/cache` warm the tenant cache
//! - `GET  /api/cache/stats` cache counters
//!
//! Authentication happens in front of this router.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::TranslationError;
use crate::models::{Category, NewTranslation};
use crate::service::TranslationService;

/// Header carrying the acting user's id, set by the auth layer.
pub const EDITOR_HEADER: &str = "x-editor-id";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
}

impl AppState {
    pub fn new(service: TranslationService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/translations/:tenant_id",
            get(list_handler).post(add_handler),
        )
        .route("/api/translations/:tenant_id/import", post(import_handler))
        .route("/api/translations/:tenant_id/stats", get(stats_handler))
        .route("/api/translations/:tenant_id/keys/:key", get(record_handler))
        .route("/api/translations/:tenant_id/lookup/:key", get(lookup_handler))
        .route("/api/translations/:tenant_id/translate", post(translate_handler))
        .route("/api/accounts/:tenant_id/cache", post(warm_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for TranslationError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TranslationError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            TranslationError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{} not found", what))
            }
            TranslationError::StoreUnavailable(_) => {
                error!("Store failure: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Translation store unavailable".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for TranslationError {
    fn from(rejection: JsonRejection) -> Self {
        TranslationError::Validation(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, TranslationError>;

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Route not found" })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<String>,
}

async fn list_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let category = query
        .category
        .filter(|c| !c.is_empty())
        .map(|c| c.parse::<Category>())
        .transpose()?;
    let records = state.service.get_translations(&tenant_id, category).await?;
    Ok(Json(records))
}

async fn add_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<NewTranslation>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(entry) = body?;
    let editor = headers.get(EDITOR_HEADER).and_then(|v| v.to_str().ok());
    let record = state
        .service
        .add_translation(&tenant_id, &entry, editor)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    #[serde(default)]
    translations: Vec<NewTranslation>,
}

async fn import_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) =
        body.map_err(|_| TranslationError::validation("Translations array is required"))?;
    let report = state
        .service
        .import_translations(&tenant_id, &request.translations)
        .await?;
    Ok(Json(json!({
        "message": "Translations imported successfully",
        "count": report.count(),
        "failed": report.failed,
    })))
}

async fn stats_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.stats(&tenant_id).await?))
}

async fn record_handler(
    State(state): State<AppState>,
    Path((tenant_id, key)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let record = state
        .service
        .get_translation_record(&tenant_id, &key)
        .await?;
    Ok(Json(record))
}

async fn lookup_handler(
    State(state): State<AppState>,
    Path((tenant_id, key)): Path<(String, String)>,
) -> impl IntoResponse {
    let value = state.service.get_translation(&tenant_id, &key);
    Json(json!({ "key": key, "value": value }))
}

async fn translate_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = body?;
    Ok(Json(state.service.translate_structure(&payload, &tenant_id)))
}

async fn warm_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let segment = state.service.warm_cache(&tenant_id).await?;
    Ok(Json(json!({ "tenant_id": tenant_id, "entries": segment.len() })))
}

async fn cache_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.cache_report())
}
