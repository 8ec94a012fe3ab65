use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::error::SearchError;
use crate::search::{SearchRequest, SearchService};

#[derive(Clone)]
pub struct AppState {
    service: Arc<SearchService>,
}

impl AppState {
    pub fn new(service: Arc<SearchService>) -> Self {
        Self { service }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/platforms", get(get_platforms))
        .route("/platforms/{platform}/categories", get(get_categories))
        .route("/search", post(search))
        .route("/enhance-existing", post(enhance_existing))
        .route("/ocr-status", get(ocr_status))
        .route("/history/{user_id}", get(history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `{success: false, error}` with the status the error class maps to.
fn error_envelope(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

fn search_error_response(err: SearchError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        SearchError::UnknownUser(_) => StatusCode::NOT_FOUND,
        SearchError::Scrape(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };
    if let SearchError::Scrape(inner) = &err {
        error!(error = ?inner, "scrape failed");
    }
    error_envelope(status, err.to_string())
}

async fn get_platforms(State(state): State<AppState>) -> Json<Value> {
    let registry = state.service.registry();
    let platforms: Vec<Value> = registry
        .available_platforms()
        .into_iter()
        .map(|p| {
            let categories = registry.categories_of(&p.name);
            json!({
                "name": p.name,
                "displayName": p.display_name,
                "description": p.description,
                "categories": categories,
            })
        })
        .collect();
    Json(json!({ "success": true, "platforms": platforms }))
}

async fn get_categories(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Json<Value> {
    let categories = state.service.registry().categories_of(&platform);
    Json(json!({
        "success": true,
        "platform": platform,
        "categories": categories,
    }))
}

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.service.run(req).await {
        Ok(resp) => {
            let mut body = serde_json::to_value(&resp).unwrap_or_else(|_| json!({}));
            if let Some(obj) = body.as_object_mut() {
                obj.insert("success".into(), json!(true));
            }
            Ok(Json(body))
        }
        Err(err) => Err(search_error_response(err)),
    }
}

#[derive(serde::Deserialize)]
struct EnhanceExistingReq {
    #[serde(rename = "filePath")]
    file_path: Option<String>,
}

async fn enhance_existing(
    State(state): State<AppState>,
    Json(req): Json<EnhanceExistingReq>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(path) = req.file_path.filter(|p| !p.trim().is_empty()) else {
        return Err(error_envelope(
            StatusCode::BAD_REQUEST,
            "File path is required",
        ));
    };
    match state.service.enhance_existing(&path).await {
        Ok(batch) => Ok(Json(batch.english)),
        Err(e) => Err(error_envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

async fn ocr_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.service.pipeline().status().await;
    Json(json!({
        "success": true,
        "ocr_service": status,
    }))
}

async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.service.repository().search_history(&user_id, 10).await {
        Ok(searches) => Ok(Json(json!({
            "success": true,
            "searches": searches,
        }))),
        Err(e) => Err(error_envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}
