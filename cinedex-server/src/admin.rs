//! Admin collect and source-registry endpoints.
//!
//! Source validation errors (`SourceNotFound`, `SourceDisabled`,
//! `InvalidWindow`) surface synchronously; the crawls themselves run in
//! the background and report through the failure log.

use axum::Json;
use axum::extract::{Path, State};
use cinedex_core::EngineError;
use cinedex_model::FilmSource;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::errors::ApiError;
use crate::state::AppState;

fn ok(msg: &str) -> Json<Value> {
    Json(json!({ "code": 1, "msg": msg }))
}

fn ok_with(msg: &str, data: Value) -> Json<Value> {
    Json(json!({ "code": 1, "msg": msg, "data": data }))
}

#[derive(Debug, Deserialize)]
pub struct CollectRequest {
    pub id: String,
    pub h: i64,
}

pub async fn start_collect(
    State(state): State<AppState>,
    Json(req): Json<CollectRequest>,
) -> Result<Json<Value>, ApiError> {
    state.supervisor.start_collect(&req.id, req.h).await?;
    Ok(ok("collection started"))
}

#[derive(Debug, Deserialize)]
pub struct BatchCollectRequest {
    pub h: i64,
    pub ids: Vec<String>,
}

pub async fn batch_collect(
    State(state): State<AppState>,
    Json(req): Json<BatchCollectRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.h == 0 {
        return Err(EngineError::InvalidWindow(0).into());
    }
    state.supervisor.batch_collect(req.h, req.ids);
    Ok(ok("batch collection started"))
}

#[derive(Debug, Deserialize)]
pub struct AutoCollectRequest {
    pub h: i64,
}

pub async fn auto_collect(
    State(state): State<AppState>,
    Json(req): Json<AutoCollectRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.h == 0 {
        return Err(EngineError::InvalidWindow(0).into());
    }
    state.supervisor.auto_collect(req.h).await?;
    Ok(ok("auto collection started"))
}

#[derive(Debug, Deserialize)]
pub struct SingleCollectRequest {
    pub ids: String,
}

pub async fn collect_single(
    State(state): State<AppState>,
    Json(req): Json<SingleCollectRequest>,
) -> Result<Json<Value>, ApiError> {
    let supervisor = state.supervisor.clone();
    tokio::spawn(async move {
        if let Err(e) = supervisor.collect_single_film(&req.ids).await {
            tracing::error!(error = %e, "single-film collection failed");
        }
    });
    Ok(ok("single-film collection started"))
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub id: String,
}

pub async fn stop_task(
    State(state): State<AppState>,
    Json(req): Json<StopRequest>,
) -> Result<Json<Value>, ApiError> {
    if state.supervisor.stop_task(&req.id).await {
        Ok(ok("collection task stopped"))
    } else {
        Err(ApiError::NotFound(format!("no running task for {}", req.id)))
    }
}

pub async fn stop_all_tasks(State(state): State<AppState>) -> Json<Value> {
    let stopped = state.supervisor.stop_all_tasks().await;
    ok_with("all collection tasks stopped", json!({ "stopped": stopped }))
}

pub async fn active_tasks(State(state): State<AppState>) -> Json<Value> {
    ok_with("active tasks", json!(state.supervisor.active_tasks()))
}

pub async fn refresh_category(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.supervisor.collect_category().await?;
    Ok(ok("category tree refreshed"))
}

pub async fn list_sources(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let sources = state.sources.list().await.map_err(ApiError::from)?;
    Ok(ok_with("configured sources", json!(sources)))
}

pub async fn save_source(
    State(state): State<AppState>,
    Json(source): Json<FilmSource>,
) -> Result<Json<Value>, ApiError> {
    if source.id.trim().is_empty() {
        return Err(ApiError::BadRequest("source id must not be empty".into()));
    }
    if source.uri.trim().is_empty() {
        return Err(ApiError::BadRequest("source uri must not be empty".into()));
    }
    state.sources.save(&source).await.map_err(ApiError::from)?;
    Ok(ok("source saved"))
}

pub async fn update_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut source): Json<FilmSource>,
) -> Result<Json<Value>, ApiError> {
    source.id = id;
    save_source(State(state), Json(source)).await
}

pub async fn delete_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.sources.delete(&id).await.map_err(ApiError::from)? {
        Ok(ok("source deleted"))
    } else {
        Err(ApiError::NotFound(format!("source {id} not found")))
    }
}
