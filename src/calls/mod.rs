//! Call recording ingestion and transcript attachment.

pub mod service;

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::shared::error::ApiResult;
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;
use service::{AttachTranscriptRequest, CallListQuery, IngestCallRequest, NewCallRecording};

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/call-recordings", get(list_calls).post(ingest_call))
        .route("/api/call-recordings/{id}", get(get_call))
        .route("/api/call-recordings/{id}/transcript", put(attach_transcript))
}

pub async fn ingest_call(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<IngestCallRequest>,
) -> ApiResult<Json<Value>> {
    let recording = NewCallRecording::from_request(request, user.id)?;
    let recording = service::ingest(&state.conn, recording).await?;
    Ok(Json(json!({ "success": true, "call": recording })))
}

pub async fn list_calls(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<CallListQuery>,
) -> ApiResult<Json<Value>> {
    let calls = service::list(&state.conn, query).await?;
    Ok(Json(json!({ "success": true, "count": calls.len(), "calls": calls })))
}

pub async fn get_call(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let recording = service::find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "call": recording })))
}

pub async fn attach_transcript(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<AttachTranscriptRequest>,
) -> ApiResult<Json<Value>> {
    let recording = service::attach_transcript(&state.conn, id, &request.transcript).await?;
    Ok(Json(json!({ "success": true, "call": recording })))
}
