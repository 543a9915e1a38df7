//! Inbound WhatsApp messages. The provider webhook is authenticated with a
//! shared token; reading the stored conversation needs a normal session.

pub mod payload;
pub mod service;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;
use payload::WebhookPayload;
use service::MessageListQuery;

pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/webhooks/whatsapp",
            get(verify_webhook).post(receive_webhook),
        )
        .route("/api/whatsapp/messages", get(list_messages))
        .route("/api/whatsapp/stats", get(message_stats))
}

fn configured_token(state: &AppState) -> ApiResult<&str> {
    state
        .config
        .whatsapp
        .webhook_token
        .as_deref()
        .ok_or_else(|| ApiError::forbidden("WhatsApp webhook is not configured"))
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Subscription handshake: echoes `hub.challenge` when the token matches.
pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<VerifyQuery>,
) -> ApiResult<impl IntoResponse> {
    let token = configured_token(&state)?;
    if query.mode.as_deref() != Some("subscribe") || query.verify_token.as_deref() != Some(token) {
        return Err(ApiError::forbidden("Webhook verification failed"));
    }
    Ok((StatusCode::OK, query.challenge.unwrap_or_default()))
}

pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<WebhookPayload>,
) -> ApiResult<Json<Value>> {
    let token = configured_token(&state)?;
    let presented = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(token) {
        return Err(ApiError::unauthorized("Invalid webhook token"));
    }

    let messages = payload.into_messages(Utc::now());
    if messages.is_empty() {
        return Ok(Json(json!({ "success": true, "status": "no_messages" })));
    }
    let summary = service::ingest(&state.conn, messages).await?;
    Ok(Json(json!({ "success": true, "status": "processed", "summary": summary })))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<MessageListQuery>,
) -> ApiResult<Json<Value>> {
    let messages = service::list(&state.conn, query).await?;
    Ok(Json(json!({ "success": true, "count": messages.len(), "messages": messages })))
}

pub async fn message_stats(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let stats = service::stats(&state.conn).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}
