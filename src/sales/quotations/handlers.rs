use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::approval::{self, ReviewDecision, ReviewRequest};
use super::service;
use super::types::*;
use crate::core::shared::error::ApiResult;
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/quotations", get(list_quotations).post(create_quotation))
        .route("/api/quotations/counts", get(quotation_counts))
        .route("/api/quotations/slug/{slug}", get(get_quotation_by_slug))
        .route(
            "/api/quotations/{id}",
            get(get_quotation)
                .put(update_quotation)
                .delete(delete_quotation),
        )
        .route("/api/quotations/{id}/status", post(update_quotation_status))
        .route("/api/quotations/{id}/submit", post(submit_quotation))
        .route("/api/quotations/{id}/approve", post(approve_quotation))
        .route("/api/quotations/{id}/reject", post(reject_quotation))
        .route("/api/quotations/{id}/approvals", get(quotation_approvals))
}

pub async fn list_quotations(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<QuotationListQuery>,
) -> ApiResult<Json<Value>> {
    let quotations = service::list(&state.conn, query).await?;
    Ok(Json(json!({
        "success": true,
        "count": quotations.len(),
        "quotations": quotations,
    })))
}

pub async fn quotation_counts(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let counts = service::counts(&state.conn).await?;
    Ok(Json(json!({ "success": true, "counts": counts })))
}

pub async fn get_quotation(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let quotation = service::find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "quotation": quotation })))
}

pub async fn get_quotation_by_slug(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let quotation = service::find_by_slug(&state.conn, slug).await?;
    Ok(Json(json!({ "success": true, "quotation": quotation })))
}

pub async fn create_quotation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateQuotationRequest>,
) -> ApiResult<Json<Value>> {
    let quotation = service::create(&state.conn, request, user.id).await?;
    Ok(Json(json!({ "success": true, "quotation": quotation })))
}

pub async fn update_quotation(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateQuotationRequest>,
) -> ApiResult<Json<Value>> {
    let quotation = service::update(&state.conn, id, request).await?;
    Ok(Json(json!({ "success": true, "quotation": quotation })))
}

pub async fn update_quotation_status(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateQuotationStatusRequest>,
) -> ApiResult<Json<Value>> {
    let quotation = service::change_status(&state.conn, id, &request.status).await?;
    Ok(Json(json!({ "success": true, "quotation": quotation })))
}

pub async fn delete_quotation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    service::delete(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "message": "Quotation deleted successfully" })))
}

pub async fn submit_quotation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let submission = approval::submit(&state.conn, id, user).await?;
    Ok(Json(json!({
        "success": true,
        "quotation": submission.quotation,
        "approvers_notified": submission.notified,
    })))
}

async fn review_quotation(
    state: Arc<AppState>,
    user: CurrentUser,
    id: i32,
    decision: ReviewDecision,
    request: ReviewRequest,
) -> ApiResult<Json<Value>> {
    let quotation = approval::review(&state.conn, id, user, decision, request.comments).await?;
    let message = match decision {
        ReviewDecision::Approve => "Quotation approved successfully",
        ReviewDecision::Reject => "Quotation rejected successfully",
    };
    Ok(Json(json!({ "success": true, "message": message, "quotation": quotation })))
}

pub async fn approve_quotation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<Value>> {
    review_quotation(state, user, id, ReviewDecision::Approve, request).await
}

pub async fn reject_quotation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<Value>> {
    review_quotation(state, user, id, ReviewDecision::Reject, request).await
}

pub async fn quotation_approvals(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let approvals = approval::history(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "approvals": approvals })))
}
