use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::service;
use super::types::*;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leads", get(list_leads).post(create_lead))
        .route(
            "/api/leads/{id}",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route("/api/leads/{id}/assign", post(assign_lead))
        .route("/api/leads/{id}/status", post(update_lead_status))
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<LeadListQuery>,
) -> ApiResult<Json<Value>> {
    let viewer = query.mine.then_some(user.id);
    let page = service::list(&state.conn, query, viewer).await?;
    Ok(Json(json!({
        "success": true,
        "leads": page.leads,
        "total": page.total,
        "page": page.page,
        "per_page": page.per_page,
    })))
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let lead = service::find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}

pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateLeadRequest>,
) -> ApiResult<Json<Value>> {
    let lead = service::create(&state.conn, request, user.id).await?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}

pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateLeadRequest>,
) -> ApiResult<Json<Value>> {
    let lead = service::update(&state.conn, id, request).await?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    service::delete(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "message": "Lead deleted successfully" })))
}

pub async fn assign_lead(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<AssignLeadRequest>,
) -> ApiResult<Json<Value>> {
    let employee_id = request
        .employee_id
        .ok_or_else(|| ApiError::bad_request("employee_id is required"))?;
    let lead = service::assign(&state.conn, id, employee_id, user.first_name.clone()).await?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}

pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateLeadStatusRequest>,
) -> ApiResult<Json<Value>> {
    let lead = service::change_status(&state.conn, id, request).await?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}
