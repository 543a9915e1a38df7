//! Work items for employees: approval requests, follow-ups after an approved
//! quotation, call-backs and ad hoc tasks.

pub mod service;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;
use service::{CreateTaskRequest, ReassignTaskRequest, TaskListQuery, UpdateTaskStatusRequest};

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/status", post(update_task_status))
        .route("/api/tasks/{id}/assign", post(reassign_task))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<Value>> {
    let viewer = query.mine.then_some(user.id);
    let tasks = service::list(&state.conn, query, viewer).await?;
    Ok(Json(json!({ "success": true, "count": tasks.len(), "tasks": tasks })))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let task = service::find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateTaskRequest>,
) -> ApiResult<Json<Value>> {
    let task = service::create(&state.conn, request, user.id).await?;
    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateTaskStatusRequest>,
) -> ApiResult<Json<Value>> {
    let task = service::change_status(&state.conn, id, &request.status, user.id, user.is_admin).await?;
    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn reassign_task(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<ReassignTaskRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let employee_id = request
        .employee_id
        .ok_or_else(|| ApiError::bad_request("employee_id is required"))?;
    let task = service::reassign(&state.conn, id, employee_id).await?;
    Ok(Json(json!({ "success": true, "task": task })))
}
