pub mod service;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::shared::error::ApiResult;
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::required_text;
use crate::security::CurrentUser;
use service::{CreateNotificationRequest, NewNotification, NotificationListQuery};

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/notifications/read-all", post(mark_all_read))
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<NotificationListQuery>,
) -> ApiResult<Json<Value>> {
    let (notifications, unread) = service::list_for(&state.conn, user.id, query).await?;
    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "unread_count": unread,
    })))
}

pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateNotificationRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let notification = NewNotification {
        employee_id: request.employee_id,
        title: required_text(&request.title, "Title")?,
        message: required_text(&request.message, "Message")?,
        notification_type: request
            .notification_type
            .unwrap_or_else(|| service::GENERAL.to_string()),
        data: request.data.unwrap_or_else(|| json!({})),
    };
    let notification = service::create(&state.conn, notification).await?;
    Ok(Json(json!({ "success": true, "notification": notification })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    service::mark_read(&state.conn, user.id, id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let updated = service::mark_all_read(&state.conn, user.id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}
