use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::items;
use super::types::*;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/menu-items", get(list_menu_items).post(create_menu_item))
        .route(
            "/api/menu-items/{id}",
            get(get_menu_item).put(update_menu_item).delete(delete_menu_item),
        )
        .route("/api/auth/menu", get(get_user_menu))
        .route("/api/auth/check-route", get(check_route))
        .route("/api/auth/can", get(check_action))
        .route(
            "/api/admin/menu-permissions",
            get(get_role_permissions).put(replace_role_permissions),
        )
        .route(
            "/api/admin/menu-permissions/cache",
            get(cache_stats).delete(clear_cache),
        )
}

pub async fn list_menu_items(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let items = items::list_menu_items(&state.conn).await?;
    Ok(Json(json!({ "success": true, "menu_items": items })))
}

pub async fn get_menu_item(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let item = items::get_menu_item(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "menu_item": item })))
}

pub async fn create_menu_item(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<CreateMenuItemRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let item = items::create_menu_item(&state.conn, request).await?;
    state.invalidate_permissions(None).await;
    Ok(Json(json!({ "success": true, "menu_item": item })))
}

pub async fn update_menu_item(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateMenuItemRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let item = items::update_menu_item(&state.conn, id, request).await?;
    state.invalidate_permissions(None).await;
    Ok(Json(json!({ "success": true, "menu_item": item })))
}

pub async fn delete_menu_item(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    items::delete_menu_item(&state.conn, id).await?;
    state.invalidate_permissions(None).await;
    Ok(Json(json!({ "success": true, "message": "Menu item deleted" })))
}

pub async fn get_user_menu(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let menu = state.menu_permissions.menu_for(&user).await?;
    Ok(Json(json!({
        "success": true,
        "is_admin": user.is_admin,
        "role_id": user.role_id,
        "role_name": user.role_name,
        "menu": menu,
    })))
}

pub async fn check_route(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<RouteCheckQuery>,
) -> ApiResult<Json<Value>> {
    let path = query
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("path is required"))?;
    let decision = state.route_guard.check(&user, &path).await?;
    Ok(Json(json!({
        "success": true,
        "allowed": decision.allowed,
        "path": path,
        "reason": decision.reason,
        "menu_item_id": decision.menu_item_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ActionCheckQuery {
    pub menu_item_id: Option<i32>,
    pub action: Option<String>,
}

pub async fn check_action(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<ActionCheckQuery>,
) -> ApiResult<Json<Value>> {
    let menu_item_id = query
        .menu_item_id
        .ok_or_else(|| ApiError::bad_request("menu_item_id is required"))?;
    let action: MenuAction = query
        .action
        .as_deref()
        .unwrap_or("view")
        .parse()
        .map_err(ApiError::BadRequest)?;
    let allowed = state
        .menu_permissions
        .can(&user, menu_item_id, action)
        .await?;
    Ok(Json(json!({
        "success": true,
        "menu_item_id": menu_item_id,
        "action": action,
        "allowed": allowed,
    })))
}

pub async fn get_role_permissions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<RolePermissionsQuery>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let role_id = query
        .role_id
        .ok_or_else(|| ApiError::bad_request("role_id is required"))?;
    let (role, permissions) = items::role_permission_matrix(&state.conn, role_id).await?;
    Ok(Json(json!({
        "success": true,
        "role_id": role_id,
        "role": role,
        "permissions": permissions,
    })))
}

pub async fn replace_role_permissions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<ReplaceRolePermissionsRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let role_id = request
        .role_id
        .ok_or_else(|| ApiError::bad_request("role_id is required"))?;
    let count = items::replace_role_permissions(&state.conn, role_id, request.permissions).await?;
    state.invalidate_permissions(Some(role_id)).await;
    Ok(Json(json!({
        "success": true,
        "message": "Permissions updated successfully",
        "role_id": role_id,
        "permissions_count": count,
    })))
}

pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let menu = state.menu_permissions.stats().await;
    let routes = state.route_guard.cached_decisions().await;
    Ok(Json(json!({
        "success": true,
        "menu": menu,
        "route_decisions": routes,
    })))
}

pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.invalidate_permissions(None).await;
    Ok(Json(json!({ "success": true, "message": "Permission caches cleared" })))
}
