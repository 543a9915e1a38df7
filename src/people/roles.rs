use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde_json::{json, Value};
use std::sync::Arc;

use super::types::*;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::shared::schema::{departments, employees, roles};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    ilike_pattern, non_blank, require_reference, required_text, with_conn, DbPool,
};
use crate::security::{CurrentUser, ADMIN_ROLE_ID};

const NOT_FOUND: &str = "Role not found";
const DUPLICATE: &str = "A role with this title already exists";

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/roles", get(list_roles).post(create_role))
        .route(
            "/api/roles/{id}",
            get(get_role).put(update_role).delete(delete_role),
        )
}

fn status_or_default(status: Option<&str>) -> ApiResult<String> {
    match status {
        Some(status) => parse_role_status(status).map_err(ApiError::BadRequest),
        None => Ok("active".to_string()),
    }
}

pub async fn list(pool: &DbPool, query: RoleListQuery) -> ApiResult<Vec<(Role, i64)>> {
    let status = match query.status.as_deref() {
        Some(status) => Some(parse_role_status(status).map_err(ApiError::BadRequest)?),
        None => None,
    };

    with_conn(pool, move |conn| {
        let mut q = roles::table.into_boxed();
        if let Some(search) = non_blank(query.search) {
            q = q.filter(roles::title.ilike(ilike_pattern(&search)));
        }
        if let Some(status) = status {
            q = q.filter(roles::status.eq(status));
        }
        let roles: Vec<Role> = q
            .order(roles::title.asc())
            .select(Role::as_select())
            .load(conn)?;

        let ids: Vec<i32> = roles.iter().map(|r| r.id).collect();
        let counts: Vec<(Option<i32>, i64)> = employees::table
            .filter(employees::role_id.eq_any(&ids))
            .filter(employees::is_active.eq(true))
            .group_by(employees::role_id)
            .select((employees::role_id, diesel::dsl::count_star()))
            .load(conn)?;

        Ok(roles
            .into_iter()
            .map(|role| {
                let count = counts
                    .iter()
                    .find(|(id, _)| *id == Some(role.id))
                    .map_or(0, |(_, count)| *count);
                (role, count)
            })
            .collect())
    })
    .await
}

fn check_department(conn: &mut PgConnection, department_id: Option<i32>) -> ApiResult<()> {
    match department_id {
        Some(id) => {
            let found = diesel::select(diesel::dsl::exists(departments::table.find(id))).get_result(conn)?;
            require_reference(found, "Department")
        }
        None => Ok(()),
    }
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<Role> {
    with_conn(pool, move |conn| {
        roles::table
            .find(id)
            .select(Role::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn create(pool: &DbPool, request: RoleRequest) -> ApiResult<Role> {
    let new_role = NewRole {
        title: required_text(&request.title, "Title")?,
        description: non_blank(request.description),
        department_id: request.department_id,
        is_management: request.is_management,
        status: status_or_default(request.status.as_deref())?,
    };

    let role = with_conn(pool, move |conn| {
        check_department(conn, new_role.department_id)?;
        diesel::insert_into(roles::table)
            .values(&new_role)
            .returning(Role::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_conflict(DUPLICATE))
    })
    .await?;

    info!("Created role {} ({})", role.id, role.title);
    Ok(role)
}

pub async fn update(pool: &DbPool, id: i32, request: RoleUpdateRequest) -> ApiResult<Role> {
    let changes = RoleChangeset {
        title: match request.title.as_deref() {
            Some(title) => Some(required_text(title, "Title")?),
            None => None,
        },
        description: request.description.map(non_blank),
        department_id: request.department_id,
        is_management: request.is_management,
        status: match request.status.as_deref() {
            Some(status) => Some(parse_role_status(status).map_err(ApiError::BadRequest)?),
            None => None,
        },
        updated_at: Utc::now(),
    };

    let role = with_conn(pool, move |conn| {
        check_department(conn, changes.department_id.flatten())?;
        diesel::update(roles::table.find(id))
            .set(&changes)
            .returning(Role::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND).or_conflict(DUPLICATE))
    })
    .await?;

    info!("Updated role {}", role.id);
    Ok(role)
}

pub async fn delete(pool: &DbPool, id: i32) -> ApiResult<()> {
    if id == ADMIN_ROLE_ID {
        return Err(ApiError::bad_request("The Administrator role cannot be deleted"));
    }

    let deleted = with_conn(pool, move |conn| {
        Ok(diesel::delete(roles::table.find(id)).execute(conn)?)
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Deleted role {id}");
    Ok(())
}

pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<RoleListQuery>,
) -> ApiResult<Json<Value>> {
    let roles: Vec<Value> = list(&state.conn, query)
        .await?
        .into_iter()
        .map(|(role, employee_count)| {
            let mut value = json!(role);
            value["employee_count"] = json!(employee_count);
            value
        })
        .collect();
    Ok(Json(json!({ "success": true, "total": roles.len(), "roles": roles })))
}

pub async fn get_role(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let role = find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "role": role })))
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<RoleRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let role = create(&state.conn, request).await?;
    Ok(Json(json!({ "success": true, "role": role })))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<RoleUpdateRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let role = update(&state.conn, id, request).await?;
    state.invalidate_permissions(Some(role.id)).await;
    Ok(Json(json!({ "success": true, "role": role })))
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    delete(&state.conn, id).await?;
    state.invalidate_permissions(Some(id)).await;
    Ok(Json(json!({ "success": true, "message": "Role deleted successfully" })))
}
