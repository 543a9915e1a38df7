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
use crate::core::shared::schema::departments;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{ilike_pattern, non_blank, required_text, with_conn, DbPool};
use crate::security::CurrentUser;

const NOT_FOUND: &str = "Department not found";
const DUPLICATE: &str = "A department with this name already exists";

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/departments", get(list_departments).post(create_department))
        .route(
            "/api/departments/{id}",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
}

pub async fn list(pool: &DbPool, query: DepartmentListQuery) -> ApiResult<Vec<Department>> {
    with_conn(pool, move |conn| {
        let mut q = departments::table.into_boxed();
        if let Some(search) = non_blank(query.search) {
            q = q.filter(departments::name.ilike(ilike_pattern(&search)));
        }
        Ok(q.order(departments::name.asc())
            .select(Department::as_select())
            .load(conn)?)
    })
    .await
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<Department> {
    with_conn(pool, move |conn| {
        departments::table
            .find(id)
            .select(Department::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn create(pool: &DbPool, request: DepartmentRequest) -> ApiResult<Department> {
    let new_department = NewDepartment {
        name: required_text(&request.name, "Name")?,
        description: non_blank(request.description),
    };

    let department = with_conn(pool, move |conn| {
        diesel::insert_into(departments::table)
            .values(&new_department)
            .returning(Department::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_conflict(DUPLICATE))
    })
    .await?;

    info!("Created department {} ({})", department.id, department.name);
    Ok(department)
}

pub async fn update(pool: &DbPool, id: i32, request: DepartmentUpdateRequest) -> ApiResult<Department> {
    let changes = DepartmentChangeset {
        name: match request.name.as_deref() {
            Some(name) => Some(required_text(name, "Name")?),
            None => None,
        },
        description: request.description.map(non_blank),
        updated_at: Utc::now(),
    };

    let department = with_conn(pool, move |conn| {
        diesel::update(departments::table.find(id))
            .set(&changes)
            .returning(Department::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND).or_conflict(DUPLICATE))
    })
    .await?;

    info!("Updated department {}", department.id);
    Ok(department)
}

pub async fn delete(pool: &DbPool, id: i32) -> ApiResult<()> {
    let deleted = with_conn(pool, move |conn| {
        diesel::delete(departments::table.find(id))
            .execute(conn)
            .map_err(|e| {
                ApiError::from(e)
                    .or_reference_conflict("Department is still referenced by designations")
            })
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Deleted department {id}");
    Ok(())
}

pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<DepartmentListQuery>,
) -> ApiResult<Json<Value>> {
    let departments = list(&state.conn, query).await?;
    Ok(Json(json!({
        "success": true,
        "total": departments.len(),
        "departments": departments,
    })))
}

pub async fn get_department(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let department = find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "department": department })))
}

pub async fn create_department(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<DepartmentRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let department = create(&state.conn, request).await?;
    Ok(Json(json!({ "success": true, "department": department })))
}

pub async fn update_department(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<DepartmentUpdateRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let department = update(&state.conn, id, request).await?;
    Ok(Json(json!({ "success": true, "department": department })))
}

pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    delete(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "message": "Department deleted successfully" })))
}
