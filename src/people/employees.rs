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
use crate::core::shared::schema::{departments, designations, employees, roles};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    ilike_pattern, non_blank, require_reference, required_text, with_conn, DbPool,
};
use crate::security::password::{check_password_policy, hash_password};
use crate::security::CurrentUser;

const NOT_FOUND: &str = "Employee not found";
const DUPLICATE: &str = "Username already exists";

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/employees", get(list_employees).post(create_employee))
        .route(
            "/api/employees/{id}",
            get(get_employee)
                .put(update_employee)
                .delete(deactivate_employee),
        )
}

async fn hash_new_password(password: String) -> ApiResult<String> {
    check_password_policy(&password).map_err(ApiError::BadRequest)?;
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal("Background task failed", e))?
        .map_err(|e| ApiError::internal("Failed to hash password", e))
}

fn load_view(conn: &mut PgConnection, id: i32) -> ApiResult<EmployeeView> {
    employees::table
        .left_join(roles::table)
        .filter(employees::id.eq(id))
        .select((Employee::as_select(), roles::title.nullable()))
        .first::<(Employee, Option<String>)>(conn)
        .map(|(employee, role_title)| EmployeeView {
            employee,
            role_title,
        })
        .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
}

pub async fn list(pool: &DbPool, query: EmployeeListQuery) -> ApiResult<Vec<EmployeeView>> {
    with_conn(pool, move |conn| {
        let mut q = employees::table
            .left_join(roles::table)
            .select((Employee::as_select(), roles::title.nullable()))
            .into_boxed();
        if let Some(search) = non_blank(query.search) {
            let pattern = ilike_pattern(&search);
            q = q.filter(
                employees::first_name
                    .ilike(pattern.clone())
                    .or(employees::last_name.assume_not_null().ilike(pattern.clone()))
                    .or(employees::username.ilike(pattern.clone()))
                    .or(employees::email.assume_not_null().ilike(pattern)),
            );
        }
        if let Some(department_id) = query.department_id {
            q = q.filter(employees::department_id.eq(department_id));
        }
        if let Some(role_id) = query.role_id {
            q = q.filter(employees::role_id.eq(role_id));
        }
        if let Some(is_active) = query.is_active {
            q = q.filter(employees::is_active.eq(is_active));
        }

        let rows = q
            .order((employees::first_name.asc(), employees::id.asc()))
            .load::<(Employee, Option<String>)>(conn)?;
        Ok(rows
            .into_iter()
            .map(|(employee, role_title)| EmployeeView {
                employee,
                role_title,
            })
            .collect())
    })
    .await
}

/// Unknown department, designation or role ids are a 400, not a constraint error.
fn check_references(
    conn: &mut PgConnection,
    department_id: Option<i32>,
    designation_id: Option<i32>,
    role_id: Option<i32>,
) -> ApiResult<()> {
    use diesel::dsl::exists;

    if let Some(id) = department_id {
        let found = diesel::select(exists(departments::table.find(id))).get_result(conn)?;
        require_reference(found, "Department")?;
    }
    if let Some(id) = designation_id {
        let found = diesel::select(exists(designations::table.find(id))).get_result(conn)?;
        require_reference(found, "Designation")?;
    }
    if let Some(id) = role_id {
        let found = diesel::select(exists(roles::table.find(id))).get_result(conn)?;
        require_reference(found, "Role")?;
    }
    Ok(())
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<EmployeeView> {
    with_conn(pool, move |conn| load_view(conn, id)).await
}

pub async fn create(pool: &DbPool, request: EmployeeRequest) -> ApiResult<EmployeeView> {
    let username = required_text(&request.username, "Username")?;
    let first_name = required_text(&request.first_name, "First name")?;
    let password_hash = match non_blank(request.password) {
        Some(password) => Some(hash_new_password(password).await?),
        None => None,
    };

    let new_employee = NewEmployee {
        username,
        password_hash,
        email: non_blank(request.email),
        first_name,
        last_name: non_blank(request.last_name),
        phone: non_blank(request.phone),
        department_id: request.department_id,
        designation_id: request.designation_id,
        role_id: request.role_id,
        is_active: request.is_active.unwrap_or(true),
    };

    let view = with_conn(pool, move |conn| {
        check_references(
            conn,
            new_employee.department_id,
            new_employee.designation_id,
            new_employee.role_id,
        )?;
        let id: i32 = diesel::insert_into(employees::table)
            .values(&new_employee)
            .returning(employees::id)
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_conflict(DUPLICATE))?;
        load_view(conn, id)
    })
    .await?;

    info!("Created employee {} ({})", view.employee.id, view.employee.username);
    Ok(view)
}

pub async fn update(pool: &DbPool, id: i32, request: EmployeeUpdateRequest) -> ApiResult<EmployeeView> {
    let password_hash = match non_blank(request.password) {
        Some(password) => Some(Some(hash_new_password(password).await?)),
        None => None,
    };

    let changes = EmployeeChangeset {
        username: match request.username.as_deref() {
            Some(username) => Some(required_text(username, "Username")?),
            None => None,
        },
        password_hash,
        email: request.email.map(non_blank),
        first_name: match request.first_name.as_deref() {
            Some(first_name) => Some(required_text(first_name, "First name")?),
            None => None,
        },
        last_name: request.last_name.map(non_blank),
        phone: request.phone.map(non_blank),
        department_id: request.department_id,
        designation_id: request.designation_id,
        role_id: request.role_id,
        is_active: request.is_active,
        updated_at: Some(Utc::now()),
    };

    let view = with_conn(pool, move |conn| {
        check_references(
            conn,
            changes.department_id.flatten(),
            changes.designation_id.flatten(),
            changes.role_id.flatten(),
        )?;
        let updated = diesel::update(employees::table.find(id))
            .set(&changes)
            .execute(conn)
            .map_err(|e| ApiError::from(e).or_conflict(DUPLICATE))?;
        if updated == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        load_view(conn, id)
    })
    .await?;

    info!("Updated employee {}", view.employee.id);
    Ok(view)
}

/// Soft delete; the row and its references are kept.
pub async fn deactivate(pool: &DbPool, id: i32) -> ApiResult<()> {
    let updated = with_conn(pool, move |conn| {
        Ok(diesel::update(employees::table.find(id))
            .set((
                employees::is_active.eq(false),
                employees::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?)
    })
    .await?;

    if updated == 0 {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Deactivated employee {id}");
    Ok(())
}

pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<EmployeeListQuery>,
) -> ApiResult<Json<Value>> {
    let employees = list(&state.conn, query).await?;
    Ok(Json(json!({
        "success": true,
        "total": employees.len(),
        "employees": employees,
    })))
}

pub async fn get_employee(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let employee = find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "employee": employee })))
}

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<EmployeeRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let employee = create(&state.conn, request).await?;
    Ok(Json(json!({ "success": true, "employee": employee })))
}

pub async fn update_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<EmployeeUpdateRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let employee = update(&state.conn, id, request).await?;
    Ok(Json(json!({ "success": true, "employee": employee })))
}

pub async fn deactivate_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    if id == user.id {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }
    deactivate(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "message": "Employee deactivated successfully" })))
}
