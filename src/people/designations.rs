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
use crate::core::shared::schema::{departments, designations};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    ilike_pattern, non_blank, require_reference, required_text, with_conn, DbPool,
};
use crate::security::CurrentUser;

const NOT_FOUND: &str = "Designation not found";
const DUPLICATE: &str = "A designation with this name already exists in this department";
const DEFAULT_LIMIT: i64 = 50;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/designations", get(list_designations).post(create_designation))
        .route(
            "/api/designations/{id}",
            get(get_designation)
                .put(update_designation)
                .delete(delete_designation),
        )
}

fn ensure_department(conn: &mut PgConnection, department_id: i32) -> ApiResult<()> {
    let found: bool =
        diesel::select(diesel::dsl::exists(departments::table.find(department_id))).get_result(conn)?;
    require_reference(found, "Department")
}

fn load_view(conn: &mut PgConnection, id: i32) -> ApiResult<DesignationView> {
    designations::table
        .left_join(departments::table)
        .filter(designations::id.eq(id))
        .select((
            Designation::as_select(),
            (departments::id, departments::name).nullable(),
        ))
        .first::<(Designation, Option<(i32, String)>)>(conn)
        .map(|(designation, department)| DesignationView::new(designation, department))
        .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
}

pub async fn list(pool: &DbPool, query: DesignationListQuery) -> ApiResult<Vec<DesignationView>> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);

    with_conn(pool, move |conn| {
        let mut q = designations::table
            .left_join(departments::table)
            .select((
                Designation::as_select(),
                (departments::id, departments::name).nullable(),
            ))
            .into_boxed();
        if let Some(search) = non_blank(query.search) {
            q = q.filter(designations::name.ilike(ilike_pattern(&search)));
        }
        if let Some(department_id) = query.department_id {
            q = q.filter(designations::department_id.eq(department_id));
        }

        let rows = q
            .order((designations::name.asc(), designations::id.asc()))
            .limit(limit)
            .load::<(Designation, Option<(i32, String)>)>(conn)?;
        Ok(rows
            .into_iter()
            .map(|(designation, department)| DesignationView::new(designation, department))
            .collect())
    })
    .await
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<DesignationView> {
    with_conn(pool, move |conn| load_view(conn, id)).await
}

pub async fn create(pool: &DbPool, request: DesignationRequest) -> ApiResult<DesignationView> {
    let name = required_text(&request.name, "Name")?;
    let department_id = request
        .department_id
        .ok_or_else(|| ApiError::bad_request("Name and department are required"))?;
    let new_designation = NewDesignation {
        name,
        description: non_blank(request.description),
        department_id,
    };

    let view = with_conn(pool, move |conn| {
        ensure_department(conn, new_designation.department_id)?;
        let id: i32 = diesel::insert_into(designations::table)
            .values(&new_designation)
            .returning(designations::id)
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_conflict(DUPLICATE))?;
        load_view(conn, id)
    })
    .await?;

    info!("Created designation {} ({})", view.designation.id, view.designation.name);
    Ok(view)
}

pub async fn update(
    pool: &DbPool,
    id: i32,
    request: DesignationUpdateRequest,
) -> ApiResult<DesignationView> {
    let changes = DesignationChangeset {
        name: match request.name.as_deref() {
            Some(name) => Some(required_text(name, "Name")?),
            None => None,
        },
        description: request.description.map(non_blank),
        department_id: request.department_id,
        updated_at: Utc::now(),
    };

    let view = with_conn(pool, move |conn| {
        if let Some(department_id) = changes.department_id {
            ensure_department(conn, department_id)?;
        }
        let updated = diesel::update(designations::table.find(id))
            .set(&changes)
            .execute(conn)
            .map_err(|e| ApiError::from(e).or_conflict(DUPLICATE))?;
        if updated == 0 {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        load_view(conn, id)
    })
    .await?;

    info!("Updated designation {}", view.designation.id);
    Ok(view)
}

pub async fn delete(pool: &DbPool, id: i32) -> ApiResult<()> {
    let deleted = with_conn(pool, move |conn| {
        Ok(diesel::delete(designations::table.find(id)).execute(conn)?)
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Deleted designation {id}");
    Ok(())
}

pub async fn list_designations(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<DesignationListQuery>,
) -> ApiResult<Json<Value>> {
    let designations = list(&state.conn, query).await?;
    Ok(Json(json!({
        "success": true,
        "total": designations.len(),
        "designations": designations,
    })))
}

pub async fn get_designation(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let designation = find(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "designation": designation })))
}

pub async fn create_designation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(request): ApiJson<DesignationRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let designation = create(&state.conn, request).await?;
    Ok(Json(json!({ "success": true, "designation": designation })))
}

pub async fn update_designation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<DesignationUpdateRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let designation = update(&state.conn, id, request).await?;
    Ok(Json(json!({ "success": true, "designation": designation })))
}

pub async fn delete_designation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    delete(&state.conn, id).await?;
    Ok(Json(json!({ "success": true, "message": "Designation deleted successfully" })))
}
