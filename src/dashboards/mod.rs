pub mod stats;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::shared::error::ApiResult;
use crate::core::shared::state::AppState;
use crate::security::CurrentUser;

pub use stats::DashboardStats;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new().route("/api/dashboard/stats", get(dashboard_stats))
}

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let stats = stats::collect(&state.conn, user.id).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}
