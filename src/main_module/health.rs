//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use diesel::sql_query;
use log::warn;
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

pub const SERVICE_NAME: &str = "studiocrm";

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let probe = with_conn(&state.conn, |conn| Ok(sql_query("SELECT 1").execute(conn)?)).await;
    let db_ok = match probe {
        Ok(_) => true,
        Err(e) => {
            warn!("Database health check failed: {e}");
            false
        }
    };

    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "success": db_ok,
            "status": status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok,
            "pool": {
                "connections": state.conn.state().connections,
                "idle": state.conn.state().idle_connections,
            }
        })),
    )
}
