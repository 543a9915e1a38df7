pub mod departments;
pub mod designations;
pub mod employees;
pub mod roles;
pub mod types;

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .merge(departments::configure())
        .merge(designations::configure())
        .merge(roles::configure())
        .merge(employees::configure())
}
