//! Lead pipeline and client quotations.

pub mod leads;
pub mod quotations;

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .merge(leads::configure())
        .merge(quotations::configure())
}
