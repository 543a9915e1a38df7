pub mod auth;
pub mod calls;
pub mod core;
pub mod dashboards;
pub mod main_module;
pub mod menu;
pub mod notifications;
pub mod people;
pub mod sales;
pub mod security;
pub mod tasks;
pub mod whatsapp;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
pub use main_module::{build_router, run_server};
