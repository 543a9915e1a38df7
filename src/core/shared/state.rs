use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::menu::permissions::{DieselPermissionSource, MenuPermissionService};
use crate::menu::route_guard::RoutePermissionGuard;
use crate::security::SessionKeys;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub sessions: SessionKeys,
    pub menu_permissions: Arc<MenuPermissionService>,
    pub route_guard: Arc<RoutePermissionGuard>,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Self {
        let sessions = SessionKeys::new(&config.auth.jwt_secret, config.auth.token_ttl_days);
        let source = Arc::new(DieselPermissionSource::new(conn.clone()));
        let menu_permissions = Arc::new(MenuPermissionService::new(
            source,
            config.permissions.menu_cache_ttl_seconds,
        ));
        let route_guard = Arc::new(RoutePermissionGuard::new(
            Arc::clone(&menu_permissions),
            config.permissions.route_cache_ttl_seconds,
        ));

        Self {
            conn,
            config,
            sessions,
            menu_permissions,
            route_guard,
        }
    }

    /// Drops cached permission data after a change to roles, menu items or grants.
    pub async fn invalidate_permissions(&self, role_id: Option<i32>) {
        match role_id {
            Some(role_id) => {
                self.menu_permissions.invalidate_role(role_id).await;
                self.route_guard.invalidate_role(role_id).await;
            }
            None => {
                self.menu_permissions.clear().await;
                self.route_guard.clear().await;
            }
        }
    }
}
