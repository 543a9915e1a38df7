use log::debug;
use serde::Serialize;
use std::sync::Arc;

use super::cache::TtlCache;
use super::permissions::MenuPermissionService;
use super::tree::{governing_item, normalize_path};
use crate::core::shared::error::ApiResult;
use crate::security::CurrentUser;

/// Paths every authenticated user may open.
pub const PUBLIC_ROUTES: &[&str] = &["/dashboard", "/profile", "/unauthorized"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub allowed: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_item_id: Option<i32>,
}

impl RouteDecision {
    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
            menu_item_id: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
            menu_item_id: None,
        }
    }

    fn for_item(mut self, menu_item_id: i32) -> Self {
        self.menu_item_id = Some(menu_item_id);
        self
    }
}

/// Decisions are cached per (role, governing menu item), so the cache is
/// bounded by roles times menu items no matter which paths are requested.
pub struct RoutePermissionGuard {
    menu: Arc<MenuPermissionService>,
    decisions: TtlCache<(i32, i32), RouteDecision>,
}

impl RoutePermissionGuard {
    pub fn new(menu: Arc<MenuPermissionService>, ttl_seconds: u64) -> Self {
        Self {
            menu,
            decisions: TtlCache::new(ttl_seconds),
        }
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_ROUTES.contains(&path)
    }

    pub async fn check(&self, user: &CurrentUser, path: &str) -> ApiResult<RouteDecision> {
        let path = normalize_path(path);

        if user.is_admin {
            return Ok(RouteDecision::allow("Administrator access"));
        }
        if Self::is_public(&path) {
            return Ok(RouteDecision::allow("Public route"));
        }
        let Some(role_id) = user.role_id else {
            return Ok(RouteDecision::deny("No role assigned"));
        };

        let catalog = self.menu.menu_catalog().await?;
        let Some(item_id) = governing_item(&catalog, &path).map(|item| item.id) else {
            return Ok(RouteDecision::allow("Route is not governed by a menu item"));
        };

        let key = (role_id, item_id);
        if let Some(decision) = self.decisions.get(&key).await {
            return Ok(decision);
        }

        let access = self.menu.role_permissions(role_id).await?.access(item_id);
        let decision = if access.can_view {
            RouteDecision::allow("Role can view this menu item").for_item(item_id)
        } else {
            RouteDecision::deny("Role cannot view this menu item").for_item(item_id)
        };

        debug!(
            "Route {path} (menu item {item_id}) for role {role_id}: allowed={} ({})",
            decision.allowed, decision.reason
        );
        self.decisions.insert(key, decision.clone()).await;
        Ok(decision)
    }

    pub async fn invalidate_role(&self, role_id: i32) {
        self.decisions.retain(|(role, _)| *role != role_id).await;
    }

    pub async fn clear(&self) {
        self.decisions.clear().await;
    }

    pub async fn cached_decisions(&self) -> usize {
        self.decisions.len().await
    }
}
