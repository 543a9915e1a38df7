use async_trait::async_trait;
use diesel::prelude::*;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::cache::TtlCache;
use super::tree::build_menu_tree;
use super::types::{MenuAccess, MenuAction, MenuItem, MenuNode, RoleMenuPermission};
use crate::core::shared::error::ApiResult;
use crate::core::shared::schema::{menu_items, role_menu_permissions};
use crate::core::shared::utils::{with_conn, DbPool};
use crate::security::CurrentUser;

/// Where permission rows and the menu catalog are loaded from on a cache miss.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn load_role_permissions(&self, role_id: i32) -> ApiResult<Vec<RoleMenuPermission>>;
    async fn load_menu_items(&self) -> ApiResult<Vec<MenuItem>>;
}

pub struct DieselPermissionSource {
    pool: DbPool,
}

impl DieselPermissionSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionSource for DieselPermissionSource {
    async fn load_role_permissions(&self, role_id: i32) -> ApiResult<Vec<RoleMenuPermission>> {
        with_conn(&self.pool, move |conn| {
            Ok(role_menu_permissions::table
                .filter(role_menu_permissions::role_id.eq(role_id))
                .order(role_menu_permissions::menu_item_id.asc())
                .select(RoleMenuPermission::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn load_menu_items(&self) -> ApiResult<Vec<MenuItem>> {
        with_conn(&self.pool, |conn| {
            Ok(menu_items::table
                .order((menu_items::sort_order.asc(), menu_items::id.asc()))
                .select(MenuItem::as_select())
                .load(conn)?)
        })
        .await
    }
}

/// A role's access per menu item. Items without a row grant nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolePermissions {
    pub role_id: i32,
    pub entries: HashMap<i32, MenuAccess>,
}

impl RolePermissions {
    pub fn from_rows(role_id: i32, rows: &[RoleMenuPermission]) -> Self {
        let entries = rows
            .iter()
            .filter(|row| row.role_id == role_id)
            .map(|row| (row.menu_item_id, MenuAccess::from(row)))
            .collect();
        Self { role_id, entries }
    }

    pub fn access(&self, menu_item_id: i32) -> MenuAccess {
        self.entries
            .get(&menu_item_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn allowed_ids(&self) -> HashSet<i32> {
        self.entries
            .iter()
            .filter(|(_, access)| access.can_view)
            .map(|(id, _)| *id)
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MenuCacheStats {
    pub cached_roles: usize,
    pub catalog_cached: bool,
    pub ttl_seconds: u64,
}

/// Per-role menu permissions and the menu catalog, both cached for a fixed TTL.
pub struct MenuPermissionService {
    source: Arc<dyn PermissionSource>,
    roles: TtlCache<i32, Arc<RolePermissions>>,
    catalog: TtlCache<(), Arc<Vec<MenuItem>>>,
}

impl MenuPermissionService {
    pub fn new(source: Arc<dyn PermissionSource>, ttl_seconds: u64) -> Self {
        Self {
            source,
            roles: TtlCache::new(ttl_seconds),
            catalog: TtlCache::new(ttl_seconds),
        }
    }

    pub async fn role_permissions(&self, role_id: i32) -> ApiResult<Arc<RolePermissions>> {
        if let Some(cached) = self.roles.get(&role_id).await {
            return Ok(cached);
        }

        debug!("Menu permission cache miss for role {role_id}");
        let rows = self.source.load_role_permissions(role_id).await?;
        let permissions = Arc::new(RolePermissions::from_rows(role_id, &rows));
        self.roles.insert(role_id, Arc::clone(&permissions)).await;
        Ok(permissions)
    }

    pub async fn menu_catalog(&self) -> ApiResult<Arc<Vec<MenuItem>>> {
        if let Some(cached) = self.catalog.get(&()).await {
            return Ok(cached);
        }

        debug!("Menu catalog cache miss");
        let items = Arc::new(self.source.load_menu_items().await?);
        self.catalog.insert((), Arc::clone(&items)).await;
        Ok(items)
    }

    pub async fn allowed_menu_ids(&self, role_id: i32) -> ApiResult<HashSet<i32>> {
        Ok(self.role_permissions(role_id).await?.allowed_ids())
    }

    pub async fn access_for(&self, user: &CurrentUser, menu_item_id: i32) -> ApiResult<MenuAccess> {
        if user.is_admin {
            return Ok(MenuAccess::full());
        }
        match user.role_id {
            Some(role_id) => Ok(self.role_permissions(role_id).await?.access(menu_item_id)),
            None => Ok(MenuAccess::none()),
        }
    }

    pub async fn can(
        &self,
        user: &CurrentUser,
        menu_item_id: i32,
        action: MenuAction,
    ) -> ApiResult<bool> {
        Ok(self.access_for(user, menu_item_id).await?.allows(action))
    }

    /// Navigation tree for `user`. Hidden items are never included.
    pub async fn menu_for(&self, user: &CurrentUser) -> ApiResult<Vec<MenuNode>> {
        let catalog = self.menu_catalog().await?;
        let visible = catalog.iter().filter(|item| item.is_visible);

        if user.is_admin {
            let entries = visible
                .map(|item| (item.clone(), MenuAccess::full()))
                .collect();
            return Ok(build_menu_tree(entries));
        }

        let Some(role_id) = user.role_id else {
            return Ok(Vec::new());
        };

        let permissions = self.role_permissions(role_id).await?;
        let entries = visible
            .filter_map(|item| {
                let access = permissions.access(item.id);
                access.can_view.then(|| (item.clone(), access))
            })
            .collect();
        Ok(build_menu_tree(entries))
    }

    pub async fn invalidate_role(&self, role_id: i32) {
        info!("Invalidating cached menu permissions for role {role_id}");
        self.roles.remove(&role_id).await;
    }

    pub async fn invalidate_catalog(&self) {
        self.catalog.clear().await;
    }

    pub async fn clear(&self) {
        info!("Clearing menu permission cache");
        self.roles.clear().await;
        self.catalog.clear().await;
    }

    pub async fn stats(&self) -> MenuCacheStats {
        MenuCacheStats {
            cached_roles: self.roles.len().await,
            catalog_cached: !self.catalog.is_empty().await,
            ttl_seconds: self.roles.ttl_seconds(),
        }
    }
}
