use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::schema::{menu_items, role_menu_permissions};
use crate::core::shared::utils::double_option;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = menu_items)]
pub struct MenuItem {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub path: Option<String>,
    pub sort_order: i32,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = menu_items)]
pub struct NewMenuItem {
    pub parent_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub path: Option<String>,
    pub sort_order: i32,
    pub is_visible: bool,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = menu_items)]
pub struct MenuItemChangeset {
    pub parent_id: Option<Option<i32>>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub path: Option<Option<String>>,
    pub sort_order: Option<i32>,
    pub is_visible: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = role_menu_permissions)]
pub struct RoleMenuPermission {
    pub id: i32,
    pub role_id: i32,
    pub menu_item_id: i32,
    pub can_view: bool,
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = role_menu_permissions)]
pub struct NewRoleMenuPermission {
    pub role_id: i32,
    pub menu_item_id: i32,
    pub can_view: bool,
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl NewRoleMenuPermission {
    pub fn new(role_id: i32, menu_item_id: i32, access: MenuAccess) -> Self {
        Self {
            role_id,
            menu_item_id,
            can_view: access.can_view,
            can_add: access.can_add,
            can_edit: access.can_edit,
            can_delete: access.can_delete,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuAccess {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_add: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl MenuAccess {
    pub const fn full() -> Self {
        Self {
            can_view: true,
            can_add: true,
            can_edit: true,
            can_delete: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            can_view: false,
            can_add: false,
            can_edit: false,
            can_delete: false,
        }
    }

    pub const fn view_only() -> Self {
        Self {
            can_view: true,
            can_add: false,
            can_edit: false,
            can_delete: false,
        }
    }

    pub fn allows(&self, action: MenuAction) -> bool {
        match action {
            MenuAction::View => self.can_view,
            MenuAction::Add => self.can_add,
            MenuAction::Edit => self.can_edit,
            MenuAction::Delete => self.can_delete,
        }
    }
}

impl From<&RoleMenuPermission> for MenuAccess {
    fn from(row: &RoleMenuPermission) -> Self {
        Self {
            can_view: row.can_view,
            can_add: row.can_add,
            can_edit: row.can_edit,
            can_delete: row.can_delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuAction {
    View,
    Add,
    Edit,
    Delete,
}

impl std::str::FromStr for MenuAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" => Ok(Self::View),
            "add" | "create" => Ok(Self::Add),
            "edit" | "update" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            other => Err(format!("Unknown menu action: {other}")),
        }
    }
}

/// A navigation entry with the caller's access and its visible children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub icon: Option<String>,
    pub path: Option<String>,
    pub sort_order: i32,
    pub permissions: MenuAccess,
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub fn new(item: MenuItem, permissions: MenuAccess) -> Self {
        Self {
            id: item.id,
            parent_id: item.parent_id,
            name: item.name,
            icon: item.icon,
            path: item.path,
            sort_order: item.sort_order,
            permissions,
            children: Vec::new(),
        }
    }

    pub fn has_path(&self) -> bool {
        self.path.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionGrant {
    pub role_id: i32,
    #[serde(flatten)]
    pub access: MenuAccess,
}

#[derive(Debug, Deserialize)]
pub struct CreateMenuItemRequest {
    pub name: String,
    pub parent_id: Option<i32>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub permissions: Vec<RolePermissionGrant>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub path: Option<Option<String>>,
    pub sort_order: Option<i32>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MenuItemPermissionEntry {
    pub menu_item_id: i32,
    #[serde(flatten)]
    pub access: MenuAccess,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRolePermissionsRequest {
    pub role_id: Option<i32>,
    #[serde(default)]
    pub permissions: Vec<MenuItemPermissionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionsQuery {
    pub role_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RouteCheckQuery {
    pub path: Option<String>,
}

/// One row of the permission matrix shown to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct MenuPermissionView {
    pub menu_item_id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub path: Option<String>,
    pub sort_order: i32,
    pub is_visible: bool,
    #[serde(flatten)]
    pub access: MenuAccess,
    pub is_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_allows_each_action() {
        let access = MenuAccess {
            can_view: true,
            can_add: false,
            can_edit: true,
            can_delete: false,
        };
        assert!(access.allows(MenuAction::View));
        assert!(!access.allows(MenuAction::Add));
        assert!(access.allows(MenuAction::Edit));
        assert!(!access.allows(MenuAction::Delete));
        assert!(MenuAccess::full().allows(MenuAction::Delete));
        assert!(!MenuAccess::none().allows(MenuAction::View));
    }

    #[test]
    fn test_menu_action_parse() {
        assert_eq!("VIEW".parse::<MenuAction>(), Ok(MenuAction::View));
        assert_eq!("create".parse::<MenuAction>(), Ok(MenuAction::Add));
        assert_eq!("update".parse::<MenuAction>(), Ok(MenuAction::Edit));
        assert!("approve".parse::<MenuAction>().is_err());
    }

    #[test]
    fn test_grant_flattens_flags() {
        let grant: RolePermissionGrant =
            serde_json::from_str(r#"{"role_id": 3, "can_view": true}"#).unwrap();
        assert_eq!(grant.role_id, 3);
        assert_eq!(grant.access, MenuAccess::view_only());
    }
}
