use chrono::Utc;
use diesel::prelude::*;
use log::info;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::types::*;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{menu_items, role_menu_permissions, roles};
use crate::core::shared::utils::{non_blank, required_text, with_conn, DbPool};
use crate::security::ADMIN_ROLE_ID;

const MENU_ITEM_NOT_FOUND: &str = "Menu item not found";

/// Permission rows for a new menu item: one per role, later grants win, and the
/// Administrator role always receives full access.
pub fn grants_with_admin(menu_item_id: i32, grants: &[RolePermissionGrant]) -> Vec<NewRoleMenuPermission> {
    let mut by_role: BTreeMap<i32, MenuAccess> = BTreeMap::new();
    for grant in grants {
        by_role.insert(grant.role_id, grant.access);
    }
    by_role.insert(ADMIN_ROLE_ID, MenuAccess::full());

    by_role
        .into_iter()
        .map(|(role_id, access)| NewRoleMenuPermission::new(role_id, menu_item_id, access))
        .collect()
}

/// True when making `new_parent` the parent of `item_id` would create a loop.
pub fn creates_cycle(parents: &HashMap<i32, Option<i32>>, item_id: i32, new_parent: i32) -> bool {
    let mut current = Some(new_parent);
    let mut seen = HashSet::new();
    while let Some(id) = current {
        if id == item_id || !seen.insert(id) {
            return true;
        }
        current = parents.get(&id).copied().flatten();
    }
    false
}

fn ensure_parent_exists(conn: &mut PgConnection, parent_id: i32) -> ApiResult<()> {
    let exists: bool = diesel::select(diesel::dsl::exists(menu_items::table.find(parent_id)))
        .get_result(conn)?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::bad_request("Parent menu item not found"))
    }
}

fn ensure_roles_exist(conn: &mut PgConnection, role_ids: &[i32]) -> ApiResult<()> {
    if role_ids.is_empty() {
        return Ok(());
    }
    let found: HashSet<i32> = roles::table
        .filter(roles::id.eq_any(role_ids))
        .select(roles::id)
        .load::<i32>(conn)?
        .into_iter()
        .collect();
    let mut missing: Vec<i32> = role_ids.iter().copied().filter(|id| !found.contains(id)).collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort_unstable();
    missing.dedup();
    Err(ApiError::bad_request(format!("Unknown role id(s): {missing:?}")))
}

pub async fn list_menu_items(pool: &DbPool) -> ApiResult<Vec<MenuItem>> {
    with_conn(pool, |conn| {
        Ok(menu_items::table
            .order((menu_items::sort_order.asc(), menu_items::id.asc()))
            .select(MenuItem::as_select())
            .load(conn)?)
    })
    .await
}

pub async fn get_menu_item(pool: &DbPool, id: i32) -> ApiResult<MenuItem> {
    with_conn(pool, move |conn| {
        menu_items::table
            .find(id)
            .select(MenuItem::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(MENU_ITEM_NOT_FOUND))
    })
    .await
}

pub async fn create_menu_item(pool: &DbPool, request: CreateMenuItemRequest) -> ApiResult<MenuItem> {
    let new_item = NewMenuItem {
        parent_id: request.parent_id,
        name: required_text(&request.name, "Name")?,
        description: non_blank(request.description),
        icon: non_blank(request.icon),
        path: non_blank(request.path),
        sort_order: request.sort_order,
        is_visible: request.is_visible,
    };
    let grants = request.permissions;

    let item = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            if let Some(parent_id) = new_item.parent_id {
                ensure_parent_exists(conn, parent_id)?;
            }
            let role_ids: Vec<i32> = grants.iter().map(|g| g.role_id).collect();
            ensure_roles_exist(conn, &role_ids)?;

            let item: MenuItem = diesel::insert_into(menu_items::table)
                .values(&new_item)
                .returning(MenuItem::as_returning())
                .get_result(conn)?;

            let rows = grants_with_admin(item.id, &grants);
            diesel::insert_into(role_menu_permissions::table)
                .values(&rows)
                .execute(conn)?;
            Ok(item)
        })
    })
    .await?;

    info!("Created menu item {} ({})", item.id, item.name);
    Ok(item)
}

pub async fn update_menu_item(
    pool: &DbPool,
    id: i32,
    request: UpdateMenuItemRequest,
) -> ApiResult<MenuItem> {
    let name = match request.name.as_deref() {
        Some(name) => Some(required_text(name, "Name")?),
        None => None,
    };
    if request.parent_id == Some(Some(id)) {
        return Err(ApiError::bad_request("A menu item cannot be its own parent"));
    }

    let changes = MenuItemChangeset {
        parent_id: request.parent_id,
        name,
        description: request.description.map(non_blank),
        icon: request.icon.map(non_blank),
        path: request.path.map(non_blank),
        sort_order: request.sort_order,
        is_visible: request.is_visible,
        updated_at: Utc::now(),
    };

    let item = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            if let Some(Some(parent_id)) = changes.parent_id {
                ensure_parent_exists(conn, parent_id)?;
                let parents: HashMap<i32, Option<i32>> = menu_items::table
                    .select((menu_items::id, menu_items::parent_id))
                    .load::<(i32, Option<i32>)>(conn)?
                    .into_iter()
                    .collect();
                if creates_cycle(&parents, id, parent_id) {
                    return Err(ApiError::bad_request(
                        "A menu item cannot be moved under one of its descendants",
                    ));
                }
            }

            diesel::update(menu_items::table.find(id))
                .set(&changes)
                .returning(MenuItem::as_returning())
                .get_result(conn)
                .map_err(|e| ApiError::from(e).or_not_found(MENU_ITEM_NOT_FOUND))
        })
    })
    .await?;

    info!("Updated menu item {}", item.id);
    Ok(item)
}

pub async fn delete_menu_item(pool: &DbPool, id: i32) -> ApiResult<()> {
    let deleted = with_conn(pool, move |conn| {
        Ok(diesel::delete(menu_items::table.find(id)).execute(conn)?)
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(MENU_ITEM_NOT_FOUND));
    }
    info!("Deleted menu item {id}");
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RoleSummary {
    pub id: i32,
    pub title: String,
}

fn find_role(conn: &mut PgConnection, role_id: i32) -> ApiResult<RoleSummary> {
    roles::table
        .find(role_id)
        .select((roles::id, roles::title))
        .first::<(i32, String)>(conn)
        .map(|(id, title)| RoleSummary { id, title })
        .map_err(|e| ApiError::from(e).or_not_found("Role not found"))
}

/// Every menu item with the role's configured access, in menu order.
pub fn permission_matrix(items: &[MenuItem], rows: &[RoleMenuPermission]) -> Vec<MenuPermissionView> {
    let configured: HashMap<i32, MenuAccess> = rows
        .iter()
        .map(|row| (row.menu_item_id, MenuAccess::from(row)))
        .collect();

    items
        .iter()
        .map(|item| MenuPermissionView {
            menu_item_id: item.id,
            parent_id: item.parent_id,
            name: item.name.clone(),
            path: item.path.clone(),
            sort_order: item.sort_order,
            is_visible: item.is_visible,
            access: configured.get(&item.id).copied().unwrap_or_default(),
            is_configured: configured.contains_key(&item.id),
        })
        .collect()
}

pub async fn role_permission_matrix(
    pool: &DbPool,
    role_id: i32,
) -> ApiResult<(RoleSummary, Vec<MenuPermissionView>)> {
    with_conn(pool, move |conn| {
        let role = find_role(conn, role_id)?;
        let items: Vec<MenuItem> = menu_items::table
            .order((menu_items::sort_order.asc(), menu_items::id.asc()))
            .select(MenuItem::as_select())
            .load(conn)?;
        let rows: Vec<RoleMenuPermission> = role_menu_permissions::table
            .filter(role_menu_permissions::role_id.eq(role_id))
            .order(role_menu_permissions::menu_item_id.asc())
            .select(RoleMenuPermission::as_select())
            .load(conn)?;
        Ok((role, permission_matrix(&items, &rows)))
    })
    .await
}

/// Replaces all of a role's permission rows in one transaction.
pub async fn replace_role_permissions(
    pool: &DbPool,
    role_id: i32,
    entries: Vec<MenuItemPermissionEntry>,
) -> ApiResult<usize> {
    let mut by_item: BTreeMap<i32, MenuAccess> = BTreeMap::new();
    for entry in entries {
        by_item.insert(entry.menu_item_id, entry.access);
    }
    let rows: Vec<NewRoleMenuPermission> = by_item
        .into_iter()
        .map(|(menu_item_id, access)| NewRoleMenuPermission::new(role_id, menu_item_id, access))
        .collect();

    let inserted = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            find_role(conn, role_id)?;

            let ids: Vec<i32> = rows.iter().map(|r| r.menu_item_id).collect();
            let known: HashSet<i32> = menu_items::table
                .filter(menu_items::id.eq_any(&ids))
                .select(menu_items::id)
                .load::<i32>(conn)?
                .into_iter()
                .collect();
            let unknown: Vec<i32> = ids.into_iter().filter(|id| !known.contains(id)).collect();
            if !unknown.is_empty() {
                return Err(ApiError::bad_request(format!(
                    "Unknown menu item id(s): {unknown:?}"
                )));
            }

            diesel::delete(
                role_menu_permissions::table.filter(role_menu_permissions::role_id.eq(role_id)),
            )
            .execute(conn)?;

            if rows.is_empty() {
                return Ok(0);
            }
            Ok(diesel::insert_into(role_menu_permissions::table)
                .values(&rows)
                .execute(conn)?)
        })
    })
    .await?;

    info!("Replaced menu permissions for role {role_id} ({inserted} rows)");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(role_id: i32, access: MenuAccess) -> RolePermissionGrant {
        RolePermissionGrant { role_id, access }
    }

    #[test]
    fn test_grants_always_include_full_admin_access() {
        let rows = grants_with_admin(10, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role_id, ADMIN_ROLE_ID);
        assert!(rows[0].can_view && rows[0].can_add && rows[0].can_edit && rows[0].can_delete);
    }

    #[test]
    fn test_grants_override_admin_downgrade_and_dedupe() {
        let rows = grants_with_admin(
            10,
            &[
                grant(ADMIN_ROLE_ID, MenuAccess::none()),
                grant(3, MenuAccess::full()),
                grant(3, MenuAccess::view_only()),
            ],
        );
        assert_eq!(rows.len(), 2);
        let admin = rows.iter().find(|r| r.role_id == ADMIN_ROLE_ID).unwrap();
        assert!(admin.can_delete);
        let sales = rows.iter().find(|r| r.role_id == 3).unwrap();
        assert!(sales.can_view);
        assert!(!sales.can_edit);
        assert!(rows.iter().all(|r| r.menu_item_id == 10));
    }

    #[test]
    fn test_creates_cycle() {
        let parents: HashMap<i32, Option<i32>> =
            [(1, None), (2, Some(1)), (3, Some(2)), (4, None)].into_iter().collect();
        assert!(creates_cycle(&parents, 1, 3));
        assert!(creates_cycle(&parents, 2, 2));
        assert!(!creates_cycle(&parents, 3, 4));
        assert!(!creates_cycle(&parents, 4, 3));
    }

    #[test]
    fn test_permission_matrix_marks_unconfigured_items() {
        let now = Utc::now();
        let items = vec![
            MenuItem {
                id: 1,
                parent_id: None,
                name: "Dashboard".into(),
                description: None,
                icon: None,
                path: Some("/dashboard".into()),
                sort_order: 1,
                is_visible: true,
                created_at: now,
                updated_at: now,
            },
            MenuItem {
                id: 2,
                parent_id: None,
                name: "Leads".into(),
                description: None,
                icon: None,
                path: Some("/sales/leads".into()),
                sort_order: 2,
                is_visible: true,
                created_at: now,
                updated_at: now,
            },
        ];
        let rows = vec![RoleMenuPermission {
            id: 7,
            role_id: 3,
            menu_item_id: 2,
            can_view: true,
            can_add: true,
            can_edit: false,
            can_delete: false,
            created_at: now,
            updated_at: now,
        }];

        let matrix = permission_matrix(&items, &rows);
        assert_eq!(matrix.len(), 2);
        assert!(!matrix[0].is_configured);
        assert_eq!(matrix[0].access, MenuAccess::none());
        assert!(matrix[1].is_configured);
        assert!(matrix[1].access.can_add);
    }
}
