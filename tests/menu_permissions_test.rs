#[cfg(test)]
mod menu_permission_integration_tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use studiocrm::core::shared::ApiResult;
    use studiocrm::menu::{
        MenuAccess, MenuAction, MenuItem, MenuPermissionService, PermissionSource,
        RoleMenuPermission, RoutePermissionGuard,
    };
    use studiocrm::security::CurrentUser;

    const TTL: u64 = 300;
    const PHOTOGRAPHER: i32 = 3;

    #[derive(Default)]
    struct MemorySource {
        items: Vec<MenuItem>,
        grants: Mutex<HashMap<i32, Vec<RoleMenuPermission>>>,
        role_loads: AtomicUsize,
        catalog_loads: AtomicUsize,
    }

    impl MemorySource {
        fn grant(&self, role_id: i32, menu_item_id: i32, access: MenuAccess) {
            let now = Utc::now();
            let mut grants = self.grants.lock().unwrap();
            let rows = grants.entry(role_id).or_default();
            rows.retain(|row| row.menu_item_id != menu_item_id);
            rows.push(RoleMenuPermission {
                id: rows.len() as i32 + 1,
                role_id,
                menu_item_id,
                can_view: access.can_view,
                can_add: access.can_add,
                can_edit: access.can_edit,
                can_delete: access.can_delete,
                created_at: now,
                updated_at: now,
            });
        }
    }

    #[async_trait]
    impl PermissionSource for MemorySource {
        async fn load_role_permissions(&self, role_id: i32) -> ApiResult<Vec<RoleMenuPermission>> {
            self.role_loads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .grants
                .lock()
                .unwrap()
                .get(&role_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn load_menu_items(&self) -> ApiResult<Vec<MenuItem>> {
            self.catalog_loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    fn item(id: i32, parent_id: Option<i32>, name: &str, path: Option<&str>, sort_order: i32) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id,
            parent_id,
            name: name.to_string(),
            description: None,
            icon: None,
            path: path.map(str::to_string),
            sort_order,
            is_visible: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn studio_menu() -> Vec<MenuItem> {
        let mut reports = item(10, None, "Reports", Some("/reports"), 9);
        reports.is_visible = false;
        vec![
            item(1, None, "Dashboard", Some("/dashboard"), 1),
            item(7, None, "Sales", None, 3),
            item(8, Some(7), "Leads", Some("/sales/leads"), 1),
            item(9, Some(7), "Quotations", Some("/sales/quotations"), 2),
            item(2, None, "Organization", None, 2),
            item(3, Some(2), "Departments", Some("/organization/departments"), 1),
            reports,
        ]
    }

    fn user(role_id: Option<i32>, is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: 42,
            username: "asha".to_string(),
            email: None,
            first_name: "Asha".to_string(),
            last_name: None,
            role_id,
            role_name: None,
            is_admin,
        }
    }

    fn setup(ttl: u64) -> (Arc<MemorySource>, Arc<MenuPermissionService>) {
        let source = Arc::new(MemorySource {
            items: studio_menu(),
            ..Default::default()
        });
        source.grant(PHOTOGRAPHER, 7, MenuAccess::view_only());
        source.grant(PHOTOGRAPHER, 8, MenuAccess::view_only());
        source.grant(PHOTOGRAPHER, 10, MenuAccess::view_only());
        let service = Arc::new(MenuPermissionService::new(source.clone(), ttl));
        (source, service)
    }

    #[tokio::test]
    async fn test_role_permissions_are_cached() {
        let (source, service) = setup(TTL);

        let first = service.role_permissions(PHOTOGRAPHER).await.unwrap();
        let second = service.role_permissions(PHOTOGRAPHER).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.role_loads.load(Ordering::SeqCst), 1);
        assert!(service.allowed_menu_ids(PHOTOGRAPHER).await.unwrap().contains(&8));
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let (source, service) = setup(0);

        service.role_permissions(PHOTOGRAPHER).await.unwrap();
        service.role_permissions(PHOTOGRAPHER).await.unwrap();

        assert_eq!(source.role_loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_role_picks_up_new_grants() {
        let (source, service) = setup(TTL);
        let photographer = user(Some(PHOTOGRAPHER), false);

        assert!(!service.can(&photographer, 9, MenuAction::View).await.unwrap());

        source.grant(PHOTOGRAPHER, 9, MenuAccess::full());
        assert!(!service.can(&photographer, 9, MenuAction::View).await.unwrap());

        service.invalidate_role(PHOTOGRAPHER).await;
        assert!(service.can(&photographer, 9, MenuAction::Delete).await.unwrap());
        assert_eq!(source.role_loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_admin_receives_full_visible_tree() {
        let (_, service) = setup(TTL);
        let admin = user(Some(1), true);

        let menu = service.menu_for(&admin).await.unwrap();
        let names: Vec<&str> = menu.iter().map(|n| n.name.as_str()).collect();

        assert_eq!(names, vec!["Dashboard", "Organization", "Sales"]);
        let sales = &menu[2];
        assert_eq!(sales.children.len(), 2);
        assert_eq!(sales.children[0].name, "Leads");
        assert_eq!(sales.children[1].permissions, MenuAccess::full());
        assert!(service.can(&admin, 999, MenuAction::Delete).await.unwrap());
    }

    #[tokio::test]
    async fn test_role_menu_only_contains_viewable_visible_items() {
        let (_, service) = setup(TTL);

        let menu = service.menu_for(&user(Some(PHOTOGRAPHER), false)).await.unwrap();

        // Reports is granted but hidden, Quotations is not granted.
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].name, "Sales");
        assert_eq!(menu[0].children.len(), 1);
        assert_eq!(menu[0].children[0].path.as_deref(), Some("/sales/leads"));
    }

    #[tokio::test]
    async fn test_user_without_role_gets_empty_menu() {
        let (source, service) = setup(TTL);
        let nobody = user(None, false);

        assert!(service.menu_for(&nobody).await.unwrap().is_empty());
        assert!(!service.can(&nobody, 8, MenuAction::View).await.unwrap());
        assert_eq!(source.role_loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_route_guard_decisions() {
        let (_, service) = setup(TTL);
        let guard = RoutePermissionGuard::new(service, TTL);
        let photographer = user(Some(PHOTOGRAPHER), false);

        let decision = guard.check(&photographer, "/sales/leads/17").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.menu_item_id, Some(8));

        let decision = guard.check(&photographer, "/sales/quotations").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.menu_item_id, Some(9));

        // Hidden items still govern their routes.
        assert!(guard.check(&photographer, "/reports").await.unwrap().allowed);

        assert!(guard.check(&photographer, "/dashboard").await.unwrap().allowed);
        assert!(guard.check(&photographer, "/settings/theme").await.unwrap().allowed);
        assert!(!guard.check(&user(None, false), "/sales/leads").await.unwrap().allowed);
        assert!(guard.check(&user(Some(1), true), "/sales/quotations").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_route_guard_invalidation() {
        let (source, service) = setup(TTL);
        let guard = RoutePermissionGuard::new(service.clone(), TTL);
        let photographer = user(Some(PHOTOGRAPHER), false);

        assert!(!guard.check(&photographer, "/sales/quotations").await.unwrap().allowed);
        assert_eq!(guard.cached_decisions().await, 1);

        source.grant(PHOTOGRAPHER, 9, MenuAccess::view_only());
        service.invalidate_role(PHOTOGRAPHER).await;
        assert!(!guard.check(&photographer, "/sales/quotations").await.unwrap().allowed);

        guard.invalidate_role(PHOTOGRAPHER).await;
        assert_eq!(guard.cached_decisions().await, 0);
        assert!(guard.check(&photographer, "/sales/quotations").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_route_guard_cache_is_bounded_by_menu_items() {
        let (_, service) = setup(TTL);
        let guard = RoutePermissionGuard::new(service, TTL);
        let photographer = user(Some(PHOTOGRAPHER), false);

        for n in 0..50 {
            let path = format!("/not-in-menu/{n}");
            assert!(guard.check(&photographer, &path).await.unwrap().allowed);
        }
        assert_eq!(guard.cached_decisions().await, 0);

        for n in 0..50 {
            let path = format!("/sales/leads/{n}");
            let decision = guard.check(&photographer, &path).await.unwrap();
            assert_eq!(decision.menu_item_id, Some(8));
        }
        assert_eq!(guard.cached_decisions().await, 1);
    }
}
