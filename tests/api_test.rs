#[cfg(test)]
mod api_integration_tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use bigdecimal::BigDecimal;
    use chrono::{Datelike, Utc};
    use diesel::prelude::*;
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::PgConnection;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::{Arc, OnceLock};
    use std::time::Duration;
    use studiocrm::calls::service::{self as calls, IngestCallRequest, NewCallRecording};
    use studiocrm::core::shared::schema::{employees, quotations};
    use studiocrm::core::shared::utils::{create_pool, run_migrations, DbPool};
    use studiocrm::notifications::service::{self as notifications, NotificationListQuery};
    use studiocrm::people::types::{DepartmentRequest, DepartmentUpdateRequest, EmployeeRequest, RoleRequest};
    use studiocrm::people::{departments, employees as people, roles};
    use studiocrm::sales::leads::service as leads;
    use studiocrm::sales::leads::types::CreateLeadRequest;
    use studiocrm::sales::quotations::approval::{self, ReviewDecision};
    use studiocrm::sales::quotations::service as quotation_service;
    use studiocrm::sales::quotations::types::{
        format_quotation_number, slugify, CreateQuotationRequest, NewQuotation,
    };
    use studiocrm::security::{CurrentUser, SessionSubject, ADMIN_ROLE_ID};
    use studiocrm::tasks::service::{self as tasks, TaskListQuery};
    use studiocrm::whatsapp::service::{self as whatsapp, MessageListQuery};
    use studiocrm::{build_router, AppConfig, AppState};
    use tower::ServiceExt;
    use uuid::Uuid;

    /// State over a pool that never connects; enough for routes that fail
    /// or succeed before touching the database.
    fn offline_state_with(config: AppConfig) -> Arc<AppState> {
        let manager = ConnectionManager::<PgConnection>::new("postgres://127.0.0.1:1/unreachable");
        let pool = Pool::builder()
            .min_idle(Some(0))
            .connection_timeout(Duration::from_millis(250))
            .build_unchecked(manager);
        Arc::new(AppState::new(pool, config))
    }

    fn offline_state() -> Arc<AppState> {
        offline_state_with(AppConfig::default())
    }

    fn token_for(state: &AppState, role_id: Option<i32>, role_name: Option<&str>) -> String {
        token_as(state, 7, role_id, role_name)
    }

    fn token_as(state: &AppState, employee_id: i32, role_id: Option<i32>, role_name: Option<&str>) -> String {
        state
            .sessions
            .issue(&SessionSubject {
                employee_id,
                username: "ravi".to_string(),
                email: None,
                first_name: "Ravi".to_string(),
                last_name: None,
                role_id,
                role_name: role_name.map(str::to_string),
            })
            .unwrap()
    }

    async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn send_json(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    /// Migrated pool shared by the database tests, or `None` without `DATABASE_URL`.
    fn database_pool() -> Option<DbPool> {
        static POOL: OnceLock<Option<DbPool>> = OnceLock::new();
        POOL.get_or_init(|| {
            let url = std::env::var("DATABASE_URL").ok()?;
            let mut config = AppConfig::default();
            config.database.url = url;
            match create_pool(&config.database) {
                Ok(pool) => {
                    run_migrations(&pool).unwrap();
                    Some(pool)
                }
                Err(e) => {
                    println!("cannot connect to database: {e}");
                    None
                }
            }
        })
        .clone()
    }

    /// Quotation numbers come from the row count, so tests creating
    /// quotations take turns.
    fn quotation_lock() -> &'static tokio::sync::Mutex<()> {
        static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
    }

    async fn new_employee(pool: &DbPool, first_name: &str, role_id: Option<i32>) -> i32 {
        people::create(
            pool,
            EmployeeRequest {
                username: format!("{}-{}", first_name.to_lowercase(), Uuid::new_v4()),
                first_name: first_name.to_string(),
                role_id,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .employee
        .id
    }

    fn session_user(id: i32, first_name: &str, role_id: Option<i32>) -> CurrentUser {
        CurrentUser {
            id,
            username: first_name.to_lowercase(),
            email: None,
            first_name: first_name.to_string(),
            last_name: None,
            role_id,
            role_name: None,
            is_admin: role_id == Some(ADMIN_ROLE_ID),
        }
    }

    async fn notifications_of(pool: &DbPool, employee_id: i32, kind: &str) -> Vec<notifications::Notification> {
        let (items, _) = notifications::list_for(pool, employee_id, NotificationListQuery::default())
            .await
            .unwrap();
        items.into_iter().filter(|n| n.notification_type == kind).collect()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = send(offline_state(), get("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_route_requires_session() {
        let (status, body) = send(offline_state(), get("/api/leads", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let (status, body) = send(offline_state(), get("/api/auth/me", Some("not-a-token"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_me_returns_session_user() {
        let state = offline_state();
        let token = token_for(&state, Some(4), Some("Photographer"));
        let (status, body) = send(state, get("/api/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "ravi");
        assert_eq!(body["user"]["is_admin"], false);
    }

    #[tokio::test]
    async fn test_session_cookie_authenticates() {
        let state = offline_state();
        let token = token_for(&state, Some(4), None);
        let cookie = format!("{}={token}", state.config.auth.cookie_name);
        let request = Request::builder()
            .uri("/api/auth/me")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], 7);
    }

    #[tokio::test]
    async fn test_admin_route_check_skips_database() {
        let state = offline_state();
        let token = token_for(&state, Some(1), Some("Administrator"));
        let (status, body) = send(state, get("/api/auth/check-route?path=/sales/leads", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], true);
        assert_eq!(body["path"], "/sales/leads");
    }

    #[tokio::test]
    async fn test_public_route_check_for_non_admin() {
        let state = offline_state();
        let token = token_for(&state, Some(4), None);
        let (status, body) = send(state, get("/api/auth/check-route?path=/profile", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], true);
    }

    #[tokio::test]
    async fn test_check_route_requires_path() {
        let state = offline_state();
        let token = token_for(&state, Some(1), None);
        let (status, body) = send(state, get("/api/auth/check-route", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_delete_department() {
        let state = offline_state();
        let token = token_for(&state, Some(4), None);
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/departments/3")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_department_lifecycle_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };

        let name = format!("Candid Team {}", uuid::Uuid::new_v4());
        let created = departments::create(
            &pool,
            DepartmentRequest {
                name: name.clone(),
                description: Some("Second shooters".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.name, name);

        let duplicate = departments::create(
            &pool,
            DepartmentRequest {
                name: name.clone(),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

        let updated = departments::update(
            &pool,
            created.id,
            DepartmentUpdateRequest {
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.description, None);

        departments::delete(&pool, created.id).await.unwrap();
        let missing = departments::find(&pool, created.id).await.unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_body_gets_error_body() {
        let state = offline_state();
        let token = token_for(&state, Some(1), Some("Administrator"));
        let request = send_json("POST", "/api/departments", Some(&token), &json!({ "name": 5 }));
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid request body");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let state = offline_state();
        let token = token_for(&state, Some(1), Some("Administrator"));
        let request = Request::builder()
            .method("POST")
            .uri("/api/departments")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(r#"{"name":"Editing"}"#))
            .unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_non_numeric_path_id_gets_error_body() {
        let state = offline_state();
        let token = token_for(&state, Some(4), None);
        let (status, body) = send(state, get("/api/departments/abc", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid path parameter");
    }

    #[tokio::test]
    async fn test_bad_query_string_gets_error_body() {
        let state = offline_state();
        let token = token_for(&state, Some(4), None);
        let (status, body) = send(state, get("/api/leads?page=first", Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid query string");
    }

    #[tokio::test]
    async fn test_administrator_role_cannot_be_deleted() {
        let state = offline_state();
        let token = token_for(&state, Some(1), Some("Administrator"));
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/roles/1")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "The Administrator role cannot be deleted");
    }

    #[tokio::test]
    async fn test_status_endpoint_cannot_approve_quotations() {
        let state = offline_state();
        let token = token_for(&state, Some(1), Some("Administrator"));
        let request = send_json("POST", "/api/quotations/5/status", Some(&token), &json!({ "status": "approved" }));
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Use the approval workflow to mark a quotation approved");
    }

    #[tokio::test]
    async fn test_whatsapp_webhook_requires_configured_token() {
        let request = send_json("POST", "/api/webhooks/whatsapp", None, &json!({}));
        let (status, body) = send(offline_state(), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "WhatsApp webhook is not configured");
    }

    #[tokio::test]
    async fn test_whatsapp_webhook_checks_token_header() {
        let mut config = AppConfig::default();
        config.whatsapp.webhook_token = Some("hook-secret".to_string());
        let state = offline_state_with(config);

        let mut wrong = send_json("POST", "/api/webhooks/whatsapp", None, &json!({}));
        wrong
            .headers_mut()
            .insert("x-webhook-token", "guess".parse().unwrap());
        let (status, body) = send(state.clone(), wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid webhook token");

        let mut right = send_json("POST", "/api/webhooks/whatsapp", None, &json!({}));
        right
            .headers_mut()
            .insert("x-webhook-token", "hook-secret".parse().unwrap());
        let (status, body) = send(state.clone(), right).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "no_messages");

        let verify = get(
            "/api/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=hook-secret&hub.challenge=4242",
            None,
        );
        let response = build_router(state).oneshot(verify).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"4242");
    }

    #[tokio::test]
    async fn test_unknown_references_are_bad_requests_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };

        let username = format!("nisha-{}", Uuid::new_v4());
        let unknown_role = people::create(
            &pool,
            EmployeeRequest {
                username: username.clone(),
                first_name: "Nisha".to_string(),
                role_id: Some(i32::MAX),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unknown_role.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown_role.to_string(), "Role not found");

        people::create(
            &pool,
            EmployeeRequest {
                username: username.clone(),
                first_name: "Nisha".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let duplicate = people::create(
            &pool,
            EmployeeRequest {
                username,
                first_name: "Nisha".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(duplicate.to_string(), "Username already exists");

        let role = roles::create(
            &pool,
            RoleRequest {
                title: format!("Drone Operator {}", Uuid::new_v4()),
                department_id: Some(i32::MAX),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(role.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(role.to_string(), "Department not found");

        let uploader = new_employee(&pool, "Farhan", None).await;
        let recording = NewCallRecording::from_request(
            IngestCallRequest {
                lead_id: Some(i32::MAX),
                ..Default::default()
            },
            uploader,
        )
        .unwrap();
        let call = calls::ingest(&pool, recording).await.unwrap_err();
        assert_eq!(call.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(call.to_string(), "Lead not found");

        let quotation = quotation_service::create(
            &pool,
            CreateQuotationRequest {
                lead_id: Some(i32::MAX),
                client_name: "Bose Reception".to_string(),
                ..Default::default()
            },
            uploader,
        )
        .await
        .unwrap_err();
        assert_eq!(quotation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(quotation.to_string(), "Lead not found");

        // A missing creator is not a numbering clash.
        let _turn = quotation_lock().lock().await;
        let orphan = quotation_service::create(
            &pool,
            CreateQuotationRequest {
                client_name: "Bose Reception".to_string(),
                ..Default::default()
            },
            i32::MAX,
        )
        .await
        .unwrap_err();
        assert_eq!(orphan.status_code(), StatusCode::CONFLICT);
        assert_ne!(orphan.to_string(), "Quotation number already exists");
    }

    fn fixture_quotation(quotation_number: String, slug: String, created_by: i32) -> NewQuotation {
        NewQuotation {
            lead_id: None,
            quotation_number,
            slug,
            client_name: "Numbering fixture".to_string(),
            bride_name: None,
            groom_name: None,
            mobile: None,
            email: None,
            default_package: "basic".to_string(),
            total_amount: BigDecimal::from(0),
            status: "draft".to_string(),
            quotation_data: json!({}),
            events_count: 0,
            created_by: Some(created_by),
        }
    }

    fn first_free_number(conn: &mut PgConnection, year: i32, from: i64) -> String {
        let mut sequence = from;
        loop {
            let number = format_quotation_number(year, sequence);
            let taken: bool = diesel::select(diesel::dsl::exists(
                quotations::table.filter(quotations::quotation_number.eq(number.as_str())),
            ))
            .get_result(conn)
            .unwrap();
            if !taken {
                return number;
            }
            sequence += 1;
        }
    }

    #[tokio::test]
    async fn test_quotation_numbering_skips_taken_numbers_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };
        let _turn = quotation_lock().lock().await;
        let creator = new_employee(&pool, "Anita", None).await;
        let year = Utc::now().year();
        let mut conn = pool.get().unwrap();

        // Two extra rows: one holding the number the count points at, one
        // holding the slug of the number that will be handed out.
        let count: i64 = quotations::table.count().get_result(&mut conn).unwrap();
        let ahead = format_quotation_number(year, count + 3);
        let ahead_id: Option<i32> = diesel::insert_into(quotations::table)
            .values(&fixture_quotation(ahead.clone(), format!("numbering-{}", Uuid::new_v4()), creator))
            .on_conflict_do_nothing()
            .returning(quotations::id)
            .get_result(&mut conn)
            .optional()
            .unwrap();
        let slug_holder: i32 = diesel::insert_into(quotations::table)
            .values(&fixture_quotation(
                format!("MANUAL-{}", Uuid::new_v4()),
                format!("numbering-{}", Uuid::new_v4()),
                creator,
            ))
            .returning(quotations::id)
            .get_result(&mut conn)
            .unwrap();

        let count: i64 = quotations::table.count().get_result(&mut conn).unwrap();
        let expected = first_free_number(&mut conn, year, count + 1);
        if ahead_id.is_some() {
            assert_eq!(format_quotation_number(year, count + 1), ahead);
            assert_ne!(expected, ahead);
        }
        let base_slug = slugify(&expected);
        diesel::update(quotations::table.find(slug_holder))
            .set(quotations::slug.eq(base_slug.as_str()))
            .execute(&mut conn)
            .unwrap();

        let created = quotation_service::create(
            &pool,
            CreateQuotationRequest {
                client_name: "Rao Engagement".to_string(),
                quotation_data: Some(json!({ "events": [{ "name": "Ring ceremony" }] })),
                ..Default::default()
            },
            creator,
        )
        .await
        .unwrap();
        assert_eq!(created.quotation_number, expected);
        assert_eq!(created.slug, format!("{base_slug}-2"));
        assert_eq!(created.events_count, 1);
        assert_eq!(created.status, "draft");

        let ids: Vec<i32> = ahead_id.into_iter().chain([slug_holder, created.id]).collect();
        diesel::delete(quotations::table.filter(quotations::id.eq_any(ids)))
            .execute(&mut conn)
            .unwrap();
    }

    #[tokio::test]
    async fn test_quotation_approval_flow_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };
        let _turn = quotation_lock().lock().await;
        let creator = new_employee(&pool, "Kavya", None).await;
        let admin = new_employee(&pool, "Arjun", Some(ADMIN_ROLE_ID)).await;
        let creator_user = session_user(creator, "Kavya", None);
        let admin_user = session_user(admin, "Arjun", Some(ADMIN_ROLE_ID));

        let quotation = quotation_service::create(
            &pool,
            CreateQuotationRequest {
                client_name: "Menon Wedding".to_string(),
                total_amount: Some(BigDecimal::from(185_000)),
                ..Default::default()
            },
            creator,
        )
        .await
        .unwrap();

        let early = approval::review(&pool, quotation.id, admin_user.clone(), ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert_eq!(early.status_code(), StatusCode::BAD_REQUEST);

        let submission = approval::submit(&pool, quotation.id, creator_user.clone()).await.unwrap();
        assert_eq!(submission.quotation.status, "pending_approval");
        assert!(submission.notified >= 1);
        let requested = notifications_of(&pool, admin, notifications::APPROVAL_REQUESTED).await;
        assert!(requested.iter().any(|n| n.data["quotation_id"] == quotation.id));

        let refused = approval::review(&pool, quotation.id, creator_user.clone(), ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert_eq!(refused.status_code(), StatusCode::FORBIDDEN);

        let direct = quotation_service::change_status(&pool, quotation.id, "approved")
            .await
            .unwrap_err();
        assert_eq!(direct.status_code(), StatusCode::BAD_REQUEST);

        let approved = approval::review(
            &pool,
            quotation.id,
            admin_user.clone(),
            ReviewDecision::Approve,
            Some("Pricing checked".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(approved.status, "approved");
        assert_eq!(approved.reviewed_by, Some(admin));
        assert_eq!(approved.review_comments.as_deref(), Some("Pricing checked"));

        let quotation_tasks = tasks::list(
            &pool,
            TaskListQuery {
                quotation_id: Some(quotation.id),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        let approval_task = quotation_tasks.iter().find(|t| t.task_type == "approval").unwrap();
        assert_eq!(approval_task.status, "completed");
        assert!(approval_task.completed_at.is_some());
        let followup = quotation_tasks.iter().find(|t| t.task_type == "followup").unwrap();
        assert_eq!(followup.status, "open");
        assert_eq!(followup.assigned_to, Some(creator));
        assert!(followup.due_date.is_some());

        let approved_notes = notifications_of(&pool, creator, notifications::QUOTATION_APPROVED).await;
        assert_eq!(approved_notes.len(), 1);
        assert_eq!(approved_notes[0].data["quotation_id"], quotation.id);

        let history = approval::history(&pool, quotation.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].approval_status, "approved");
        assert_eq!(history[0].approver_id, Some(admin));

        let second = quotation_service::create(
            &pool,
            CreateQuotationRequest {
                client_name: "Menon Reception".to_string(),
                ..Default::default()
            },
            creator,
        )
        .await
        .unwrap();
        approval::submit(&pool, second.id, creator_user.clone()).await.unwrap();
        let rejected = approval::review(
            &pool,
            second.id,
            admin_user,
            ReviewDecision::Reject,
            Some("Reduce the drone coverage".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(rejected.status, "rejected");

        let rejected_notes = notifications_of(&pool, creator, notifications::QUOTATION_REJECTED).await;
        assert_eq!(rejected_notes.len(), 1);
        assert!(rejected_notes[0].message.contains("Reduce the drone coverage"));
        assert_eq!(rejected_notes[0].data["reason"], "Reduce the drone coverage");

        let resubmitted = approval::submit(&pool, second.id, creator_user).await.unwrap();
        assert_eq!(resubmitted.quotation.status, "pending_approval");
        assert_eq!(resubmitted.quotation.reviewed_by, None);
        assert_eq!(approval::history(&pool, second.id).await.unwrap().len(), 1);

        let missing = approval::history(&pool, i32::MAX).await.unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        quotation_service::delete(&pool, quotation.id).await.unwrap();
        quotation_service::delete(&pool, second.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_lead_assignment_notifies_assignee_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };
        let manager = new_employee(&pool, "Sunita", None).await;
        let assignee = new_employee(&pool, "Imran", None).await;
        let lead = leads::create(
            &pool,
            CreateLeadRequest {
                client_name: "Chopra Family".to_string(),
                ..Default::default()
            },
            manager,
        )
        .await
        .unwrap();

        let assigned = leads::assign(&pool, lead.id, assignee, "Sunita".to_string()).await.unwrap();
        assert_eq!(assigned.assigned_to, Some(assignee));
        assert_eq!(assigned.status, "ASSIGNED");

        let notes = notifications_of(&pool, assignee, notifications::LEAD_ASSIGNED).await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].data["lead_id"], lead.id);
        assert!(!notes[0].is_read);
        assert!(notes[0].message.contains("Chopra Family"));

        people::deactivate(&pool, manager).await.unwrap();
        let inactive = leads::assign(&pool, lead.id, manager, "Imran".to_string()).await.unwrap_err();
        assert_eq!(inactive.status_code(), StatusCode::BAD_REQUEST);
        assert!(notifications_of(&pool, manager, notifications::LEAD_ASSIGNED).await.is_empty());
        assert_eq!(leads::find(&pool, lead.id).await.unwrap().assigned_to, Some(assignee));

        leads::delete(&pool, lead.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_employee_delete_deactivates_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };
        let admin = new_employee(&pool, "Deepak", Some(ADMIN_ROLE_ID)).await;
        let target = new_employee(&pool, "Lata", None).await;

        let state = Arc::new(AppState::new(pool.clone(), AppConfig::default()));
        let token = token_as(&state, admin, Some(ADMIN_ROLE_ID), Some("Administrator"));

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/employees/{target}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let mut conn = pool.get().unwrap();
        let is_active: bool = employees::table
            .find(target)
            .select(employees::is_active)
            .first(&mut conn)
            .unwrap();
        assert!(!is_active);

        let own = Request::builder()
            .method("DELETE")
            .uri(format!("/api/employees/{admin}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(state, own).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_whatsapp_webhook_ingests_messages_against_database() {
        let Some(pool) = database_pool() else {
            println!("Skipping test - DATABASE_URL not set");
            return;
        };
        let digits = format!("9{:09}", Uuid::new_v4().as_u128() % 1_000_000_000);
        let assignee = new_employee(&pool, "Pooja", None).await;
        let lead = leads::create(
            &pool,
            CreateLeadRequest {
                client_name: "Desai Wedding".to_string(),
                phone: Some(format!("+91{digits}")),
                ..Default::default()
            },
            assignee,
        )
        .await
        .unwrap();
        leads::assign(&pool, lead.id, assignee, "Pooja".to_string()).await.unwrap();

        let mut config = AppConfig::default();
        config.whatsapp.webhook_token = Some("hook-secret".to_string());
        let state = Arc::new(AppState::new(pool.clone(), config));
        let message_id = format!("wamid.{}", Uuid::new_v4());
        let payload = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "contacts": [{ "wa_id": format!("91{digits}"), "profile": { "name": "Nikita" } }],
                        "messages": [{
                            "id": message_id,
                            "from": format!("91{digits}"),
                            "type": "text",
                            "text": { "body": "Can we add a pre-wedding shoot?" }
                        }]
                    }
                }]
            }]
        });
        let webhook = || {
            let mut request = send_json("POST", "/api/webhooks/whatsapp", None, &payload);
            request
                .headers_mut()
                .insert("x-webhook-token", "hook-secret".parse().unwrap());
            request
        };

        let (status, body) = send(state.clone(), webhook()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processed");
        assert_eq!(body["summary"]["stored"], 1);
        assert_eq!(body["summary"]["linked"], 1);

        let (_, body) = send(state, webhook()).await;
        assert_eq!(body["summary"]["stored"], 0);
        assert_eq!(body["summary"]["duplicates"], 1);

        let stored = whatsapp::list(
            &pool,
            MessageListQuery {
                lead_id: Some(lead.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].client_phone, digits);
        assert_eq!(stored[0].client_name.as_deref(), Some("Nikita"));
        assert_eq!(stored[0].direction, "incoming");

        let notes = notifications_of(&pool, assignee, notifications::WHATSAPP_MESSAGE).await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.starts_with("Nikita: "));
    }
}
