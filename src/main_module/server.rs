//! HTTP server initialization and routing

use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Router};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::{auth, calls, dashboards, menu, notifications, people, sales, tasks, whatsapp};

use super::{health_check, health_check_simple, shutdown_signal};

/// Without configured origins any origin is accepted; otherwise only the listed
/// origins, with credentials so the session cookie crosses over.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(&app_state.config.cors_allowed_origins);

    Router::new()
        .route("/api/health", get(health_check_simple))
        .route("/api/health/database", get(health_check))
        .merge(auth::configure())
        .merge(people::configure())
        .merge(sales::configure())
        .merge(menu::configure())
        .merge(notifications::configure())
        .merge(calls::configure())
        .merge(tasks::configure())
        .merge(whatsapp::configure())
        .merge(dashboards::configure())
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CookieManagerLayer::new()),
        )
}

pub async fn run_server(app_state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)?;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(origins: &[String]) -> Router {
        Router::new()
            .route("/api/health", get(|| async { "ok" }))
            .layer(create_cors_layer(origins))
    }

    fn request(method: Method, origin: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/api/health")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_allows_listed_origin_and_skips_invalid_entries() {
        let app = app(&["https://studio.example.com".to_string(), "bad\norigin".to_string()]);

        let response = app
            .clone()
            .oneshot(request(Method::OPTIONS, "https://studio.example.com"))
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://studio.example.com"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );

        let response = app
            .oneshot(request(Method::GET, "https://other.example.com"))
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_cors_without_origins_is_permissive() {
        let response = app(&[])
            .oneshot(request(Method::GET, "https://anywhere.example.com"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}
