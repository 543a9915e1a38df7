use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::{
    cookie::{time, SameSite},
    Cookie, Cookies,
};

use super::service;
use crate::core::shared::extract::ApiJson;
use crate::core::config::AuthConfig;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::state::AppState;
use crate::security::{CurrentUser, MaybeUser, SessionSubject};

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/refresh", post(refresh))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub fn session_cookie(config: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(config.token_ttl_days))
        .build()
}

fn expired_cookie(config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build()
}

fn issue_session(
    state: &AppState,
    cookies: &Cookies,
    subject: &SessionSubject,
) -> ApiResult<(String, CurrentUser)> {
    let claims = state.sessions.claims_for(subject);
    let token = state
        .sessions
        .encode(&claims)
        .map_err(|e| ApiError::internal("Failed to create session", e))?;
    cookies.add(session_cookie(&state.config.auth, token.clone()));
    Ok((token, CurrentUser::from_claims(claims)?))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let subject = service::authenticate(&state.conn, &request.username, &request.password).await?;
    let (token, user) = issue_session(&state, &cookies, &subject)?;
    Ok(Json(json!({
        "success": true,
        "user": user,
        "token": token,
        "expires_in": state.sessions.ttl().num_seconds(),
    })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    MaybeUser(user): MaybeUser,
) -> Json<Value> {
    if let Some(user) = user {
        log::info!("Employee {} signed out", user.username);
    }
    cookies.add(expired_cookie(&state.config.auth));
    Json(json!({ "success": true, "message": "Logged out" }))
}

pub async fn me(user: CurrentUser) -> Json<Value> {
    Json(json!({ "success": true, "user": user }))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let subject = service::reload(&state.conn, user.id).await?;
    let (token, user) = issue_session(&state, &cookies, &subject)?;
    Ok(Json(json!({ "success": true, "user": user, "token": token })))
}
