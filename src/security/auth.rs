//! Request authentication: the session token is read from the `Authorization`
//! header first and from the session cookie second.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    RequestPartsExt,
};
use serde::Serialize;
use std::sync::Arc;
use tower_cookies::Cookies;

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::security::jwt::{extract_bearer_token, SessionClaims};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub role_id: Option<i32>,
    pub role_name: Option<String>,
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn from_claims(claims: SessionClaims) -> Result<Self, ApiError> {
        let id = claims
            .employee_id()
            .map_err(|_| ApiError::unauthorized("Invalid or expired session"))?;
        Ok(Self {
            id,
            username: claims.username,
            email: claims.email,
            first_name: claims.first_name,
            last_name: claims.last_name,
            role_id: claims.role_id,
            role_name: claims.role_name,
            is_admin: claims.is_admin,
        })
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator access required"))
        }
    }
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = match header_token(&parts.headers) {
            Some(token) => token,
            None => {
                let cookies = parts
                    .extract::<Cookies>()
                    .await
                    .map_err(|_| ApiError::unauthorized("Authentication required"))?;
                cookies
                    .get(&state.config.auth.cookie_name)
                    .map(|c| c.value().to_string())
                    .ok_or_else(|| ApiError::unauthorized("Authentication required"))?
            }
        };

        let claims = state.sessions.verify(&token)?;
        Self::from_claims(claims)
    }
}

/// Authenticated user when present; never rejects.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            CurrentUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::jwt::{SessionKeys, SessionSubject};
    use axum::http::HeaderValue;

    #[test]
    fn test_header_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(header_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_from_claims_and_require_admin() {
        let keys = SessionKeys::new("unit-test-secret-unit-test-secret", 1);
        let claims = keys.claims_for(&SessionSubject {
            employee_id: 7,
            username: "ravi".into(),
            email: None,
            first_name: "Ravi".into(),
            last_name: None,
            role_id: Some(4),
            role_name: Some("Photographer".into()),
        });
        let user = CurrentUser::from_claims(claims).unwrap();
        assert_eq!(user.id, 7);
        assert!(!user.is_admin);
        assert_eq!(
            user.require_admin().unwrap_err().status_code(),
            axum::http::StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_from_claims_rejects_bad_subject() {
        let keys = SessionKeys::new("unit-test-secret-unit-test-secret", 1);
        let mut claims = keys.claims_for(&SessionSubject {
            employee_id: 1,
            username: "admin".into(),
            email: None,
            first_name: "Admin".into(),
            last_name: None,
            role_id: Some(1),
            role_name: Some("Administrator".into()),
        });
        claims.sub = "not-a-number".into();
        assert!(CurrentUser::from_claims(claims).is_err());
    }
}
