use crate::core::shared::error::ApiError;
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ADMIN_ROLE_ID: i32 = 1;
pub const ADMIN_ROLE_TITLE: &str = "Administrator";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub role_id: Option<i32>,
    pub role_name: Option<String>,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Identity facts baked into a session token.
#[derive(Debug, Clone)]
pub struct SessionSubject {
    pub employee_id: i32,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub role_id: Option<i32>,
    pub role_name: Option<String>,
}

impl SessionClaims {
    pub fn employee_id(&self) -> Result<i32> {
        self.sub
            .parse()
            .map_err(|e| anyhow!("Invalid subject in token: {e}"))
    }
}

pub fn is_administrator(role_id: Option<i32>, role_title: Option<&str>) -> bool {
    role_id == Some(ADMIN_ROLE_ID) || role_title == Some(ADMIN_ROLE_TITLE)
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn claims_for(&self, subject: &SessionSubject) -> SessionClaims {
        let now = Utc::now();
        SessionClaims {
            sub: subject.employee_id.to_string(),
            username: subject.username.clone(),
            email: subject.email.clone(),
            first_name: subject.first_name.clone(),
            last_name: subject.last_name.clone(),
            role_id: subject.role_id,
            role_name: subject.role_name.clone(),
            is_admin: is_administrator(subject.role_id, subject.role_name.as_deref()),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to sign session token: {e}"))
    }

    pub fn issue(&self, subject: &SessionSubject) -> Result<String> {
        self.encode(&self.claims_for(subject))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected session token: {e}");
                ApiError::unauthorized("Invalid or expired session")
            })
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> SessionKeys {
        SessionKeys::new("this-is-a-very-long-secret-key-for-testing-purposes-only", 7)
    }

    fn subject(role_id: Option<i32>, role_name: Option<&str>) -> SessionSubject {
        SessionSubject {
            employee_id: 42,
            username: "priya".into(),
            email: Some("priya@studio.test".into()),
            first_name: "Priya".into(),
            last_name: Some("Sharma".into()),
            role_id,
            role_name: role_name.map(String::from),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = test_keys();
        let token = keys
            .issue(&subject(Some(3), Some("Sales Head")))
            .expect("Failed to issue");
        let claims = keys.verify(&token).expect("Validation failed");

        assert_eq!(claims.employee_id().expect("Invalid subject"), 42);
        assert_eq!(claims.username, "priya");
        assert_eq!(claims.role_id, Some(3));
        assert!(!claims.is_admin);
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn test_admin_flag_from_role_id_or_title() {
        let keys = test_keys();
        assert!(keys.claims_for(&subject(Some(1), Some("Owner"))).is_admin);
        assert!(keys.claims_for(&subject(Some(9), Some("Administrator"))).is_admin);
        assert!(!keys.claims_for(&subject(None, None)).is_admin);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = test_keys();
        let mut claims = keys.claims_for(&subject(Some(2), None));
        claims.iat -= 3 * 3600;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = keys.encode(&claims).expect("Failed to sign");

        let err = keys.verify(&token).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = SessionKeys::new("another-secret-key-that-is-also-long", 7)
            .issue(&subject(Some(2), None))
            .expect("Failed to issue");
        assert!(test_keys().verify(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("bearer xyz"), Some("xyz"));
        assert_eq!(extract_bearer_token("Bearer   "), None);
        assert_eq!(extract_bearer_token("Basic dXNlcg=="), None);
    }
}
