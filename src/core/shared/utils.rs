use crate::core::config::DatabaseConfig;
use crate::core::shared::error::{ApiError, ApiResult};
use anyhow::{anyhow, Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use serde::{Deserialize, Deserializer};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .context("Failed to create database connection pool")
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get().context("Failed to get connection for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Migration error: {e}"))?;
    for version in applied {
        log::info!("Applied migration {version}");
    }
    Ok(())
}

/// Runs blocking diesel work on the blocking thread pool with a pooled connection.
pub async fn with_conn<T, F>(pool: &DbPool, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> ApiResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        work(&mut conn)
    })
    .await
    .map_err(|e| ApiError::internal("Background task failed", e))?
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn ilike_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Trims a required text field, rejecting blank input.
pub fn required_text(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// 400 with `"{label} not found"` when a referenced row is missing.
pub fn require_reference(found: bool, label: &str) -> ApiResult<()> {
    if found {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("{label} not found")))
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        parent_id: Option<Option<i32>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.parent_id, None);

        let null: Patch = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));

        let set: Patch = serde_json::from_str(r#"{"parent_id": 4}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some(4)));
    }

    #[test]
    fn test_ilike_pattern_escapes_wildcards() {
        assert_eq!(ilike_pattern(" sales "), "%sales%");
        assert_eq!(ilike_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_require_reference() {
        assert!(require_reference(true, "Role").is_ok());
        let err = require_reference(false, "Role").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Role not found");
    }

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("  Finance ", "Name").unwrap(), "Finance");
        let err = required_text("   ", "Name").unwrap_err();
        assert_eq!(err.to_string(), "Name is required");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" a ".into())), Some("a".into()));
        assert_eq!(non_blank(None), None);
    }
}
