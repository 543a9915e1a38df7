use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{employees, roles};
use crate::core::shared::utils::{required_text, with_conn, DbPool};
use crate::people::types::Employee;
use crate::security::password::{check_password_policy, hash_password, verify_password};
use crate::security::{SessionSubject, ADMIN_ROLE_ID};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn subject_from(employee: &Employee, role_title: Option<String>) -> SessionSubject {
    SessionSubject {
        employee_id: employee.id,
        username: employee.username.clone(),
        email: employee.email.clone(),
        first_name: employee.first_name.clone(),
        last_name: employee.last_name.clone(),
        role_id: employee.role_id,
        role_name: role_title,
    }
}

/// Outcome of checking an account against a login attempt, before any write.
pub fn check_account(
    employee: &Employee,
    password: &str,
    verify: impl Fn(&str, &str) -> anyhow::Result<bool>,
) -> ApiResult<()> {
    if !employee.is_active {
        return Err(ApiError::forbidden("Account is inactive"));
    }
    let Some(hash) = employee.password_hash.as_deref() else {
        return Err(ApiError::forbidden("Account not properly configured"));
    };
    match verify(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::unauthorized(INVALID_CREDENTIALS)),
        Err(e) => {
            warn!("Stored password hash for {} is unusable: {e}", employee.username);
            Err(ApiError::forbidden("Account not properly configured"))
        }
    }
}

fn load_with_role(
    conn: &mut PgConnection,
    filter_username: Option<&str>,
    filter_id: Option<i32>,
) -> QueryResult<Option<(Employee, Option<String>)>> {
    let mut q = employees::table
        .left_join(roles::table)
        .select((Employee::as_select(), roles::title.nullable()))
        .into_boxed();
    if let Some(username) = filter_username {
        q = q.filter(employees::username.eq(username.to_string()));
    }
    if let Some(id) = filter_id {
        q = q.filter(employees::id.eq(id));
    }
    q.first::<(Employee, Option<String>)>(conn).optional()
}

pub async fn authenticate(pool: &DbPool, username: &str, password: &str) -> ApiResult<SessionSubject> {
    let username = username.trim().to_string();
    let password = password.to_string();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let subject = with_conn(pool, move |conn| {
        let Some((employee, role_title)) = load_with_role(conn, Some(&username), None)? else {
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        };
        check_account(&employee, &password, verify_password)?;

        diesel::update(employees::table.find(employee.id))
            .set(employees::last_login.eq(Utc::now()))
            .execute(conn)?;
        Ok(subject_from(&employee, role_title))
    })
    .await?;

    info!("Employee {} signed in", subject.username);
    Ok(subject)
}

/// Re-reads the employee so role changes reach the next token.
pub async fn reload(pool: &DbPool, employee_id: i32) -> ApiResult<SessionSubject> {
    with_conn(pool, move |conn| {
        let Some((employee, role_title)) = load_with_role(conn, None, Some(employee_id))? else {
            return Err(ApiError::unauthorized("Account no longer exists"));
        };
        if !employee.is_active {
            return Err(ApiError::forbidden("Account is inactive"));
        }
        Ok(subject_from(&employee, role_title))
    })
    .await
}

/// Creates the account, or resets its password, and gives it the Administrator role.
pub async fn ensure_admin_account(pool: &DbPool, username: &str, password: &str) -> anyhow::Result<i32> {
    let username = required_text(username, "Username").map_err(|e| anyhow::anyhow!("{e}"))?;
    check_password_policy(password).map_err(|e| anyhow::anyhow!(e))?;
    let hash = hash_password(password)?;

    let id = with_conn(pool, move |conn| {
        let id = diesel::insert_into(employees::table)
            .values((
                employees::username.eq(&username),
                employees::first_name.eq(&username),
                employees::password_hash.eq(&hash),
                employees::role_id.eq(ADMIN_ROLE_ID),
                employees::is_active.eq(true),
            ))
            .on_conflict(employees::username)
            .do_update()
            .set((
                employees::password_hash.eq(&hash),
                employees::role_id.eq(ADMIN_ROLE_ID),
                employees::is_active.eq(true),
                employees::updated_at.eq(Utc::now()),
            ))
            .returning(employees::id)
            .get_result::<i32>(conn)?;
        Ok(id)
    })
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    info!("Administrator account ready (employee {id})");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(is_active: bool, password_hash: Option<&str>) -> Employee {
        let now = Utc::now();
        Employee {
            id: 5,
            username: "deepa".into(),
            password_hash: password_hash.map(String::from),
            email: None,
            first_name: "Deepa".into(),
            last_name: None,
            phone: None,
            department_id: None,
            designation_id: None,
            role_id: Some(2),
            is_active,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn accept(_: &str, _: &str) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn reject(_: &str, _: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    #[test]
    fn test_inactive_account_is_forbidden() {
        let err = check_account(&employee(false, Some("hash")), "pw", accept).unwrap_err();
        assert_eq!(err.to_string(), "Account is inactive");
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_missing_hash_is_not_configured() {
        let err = check_account(&employee(true, None), "pw", accept).unwrap_err();
        assert_eq!(err.to_string(), "Account not properly configured");
    }

    #[test]
    fn test_wrong_password_is_unauthorized() {
        let err = check_account(&employee(true, Some("hash")), "pw", reject).unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_valid_password_passes() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(check_account(&employee(true, Some(&hash)), "correct-horse", verify_password).is_ok());
        assert!(check_account(&employee(true, Some(&hash)), "wrong-horse", verify_password).is_err());
    }

    #[test]
    fn test_subject_carries_role_title() {
        let subject = subject_from(&employee(true, None), Some("Sales Head".into()));
        assert_eq!(subject.employee_id, 5);
        assert_eq!(subject.role_id, Some(2));
        assert_eq!(subject.role_name.as_deref(), Some("Sales Head"));
    }
}
