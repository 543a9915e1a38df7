use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::notifications;
use crate::core::shared::utils::{with_conn, DbPool};

pub const LEAD_ASSIGNED: &str = "lead_assigned";
pub const APPROVAL_REQUESTED: &str = "quotation_approval_requested";
pub const QUOTATION_APPROVED: &str = "quotation_approved";
pub const QUOTATION_REJECTED: &str = "quotation_rejected";
pub const WHATSAPP_MESSAGE: &str = "whatsapp_message";
pub const GENERAL: &str = "general";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: i32,
    pub employee_id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub is_read: bool,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub employee_id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub data: serde_json::Value,
}

impl NewNotification {
    pub fn lead_assigned(employee_id: i32, lead_id: i32, client_name: &str, assigned_by: &str) -> Self {
        Self {
            employee_id,
            title: "New lead assigned".to_string(),
            message: format!("{assigned_by} assigned you the lead for {client_name}"),
            notification_type: LEAD_ASSIGNED.to_string(),
            data: serde_json::json!({ "lead_id": lead_id }),
        }
    }

    pub fn approval_requested(employee_id: i32, quotation_id: i32, number: &str, submitted_by: &str) -> Self {
        Self {
            employee_id,
            title: "Quotation awaiting approval".to_string(),
            message: format!("{submitted_by} submitted quotation {number} for approval"),
            notification_type: APPROVAL_REQUESTED.to_string(),
            data: serde_json::json!({ "quotation_id": quotation_id }),
        }
    }

    pub fn quotation_approved(employee_id: i32, quotation_id: i32, number: &str, approver: &str) -> Self {
        Self {
            employee_id,
            title: "Quotation approved".to_string(),
            message: format!("{approver} approved quotation {number}"),
            notification_type: QUOTATION_APPROVED.to_string(),
            data: serde_json::json!({ "quotation_id": quotation_id }),
        }
    }

    pub fn quotation_rejected(employee_id: i32, quotation_id: i32, number: &str, reason: &str) -> Self {
        Self {
            employee_id,
            title: "Quotation rejected".to_string(),
            message: format!(
                "Quotation {number} was rejected: {reason}. Please revise the quotation and resubmit for approval."
            ),
            notification_type: QUOTATION_REJECTED.to_string(),
            data: serde_json::json!({ "quotation_id": quotation_id, "reason": reason }),
        }
    }

    pub fn whatsapp_message(employee_id: i32, lead_id: i32, client: &str, preview: &str) -> Self {
        Self {
            employee_id,
            title: "New WhatsApp message".to_string(),
            message: format!("{client}: {preview}"),
            notification_type: WHATSAPP_MESSAGE.to_string(),
            data: serde_json::json!({ "lead_id": lead_id }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub employee_id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub notification_type: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

pub fn insert(conn: &mut PgConnection, notification: &NewNotification) -> ApiResult<Notification> {
    Ok(diesel::insert_into(notifications::table)
        .values(notification)
        .returning(Notification::as_returning())
        .get_result(conn)?)
}

pub async fn create(pool: &DbPool, notification: NewNotification) -> ApiResult<Notification> {
    with_conn(pool, move |conn| insert(conn, &notification)).await
}

pub async fn list_for(
    pool: &DbPool,
    employee_id: i32,
    query: NotificationListQuery,
) -> ApiResult<(Vec<Notification>, i64)> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);

    with_conn(pool, move |conn| {
        let mut q = notifications::table
            .filter(notifications::employee_id.eq(employee_id))
            .into_boxed();
        if query.unread_only {
            q = q.filter(notifications::is_read.eq(false));
        }
        let items = q
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .limit(limit)
            .select(Notification::as_select())
            .load(conn)?;
        let unread = unread_count(conn, employee_id)?;
        Ok((items, unread))
    })
    .await
}

pub fn unread_count(conn: &mut PgConnection, employee_id: i32) -> ApiResult<i64> {
    Ok(notifications::table
        .filter(notifications::employee_id.eq(employee_id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(conn)?)
}

/// Marks one of the employee's notifications read. Other employees' rows are not found.
pub async fn mark_read(pool: &DbPool, employee_id: i32, id: i32) -> ApiResult<()> {
    let updated = with_conn(pool, move |conn| {
        Ok(diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::employee_id.eq(employee_id)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)?)
    })
    .await?;

    if updated == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(())
}

pub async fn mark_all_read(pool: &DbPool, employee_id: i32) -> ApiResult<usize> {
    with_conn(pool, move |conn| {
        Ok(diesel::update(
            notifications::table
                .filter(notifications::employee_id.eq(employee_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(conn)?)
    })
    .await
}
