use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{employees, leads, quotations, tasks};
use crate::core::shared::utils::{non_blank, require_reference, required_text, with_conn, DbPool};
use crate::sales::leads::types::LeadPriority;
use crate::sales::quotations::Quotation;

const NOT_FOUND: &str = "Task not found";
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const FOLLOW_UP_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    General,
    Approval,
    Followup,
    Call,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Approval => "approval",
            Self::Followup => "followup",
            Self::Call => "call",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "approval" => Ok(Self::Approval),
            "followup" => Ok(Self::Followup),
            "call" => Ok(Self::Call),
            _ => Err(format!("Invalid task type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = tasks)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub priority: String,
    pub status: String,
    pub assigned_to: Option<i32>,
    pub lead_id: Option<i32>,
    pub quotation_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub priority: String,
    pub status: String,
    pub assigned_to: Option<i32>,
    pub lead_id: Option<i32>,
    pub quotation_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_by: Option<i32>,
}

impl NewTask {
    pub fn approval(quotation: &Quotation, assigned_to: Option<i32>, submitted_by: i32) -> Self {
        Self {
            title: format!("Approve quotation {}", quotation.quotation_number),
            description: Some(format!(
                "Review quotation {} for {}",
                quotation.quotation_number, quotation.client_name
            )),
            task_type: TaskType::Approval.as_str().to_string(),
            priority: LeadPriority::High.as_str().to_string(),
            status: TaskStatus::Open.as_str().to_string(),
            assigned_to,
            lead_id: quotation.lead_id,
            quotation_id: Some(quotation.id),
            due_date: None,
            metadata: serde_json::json!({ "quotation_number": quotation.quotation_number }),
            created_by: Some(submitted_by),
        }
    }

    /// Due one day after the approval.
    pub fn approved_followup(
        quotation: &Quotation,
        assigned_to: Option<i32>,
        approver_id: i32,
        approved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: format!("Follow up on approved quotation {}", quotation.quotation_number),
            description: Some(format!(
                "Share the approved quotation with {} and confirm the booking",
                quotation.client_name
            )),
            task_type: TaskType::Followup.as_str().to_string(),
            priority: LeadPriority::High.as_str().to_string(),
            status: TaskStatus::Open.as_str().to_string(),
            assigned_to,
            lead_id: quotation.lead_id,
            quotation_id: Some(quotation.id),
            due_date: Some(approved_at + Duration::hours(FOLLOW_UP_HOURS)),
            metadata: serde_json::json!({
                "quotation_number": quotation.quotation_number,
                "client_name": quotation.client_name,
                "total_amount": quotation.total_amount,
                "approved_at": approved_at,
            }),
            created_by: Some(approver_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<i32>,
    pub lead_id: Option<i32>,
    pub quotation_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignTaskRequest {
    pub employee_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub task_type: Option<String>,
    pub assigned_to: Option<i32>,
    pub lead_id: Option<i32>,
    pub quotation_id: Option<i32>,
    #[serde(default)]
    pub mine: bool,
    pub limit: Option<i64>,
}

pub fn insert(conn: &mut PgConnection, task: &NewTask) -> ApiResult<Task> {
    Ok(diesel::insert_into(tasks::table)
        .values(task)
        .returning(Task::as_returning())
        .get_result(conn)?)
}

/// Marks the unfinished tasks of one type on a quotation as completed.
pub fn complete_open(conn: &mut PgConnection, quotation_id: i32, task_type: TaskType) -> ApiResult<usize> {
    let now = Utc::now();
    Ok(diesel::update(
        tasks::table
            .filter(tasks::quotation_id.eq(quotation_id))
            .filter(tasks::task_type.eq(task_type.as_str()))
            .filter(tasks::status.eq_any([TaskStatus::Open.as_str(), TaskStatus::InProgress.as_str()])),
    )
    .set((
        tasks::status.eq(TaskStatus::Completed.as_str()),
        tasks::completed_at.eq(now),
        tasks::updated_at.eq(now),
    ))
    .execute(conn)?)
}

fn active_employee(conn: &mut PgConnection, employee_id: i32) -> ApiResult<()> {
    let active: Option<bool> = employees::table
        .find(employee_id)
        .select(employees::is_active)
        .first(conn)
        .optional()?;
    match active {
        None => Err(ApiError::bad_request("Employee not found")),
        Some(false) => Err(ApiError::bad_request("Cannot assign a task to an inactive employee")),
        Some(true) => Ok(()),
    }
}

pub async fn list(pool: &DbPool, query: TaskListQuery, viewer_id: Option<i32>) -> ApiResult<Vec<Task>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<TaskStatus>().map_err(ApiError::BadRequest))
        .transpose()?;
    let task_type = query
        .task_type
        .as_deref()
        .map(|t| t.parse::<TaskType>().map_err(ApiError::BadRequest))
        .transpose()?;
    let assigned_to = viewer_id.or(query.assigned_to);
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);

    with_conn(pool, move |conn| {
        let mut q = tasks::table.into_boxed();
        if let Some(status) = status {
            q = q.filter(tasks::status.eq(status.as_str()));
        }
        if let Some(task_type) = task_type {
            q = q.filter(tasks::task_type.eq(task_type.as_str()));
        }
        if let Some(assigned_to) = assigned_to {
            q = q.filter(tasks::assigned_to.eq(assigned_to));
        }
        if let Some(lead_id) = query.lead_id {
            q = q.filter(tasks::lead_id.eq(lead_id));
        }
        if let Some(quotation_id) = query.quotation_id {
            q = q.filter(tasks::quotation_id.eq(quotation_id));
        }
        Ok(q
            .order((tasks::due_date.asc(), tasks::id.desc()))
            .limit(limit)
            .select(Task::as_select())
            .load(conn)?)
    })
    .await
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<Task> {
    with_conn(pool, move |conn| {
        tasks::table
            .find(id)
            .select(Task::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn create(pool: &DbPool, request: CreateTaskRequest, created_by: i32) -> ApiResult<Task> {
    let task_type = match request.task_type.as_deref() {
        Some(t) => t.parse::<TaskType>().map_err(ApiError::BadRequest)?,
        None => TaskType::General,
    };
    let priority = match request.priority.as_deref() {
        Some(p) => p.parse::<LeadPriority>().map_err(ApiError::BadRequest)?,
        None => LeadPriority::Medium,
    };
    let new_task = NewTask {
        title: required_text(&request.title, "Title")?,
        description: non_blank(request.description),
        task_type: task_type.as_str().to_string(),
        priority: priority.as_str().to_string(),
        status: TaskStatus::Open.as_str().to_string(),
        assigned_to: Some(request.assigned_to.unwrap_or(created_by)),
        lead_id: request.lead_id,
        quotation_id: request.quotation_id,
        due_date: request.due_date,
        metadata: request.metadata.unwrap_or_else(|| serde_json::json!({})),
        created_by: Some(created_by),
    };

    let task = with_conn(pool, move |conn| {
        if let Some(employee_id) = new_task.assigned_to {
            active_employee(conn, employee_id)?;
        }
        if let Some(lead_id) = new_task.lead_id {
            let found = diesel::select(diesel::dsl::exists(leads::table.find(lead_id))).get_result(conn)?;
            require_reference(found, "Lead")?;
        }
        if let Some(quotation_id) = new_task.quotation_id {
            let found =
                diesel::select(diesel::dsl::exists(quotations::table.find(quotation_id))).get_result(conn)?;
            require_reference(found, "Quotation")?;
        }
        insert(conn, &new_task)
    })
    .await?;

    info!("Created {} task {} ({})", task.task_type, task.id, task.title);
    Ok(task)
}

/// Only the assignee or an administrator may move a task.
pub async fn change_status(
    pool: &DbPool,
    id: i32,
    status: &str,
    actor_id: i32,
    actor_is_admin: bool,
) -> ApiResult<Task> {
    let status: TaskStatus = status.parse().map_err(ApiError::BadRequest)?;
    let task = with_conn(pool, move |conn| {
        let current: Option<i32> = tasks::table
            .find(id)
            .select(tasks::assigned_to)
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))?;
        if !actor_is_admin && current != Some(actor_id) {
            return Err(ApiError::forbidden("Only the assignee can update this task"));
        }
        let now = Utc::now();
        let completed_at = (status == TaskStatus::Completed).then_some(now);
        Ok(diesel::update(tasks::table.find(id))
            .set((
                tasks::status.eq(status.as_str()),
                tasks::completed_at.eq(completed_at),
                tasks::updated_at.eq(now),
            ))
            .returning(Task::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Task {} moved to {}", task.id, task.status);
    Ok(task)
}

pub async fn reassign(pool: &DbPool, id: i32, employee_id: i32) -> ApiResult<Task> {
    let task = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            active_employee(conn, employee_id)?;
            let status: String = tasks::table
                .find(id)
                .select(tasks::status)
                .first(conn)
                .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))?;
            if status.parse::<TaskStatus>().is_ok_and(|s| s.is_finished()) {
                return Err(ApiError::bad_request("A finished task cannot be reassigned"));
            }
            Ok(diesel::update(tasks::table.find(id))
                .set((tasks::assigned_to.eq(employee_id), tasks::updated_at.eq(Utc::now())))
                .returning(Task::as_returning())
                .get_result(conn)?)
        })
    })
    .await?;

    info!("Reassigned task {} to employee {employee_id}", task.id);
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn quotation() -> Quotation {
        let now = Utc::now();
        Quotation {
            id: 12,
            lead_id: Some(3),
            quotation_number: "QT-2025-0012".to_string(),
            slug: "qt-2025-0012".to_string(),
            client_name: "Mehta Wedding".to_string(),
            bride_name: None,
            groom_name: None,
            mobile: Some("9876543210".to_string()),
            email: None,
            default_package: "basic".to_string(),
            total_amount: BigDecimal::from(150000),
            status: "pending_approval".to_string(),
            quotation_data: serde_json::json!({}),
            events_count: 0,
            created_by: Some(5),
            created_at: now,
            updated_at: now,
            reviewed_by: None,
            reviewed_at: None,
            review_comments: None,
        }
    }

    #[test]
    fn test_followup_task_is_due_next_day() {
        let approved_at = Utc::now();
        let task = NewTask::approved_followup(&quotation(), Some(5), 1, approved_at);
        assert_eq!(task.title, "Follow up on approved quotation QT-2025-0012");
        assert_eq!(task.task_type, "followup");
        assert_eq!(task.priority, "high");
        assert_eq!(task.status, "open");
        assert_eq!(task.quotation_id, Some(12));
        assert_eq!(task.lead_id, Some(3));
        assert_eq!(task.due_date, Some(approved_at + Duration::hours(24)));
        assert_eq!(task.metadata["client_name"], "Mehta Wedding");
    }

    #[test]
    fn test_approval_task() {
        let task = NewTask::approval(&quotation(), None, 5);
        assert_eq!(task.task_type, "approval");
        assert_eq!(task.assigned_to, None);
        assert_eq!(task.created_by, Some(5));
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!("In_Progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert!("done".parse::<TaskStatus>().is_err());
        assert!(TaskStatus::Cancelled.is_finished());
        assert!(!TaskStatus::Open.is_finished());
        assert_eq!("FOLLOWUP".parse::<TaskType>(), Ok(TaskType::Followup));
    }
}
