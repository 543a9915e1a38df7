//! Quotation approval: a quotation is submitted, a manager approves or
//! rejects it, and the creator hears about the outcome. Approval also opens a
//! follow-up task for the sales side.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

use super::types::{Quotation, QuotationStatus};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{employees, leads, quotation_approvals, quotations, roles};
use crate::core::shared::utils::{non_blank, with_conn, DbPool};
use crate::notifications::service::{self as notifications, NewNotification};
use crate::security::{CurrentUser, ADMIN_ROLE_ID};
use crate::tasks::service::{self as tasks, NewTask, TaskType};

const NOT_FOUND: &str = "Quotation not found";
const DEFAULT_REJECTION_REASON: &str = "No specific reason provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn status(&self) -> QuotationStatus {
        match self {
            Self::Approve => QuotationStatus::Approved,
            Self::Reject => QuotationStatus::Rejected,
        }
    }

    fn default_comment(&self) -> &'static str {
        match self {
            Self::Approve => "Approved",
            Self::Reject => DEFAULT_REJECTION_REASON,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = quotation_approvals)]
pub struct QuotationApproval {
    pub id: i32,
    pub quotation_id: i32,
    pub approval_status: String,
    pub comments: Option<String>,
    pub approver_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = quotation_approvals)]
struct NewQuotationApproval<'a> {
    quotation_id: i32,
    approval_status: &'a str,
    comments: Option<&'a str>,
    approver_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Submission {
    pub quotation: Quotation,
    pub notified: usize,
}

fn load_for_update(conn: &mut PgConnection, id: i32) -> ApiResult<Quotation> {
    quotations::table
        .find(id)
        .for_update()
        .select(Quotation::as_select())
        .first(conn)
        .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
}

fn current_status(quotation: &Quotation) -> ApiResult<QuotationStatus> {
    quotation
        .status
        .parse()
        .map_err(|e: String| ApiError::internal("Stored quotation status is invalid", e))
}

/// Active employees holding a management role or the Administrator role.
pub fn approver_ids(conn: &mut PgConnection) -> ApiResult<Vec<i32>> {
    Ok(employees::table
        .inner_join(roles::table)
        .filter(employees::is_active.eq(true))
        .filter(roles::is_management.eq(true).or(roles::id.eq(ADMIN_ROLE_ID)))
        .select(employees::id)
        .order(employees::id)
        .load(conn)?)
}

fn ensure_approver(conn: &mut PgConnection, user: &CurrentUser) -> ApiResult<()> {
    if user.is_admin {
        return Ok(());
    }
    let management = match user.role_id {
        Some(role_id) => roles::table
            .find(role_id)
            .select(roles::is_management)
            .first::<bool>(conn)
            .optional()?
            .unwrap_or(false),
        None => false,
    };
    if management {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only managers can review quotations"))
    }
}

/// Moves the quotation to `pending_approval`, opens an approval task and
/// notifies every approver other than the submitter.
pub async fn submit(pool: &DbPool, id: i32, submitter: CurrentUser) -> ApiResult<Submission> {
    let submission = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            let current = load_for_update(conn, id)?;
            if !current_status(&current)?.can_submit_for_approval() {
                return Err(ApiError::bad_request(format!(
                    "A {} quotation cannot be submitted for approval",
                    current.status
                )));
            }

            let quotation: Quotation = diesel::update(quotations::table.find(id))
                .set((
                    quotations::status.eq(QuotationStatus::PendingApproval.as_str()),
                    quotations::reviewed_by.eq(None::<i32>),
                    quotations::reviewed_at.eq(None::<DateTime<Utc>>),
                    quotations::updated_at.eq(Utc::now()),
                ))
                .returning(Quotation::as_returning())
                .get_result(conn)?;

            let approvers: Vec<i32> = approver_ids(conn)?
                .into_iter()
                .filter(|approver| *approver != submitter.id)
                .collect();
            tasks::insert(
                conn,
                &NewTask::approval(&quotation, approvers.first().copied(), submitter.id),
            )?;
            for approver in &approvers {
                notifications::insert(
                    conn,
                    &NewNotification::approval_requested(
                        *approver,
                        quotation.id,
                        &quotation.quotation_number,
                        &submitter.first_name,
                    ),
                )?;
            }
            Ok(Submission {
                quotation,
                notified: approvers.len(),
            })
        })
    })
    .await?;

    info!(
        "Quotation {} submitted for approval, {} approver(s) notified",
        submission.quotation.quotation_number, submission.notified
    );
    Ok(submission)
}

/// Records the decision, closes the open approval tasks and notifies the
/// creator. Approving also opens the follow-up task for the lead's assignee,
/// falling back to the creator.
pub async fn review(
    pool: &DbPool,
    id: i32,
    reviewer: CurrentUser,
    decision: ReviewDecision,
    comments: Option<String>,
) -> ApiResult<Quotation> {
    let comments = non_blank(comments).unwrap_or_else(|| decision.default_comment().to_string());

    let quotation = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            ensure_approver(conn, &reviewer)?;
            let current = load_for_update(conn, id)?;
            if current_status(&current)? != QuotationStatus::PendingApproval {
                return Err(ApiError::bad_request("Quotation is not awaiting approval"));
            }

            let now = Utc::now();
            let status = decision.status();
            let quotation: Quotation = diesel::update(quotations::table.find(id))
                .set((
                    quotations::status.eq(status.as_str()),
                    quotations::reviewed_by.eq(reviewer.id),
                    quotations::reviewed_at.eq(now),
                    quotations::review_comments.eq(comments.as_str()),
                    quotations::updated_at.eq(now),
                ))
                .returning(Quotation::as_returning())
                .get_result(conn)?;

            diesel::insert_into(quotation_approvals::table)
                .values(&NewQuotationApproval {
                    quotation_id: quotation.id,
                    approval_status: status.as_str(),
                    comments: Some(comments.as_str()),
                    approver_id: Some(reviewer.id),
                })
                .execute(conn)?;
            tasks::complete_open(conn, quotation.id, TaskType::Approval)?;

            match decision {
                ReviewDecision::Approve => {
                    let assignee = match quotation.lead_id {
                        Some(lead_id) => leads::table
                            .find(lead_id)
                            .select(leads::assigned_to)
                            .first::<Option<i32>>(conn)
                            .optional()?
                            .flatten(),
                        None => None,
                    }
                    .or(quotation.created_by);
                    tasks::insert(
                        conn,
                        &NewTask::approved_followup(&quotation, assignee, reviewer.id, now),
                    )?;
                    if let Some(creator) = quotation.created_by {
                        notifications::insert(
                            conn,
                            &NewNotification::quotation_approved(
                                creator,
                                quotation.id,
                                &quotation.quotation_number,
                                &reviewer.first_name,
                            ),
                        )?;
                    }
                }
                ReviewDecision::Reject => {
                    if let Some(creator) = quotation.created_by {
                        notifications::insert(
                            conn,
                            &NewNotification::quotation_rejected(
                                creator,
                                quotation.id,
                                &quotation.quotation_number,
                                &comments,
                            ),
                        )?;
                    }
                }
            }
            Ok(quotation)
        })
    })
    .await?;

    info!("Quotation {} marked {}", quotation.quotation_number, quotation.status);
    Ok(quotation)
}

pub async fn history(pool: &DbPool, id: i32) -> ApiResult<Vec<QuotationApproval>> {
    with_conn(pool, move |conn| {
        let found: bool = diesel::select(diesel::dsl::exists(quotations::table.find(id))).get_result(conn)?;
        if !found {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        Ok(quotation_approvals::table
            .filter(quotation_approvals::quotation_id.eq(id))
            .order((quotation_approvals::created_at.desc(), quotation_approvals::id.desc()))
            .select(QuotationApproval::as_select())
            .load(conn)?)
    })
    .await
}
