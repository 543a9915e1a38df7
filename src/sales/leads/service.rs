use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use log::info;

use super::types::*;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{employees, leads};
use crate::core::shared::utils::{ilike_pattern, non_blank, required_text, with_conn, DbPool};
use crate::notifications::service::{self as notifications, NewNotification};

const NOT_FOUND: &str = "Lead not found";

#[derive(Debug, serde::Serialize)]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

fn parse_priority(priority: Option<&str>) -> ApiResult<Option<String>> {
    priority
        .map(|p| {
            p.parse::<LeadPriority>()
                .map(|p| p.as_str().to_string())
                .map_err(ApiError::BadRequest)
        })
        .transpose()
}

fn filtered<'a>(
    status: Option<&'a str>,
    assigned_to: Option<i32>,
    search: Option<&'a str>,
) -> leads::BoxedQuery<'a, Pg> {
    let mut q = leads::table.into_boxed();
    if let Some(status) = status {
        q = q.filter(leads::status.eq(status));
    }
    if let Some(assigned_to) = assigned_to {
        q = q.filter(leads::assigned_to.eq(assigned_to));
    }
    if let Some(search) = search {
        let pattern = ilike_pattern(search);
        q = q.filter(
            leads::client_name
                .ilike(pattern.clone())
                .or(leads::bride_name.assume_not_null().ilike(pattern.clone()))
                .or(leads::groom_name.assume_not_null().ilike(pattern.clone()))
                .or(leads::phone.assume_not_null().ilike(pattern.clone()))
                .or(leads::email.assume_not_null().ilike(pattern)),
        );
    }
    q
}

/// `viewer_id` restricts the page to leads assigned to that employee.
pub async fn list(pool: &DbPool, query: LeadListQuery, viewer_id: Option<i32>) -> ApiResult<LeadPage> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<LeadStatus>().map_err(ApiError::BadRequest))
        .transpose()?;
    let assigned_to = viewer_id.or(query.assigned_to);
    let search = non_blank(query.search);
    let (page, per_page, offset) = pagination(query.page, query.per_page);

    with_conn(pool, move |conn| {
        let status = status.map(|s| s.as_str());
        let total: i64 = filtered(status, assigned_to, search.as_deref())
            .count()
            .get_result(conn)?;
        let leads = filtered(status, assigned_to, search.as_deref())
            .order((leads::created_at.desc(), leads::id.desc()))
            .limit(per_page)
            .offset(offset)
            .select(Lead::as_select())
            .load(conn)?;
        Ok(LeadPage {
            leads,
            total,
            page,
            per_page,
        })
    })
    .await
}

fn load(conn: &mut PgConnection, id: i32) -> ApiResult<Lead> {
    leads::table
        .find(id)
        .select(Lead::as_select())
        .first(conn)
        .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<Lead> {
    with_conn(pool, move |conn| load(conn, id)).await
}

pub async fn create(pool: &DbPool, request: CreateLeadRequest, created_by: i32) -> ApiResult<Lead> {
    let new_lead = NewLead {
        client_name: required_text(&request.client_name, "Client name")?,
        bride_name: non_blank(request.bride_name),
        groom_name: non_blank(request.groom_name),
        phone: non_blank(request.phone),
        email: non_blank(request.email),
        location: non_blank(request.location),
        wedding_date: request.wedding_date,
        lead_source: non_blank(request.lead_source),
        status: LeadStatus::New.as_str().to_string(),
        priority: parse_priority(request.priority.as_deref())?
            .unwrap_or_else(|| LeadPriority::Medium.as_str().to_string()),
        estimated_value: request.estimated_value,
        notes: non_blank(request.notes),
        follow_up_date: request.follow_up_date,
        created_by: Some(created_by),
    };

    let lead = with_conn(pool, move |conn| {
        Ok(diesel::insert_into(leads::table)
            .values(&new_lead)
            .returning(Lead::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created lead {} for {}", lead.id, lead.client_name);
    Ok(lead)
}

pub async fn update(pool: &DbPool, id: i32, request: UpdateLeadRequest) -> ApiResult<Lead> {
    let changes = LeadChangeset {
        client_name: match request.client_name.as_deref() {
            Some(name) => Some(required_text(name, "Client name")?),
            None => None,
        },
        bride_name: request.bride_name.map(non_blank),
        groom_name: request.groom_name.map(non_blank),
        phone: request.phone.map(non_blank),
        email: request.email.map(non_blank),
        location: request.location.map(non_blank),
        wedding_date: request.wedding_date,
        lead_source: request.lead_source.map(non_blank),
        priority: parse_priority(request.priority.as_deref())?,
        estimated_value: request.estimated_value,
        notes: request.notes.map(non_blank),
        follow_up_date: request.follow_up_date,
        updated_at: Some(Utc::now()),
    };

    with_conn(pool, move |conn| {
        diesel::update(leads::table.find(id))
            .set(&changes)
            .returning(Lead::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn delete(pool: &DbPool, id: i32) -> ApiResult<()> {
    let deleted = with_conn(pool, move |conn| {
        Ok(diesel::delete(leads::table.find(id)).execute(conn)?)
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Deleted lead {id}");
    Ok(())
}

/// Assigns the lead, moves it to ASSIGNED and notifies the assignee in one transaction.
pub async fn assign(pool: &DbPool, id: i32, employee_id: i32, assigned_by: String) -> ApiResult<Lead> {
    let lead = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            let active: Option<bool> = employees::table
                .find(employee_id)
                .select(employees::is_active)
                .first(conn)
                .optional()?;
            match active {
                None => return Err(ApiError::bad_request("Employee not found")),
                Some(false) => {
                    return Err(ApiError::bad_request("Cannot assign a lead to an inactive employee"))
                }
                Some(true) => {}
            }

            let lead: Lead = diesel::update(leads::table.find(id))
                .set((
                    leads::assigned_to.eq(employee_id),
                    leads::status.eq(LeadStatus::Assigned.as_str()),
                    leads::updated_at.eq(Utc::now()),
                ))
                .returning(Lead::as_returning())
                .get_result(conn)
                .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))?;

            notifications::insert(
                conn,
                &NewNotification::lead_assigned(employee_id, lead.id, &lead.client_name, &assigned_by),
            )?;
            Ok(lead)
        })
    })
    .await?;

    info!("Assigned lead {} to employee {employee_id}", lead.id);
    Ok(lead)
}

pub async fn change_status(pool: &DbPool, id: i32, request: UpdateLeadStatusRequest) -> ApiResult<Lead> {
    let status: LeadStatus = request.status.parse().map_err(ApiError::BadRequest)?;
    let reason = non_blank(request.reason);

    let lead = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            let current = load(conn, id)?;
            let now = Utc::now();
            let notes = match reason.as_deref() {
                Some(reason) => Some(append_status_note(current.notes.as_deref(), status, reason, now)),
                None => current.notes,
            };
            let follow_up_date = if status.is_closed() {
                None
            } else {
                current.follow_up_date
            };
            Ok(diesel::update(leads::table.find(id))
                .set((
                    leads::status.eq(status.as_str()),
                    leads::notes.eq(notes),
                    leads::follow_up_date.eq(follow_up_date),
                    leads::updated_at.eq(now),
                ))
                .returning(Lead::as_returning())
                .get_result(conn)?)
        })
    })
    .await?;

    info!("Lead {} moved to {}", lead.id, lead.status);
    Ok(lead)
}
