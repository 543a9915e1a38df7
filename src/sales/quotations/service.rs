use chrono::{Datelike, Utc};
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use log::info;
use std::collections::BTreeMap;

use super::types::*;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{leads, quotations};
use crate::core::shared::utils::{non_blank, require_reference, required_text, with_conn, DbPool};

const NOT_FOUND: &str = "Quotation not found";
const DEFAULT_LIMIT: i64 = 100;
const MAX_SLUG_ATTEMPTS: u32 = 100;

fn parse_status(status: &str) -> ApiResult<QuotationStatus> {
    status.parse().map_err(ApiError::BadRequest)
}

fn number_taken(conn: &mut PgConnection, number: &str) -> ApiResult<bool> {
    Ok(diesel::select(exists(
        quotations::table.filter(quotations::quotation_number.eq(number)),
    ))
    .get_result(conn)?)
}

fn slug_taken(conn: &mut PgConnection, slug: &str) -> ApiResult<bool> {
    Ok(diesel::select(exists(quotations::table.filter(quotations::slug.eq(slug)))).get_result(conn)?)
}

/// Next free `QT-<year>-<NNNN>` number, starting from the row count + 1.
fn next_number(conn: &mut PgConnection, year: i32) -> ApiResult<String> {
    let mut sequence: i64 = quotations::table.count().get_result::<i64>(conn)? + 1;
    loop {
        let number = format_quotation_number(year, sequence);
        if !number_taken(conn, &number)? {
            return Ok(number);
        }
        sequence += 1;
    }
}

fn unique_slug(conn: &mut PgConnection, base: &str) -> ApiResult<String> {
    if !slug_taken(conn, base)? {
        return Ok(base.to_string());
    }
    for suffix in 2..=MAX_SLUG_ATTEMPTS {
        let candidate = format!("{base}-{suffix}");
        if !slug_taken(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(ApiError::conflict("Could not allocate a unique quotation slug"))
}

fn check_lead(conn: &mut PgConnection, lead_id: Option<i32>) -> ApiResult<()> {
    match lead_id {
        Some(id) => {
            let found = diesel::select(exists(leads::table.find(id))).get_result(conn)?;
            require_reference(found, "Lead")
        }
        None => Ok(()),
    }
}

pub async fn list(pool: &DbPool, query: QuotationListQuery) -> ApiResult<Vec<Quotation>> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);

    with_conn(pool, move |conn| {
        let mut q = quotations::table.into_boxed();
        if let Some(status) = status {
            q = q.filter(quotations::status.eq(status.as_str()));
        }
        if let Some(lead_id) = query.lead_id {
            q = q.filter(quotations::lead_id.eq(lead_id));
        }
        Ok(q
            .order((quotations::created_at.desc(), quotations::id.desc()))
            .limit(limit)
            .select(Quotation::as_select())
            .load(conn)?)
    })
    .await
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<Quotation> {
    with_conn(pool, move |conn| {
        quotations::table
            .find(id)
            .select(Quotation::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn find_by_slug(pool: &DbPool, slug: String) -> ApiResult<Quotation> {
    with_conn(pool, move |conn| {
        quotations::table
            .filter(quotations::slug.eq(slug.as_str()))
            .select(Quotation::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn create(
    pool: &DbPool,
    request: CreateQuotationRequest,
    created_by: i32,
) -> ApiResult<Quotation> {
    let client_name = required_text(&request.client_name, "Client name")?;
    let data = request.quotation_data.unwrap_or_else(|| serde_json::json!({}));
    let default_package = non_blank(request.default_package).unwrap_or_else(|| DEFAULT_PACKAGE.to_string());
    let total_amount = request.total_amount.unwrap_or_default();
    let year = Utc::now().year();

    let quotation = with_conn(pool, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            check_lead(conn, request.lead_id)?;

            let quotation_number = next_number(conn, year)?;
            let slug = unique_slug(conn, &slugify(&quotation_number))?;
            let new_quotation = NewQuotation {
                lead_id: request.lead_id,
                quotation_number,
                slug,
                client_name,
                bride_name: non_blank(request.bride_name),
                groom_name: non_blank(request.groom_name),
                mobile: non_blank(request.mobile),
                email: non_blank(request.email),
                default_package,
                total_amount,
                status: QuotationStatus::Draft.as_str().to_string(),
                events_count: count_events(&data),
                quotation_data: data,
                created_by: Some(created_by),
            };

            diesel::insert_into(quotations::table)
                .values(&new_quotation)
                .returning(Quotation::as_returning())
                .get_result(conn)
                .map_err(|e| ApiError::from(e).or_conflict("Quotation number already exists"))
        })
    })
    .await?;

    info!("Created quotation {} ({})", quotation.quotation_number, quotation.slug);
    Ok(quotation)
}

pub async fn update(pool: &DbPool, id: i32, request: UpdateQuotationRequest) -> ApiResult<Quotation> {
    let changes = QuotationChangeset {
        lead_id: request.lead_id,
        client_name: match request.client_name.as_deref() {
            Some(name) => Some(required_text(name, "Client name")?),
            None => None,
        },
        bride_name: request.bride_name.map(non_blank),
        groom_name: request.groom_name.map(non_blank),
        mobile: request.mobile.map(non_blank),
        email: request.email.map(non_blank),
        default_package: non_blank(request.default_package),
        total_amount: request.total_amount,
        events_count: request.quotation_data.as_ref().map(count_events),
        quotation_data: request.quotation_data,
        updated_at: Some(Utc::now()),
    };

    with_conn(pool, move |conn| {
        check_lead(conn, changes.lead_id.flatten())?;
        diesel::update(quotations::table.find(id))
            .set(&changes)
            .returning(Quotation::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

/// Approval states are reachable only through the approval workflow.
pub async fn change_status(pool: &DbPool, id: i32, status: &str) -> ApiResult<Quotation> {
    let status = parse_status(status)?;
    if status.is_review_state() {
        return Err(ApiError::bad_request(format!(
            "Use the approval workflow to mark a quotation {status}"
        )));
    }
    let quotation = with_conn(pool, move |conn| {
        diesel::update(quotations::table.find(id))
            .set((
                quotations::status.eq(status.as_str()),
                quotations::updated_at.eq(Utc::now()),
            ))
            .returning(Quotation::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await?;

    info!("Quotation {} moved to {}", quotation.quotation_number, quotation.status);
    Ok(quotation)
}

pub async fn delete(pool: &DbPool, id: i32) -> ApiResult<()> {
    let deleted = with_conn(pool, move |conn| {
        Ok(diesel::delete(quotations::table.find(id)).execute(conn)?)
    })
    .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    info!("Deleted quotation {id}");
    Ok(())
}

/// Counts per status, with every status present and `total` summing them.
pub fn status_counts(conn: &mut PgConnection) -> ApiResult<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = quotations::table
        .group_by(quotations::status)
        .select((quotations::status, count_star()))
        .load(conn)?;
    Ok(fill_status_counts(rows))
}

pub async fn counts(pool: &DbPool) -> ApiResult<BTreeMap<String, i64>> {
    with_conn(pool, status_counts).await
}

fn fill_status_counts(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = QuotationStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut total = 0;
    for (status, count) in rows {
        total += count;
        counts.insert(status, count);
    }
    counts.insert("total".to_string(), total);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_status_counts() {
        let counts = fill_status_counts(vec![("draft".to_string(), 3), ("approved".to_string(), 2)]);
        assert_eq!(counts["draft"], 3);
        assert_eq!(counts["approved"], 2);
        assert_eq!(counts["expired"], 0);
        assert_eq!(counts["total"], 5);
        assert_eq!(counts.len(), QuotationStatus::ALL.len() + 1);
    }
}
