use bigdecimal::BigDecimal;
use diesel::dsl::{count_star, sum};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::shared::error::ApiResult;
use crate::core::shared::schema::{departments, employees, leads, quotations};
use crate::core::shared::utils::{with_conn, DbPool};
use crate::notifications::service as notifications;
use crate::sales::leads::LeadStatus;
use crate::sales::quotations::{service as quotation_service, QuotationStatus};

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub leads: BTreeMap<String, i64>,
    pub quotations: BTreeMap<String, i64>,
    pub approved_quotation_value: BigDecimal,
    pub active_employees: i64,
    pub departments: i64,
    pub unread_notifications: i64,
}

/// Every lead status present, plus `total`.
pub fn lead_counts(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = LeadStatus::ALL
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

pub async fn collect(pool: &DbPool, employee_id: i32) -> ApiResult<DashboardStats> {
    with_conn(pool, move |conn| {
        let lead_rows: Vec<(String, i64)> = leads::table
            .group_by(leads::status)
            .select((leads::status, count_star()))
            .load(conn)?;

        let quotations = quotation_service::status_counts(conn)?;

        let approved: Option<BigDecimal> = quotations::table
            .filter(quotations::status.eq(QuotationStatus::Approved.as_str()))
            .select(sum(quotations::total_amount))
            .first(conn)?;

        let active_employees: i64 = employees::table
            .filter(employees::is_active.eq(true))
            .count()
            .get_result(conn)?;

        let departments: i64 = departments::table.count().get_result(conn)?;

        Ok(DashboardStats {
            leads: lead_counts(lead_rows),
            quotations,
            approved_quotation_value: approved.unwrap_or_default(),
            active_employees,
            departments,
            unread_notifications: notifications::unread_count(conn, employee_id)?,
        })
    })
    .await
}
