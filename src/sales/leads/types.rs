use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::shared::schema::leads;
use crate::core::shared::utils::double_option;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Assigned,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
    Rejected,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 9] = [
        Self::New,
        Self::Assigned,
        Self::Contacted,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::ClosedWon,
        Self::ClosedLost,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Assigned => "ASSIGNED",
            Self::Contacted => "CONTACTED",
            Self::Qualified => "QUALIFIED",
            Self::Proposal => "PROPOSAL",
            Self::Negotiation => "NEGOTIATION",
            Self::ClosedWon => "CLOSED_WON",
            Self::ClosedLost => "CLOSED_LOST",
            Self::Rejected => "REJECTED",
        }
    }

    /// Terminal statuses; a closed lead has no pending follow-up.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost | Self::Rejected)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Invalid lead status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl LeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for LeadPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid lead priority: {s}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = leads)]
pub struct Lead {
    pub id: i32,
    pub client_name: String,
    pub bride_name: Option<String>,
    pub groom_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub wedding_date: Option<NaiveDate>,
    pub lead_source: Option<String>,
    pub status: String,
    pub priority: String,
    pub estimated_value: Option<BigDecimal>,
    pub assigned_to: Option<i32>,
    pub notes: Option<String>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = leads)]
pub struct NewLead {
    pub client_name: String,
    pub bride_name: Option<String>,
    pub groom_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub wedding_date: Option<NaiveDate>,
    pub lead_source: Option<String>,
    pub status: String,
    pub priority: String,
    pub estimated_value: Option<BigDecimal>,
    pub notes: Option<String>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub created_by: Option<i32>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = leads)]
pub struct LeadChangeset {
    pub client_name: Option<String>,
    pub bride_name: Option<Option<String>>,
    pub groom_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub wedding_date: Option<Option<NaiveDate>>,
    pub lead_source: Option<Option<String>>,
    pub priority: Option<String>,
    pub estimated_value: Option<Option<BigDecimal>>,
    pub notes: Option<Option<String>>,
    pub follow_up_date: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLeadRequest {
    #[serde(default)]
    pub client_name: String,
    pub bride_name: Option<String>,
    pub groom_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub wedding_date: Option<NaiveDate>,
    pub lead_source: Option<String>,
    pub priority: Option<String>,
    pub estimated_value: Option<BigDecimal>,
    pub notes: Option<String>,
    pub follow_up_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLeadRequest {
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub bride_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub groom_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub wedding_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub lead_source: Option<Option<String>>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_value: Option<Option<BigDecimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub follow_up_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignLeadRequest {
    pub employee_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeadStatusRequest {
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadListQuery {
    pub status: Option<String>,
    pub assigned_to: Option<i32>,
    pub search: Option<String>,
    #[serde(default)]
    pub mine: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub const DEFAULT_PER_PAGE: i64 = 25;
pub const MAX_PER_PAGE: i64 = 100;

/// Returns `(page, per_page, offset)` with page starting at 1.
pub fn pagination(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let per_page = per_page
        .filter(|p| *p >= 1)
        .unwrap_or(DEFAULT_PER_PAGE)
        .min(MAX_PER_PAGE);
    (page, per_page, (page - 1) * per_page)
}

/// Appends a dated status note, keeping earlier notes.
pub fn append_status_note(
    notes: Option<&str>,
    status: LeadStatus,
    reason: &str,
    at: DateTime<Utc>,
) -> String {
    let entry = format!("[{} {}] {}", at.format("%Y-%m-%d"), status, reason.trim());
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(existing) => format!("{existing}\n{entry}"),
        None => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lead_status_parse() {
        assert_eq!("new".parse::<LeadStatus>(), Ok(LeadStatus::New));
        assert_eq!("closed won".parse::<LeadStatus>(), Ok(LeadStatus::ClosedWon));
        assert_eq!("CLOSED-LOST".parse::<LeadStatus>(), Ok(LeadStatus::ClosedLost));
        assert!("WON".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_lead_status_round_trips_through_str() {
        for status in LeadStatus::ALL {
            assert_eq!(status.as_str().parse::<LeadStatus>(), Ok(status));
        }
        assert!(LeadStatus::Rejected.is_closed());
        assert!(!LeadStatus::Negotiation.is_closed());
    }

    #[test]
    fn test_lead_priority_parse() {
        assert_eq!("URGENT".parse::<LeadPriority>(), Ok(LeadPriority::Urgent));
        assert!("critical".parse::<LeadPriority>().is_err());
    }

    #[test]
    fn test_pagination() {
        assert_eq!(pagination(None, None), (1, 25, 0));
        assert_eq!(pagination(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(pagination(Some(0), Some(1000)), (1, 100, 0));
    }

    #[test]
    fn test_append_status_note() {
        let at = Utc.with_ymd_and_hms(2024, 11, 2, 10, 0, 0).unwrap();
        assert_eq!(
            append_status_note(None, LeadStatus::Rejected, " Budget too low ", at),
            "[2024-11-02 REJECTED] Budget too low"
        );
        assert_eq!(
            append_status_note(Some("Called twice"), LeadStatus::ClosedWon, "Signed", at),
            "Called twice\n[2024-11-02 CLOSED_WON] Signed"
        );
    }
}
