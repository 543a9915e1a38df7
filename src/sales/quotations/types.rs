use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::shared::schema::quotations;
use crate::core::shared::utils::double_option;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    PendingApproval,
    Approved,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub const ALL: [QuotationStatus; 6] = [
        Self::Draft,
        Self::Sent,
        Self::PendingApproval,
        Self::Approved,
        Self::Rejected,
        Self::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Statuses only the approval workflow may set.
    pub fn is_review_state(&self) -> bool {
        matches!(self, Self::PendingApproval | Self::Approved | Self::Rejected)
    }

    /// A quotation can be sent for approval while it is still being worked on
    /// or after a rejection.
    pub fn can_submit_for_approval(&self) -> bool {
        matches!(self, Self::Draft | Self::Sent | Self::Rejected)
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Invalid quotation status: {s}"))
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = quotations)]
pub struct Quotation {
    pub id: i32,
    pub lead_id: Option<i32>,
    pub quotation_number: String,
    pub slug: String,
    pub client_name: String,
    pub bride_name: Option<String>,
    pub groom_name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub default_package: String,
    pub total_amount: BigDecimal,
    pub status: String,
    pub quotation_data: serde_json::Value,
    pub events_count: i32,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_comments: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = quotations)]
pub struct NewQuotation {
    pub lead_id: Option<i32>,
    pub quotation_number: String,
    pub slug: String,
    pub client_name: String,
    pub bride_name: Option<String>,
    pub groom_name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub default_package: String,
    pub total_amount: BigDecimal,
    pub status: String,
    pub quotation_data: serde_json::Value,
    pub events_count: i32,
    pub created_by: Option<i32>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = quotations)]
pub struct QuotationChangeset {
    pub lead_id: Option<Option<i32>>,
    pub client_name: Option<String>,
    pub bride_name: Option<Option<String>>,
    pub groom_name: Option<Option<String>>,
    pub mobile: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub default_package: Option<String>,
    pub total_amount: Option<BigDecimal>,
    pub quotation_data: Option<serde_json::Value>,
    pub events_count: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuotationRequest {
    pub lead_id: Option<i32>,
    #[serde(default)]
    pub client_name: String,
    pub bride_name: Option<String>,
    pub groom_name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub default_package: Option<String>,
    pub total_amount: Option<BigDecimal>,
    pub quotation_data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuotationRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub lead_id: Option<Option<i32>>,
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub bride_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub groom_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub mobile: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    pub default_package: Option<String>,
    pub total_amount: Option<BigDecimal>,
    pub quotation_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuotationStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuotationListQuery {
    pub status: Option<String>,
    pub lead_id: Option<i32>,
    pub limit: Option<i64>,
}

pub const DEFAULT_PACKAGE: &str = "basic";

/// `QT-<year>-<sequence>` with the sequence zero padded to four digits.
pub fn format_quotation_number(year: i32, sequence: i64) -> String {
    format!("QT-{year}-{sequence:04}")
}

/// Lowercase ASCII alphanumerics; every other run of characters becomes one `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Number of entries in the `events` array of the quotation payload.
pub fn count_events(data: &serde_json::Value) -> i32 {
    data.get("events")
        .and_then(serde_json::Value::as_array)
        .map_or(0, |events| i32::try_from(events.len()).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_quotation_number() {
        assert_eq!(format_quotation_number(2024, 7), "QT-2024-0007");
        assert_eq!(format_quotation_number(2025, 12345), "QT-2025-12345");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("QT-2024-0007"), "qt-2024-0007");
        assert_eq!(slugify("  Sharma & Kapoor  Wedding!"), "sharma-kapoor-wedding");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_count_events() {
        assert_eq!(count_events(&json!({"events": [{"name": "Haldi"}, {"name": "Sangeet"}]})), 2);
        assert_eq!(count_events(&json!({"events": "none"})), 0);
        assert_eq!(count_events(&json!({})), 0);
    }

    #[test]
    fn test_quotation_status_parse() {
        assert_eq!(" Approved ".parse::<QuotationStatus>(), Ok(QuotationStatus::Approved));
        assert_eq!(
            "pending_approval".parse::<QuotationStatus>(),
            Ok(QuotationStatus::PendingApproval)
        );
        assert!("paid".parse::<QuotationStatus>().is_err());
    }

    #[test]
    fn test_review_states() {
        assert!(QuotationStatus::PendingApproval.is_review_state());
        assert!(QuotationStatus::Approved.is_review_state());
        assert!(!QuotationStatus::Sent.is_review_state());
        assert!(QuotationStatus::Rejected.can_submit_for_approval());
        assert!(!QuotationStatus::PendingApproval.can_submit_for_approval());
        assert!(!QuotationStatus::Approved.can_submit_for_approval());
        assert_eq!(
            serde_json::to_value(QuotationStatus::PendingApproval).unwrap(),
            json!("pending_approval")
        );
    }
}
