use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::payload::InboundMessage;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{leads, quotations, whatsapp_messages};
use crate::core::shared::utils::{non_blank, with_conn, DbPool};
use crate::notifications::service::{self as notifications, NewNotification};

pub const INCOMING: &str = "incoming";
pub const OUTGOING: &str = "outgoing";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const PREVIEW_CHARS: usize = 80;
/// Phone columns are matched on their last ten digits.
const MATCH_DIGITS: usize = 10;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = whatsapp_messages)]
pub struct WhatsappMessage {
    pub id: i32,
    pub message_id: String,
    pub lead_id: Option<i32>,
    pub quotation_id: Option<i32>,
    pub client_phone: String,
    pub client_name: Option<String>,
    pub direction: String,
    pub message_type: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = whatsapp_messages)]
struct NewWhatsappMessage<'a> {
    message_id: &'a str,
    lead_id: Option<i32>,
    quotation_id: Option<i32>,
    client_phone: &'a str,
    client_name: Option<&'a str>,
    direction: &'a str,
    message_type: &'a str,
    body: &'a str,
    sent_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageListQuery {
    pub lead_id: Option<i32>,
    pub phone: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    pub received: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub linked: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageStats {
    pub total: i64,
    pub incoming: i64,
    pub outgoing: i64,
    pub unlinked: i64,
}

fn match_pattern(phone: &str) -> Option<String> {
    let tail_start = phone.len().saturating_sub(MATCH_DIGITS);
    let tail = &phone[tail_start..];
    (!tail.is_empty()).then(|| format!("%{tail}%"))
}

/// The most recently touched lead with this phone, else the lead behind the
/// most recent quotation with this mobile number.
fn find_links(
    conn: &mut PgConnection,
    phone: &str,
) -> ApiResult<(Option<(i32, Option<i32>, String)>, Option<i32>)> {
    let Some(pattern) = match_pattern(phone) else {
        return Ok((None, None));
    };

    let quotation: Option<(i32, Option<i32>)> = quotations::table
        .filter(quotations::mobile.assume_not_null().ilike(pattern.as_str()))
        .order(quotations::updated_at.desc())
        .select((quotations::id, quotations::lead_id))
        .first(conn)
        .optional()?;

    let mut lead: Option<(i32, Option<i32>, String)> = leads::table
        .filter(leads::phone.assume_not_null().ilike(pattern.as_str()))
        .order(leads::updated_at.desc())
        .select((leads::id, leads::assigned_to, leads::client_name))
        .first(conn)
        .optional()?;
    if lead.is_none() {
        if let Some(lead_id) = quotation.and_then(|(_, lead_id)| lead_id) {
            lead = leads::table
                .find(lead_id)
                .select((leads::id, leads::assigned_to, leads::client_name))
                .first(conn)
                .optional()?;
        }
    }
    Ok((lead, quotation.map(|(id, _)| id)))
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

/// Stores each message once (by `message_id`), links it to a lead and
/// quotation by phone number and notifies the lead's assignee.
pub async fn ingest(pool: &DbPool, messages: Vec<InboundMessage>) -> ApiResult<IngestSummary> {
    let summary = with_conn(pool, move |conn| {
        let mut summary = IngestSummary {
            received: messages.len(),
            ..IngestSummary::default()
        };
        for message in &messages {
            conn.transaction::<_, ApiError, _>(|conn| {
                let (lead, quotation_id) = find_links(conn, &message.phone)?;
                let client_name = non_blank(message.client_name.clone());
                let inserted = diesel::insert_into(whatsapp_messages::table)
                    .values(&NewWhatsappMessage {
                        message_id: &message.message_id,
                        lead_id: lead.as_ref().map(|(id, _, _)| *id),
                        quotation_id,
                        client_phone: &message.phone,
                        client_name: client_name.as_deref(),
                        direction: INCOMING,
                        message_type: &message.message_type,
                        body: &message.body,
                        sent_at: message.sent_at,
                    })
                    .on_conflict(whatsapp_messages::message_id)
                    .do_nothing()
                    .execute(conn)?;
                if inserted == 0 {
                    debug!("Skipping duplicate WhatsApp message {}", message.message_id);
                    summary.duplicates += 1;
                    return Ok(());
                }

                summary.stored += 1;
                if let Some((lead_id, assigned_to, lead_name)) = lead {
                    summary.linked += 1;
                    if let Some(employee_id) = assigned_to {
                        let sender = client_name.as_deref().unwrap_or(&lead_name);
                        notifications::insert(
                            conn,
                            &NewNotification::whatsapp_message(
                                employee_id,
                                lead_id,
                                sender,
                                &preview(&message.body),
                            ),
                        )?;
                    }
                }
                Ok(())
            })?;
        }
        Ok(summary)
    })
    .await?;

    info!(
        "WhatsApp webhook: {} received, {} stored, {} duplicate(s), {} linked to leads",
        summary.received, summary.stored, summary.duplicates, summary.linked
    );
    Ok(summary)
}

pub async fn list(pool: &DbPool, query: MessageListQuery) -> ApiResult<Vec<WhatsappMessage>> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);
    let phone = non_blank(query.phone).map(|p| super::payload::normalize_phone(&p));

    with_conn(pool, move |conn| {
        let mut q = whatsapp_messages::table.into_boxed();
        if let Some(lead_id) = query.lead_id {
            q = q.filter(whatsapp_messages::lead_id.eq(lead_id));
        }
        if let Some(phone) = phone {
            q = q.filter(whatsapp_messages::client_phone.eq(phone));
        }
        Ok(q
            .order((whatsapp_messages::sent_at.desc(), whatsapp_messages::id.desc()))
            .limit(limit)
            .select(WhatsappMessage::as_select())
            .load(conn)?)
    })
    .await
}

pub async fn stats(pool: &DbPool) -> ApiResult<MessageStats> {
    with_conn(pool, |conn| {
        let by_direction: Vec<(String, i64)> = whatsapp_messages::table
            .group_by(whatsapp_messages::direction)
            .select((whatsapp_messages::direction, count_star()))
            .load(conn)?;
        let unlinked: i64 = whatsapp_messages::table
            .filter(whatsapp_messages::lead_id.is_null())
            .count()
            .get_result(conn)?;
        let count_of = |direction: &str| {
            by_direction
                .iter()
                .find(|(d, _)| d == direction)
                .map_or(0, |(_, n)| *n)
        };
        Ok(MessageStats {
            total: by_direction.iter().map(|(_, n)| n).sum(),
            incoming: count_of(INCOMING),
            outgoing: count_of(OUTGOING),
            unlinked,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_pattern_uses_last_ten_digits() {
        assert_eq!(match_pattern("9876543210").as_deref(), Some("%9876543210%"));
        assert_eq!(match_pattern("14155550100").as_deref(), Some("%4155550100%"));
        assert_eq!(match_pattern(""), None);
    }

    #[test]
    fn test_preview_truncates_long_bodies() {
        assert_eq!(preview("Hello"), "Hello");
        let long = "a".repeat(120);
        let short = preview(&long);
        assert_eq!(short.chars().count(), PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));
    }
}
