//! Webhook payloads. Two shapes arrive: the Meta Cloud API envelope
//! (`entry[].changes[].value.messages[]`) and the Interakt envelope
//! (`data.message` plus `data.customer`).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<MetaEntry>,
    pub data: Option<InteraktData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetaEntry {
    #[serde(default)]
    pub changes: Vec<MetaChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetaChange {
    #[serde(default)]
    pub value: MetaValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetaValue {
    #[serde(default)]
    pub messages: Vec<MetaMessage>,
    #[serde(default)]
    pub contacts: Vec<MetaContact>,
}

#[derive(Debug, Deserialize)]
pub struct MetaMessage {
    pub id: String,
    pub from: String,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<MetaText>,
}

#[derive(Debug, Deserialize)]
pub struct MetaText {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct MetaContact {
    pub wa_id: Option<String>,
    pub profile: Option<MetaProfile>,
}

#[derive(Debug, Deserialize)]
pub struct MetaProfile {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InteraktData {
    pub message: Option<InteraktMessage>,
    pub customer: Option<InteraktCustomer>,
}

#[derive(Debug, Deserialize)]
pub struct InteraktMessage {
    pub id: Option<String>,
    pub message: Option<String>,
    pub received_at_utc: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InteraktCustomer {
    pub channel_phone_number: Option<String>,
    pub phone_number: Option<String>,
    pub traits: Option<serde_json::Value>,
}

/// One client message, normalized from either envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message_id: String,
    pub phone: String,
    pub client_name: Option<String>,
    pub message_type: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Digits only; a leading `91` country code or trunk `0` is dropped from
/// Indian numbers so both spellings compare equal.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        12 if digits.starts_with("91") => digits[2..].to_string(),
        11 if digits.starts_with('0') => digits[1..].to_string(),
        _ => digits,
    }
}

fn parse_received_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

impl WebhookPayload {
    pub fn into_messages(self, now: DateTime<Utc>) -> Vec<InboundMessage> {
        let mut messages = Vec::new();

        for change in self.entry.into_iter().flat_map(|entry| entry.changes) {
            let contacts = change.value.contacts;
            for message in change.value.messages {
                let client_name = contacts
                    .iter()
                    .find(|c| c.wa_id.as_deref() == Some(message.from.as_str()))
                    .and_then(|c| c.profile.as_ref())
                    .and_then(|p| p.name.clone());
                let message_type = message.kind.unwrap_or_else(|| "text".to_string());
                let body = match message.text {
                    Some(text) => text.body,
                    None => format!("[{message_type}]"),
                };
                let sent_at = message
                    .timestamp
                    .and_then(|t| t.parse::<i64>().ok())
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .unwrap_or(now);
                messages.push(InboundMessage {
                    message_id: message.id,
                    phone: normalize_phone(&message.from),
                    client_name,
                    message_type,
                    body,
                    sent_at,
                });
            }
        }

        if let Some(InteraktData {
            message: Some(message),
            customer: Some(customer),
        }) = self.data
        {
            let phone = customer
                .channel_phone_number
                .or(customer.phone_number)
                .map(|p| normalize_phone(&p))
                .filter(|p| !p.is_empty());
            if let (Some(phone), Some(body)) = (phone, message.message) {
                let client_name = customer
                    .traits
                    .as_ref()
                    .and_then(|t| t.get("name").or_else(|| t.get("User")))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
                messages.push(InboundMessage {
                    message_id: message
                        .id
                        .unwrap_or_else(|| format!("interakt-{}", uuid::Uuid::new_v4())),
                    phone,
                    client_name,
                    message_type: "text".to_string(),
                    body,
                    sent_at: message
                        .received_at_utc
                        .as_deref()
                        .and_then(parse_received_at)
                        .unwrap_or(now),
                });
            }
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+91 98765 43210"), "9876543210");
        assert_eq!(normalize_phone("919876543210"), "9876543210");
        assert_eq!(normalize_phone("09876543210"), "9876543210");
        assert_eq!(normalize_phone("+1 (415) 555-0100"), "14155550100");
    }

    #[test]
    fn test_meta_envelope() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "contacts": [{"wa_id": "919876543210", "profile": {"name": "Priya"}}],
                        "messages": [
                            {
                                "id": "wamid.1",
                                "from": "919876543210",
                                "timestamp": "1736400000",
                                "type": "text",
                                "text": {"body": "Is the Sangeet package available?"}
                            },
                            {"id": "wamid.2", "from": "919876543210", "type": "image"}
                        ]
                    }
                }]
            }]
        }))
        .unwrap();
        let now = Utc::now();
        let messages = payload.into_messages(now);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].phone, "9876543210");
        assert_eq!(messages[0].client_name.as_deref(), Some("Priya"));
        assert_eq!(messages[0].sent_at.timestamp(), 1_736_400_000);
        assert_eq!(messages[1].body, "[image]");
        assert_eq!(messages[1].sent_at, now);
    }

    #[test]
    fn test_interakt_envelope() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "data": {
                "customer": {
                    "channel_phone_number": "+919876543210",
                    "traits": {"name": "Rahul"}
                },
                "message": {
                    "id": "ik-77",
                    "message": "Please share the quotation",
                    "received_at_utc": "2025-01-09T10:15:00.000000"
                }
            }
        }))
        .unwrap();
        let messages = payload.into_messages(Utc::now());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, "ik-77");
        assert_eq!(messages[0].phone, "9876543210");
        assert_eq!(messages[0].client_name.as_deref(), Some("Rahul"));
        assert_eq!(messages[0].sent_at.to_rfc3339(), "2025-01-09T10:15:00+00:00");
    }

    #[test]
    fn test_empty_payload_has_no_messages() {
        let payload: WebhookPayload = serde_json::from_value(json!({"object": "whatsapp_business_account"})).unwrap();
        assert!(payload.into_messages(Utc::now()).is_empty());
    }
}
