use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{call_transcriptions, employees, leads};
use crate::core::shared::utils::{non_blank, require_reference, required_text, with_conn, DbPool};

const NOT_FOUND: &str = "Call recording not found";
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub const PROCESSING: &str = "processing";
pub const COMPLETED: &str = "completed";
pub const FAILED: &str = "failed";

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = call_transcriptions)]
pub struct CallRecording {
    pub id: i32,
    pub call_id: String,
    pub lead_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub duration_seconds: i32,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = call_transcriptions)]
pub struct NewCallRecording {
    pub call_id: String,
    pub lead_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub duration_seconds: i32,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub status: String,
}

impl NewCallRecording {
    /// `employee_id` falls back to the uploader when the payload names nobody.
    pub fn from_request(request: IngestCallRequest, uploader_id: i32) -> ApiResult<Self> {
        let duration_seconds = request.duration_seconds.unwrap_or(0);
        if duration_seconds < 0 {
            return Err(ApiError::bad_request("duration_seconds cannot be negative"));
        }
        let transcript = non_blank(request.transcript);
        let status = initial_status(transcript.as_deref(), request.status.as_deref())?;
        Ok(Self {
            call_id: non_blank(request.call_id).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            lead_id: request.lead_id,
            employee_id: Some(request.employee_id.unwrap_or(uploader_id)),
            client_name: non_blank(request.client_name),
            client_phone: non_blank(request.client_phone),
            duration_seconds,
            recording_url: non_blank(request.recording_url),
            transcript,
            status,
        })
    }
}

/// A transcript means the call is done; otherwise it waits in `processing`
/// unless the caller reports `failed`.
fn initial_status(transcript: Option<&str>, requested: Option<&str>) -> ApiResult<String> {
    if transcript.is_some() {
        return Ok(COMPLETED.to_string());
    }
    match requested.map(str::trim) {
        None | Some("") | Some(PROCESSING) => Ok(PROCESSING.to_string()),
        Some(FAILED) => Ok(FAILED.to_string()),
        Some(COMPLETED) => Err(ApiError::bad_request("A completed call requires a transcript")),
        Some(other) => Err(ApiError::bad_request(format!("Invalid call status: {other}"))),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestCallRequest {
    pub call_id: Option<String>,
    pub lead_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub duration_seconds: Option<i32>,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachTranscriptRequest {
    #[serde(default)]
    pub transcript: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallListQuery {
    pub lead_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub limit: Option<i64>,
}

pub async fn ingest(pool: &DbPool, recording: NewCallRecording) -> ApiResult<CallRecording> {
    let recording = with_conn(pool, move |conn| {
        if let Some(lead_id) = recording.lead_id {
            let found = diesel::select(diesel::dsl::exists(leads::table.find(lead_id))).get_result(conn)?;
            require_reference(found, "Lead")?;
        }
        if let Some(employee_id) = recording.employee_id {
            let found =
                diesel::select(diesel::dsl::exists(employees::table.find(employee_id))).get_result(conn)?;
            require_reference(found, "Employee")?;
        }
        diesel::insert_into(call_transcriptions::table)
            .values(&recording)
            .returning(CallRecording::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_conflict("A call with this call_id already exists"))
    })
    .await?;

    info!("Ingested call {} with status {}", recording.call_id, recording.status);
    Ok(recording)
}

pub async fn list(pool: &DbPool, query: CallListQuery) -> ApiResult<Vec<CallRecording>> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);

    with_conn(pool, move |conn| {
        let mut q = call_transcriptions::table.into_boxed();
        if let Some(lead_id) = query.lead_id {
            q = q.filter(call_transcriptions::lead_id.eq(lead_id));
        }
        if let Some(employee_id) = query.employee_id {
            q = q.filter(call_transcriptions::employee_id.eq(employee_id));
        }
        Ok(q
            .order((call_transcriptions::created_at.desc(), call_transcriptions::id.desc()))
            .limit(limit)
            .select(CallRecording::as_select())
            .load(conn)?)
    })
    .await
}

pub async fn find(pool: &DbPool, id: i32) -> ApiResult<CallRecording> {
    with_conn(pool, move |conn| {
        call_transcriptions::table
            .find(id)
            .select(CallRecording::as_select())
            .first(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await
}

pub async fn attach_transcript(pool: &DbPool, id: i32, transcript: &str) -> ApiResult<CallRecording> {
    let transcript = required_text(transcript, "Transcript")?;
    let recording = with_conn(pool, move |conn| {
        diesel::update(call_transcriptions::table.find(id))
            .set((
                call_transcriptions::transcript.eq(transcript),
                call_transcriptions::status.eq(COMPLETED),
                call_transcriptions::updated_at.eq(Utc::now()),
            ))
            .returning(CallRecording::as_returning())
            .get_result(conn)
            .map_err(|e| ApiError::from(e).or_not_found(NOT_FOUND))
    })
    .await?;

    info!("Attached transcript to call {}", recording.call_id);
    Ok(recording)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_marks_call_completed() {
        let request = IngestCallRequest {
            call_id: Some("call-77".into()),
            transcript: Some("Client asked about drone coverage".into()),
            ..Default::default()
        };
        let recording = NewCallRecording::from_request(request, 4).unwrap();
        assert_eq!(recording.status, COMPLETED);
        assert_eq!(recording.call_id, "call-77");
        assert_eq!(recording.employee_id, Some(4));
    }

    #[test]
    fn test_missing_call_id_is_generated() {
        let request = IngestCallRequest {
            call_id: Some("  ".into()),
            employee_id: Some(9),
            duration_seconds: Some(340),
            ..Default::default()
        };
        let recording = NewCallRecording::from_request(request, 4).unwrap();
        assert_eq!(recording.status, PROCESSING);
        assert!(uuid::Uuid::parse_str(&recording.call_id).is_ok());
        assert_eq!(recording.employee_id, Some(9));
        assert_eq!(recording.duration_seconds, 340);
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(None, Some("failed")).unwrap(), FAILED);
        assert_eq!(initial_status(Some("text"), Some("failed")).unwrap(), COMPLETED);
        assert!(initial_status(None, Some("completed")).is_err());
        assert!(initial_status(None, Some("queued")).is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let request = IngestCallRequest {
            duration_seconds: Some(-5),
            ..Default::default()
        };
        assert!(NewCallRecording::from_request(request, 1).is_err());
    }
}
