use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::hms::HmsError;
use super::transcripts::{room_index_key, MeetingTranscript, TranscriptSegment, TranscriptStatus};
use crate::calendar::CalendarEvent;
use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

const WEBHOOK_SECRET_HEADER: &str = "x-hms-webhook-secret";

pub fn meet_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::CALENDAR_EVENT_RECORDING_START, post(start_recording))
        .route(ApiUrls::CALENDAR_EVENT_RECORDING_STOP, post(stop_recording))
        .route(ApiUrls::CALENDAR_EVENT_TRANSCRIPT, get(get_transcript))
        .route(ApiUrls::CALENDAR_EVENT_JOIN, post(join_room))
        .route(ApiUrls::WEBHOOK_HMS, post(hms_webhook))
}

impl From<HmsError> for ApiError {
    fn from(err: HmsError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

async fn room_for_event(
    state: &AppState,
    tenant_id: &str,
    event_id: &str,
) -> Result<(CalendarEvent, String), ApiError> {
    let event = state
        .repo
        .get::<CalendarEvent>(tenant_id, event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    let room_id = event
        .video_room_id
        .clone()
        .ok_or_else(|| ApiError::Validation("Event has no video room".to_string()))?;
    Ok((event, room_id))
}

async fn start_recording(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<MeetingTranscript> {
    let (event, room_id) = room_for_event(&state, current.id(), &id).await?;

    state.video.start_recording(&room_id).await?;
    info!("Recording started for event {} in room {room_id}", event.id);

    let transcript = match state.repo.get::<MeetingTranscript>(current.id(), &event.id).await {
        Ok(Some(mut existing)) if existing.room_id == room_id => {
            existing.advance(TranscriptStatus::Recording);
            Ok(existing)
        }
        // A transcript for another room is replaced by the new recording.
        Ok(_) => Ok(MeetingTranscript::recording(current.id(), &event.id, &room_id)),
        Err(e) => Err(e),
    };

    let saved = match transcript {
        Ok(transcript) => state
            .repo
            .put(current.id(), &transcript)
            .await
            .map(|()| transcript),
        Err(e) => Err(e),
    };

    match saved {
        Ok(transcript) => ok(transcript),
        Err(e) => {
            error!("Transcript write failed for event {}: {e}; stopping recording", event.id);
            if let Err(stop_err) = state.video.stop_recording(&room_id).await {
                error!("Failed to stop orphaned recording in room {room_id}: {stop_err}");
            }
            Err(ApiError::Storage(e))
        }
    }
}

async fn stop_recording(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<MeetingTranscript> {
    let (event, room_id) = room_for_event(&state, current.id(), &id).await?;
    let mut transcript = state
        .repo
        .get::<MeetingTranscript>(current.id(), &event.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transcript"))?;

    state.video.stop_recording(&room_id).await?;

    if transcript.advance(TranscriptStatus::Uploading) {
        state.repo.put(current.id(), &transcript).await?;
    }
    ok(transcript)
}

async fn get_transcript(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<MeetingTranscript> {
    let transcript = state
        .repo
        .get::<MeetingTranscript>(current.id(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transcript"))?;
    ok(transcript)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room_id: String,
    pub token: String,
}

async fn join_room(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<JoinResponse> {
    let (_, room_id) = room_for_event(&state, current.id(), &id).await?;
    let token = state
        .video
        .auth_token(&room_id, &current.user.claims.sub, "host")?;
    ok(JoinResponse { room_id, token })
}

#[derive(Debug, Deserialize)]
pub struct HmsWebhook {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: HmsWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct HmsWebhookData {
    pub room_id: String,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub error: Option<String>,
}

pub fn webhook_status(event_type: &str) -> Option<TranscriptStatus> {
    match event_type {
        "recording.success" | "transcription.started" => Some(TranscriptStatus::Transcribing),
        "summary.started" => Some(TranscriptStatus::Summarizing),
        "transcription.success" => Some(TranscriptStatus::Completed),
        "transcription.failed" | "recording.failed" => Some(TranscriptStatus::Failed),
        _ => None,
    }
}

async fn hms_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<HmsWebhook>,
) -> ApiResult<serde_json::Value> {
    let expected = state
        .config
        .hms
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("Webhook secret not configured".to_string()))?;
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(ApiError::Unauthorized("Invalid webhook secret".to_string()));
    }

    let Some(next) = webhook_status(&payload.event_type) else {
        return ok(serde_json::json!({ "received": true, "updated": 0 }));
    };

    let transcripts: Vec<MeetingTranscript> = state
        .repo
        .list_by_index(&room_index_key(&payload.data.room_id))
        .await?;
    if transcripts.is_empty() {
        warn!("100ms webhook {} for unknown room {}", payload.event_type, payload.data.room_id);
    }

    let mut updated = 0;
    for mut transcript in transcripts {
        if !transcript.advance(next) {
            warn!(
                "Ignoring {} for transcript {} in status {:?}",
                payload.event_type, transcript.id, transcript.status
            );
            continue;
        }
        match next {
            TranscriptStatus::Completed => {
                transcript.text = payload.data.transcript.clone();
                transcript.summary = payload.data.summary.clone();
                transcript.segments = payload.data.segments.clone();
            }
            TranscriptStatus::Failed => {
                transcript.error = payload
                    .data
                    .error
                    .clone()
                    .or_else(|| Some(payload.event_type.clone()));
            }
            _ => {}
        }
        state.repo.put(&transcript.tenant_id, &transcript).await?;
        updated += 1;
    }

    ok(serde_json::json!({ "received": true, "updated": updated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_status_mapping() {
        assert_eq!(webhook_status("recording.success"), Some(TranscriptStatus::Transcribing));
        assert_eq!(webhook_status("summary.started"), Some(TranscriptStatus::Summarizing));
        assert_eq!(webhook_status("transcription.success"), Some(TranscriptStatus::Completed));
        assert_eq!(webhook_status("transcription.failed"), Some(TranscriptStatus::Failed));
        assert_eq!(webhook_status("peer.join.success"), None);
    }
}
