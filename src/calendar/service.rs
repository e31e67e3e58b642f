//! Calendar event workflows. Handlers stay thin; everything with side effects
//! (refunds, meeting links, email, calendar sync) is sequenced here.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::recurrence::{later_siblings, RecurrenceRule, TimeShift};
use super::sync::SyncReport;
use super::types::{group_index_key, Attendee, CalendarEvent, EventStatus, LocationType, RefundRecord, RefundStatus};
use crate::billing::refund_booking;
use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::is_hex_color;
use crate::email::{self, templates};
use crate::meet::ensure_meeting_link;
use crate::tenants::{self, Tenant};
use crate::waitlist;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
    pub notes: Option<String>,
    pub color: Option<String>,
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub update_future: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventResponse {
    pub event: CalendarEvent,
    pub shifted_events: Vec<CalendarEvent>,
    pub sync: SyncReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundRecord>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: Option<EventStatus>,
    pub location_type: Option<LocationType>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub color: Option<String>,
    pub attendee: Option<Attendee>,
    pub recurrence: Option<RecurrenceRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventResponse {
    pub events: Vec<CalendarEvent>,
    pub sync: SyncReport,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEventResponse {
    pub deleted: Vec<String>,
    pub sync: SyncReport,
}

fn validate_color(color: &str) -> Result<(), ApiError> {
    if is_hex_color(color) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("Invalid color {color}")))
    }
}

pub async fn get_event(state: &AppState, tenant_id: &str, event_id: &str) -> Result<CalendarEvent, ApiError> {
    state
        .repo
        .get::<CalendarEvent>(tenant_id, event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))
}

/// Events overlapping `[start, end)`, ordered by start time.
pub async fn list_events(
    state: &AppState,
    tenant_id: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<CalendarEvent>, ApiError> {
    let mut events: Vec<CalendarEvent> = state.repo.list(tenant_id).await?;
    events.retain(|e| {
        start.map_or(true, |s| e.end_time > s) && end.map_or(true, |en| e.start_time < en)
    });
    events.sort_by_key(|e| e.start_time);
    Ok(events)
}

pub async fn create_event(
    state: &AppState,
    mut tenant: Tenant,
    req: CreateEventRequest,
) -> Result<CreateEventResponse, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    if req.end_time <= req.start_time {
        return Err(ApiError::Validation("End time must be after start time".to_string()));
    }
    if let Some(color) = &req.color {
        validate_color(color)?;
    }

    let (occurrences, group_id) = match &req.recurrence {
        Some(rule) => (
            rule.expand(req.start_time, req.end_time)
                .map_err(ApiError::Validation)?,
            Some(uuid::Uuid::new_v4().to_string()),
        ),
        None => (vec![(req.start_time, req.end_time)], None),
    };

    let mut warnings = Vec::new();
    let mut tenant_changed = false;
    let mut events = Vec::with_capacity(occurrences.len());

    for (start, end) in occurrences {
        let mut event = CalendarEvent::new(&tenant.id, title, start, end);
        event.description = req.description.clone();
        event.status = req.status.unwrap_or(EventStatus::Scheduled);
        event.location_type = req.location_type.unwrap_or_default();
        event.location = req.location.clone();
        event.notes = req.notes.clone();
        event.color = req.color.clone();
        event.attendee = req.attendee.clone();
        event.recurrence_group_id = group_id.clone();

        if event.status == EventStatus::Scheduled {
            match ensure_meeting_link(state, &mut tenant, &mut event).await {
                Ok(changed) => tenant_changed |= changed,
                Err(e) => {
                    warn!("No meeting link for event {}: {e}", event.id);
                    warnings.push(e);
                }
            }
        }
        events.push(event);
    }

    let sync = state.calendar_sync.push(&mut tenant, &mut events).await;
    tenant_changed |= sync.tenant_changed;

    for event in &events {
        state.repo.put(&tenant.id, event).await?;
    }
    if tenant_changed {
        tenants::save(&state.repo, &tenant).await?;
    }
    info!(
        "Created {} event(s) for tenant {}{}",
        events.len(),
        tenant.id,
        group_id
            .map(|g| format!(" in group {g}"))
            .unwrap_or_default()
    );

    Ok(CreateEventResponse {
        events,
        sync,
        warnings,
    })
}

pub async fn update_event(
    state: &AppState,
    mut tenant: Tenant,
    event_id: &str,
    req: UpdateEventRequest,
) -> Result<UpdateEventResponse, ApiError> {
    let original = get_event(state, &tenant.id, event_id).await?;

    let new_start = req.start_time.unwrap_or(original.start_time);
    let new_end = req.end_time.unwrap_or(original.end_time);
    if new_end <= new_start {
        return Err(ApiError::Validation("End time must be after start time".to_string()));
    }
    if req.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::Validation("Title cannot be empty".to_string()));
    }
    if let Some(color) = &req.color {
        validate_color(color)?;
    }

    let now = Utc::now();
    let mut event = original.clone();
    event.start_time = new_start;
    event.end_time = new_end;
    if let Some(title) = &req.title {
        event.title = title.trim().to_string();
    }
    if req.description.is_some() {
        event.description = req.description.clone();
    }
    if let Some(status) = req.status {
        event.status = status;
    }
    if req.location.is_some() {
        event.location = req.location.clone();
    }
    if let Some(location_type) = req.location_type {
        event.location_type = location_type;
    }
    if req.notes.is_some() {
        event.notes = req.notes.clone();
    }
    if req.color.is_some() {
        event.color = req.color.clone();
    }
    if req.meeting_link.is_some() {
        event.meeting_link = req.meeting_link.clone();
    }
    event.updated_at = now;

    let mut shifted = Vec::new();
    if req.update_future {
        if let Some(group_id) = &original.recurrence_group_id {
            let shift = TimeShift::between(original.start_time, original.end_time, new_start, new_end);
            let siblings: Vec<CalendarEvent> = state
                .repo
                .list_by_index(&group_index_key(&tenant.id, group_id))
                .await?;

            for mut sibling in later_siblings(siblings, &event.id, original.start_time) {
                shift.apply(&mut sibling);
                if sibling.end_time <= sibling.start_time {
                    return Err(ApiError::Validation(format!(
                        "Shifting the series would end event {} before it starts",
                        sibling.id
                    )));
                }
                if let Some(title) = &req.title {
                    sibling.title = title.trim().to_string();
                }
                if req.description.is_some() {
                    sibling.description = req.description.clone();
                }
                if req.location.is_some() {
                    sibling.location = req.location.clone();
                }
                if req.color.is_some() {
                    sibling.color = req.color.clone();
                }
                sibling.updated_at = now;
                shifted.push(sibling);
            }
            info!(
                "Shifting {} later event(s) in group {group_id} by {}ms/{}ms",
                shifted.len(),
                shift.start_delta.num_milliseconds(),
                shift.end_delta.num_milliseconds()
            );
        }
    }

    let confirmed = original.status == EventStatus::Pending && event.status == EventStatus::Scheduled;
    let cancelled = original.status != EventStatus::Cancelled && event.status == EventStatus::Cancelled;

    let mut warnings = Vec::new();
    let mut tenant_changed = false;
    let mut refund = None;

    if confirmed {
        match ensure_meeting_link(state, &mut tenant, &mut event).await {
            Ok(changed) => tenant_changed |= changed,
            Err(e) => {
                warn!("No meeting link for event {}: {e}", event.id);
                warnings.push(e);
            }
        }
    }

    if cancelled {
        refund = refund_booking(state.payments.as_ref(), &tenant, &event).await;
        if let Some(record) = &refund {
            if record.status == RefundStatus::Failed {
                warnings.push(format!(
                    "Refund failed: {}",
                    record.reason.as_deref().unwrap_or("unknown error")
                ));
            }
            event.refund = Some(record.clone());
        }
    }

    let mut batch = Vec::with_capacity(shifted.len() + 1);
    batch.push(event);
    batch.extend(shifted);
    let sync = state.calendar_sync.push(&mut tenant, &mut batch).await;
    tenant_changed |= sync.tenant_changed;

    for changed in &batch {
        state.repo.put(&tenant.id, changed).await?;
    }
    if tenant_changed {
        tenants::save(&state.repo, &tenant).await?;
    }

    let event = batch.remove(0);
    let shifted_events = batch;

    let from = tenant.sender_address(&state.config.email.from);
    if confirmed {
        let message = templates::booking_confirmation(&tenant, &event, &from);
        email::send_or_warn(state.mailer.as_ref(), message, &mut warnings).await;
    }
    if cancelled {
        let message = if event.stripe_payment_intent_id.is_some() {
            templates::booking_cancellation(&tenant, &event, refund.as_ref(), &from)
        } else {
            templates::booking_declined(&tenant, &event, &from)
        };
        email::send_or_warn(state.mailer.as_ref(), message, &mut warnings).await;
        waitlist::notify_spot_opened(state, &tenant, &event, &mut warnings).await;
    }

    Ok(UpdateEventResponse {
        event,
        shifted_events,
        sync,
        refund,
        warnings,
    })
}

/// Deletes one event, or its whole recurrence group when `delete_all` is set
/// and the event has one.
pub async fn delete_event(
    state: &AppState,
    mut tenant: Tenant,
    event_id: &str,
    delete_all: bool,
) -> Result<DeleteEventResponse, ApiError> {
    let event = get_event(state, &tenant.id, event_id).await?;

    let targets = match (&event.recurrence_group_id, delete_all) {
        (Some(group_id), true) => {
            state
                .repo
                .list_by_index::<CalendarEvent>(&group_index_key(&tenant.id, group_id))
                .await?
        }
        _ => vec![event],
    };

    let mut deleted = Vec::with_capacity(targets.len());
    let mut removed = Vec::with_capacity(targets.len());
    for target in targets {
        if state.repo.delete::<CalendarEvent>(&tenant.id, &target.id).await? {
            deleted.push(target.id.clone());
            removed.push(target);
        }
    }
    info!("Deleted {} event(s) for tenant {}", deleted.len(), tenant.id);

    // Provider copies are only removed once the stored event is gone.
    let sync = state.calendar_sync.remove(&mut tenant, &removed).await;
    if sync.tenant_changed {
        tenants::save(&state.repo, &tenant).await?;
    }

    Ok(DeleteEventResponse { deleted, sync })
}
