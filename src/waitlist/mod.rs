//! Visitors waiting for a slot to open up.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::calendar::CalendarEvent;
use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::email::{self, templates};
use crate::storage::{Entity, Repository, Result};
use crate::tenants::{normalize_email, Tenant};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: String,
    /// The event the visitor is waiting for; `None` means any opening.
    #[serde(default)]
    pub event_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notified_at: Option<DateTime<Utc>>,
}

impl Entity for WaitlistEntry {
    const KIND: &'static str = "WAITLIST";

    fn entity_id(&self) -> String {
        self.id.clone()
    }
}

pub fn waitlist_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::WAITLIST, get(list_entries).post(add_entry))
        .route(ApiUrls::WAITLIST_BY_ID, delete(remove_entry))
}

/// Oldest entry for `event_id` that has not been notified yet.
pub async fn next_waiting(
    repo: &Repository,
    tenant_id: &str,
    event_id: &str,
) -> Result<Option<WaitlistEntry>> {
    let entries: Vec<WaitlistEntry> = repo.list(tenant_id).await?;
    Ok(entries
        .into_iter()
        .filter(|e| e.notified_at.is_none() && e.event_id.as_deref() == Some(event_id))
        .min_by_key(|e| e.created_at))
}

/// Tells the next visitor waiting for `event` that a spot opened, and marks
/// them notified. Problems are appended to `warnings`.
pub async fn notify_spot_opened(
    state: &AppState,
    tenant: &Tenant,
    event: &CalendarEvent,
    warnings: &mut Vec<String>,
) -> Option<WaitlistEntry> {
    let mut entry = match next_waiting(&state.repo, &tenant.id, &event.id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => return None,
        Err(e) => {
            warnings.push(format!("Waitlist lookup failed: {e}"));
            return None;
        }
    };

    let booking_url = format!("{}/{}/book", state.config.server.base_url, tenant.slug);
    let message = templates::waitlist_spot_opened(
        tenant,
        event,
        &entry.name,
        &entry.email,
        &booking_url,
        &tenant.sender_address(&state.config.email.from),
    );
    if !email::send_or_warn(state.mailer.as_ref(), Some(message), warnings).await {
        return None;
    }

    entry.notified_at = Some(Utc::now());
    if let Err(e) = state.repo.put(&tenant.id, &entry).await {
        warnings.push(format!("Failed to mark waitlist entry {} notified: {e}", entry.id));
    }
    info!("Notified waitlist entry {} for event {}", entry.id, event.id);
    Some(entry)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistQuery {
    pub event_id: Option<String>,
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiQuery(query): ApiQuery<WaitlistQuery>,
) -> ApiResult<Vec<WaitlistEntry>> {
    let mut entries: Vec<WaitlistEntry> = state.repo.list(current.id()).await?;
    if let Some(event_id) = query.event_id {
        entries.retain(|e| e.event_id.as_deref() == Some(event_id.as_str()));
    }
    entries.sort_by_key(|e| e.created_at);
    ok(entries)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEntryRequest {
    pub event_id: Option<String>,
    pub name: String,
    pub email: String,
    pub note: Option<String>,
}

async fn add_entry(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<AddEntryRequest>,
) -> ApiResult<WaitlistEntry> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    let email = normalize_email(&req.email)
        .ok_or_else(|| ApiError::Validation("Invalid email address".to_string()))?;

    if let Some(event_id) = &req.event_id {
        state
            .repo
            .get::<CalendarEvent>(current.id(), event_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Event"))?;
    }

    let existing: Vec<WaitlistEntry> = state.repo.list(current.id()).await?;
    if existing
        .iter()
        .any(|e| e.email == email && e.event_id == req.event_id && e.notified_at.is_none())
    {
        return Err(ApiError::Conflict("Already on the waitlist".to_string()));
    }

    let entry = WaitlistEntry {
        id: uuid::Uuid::new_v4().to_string(),
        event_id: req.event_id,
        name: req.name.trim().to_string(),
        email,
        note: req.note,
        created_at: Utc::now(),
        notified_at: None,
    };
    state.repo.put(current.id(), &entry).await?;
    ok(entry)
}

async fn remove_entry(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    if !state.repo.delete::<WaitlistEntry>(current.id(), &id).await? {
        return Err(ApiError::not_found("Waitlist entry"));
    }
    ok(serde_json::json!({ "deleted": id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(event_id: Option<&str>, age_minutes: i64) -> WaitlistEntry {
        WaitlistEntry {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.map(String::from),
            name: "Visitor".to_string(),
            email: "v@example.com".to_string(),
            note: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            notified_at: None,
        }
    }

    #[tokio::test]
    async fn test_next_waiting_is_oldest_unnotified_for_event() {
        let repo = Repository::in_memory();
        let oldest = entry(Some("e1"), 30);
        let mut notified = entry(Some("e1"), 60);
        notified.notified_at = Some(Utc::now());
        let newer = entry(Some("e1"), 5);
        let other_event = entry(Some("e2"), 90);

        for e in [&oldest, &notified, &newer, &other_event] {
            repo.put("t1", e).await.unwrap();
        }

        let next = next_waiting(&repo, "t1", "e1").await.unwrap().unwrap();
        assert_eq!(next.id, oldest.id);
        assert!(next_waiting(&repo, "t1", "e3").await.unwrap().is_none());
    }
}
