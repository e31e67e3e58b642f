//! Pushes calendar events to the tenant's connected Google and Outlook calendars.
//!
//! Every push is awaited. Failures never abort the request that triggered them;
//! they are collected into a [`SyncReport`] and returned to the caller.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::types::{CalendarEvent, EventStatus};
use crate::integrations::{IntegrationProvider, OAuthProvider};
use crate::tenants::{CalendarConnection, Tenant};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn provider(&self) -> IntegrationProvider;

    /// Creates the event when `external_id` is `None`, otherwise updates it.
    /// Returns the provider's id for the event.
    async fn upsert_event(
        &self,
        connection: &CalendarConnection,
        event: &CalendarEvent,
        external_id: Option<&str>,
    ) -> Result<String, SyncError>;

    /// Removing an event the provider no longer knows about is not an error.
    async fn delete_event(
        &self,
        connection: &CalendarConnection,
        external_id: &str,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub provider: IntegrationProvider,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub pushed: usize,
    pub removed: usize,
    pub failures: Vec<SyncFailure>,
    /// Set when an OAuth token was refreshed and the tenant must be saved.
    #[serde(skip)]
    pub tenant_changed: bool,
}

pub struct SyncTarget {
    pub calendar: Arc<dyn CalendarProvider>,
    pub oauth: Arc<dyn OAuthProvider>,
}

enum Outcome {
    Pushed(String),
    Removed,
    Failed(String),
}

pub struct CalendarSync {
    targets: Vec<SyncTarget>,
}

impl CalendarSync {
    pub fn new(targets: Vec<SyncTarget>) -> Self {
        Self { targets }
    }

    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Fresh connections for every enabled provider. Expired tokens are
    /// refreshed and written back onto the tenant.
    async fn connections(
        &self,
        tenant: &mut Tenant,
        report: &mut SyncReport,
    ) -> Vec<(&dyn CalendarProvider, CalendarConnection)> {
        let mut active = Vec::new();
        let now = Utc::now();

        for target in &self.targets {
            let provider = target.calendar.provider();
            let Some(connection) = tenant.calendar_connection(provider).cloned() else {
                continue;
            };
            if !connection.sync_enabled {
                continue;
            }

            if !connection.oauth.needs_refresh(now) {
                active.push((target.calendar.as_ref(), connection));
                continue;
            }

            match target.oauth.refresh(&connection.oauth).await {
                Ok(oauth) => {
                    info!("Refreshed {provider} token for tenant {}", tenant.id);
                    let refreshed = CalendarConnection {
                        oauth,
                        ..connection
                    };
                    tenant.set_calendar_connection(provider, Some(refreshed.clone()));
                    report.tenant_changed = true;
                    active.push((target.calendar.as_ref(), refreshed));
                }
                Err(e) => {
                    warn!("Skipping {provider} sync for tenant {}: {e}", tenant.id);
                    report.failures.push(SyncFailure {
                        event_id: None,
                        provider,
                        message: SyncError::TokenRefresh(e.to_string()).to_string(),
                    });
                }
            }
        }
        active
    }

    /// Upserts live events and removes cancelled ones. External ids on
    /// `events` are updated in place; the caller persists them.
    pub async fn push(&self, tenant: &mut Tenant, events: &mut [CalendarEvent]) -> SyncReport {
        let mut report = SyncReport::default();
        let connections = self.connections(tenant, &mut report).await;
        if connections.is_empty() || events.is_empty() {
            return report;
        }

        let mut jobs = Vec::new();
        for (index, event) in events.iter().enumerate() {
            for (calendar, connection) in &connections {
                let provider = calendar.provider();
                let external_id = event.external_id(provider);
                let cancelled = event.status == EventStatus::Cancelled;
                if cancelled && external_id.is_none() {
                    continue;
                }
                jobs.push(async move {
                    let outcome = match (cancelled, external_id) {
                        (true, Some(id)) => match calendar.delete_event(connection, id).await {
                            Ok(()) => Outcome::Removed,
                            Err(e) => Outcome::Failed(e.to_string()),
                        },
                        _ => match calendar.upsert_event(connection, event, external_id).await {
                            Ok(id) => Outcome::Pushed(id),
                            Err(e) => Outcome::Failed(e.to_string()),
                        },
                    };
                    (index, provider, outcome)
                });
            }
        }

        let results = join_all(jobs).await;
        for (index, provider, outcome) in results {
            let event = &mut events[index];
            match outcome {
                Outcome::Pushed(id) => {
                    event.set_external_id(provider, Some(id));
                    report.pushed += 1;
                }
                Outcome::Removed => {
                    event.set_external_id(provider, None);
                    report.removed += 1;
                }
                Outcome::Failed(message) => {
                    warn!("{provider} sync failed for event {}: {message}", event.id);
                    report.failures.push(SyncFailure {
                        event_id: Some(event.id.clone()),
                        provider,
                        message,
                    });
                }
            }
        }
        report
    }

    /// Removes deleted events from every connected calendar.
    pub async fn remove(&self, tenant: &mut Tenant, events: &[CalendarEvent]) -> SyncReport {
        let mut report = SyncReport::default();
        let connections = self.connections(tenant, &mut report).await;

        let mut jobs = Vec::new();
        for event in events {
            for (calendar, connection) in &connections {
                let provider = calendar.provider();
                let Some(external_id) = event.external_id(provider) else {
                    continue;
                };
                jobs.push(async move {
                    let result = calendar.delete_event(connection, external_id).await;
                    (event.id.as_str(), provider, result)
                });
            }
        }

        for (event_id, provider, result) in join_all(jobs).await {
            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!("{provider} delete failed for event {event_id}: {e}");
                    report.failures.push(SyncFailure {
                        event_id: Some(event_id.to_string()),
                        provider,
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::{connected_tenant, FakeCalendar, FakeOAuth};
    use chrono::Duration;

    fn event(tenant: &Tenant) -> CalendarEvent {
        let start = Utc::now() + Duration::days(1);
        CalendarEvent::new(&tenant.id, "Consultation", start, start + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_push_records_external_ids() {
        let google = Arc::new(FakeCalendar::new(IntegrationProvider::Google));
        let sync = CalendarSync::new(vec![SyncTarget {
            calendar: google.clone(),
            oauth: Arc::new(FakeOAuth::default()),
        }]);
        let mut tenant = connected_tenant(false);
        let mut events = vec![event(&tenant)];

        let report = sync.push(&mut tenant, &mut events).await;
        assert_eq!(report.pushed, 1);
        assert!(report.failures.is_empty());
        assert!(!report.tenant_changed);
        assert_eq!(events[0].google_event_id.as_deref(), Some("google-1"));
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let google = Arc::new(FakeCalendar::failing(IntegrationProvider::Google));
        let sync = CalendarSync::new(vec![SyncTarget {
            calendar: google,
            oauth: Arc::new(FakeOAuth::default()),
        }]);
        let mut tenant = connected_tenant(false);
        let mut events = vec![event(&tenant), event(&tenant)];

        let report = sync.push(&mut tenant, &mut events).await;
        assert_eq!(report.pushed, 0);
        assert_eq!(report.failures.len(), 2);
        assert!(events.iter().all(|e| e.google_event_id.is_none()));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let google = Arc::new(FakeCalendar::new(IntegrationProvider::Google));
        let sync = CalendarSync::new(vec![SyncTarget {
            calendar: google,
            oauth: Arc::new(FakeOAuth::default()),
        }]);
        let mut tenant = connected_tenant(true);
        let mut events = vec![event(&tenant)];

        let report = sync.push(&mut tenant, &mut events).await;
        assert!(report.tenant_changed);
        let conn = tenant
            .calendar_connection(IntegrationProvider::Google)
            .unwrap();
        assert_eq!(conn.oauth.access_token, "refreshed-token");
    }

    #[tokio::test]
    async fn test_cancelled_event_is_removed() {
        let google = Arc::new(FakeCalendar::new(IntegrationProvider::Google));
        let sync = CalendarSync::new(vec![SyncTarget {
            calendar: google.clone(),
            oauth: Arc::new(FakeOAuth::default()),
        }]);
        let mut tenant = connected_tenant(false);
        let mut cancelled = event(&tenant);
        cancelled.status = EventStatus::Cancelled;
        cancelled.google_event_id = Some("g-77".to_string());
        let mut events = vec![cancelled];

        let report = sync.push(&mut tenant, &mut events).await;
        assert_eq!(report.removed, 1);
        assert!(events[0].google_event_id.is_none());
        assert_eq!(google.deleted(), vec!["g-77".to_string()]);
    }

    #[tokio::test]
    async fn test_disconnected_tenant_is_noop() {
        let sync = CalendarSync::new(vec![SyncTarget {
            calendar: Arc::new(FakeCalendar::new(IntegrationProvider::Outlook)),
            oauth: Arc::new(FakeOAuth::default()),
        }]);
        let mut tenant = connected_tenant(false);
        let mut events = vec![event(&tenant)];

        let report = sync.push(&mut tenant, &mut events).await;
        assert_eq!(report.pushed, 0);
        assert!(report.failures.is_empty());
    }
}
