// Microsoft Graph calendar client used for outbound event sync
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::IntegrationProvider;
use crate::calendar::{CalendarEvent, CalendarProvider, SyncError};
use crate::tenants::CalendarConnection;

#[derive(Debug, Clone)]
pub struct OutlookCalendarClient {
    client: Client,
    base_url: String,
}

impl OutlookCalendarClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn event_body(event: &CalendarEvent) -> serde_json::Value {
        let mut body = json!({
            "subject": event.title,
            "body": { "contentType": "text", "content": event.sync_description() },
            "start": {
                "dateTime": event.start_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": "UTC",
            },
            "end": {
                "dateTime": event.end_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": "UTC",
            },
        });
        if let Some(location) = &event.location {
            body["location"] = json!({ "displayName": location });
        }
        if let Some(attendee) = &event.attendee {
            body["attendees"] = json!([{
                "emailAddress": { "address": attendee.email, "name": attendee.name },
                "type": "required",
            }]);
        }
        body
    }
}

#[async_trait]
impl CalendarProvider for OutlookCalendarClient {
    fn provider(&self) -> IntegrationProvider {
        IntegrationProvider::Outlook
    }

    async fn upsert_event(
        &self,
        connection: &CalendarConnection,
        event: &CalendarEvent,
        external_id: Option<&str>,
    ) -> Result<String, SyncError> {
        let body = Self::event_body(event);
        let request = match external_id {
            Some(id) => self.client.patch(format!(
                "{}/me/events/{}",
                self.base_url,
                urlencoding::encode(id)
            )),
            None => self.client.post(format!("{}/me/events", self.base_url)),
        };

        let response = request
            .bearer_auth(&connection.oauth.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Api { status, message });
        }

        #[derive(Deserialize)]
        struct GraphEvent {
            id: String,
        }

        let saved: GraphEvent = response
            .json()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))?;
        Ok(saved.id)
    }

    async fn delete_event(
        &self,
        connection: &CalendarConnection,
        external_id: &str,
    ) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(format!(
                "{}/me/events/{}",
                self.base_url,
                urlencoding::encode(external_id)
            ))
            .bearer_auth(&connection.oauth.access_token)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_event_body_uses_utc_wall_time() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let mut event = CalendarEvent::new("t1", "Intro call", start, start + chrono::Duration::minutes(30));
        event.location = Some("Studio A".to_string());

        let body = OutlookCalendarClient::event_body(&event);
        assert_eq!(body["subject"], "Intro call");
        assert_eq!(body["start"]["dateTime"], "2025-03-01T09:30:00");
        assert_eq!(body["end"]["timeZone"], "UTC");
        assert_eq!(body["location"]["displayName"], "Studio A");
    }
}
