// Google Calendar v3 client used for outbound event sync
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::IntegrationProvider;
use crate::calendar::{CalendarEvent, CalendarProvider, SyncError};
use crate::tenants::CalendarConnection;

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self, connection: &CalendarConnection) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&connection.calendar_id)
        )
    }

    fn event_body(event: &CalendarEvent) -> serde_json::Value {
        let mut body = json!({
            "summary": event.title,
            "description": event.sync_description(),
            "start": { "dateTime": event.start_time.to_rfc3339() },
            "end": { "dateTime": event.end_time.to_rfc3339() },
        });
        if let Some(location) = event.location.as_ref().or(event.meeting_link.as_ref()) {
            body["location"] = json!(location);
        }
        if let Some(attendee) = &event.attendee {
            body["attendees"] = json!([{
                "email": attendee.email,
                "displayName": attendee.name,
            }]);
        }
        body
    }
}

async fn api_error(response: reqwest::Response) -> SyncError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    SyncError::Api { status, message }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn provider(&self) -> IntegrationProvider {
        IntegrationProvider::Google
    }

    async fn upsert_event(
        &self,
        connection: &CalendarConnection,
        event: &CalendarEvent,
        external_id: Option<&str>,
    ) -> Result<String, SyncError> {
        let body = Self::event_body(event);
        let request = match external_id {
            Some(id) => self.client.put(format!(
                "{}/{}",
                self.events_url(connection),
                urlencoding::encode(id)
            )),
            None => self.client.post(self.events_url(connection)),
        };

        let response = request
            .bearer_auth(&connection.oauth.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        #[derive(Deserialize)]
        struct GoogleEvent {
            id: String,
        }

        let created: GoogleEvent = response
            .json()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    async fn delete_event(
        &self,
        connection: &CalendarConnection,
        external_id: &str,
    ) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(format!(
                "{}/{}",
                self.events_url(connection),
                urlencoding::encode(external_id)
            ))
            .bearer_auth(&connection.oauth.access_token)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(()),
            _ => Err(api_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::oauth_connection;
    use chrono::{Duration, Utc};

    fn connection() -> CalendarConnection {
        CalendarConnection::new(oauth_connection(Utc::now() + Duration::hours(1)))
    }

    #[tokio::test]
    async fn test_insert_then_update() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer access-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"gcal-1"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/calendars/primary/events/gcal-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"gcal-1"}"#)
            .create_async()
            .await;

        let client = GoogleCalendarClient::new(&server.url());
        let start = Utc::now();
        let event = CalendarEvent::new("t1", "Consultation", start, start + Duration::hours(1));

        let id = client.upsert_event(&connection(), &event, None).await.unwrap();
        assert_eq!(id, "gcal-1");
        let id = client
            .upsert_event(&connection(), &event, Some("gcal-1"))
            .await
            .unwrap();
        assert_eq!(id, "gcal-1");

        insert.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_treats_missing_as_done() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/calendars/primary/events/gone")
            .with_status(410)
            .create_async()
            .await;
        server
            .mock("DELETE", "/calendars/primary/events/locked")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let client = GoogleCalendarClient::new(&server.url());
        assert!(client.delete_event(&connection(), "gone").await.is_ok());
        assert!(matches!(
            client.delete_event(&connection(), "locked").await,
            Err(SyncError::Api { status: 403, .. })
        ));
    }
}
