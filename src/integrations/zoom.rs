use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::tenants::OAuthConnection;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ZoomError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Zoom API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoomMeeting {
    pub id: i64,
    pub join_url: String,
    #[serde(default)]
    pub start_url: Option<String>,
}

#[async_trait]
pub trait MeetingScheduler: Send + Sync {
    async fn create_meeting(
        &self,
        connection: &OAuthConnection,
        topic: &str,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<ZoomMeeting, ZoomError>;
}

#[derive(Debug, Clone)]
pub struct ZoomClient {
    client: Client,
    base_url: String,
}

impl ZoomClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MeetingScheduler for ZoomClient {
    async fn create_meeting(
        &self,
        connection: &OAuthConnection,
        topic: &str,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<ZoomMeeting, ZoomError> {
        // type 2 = scheduled meeting
        let body = serde_json::json!({
            "topic": topic,
            "type": 2,
            "start_time": start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "duration": duration_minutes.max(1),
            "settings": { "join_before_host": true, "waiting_room": false },
        });

        let response = self
            .client
            .post(format!("{}/users/me/meetings", self.base_url))
            .bearer_auth(&connection.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ZoomError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ZoomError::Api(format!("HTTP {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| ZoomError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_meeting() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/me/meetings")
            .match_header("authorization", "Bearer zoom-token")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":81234567890,"join_url":"https://zoom.us/j/81234567890"}"#)
            .create_async()
            .await;

        let client = ZoomClient::new(&server.url());
        let conn = OAuthConnection {
            access_token: "zoom-token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            account_email: None,
        };

        let meeting = client
            .create_meeting(&conn, "Consultation", Utc::now(), 30)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(meeting.join_url, "https://zoom.us/j/81234567890");
    }
}
