//! 100ms video rooms, recording and client tokens.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::config::HmsConfig;

const MANAGEMENT_TOKEN_TTL_MINUTES: i64 = 10;
const AUTH_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HmsError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("100ms API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Token signing failed: {0}")]
    Token(String),
    #[error("100ms is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Returns the new room id.
    async fn create_room(&self, name: &str) -> Result<String, HmsError>;

    /// Starts cloud recording with transcription and summary enabled.
    async fn start_recording(&self, room_id: &str) -> Result<(), HmsError>;

    async fn stop_recording(&self, room_id: &str) -> Result<(), HmsError>;

    fn auth_token(&self, room_id: &str, user_id: &str, role: &str) -> Result<String, HmsError>;
}

#[derive(Debug, Serialize)]
struct ManagementClaims<'a> {
    access_key: &'a str,
    #[serde(rename = "type")]
    token_type: &'static str,
    version: u8,
    iat: i64,
    nbf: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Serialize)]
struct AppClaims<'a> {
    access_key: &'a str,
    room_id: &'a str,
    user_id: &'a str,
    role: &'a str,
    #[serde(rename = "type")]
    token_type: &'static str,
    version: u8,
    iat: i64,
    nbf: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Clone)]
pub struct HmsClient {
    client: Client,
    config: HmsConfig,
}

impl HmsClient {
    pub fn new(config: HmsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), HmsError> {
        match (&self.config.access_key, &self.config.secret) {
            (Some(key), Some(secret)) => Ok((key.as_str(), secret.as_str())),
            _ => Err(HmsError::NotConfigured),
        }
    }

    fn management_token(&self) -> Result<String, HmsError> {
        let (access_key, secret) = self.credentials()?;
        let now = Utc::now();
        let claims = ManagementClaims {
            access_key,
            token_type: "management",
            version: 2,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::minutes(MANAGEMENT_TOKEN_TTL_MINUTES)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| HmsError::Token(e.to_string()))
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, HmsError> {
        let token = self.management_token()?;
        let response = self
            .client
            .post(format!("{}{path}", self.config.api_base.trim_end_matches('/')))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| HmsError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HmsError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(HmsError::Api(format!("HTTP {status}: {text}")));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| HmsError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Room {
    id: String,
}

#[async_trait]
impl VideoProvider for HmsClient {
    async fn create_room(&self, name: &str) -> Result<String, HmsError> {
        let mut body = serde_json::json!({ "name": name });
        if let Some(template) = &self.config.template_id {
            body["template_id"] = serde_json::json!(template);
        }
        let value = self.post("/rooms", body).await?;
        let room: Room = serde_json::from_value(value).map_err(|e| HmsError::Parse(e.to_string()))?;
        Ok(room.id)
    }

    async fn start_recording(&self, room_id: &str) -> Result<(), HmsError> {
        let body = serde_json::json!({
            "transcription": {
                "enabled": true,
                "modes": ["recorded"],
                "output_modes": ["txt", "json"],
                "summary": { "enabled": true },
            }
        });
        self.post(&format!("/recordings/room/{room_id}/start"), body)
            .await
            .map(|_| ())
    }

    async fn stop_recording(&self, room_id: &str) -> Result<(), HmsError> {
        self.post(
            &format!("/recordings/room/{room_id}/stop"),
            serde_json::json!({}),
        )
        .await
        .map(|_| ())
    }

    fn auth_token(&self, room_id: &str, user_id: &str, role: &str) -> Result<String, HmsError> {
        let (access_key, secret) = self.credentials()?;
        let now = Utc::now();
        let claims = AppClaims {
            access_key,
            room_id,
            user_id,
            role,
            token_type: "app",
            version: 2,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(AUTH_TOKEN_TTL_HOURS)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| HmsError::Token(e.to_string()))
    }
}
