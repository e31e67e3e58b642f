use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::config::OAuthClientConfig;
use crate::tenants::OAuthConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationProvider {
    Google,
    Outlook,
    Zoom,
}

impl IntegrationProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
            Self::Zoom => "zoom",
        }
    }
}

impl std::fmt::Display for IntegrationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "outlook" | "microsoft" => Ok(Self::Outlook),
            "zoom" => Ok(Self::Zoom),
            other => Err(format!("Unknown integration provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuthError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("OAuth error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("{0} OAuth client is not configured")]
    NotConfigured(IntegrationProvider),
    #[error("No refresh token available")]
    MissingRefreshToken,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError>;

    async fn exchange_code(&self, code: &str) -> Result<OAuthConnection, OAuthError>;

    /// Returns a connection carrying the new access token. Providers that do
    /// not rotate refresh tokens keep the previous one.
    async fn refresh(&self, connection: &OAuthConnection) -> Result<OAuthConnection, OAuthError>;
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    provider: IntegrationProvider,
    config: OAuthClientConfig,
    authorize_endpoint: &'static str,
    scopes: &'static str,
    client: Client,
}

impl OAuthClient {
    pub fn google(config: OAuthClientConfig) -> Self {
        Self {
            provider: IntegrationProvider::Google,
            config,
            authorize_endpoint: "https://accounts.google.com/o/oauth2/v2/auth",
            scopes: "openid email https://www.googleapis.com/auth/calendar.events",
            client: Client::new(),
        }
    }

    pub fn microsoft(config: OAuthClientConfig) -> Self {
        Self {
            provider: IntegrationProvider::Outlook,
            config,
            authorize_endpoint: "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            scopes: "offline_access User.Read Calendars.ReadWrite",
            client: Client::new(),
        }
    }

    pub fn zoom(config: OAuthClientConfig) -> Self {
        Self {
            provider: IntegrationProvider::Zoom,
            config,
            authorize_endpoint: "https://zoom.us/oauth/authorize",
            scopes: "meeting:write",
            client: Client::new(),
        }
    }

    fn ensure_configured(&self) -> Result<(), OAuthError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(OAuthError::NotConfigured(self.provider));
        }
        Ok(())
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenPayload, OAuthError> {
        self.ensure_configured()?;

        let mut request = self.client.post(&self.config.token_url);
        // Zoom authenticates the client with HTTP basic auth instead of form fields.
        request = if self.provider == IntegrationProvider::Zoom {
            request
                .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
                .form(form)
        } else {
            let mut full: Vec<(&str, &str)> = vec![
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ];
            full.extend_from_slice(form);
            request.form(&full)
        };

        let response = request
            .send()
            .await
            .map_err(|e| OAuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Api(format!(
                "{} token request failed: {status} {body}",
                self.provider
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Parse(e.to_string()))
    }

    async fn fetch_account_email(&self, access_token: &str) -> Option<String> {
        let response = match self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("{} userinfo request failed: {}", self.provider, r.status());
                return None;
            }
            Err(e) => {
                warn!("{} userinfo request failed: {e}", self.provider);
                return None;
            }
        };

        let info: serde_json::Value = response.json().await.ok()?;
        ["email", "mail", "userPrincipalName"]
            .iter()
            .find_map(|key| info[*key].as_str().map(String::from))
    }
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[async_trait]
impl OAuthProvider for OAuthClient {
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        self.ensure_configured()?;

        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.authorize_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(self.scopes),
            urlencoding::encode(state),
        );
        if self.provider == IntegrationProvider::Google {
            url.push_str("&access_type=offline&prompt=consent");
        }
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthConnection, OAuthError> {
        let token = self
            .token_request(&[
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let account_email = self.fetch_account_email(&token.access_token).await;

        Ok(OAuthConnection {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            account_email,
        })
    }

    async fn refresh(&self, connection: &OAuthConnection) -> Result<OAuthConnection, OAuthError> {
        let refresh_token = connection
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::MissingRefreshToken)?;

        let token = self
            .token_request(&[
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        Ok(OAuthConnection {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| connection.refresh_token.clone()),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            account_email: connection.account_email.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token_url: &str) -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://localhost:8080/api/auth/google/callback".to_string(),
            api_base: String::new(),
            token_url: token_url.to_string(),
            userinfo_url: format!("{token_url}/userinfo"),
        }
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("google".parse::<IntegrationProvider>(), Ok(IntegrationProvider::Google));
        assert_eq!("microsoft".parse::<IntegrationProvider>(), Ok(IntegrationProvider::Outlook));
        assert!("icloud".parse::<IntegrationProvider>().is_err());
    }

    #[test]
    fn test_authorize_url() {
        let client = OAuthClient::google(config("https://oauth2.googleapis.com/token"));
        let url = client.authorize_url("abc").unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?client_id=client-id"));
        assert!(url.contains("state=abc"));
        assert!(url.contains("access_type=offline"));

        let unconfigured = OAuthClient::zoom(OAuthClientConfig {
            client_id: String::new(),
            ..config("x")
        });
        assert!(matches!(
            unconfigured.authorize_url("abc"),
            Err(OAuthError::NotConfigured(IntegrationProvider::Zoom))
        ));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new-token","expires_in":3600}"#)
            .create_async()
            .await;

        let client = OAuthClient::google(config(&format!("{}/token", server.url())));
        let old = OAuthConnection {
            access_token: "old".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_at: Utc::now(),
            account_email: Some("owner@example.com".to_string()),
        };

        let refreshed = client.refresh(&old).await.unwrap();
        mock.assert_async().await;
        assert_eq!(refreshed.access_token, "new-token");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
        assert!(!refreshed.needs_refresh(Utc::now()));
    }

    #[tokio::test]
    async fn test_refresh_without_token_fails() {
        let client = OAuthClient::google(config("http://127.0.0.1:9/token"));
        let conn = OAuthConnection {
            access_token: "old".to_string(),
            refresh_token: None,
            expires_at: Utc::now(),
            account_email: None,
        };
        assert!(matches!(
            client.refresh(&conn).await,
            Err(OAuthError::MissingRefreshToken)
        ));
    }
}
