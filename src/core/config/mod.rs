use log::warn;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub stripe: StripeConfig,
    pub hms: HmsConfig,
    pub google: OAuthClientConfig,
    pub microsoft: OAuthClientConfig,
    pub zoom: OAuthClientConfig,
    pub email: EmailConfig,
    pub openai: OpenAiConfig,
}
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub cookie_name: String,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Dynamo,
    Memory,
}
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub table_name: String,
    pub endpoint_url: Option<String>,
}
#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
}
#[derive(Clone, Debug)]
pub struct HmsConfig {
    pub access_key: Option<String>,
    pub secret: Option<String>,
    pub template_id: Option<String>,
    pub api_base: String,
    pub webhook_secret: Option<String>,
}
/// OAuth application credentials for a calendar or meeting provider.
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base: String,
    pub token_url: String,
    pub userinfo_url: String,
}
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_map(&std::env::vars().collect())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        let get_str = |key: &str, default: &str| -> String {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let get_opt = |key: &str| -> Option<String> {
            vars.get(key).filter(|v| !v.is_empty()).cloned()
        };
        let get_u16 = |key: &str, default: u16| -> u16 {
            vars.get(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        let port = get_u16("PORT", 8080);
        let base_url = get_str("APP_BASE_URL", &format!("http://localhost:{port}"));

        let jwt_secret = get_opt("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using default development secret - DO NOT USE IN PRODUCTION");
            "dev-secret-key-change-in-production-minimum-32-chars".to_string()
        });

        let backend = match get_str("STORAGE_BACKEND", "dynamo").as_str() {
            "memory" => StorageBackend::Memory,
            _ => StorageBackend::Dynamo,
        };

        let oauth = |prefix: &str, api_base: &str, token_url: &str, userinfo_url: &str| OAuthClientConfig {
            client_id: get_str(&format!("{prefix}_CLIENT_ID"), ""),
            client_secret: get_str(&format!("{prefix}_CLIENT_SECRET"), ""),
            redirect_uri: get_str(
                &format!("{prefix}_REDIRECT_URI"),
                &format!(
                    "{base_url}/api/auth/{}/callback",
                    provider_path(prefix)
                ),
            ),
            api_base: get_str(&format!("{prefix}_API_BASE"), api_base),
            token_url: get_str(&format!("{prefix}_TOKEN_URL"), token_url),
            userinfo_url: get_str(&format!("{prefix}_USERINFO_URL"), userinfo_url),
        };

        Self {
            server: ServerConfig {
                host: get_str("HOST", "0.0.0.0"),
                port,
                base_url: base_url.clone(),
            },
            auth: AuthConfig {
                jwt_secret,
                cookie_name: get_str("SESSION_COOKIE", "session"),
            },
            storage: StorageConfig {
                backend,
                table_name: get_str("DYNAMODB_TABLE", "cally-core"),
                endpoint_url: get_opt("DYNAMODB_ENDPOINT"),
            },
            stripe: StripeConfig {
                secret_key: get_opt("STRIPE_SECRET_KEY"),
                webhook_secret: get_opt("STRIPE_WEBHOOK_SECRET"),
                api_base: get_str("STRIPE_API_BASE", "https://api.stripe.com/v1"),
            },
            hms: HmsConfig {
                access_key: get_opt("HMS_ACCESS_KEY"),
                secret: get_opt("HMS_SECRET"),
                template_id: get_opt("HMS_TEMPLATE_ID"),
                api_base: get_str("HMS_API_BASE", "https://api.100ms.live/v2"),
                webhook_secret: get_opt("HMS_WEBHOOK_SECRET"),
            },
            google: oauth(
                "GOOGLE",
                "https://www.googleapis.com/calendar/v3",
                "https://oauth2.googleapis.com/token",
                "https://www.googleapis.com/oauth2/v2/userinfo",
            ),
            microsoft: oauth(
                "MICROSOFT",
                "https://graph.microsoft.com/v1.0",
                "https://login.microsoftonline.com/common/oauth2/v2.0/token",
                "https://graph.microsoft.com/v1.0/me",
            ),
            zoom: oauth(
                "ZOOM",
                "https://api.zoom.us/v2",
                "https://zoom.us/oauth/token",
                "https://api.zoom.us/v2/users/me",
            ),
            email: EmailConfig {
                smtp_server: get_opt("SMTP_SERVER"),
                smtp_port: get_u16("SMTP_PORT", 587),
                username: get_str("SMTP_USERNAME", ""),
                password: get_str("SMTP_PASSWORD", ""),
                from: get_str("EMAIL_FROM", "CallyGo <no-reply@callygo.com>"),
            },
            openai: OpenAiConfig {
                api_key: get_opt("OPENAI_API_KEY"),
                base_url: get_str("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: get_str("OPENAI_MODEL", "gpt-4o-mini"),
            },
        }
    }
}

fn provider_path(prefix: &str) -> &'static str {
    match prefix {
        "GOOGLE" => "google",
        "MICROSOFT" => "outlook",
        _ => "zoom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_map(&HashMap::new());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Dynamo);
        assert_eq!(config.stripe.api_base, "https://api.stripe.com/v1");
        assert_eq!(
            config.microsoft.redirect_uri,
            "http://localhost:8080/api/auth/outlook/callback"
        );
        assert!(config.email.smtp_server.is_none());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<String, String> = [
            ("PORT", "9000"),
            ("STORAGE_BACKEND", "memory"),
            ("APP_BASE_URL", "https://app.callygo.com"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("SMTP_SERVER", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = AppConfig::from_map(&vars);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.stripe.secret_key.as_deref(), Some("sk_test_123"));
        assert_eq!(
            config.google.redirect_uri,
            "https://app.callygo.com/api/auth/google/callback"
        );
        assert!(config.email.smtp_server.is_none());
    }
}
