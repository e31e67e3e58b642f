use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integrations::IntegrationProvider;
use crate::storage::Entity;

/// Seconds before expiry at which an OAuth access token is refreshed.
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub custom_domain: Option<CustomDomain>,
    #[serde(default)]
    pub google_calendar: Option<CalendarConnection>,
    #[serde(default)]
    pub outlook_calendar: Option<CalendarConnection>,
    #[serde(default)]
    pub zoom: Option<OAuthConnection>,
    #[serde(default)]
    pub stripe: Option<StripeAccountConfig>,
    #[serde(default)]
    pub subscription: Option<SubscriptionConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Entity for Tenant {
    const KIND: &'static str = "TENANT";

    fn entity_id(&self) -> String {
        self.id.clone()
    }

    fn index_key(&self) -> Option<String> {
        Some(owner_index_key(&self.owner_id))
    }
}

pub fn owner_index_key(owner_id: &str) -> String {
    format!("OWNER#{owner_id}")
}

impl Tenant {
    pub fn new(owner_id: &str, name: &str, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            slug: slugify(name),
            email: email.to_string(),
            timezone: default_timezone(),
            custom_domain: None,
            google_calendar: None,
            outlook_calendar: None,
            zoom: None,
            stripe: None,
            subscription: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `From` address for tenant email. A verified BYOD domain wins over the
    /// platform default.
    pub fn sender_address(&self, platform_default: &str) -> String {
        match &self.custom_domain {
            Some(domain) if domain.verified => {
                format!("{} <{}>", self.name, domain.email_from)
            }
            _ => platform_default.to_string(),
        }
    }

    pub fn stripe_account_id(&self) -> Option<&str> {
        self.stripe.as_ref().map(|s| s.account_id.as_str())
    }

    pub fn calendar_connection(&self, provider: IntegrationProvider) -> Option<&CalendarConnection> {
        match provider {
            IntegrationProvider::Google => self.google_calendar.as_ref(),
            IntegrationProvider::Outlook => self.outlook_calendar.as_ref(),
            IntegrationProvider::Zoom => None,
        }
    }

    pub fn set_calendar_connection(
        &mut self,
        provider: IntegrationProvider,
        connection: Option<CalendarConnection>,
    ) {
        match provider {
            IntegrationProvider::Google => self.google_calendar = connection,
            IntegrationProvider::Outlook => self.outlook_calendar = connection,
            IntegrationProvider::Zoom => {}
        }
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    pub domain: String,
    pub email_from: String,
    #[serde(default)]
    pub verified: bool,
}

/// OAuth tokens for a connected provider account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConnection {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub account_email: Option<String>,
}

impl OAuthConnection {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECONDS) <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarConnection {
    #[serde(flatten)]
    pub oauth: OAuthConnection,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_true")]
    pub sync_enabled: bool,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_true() -> bool {
    true
}

impl CalendarConnection {
    pub fn new(oauth: OAuthConnection) -> Self {
        Self {
            oauth,
            calendar_id: default_calendar_id(),
            sync_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StripeAccountConfig {
    pub account_id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    pub tier: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoPreference {
    #[default]
    Hms,
    Zoom,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfig {
    pub slot_duration_minutes: u32,
    #[serde(default)]
    pub buffer_minutes: u32,
    pub advance_booking_days: u32,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub video_provider: VideoPreference,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
}

fn default_currency() -> String {
    "usd".to_string()
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            slot_duration_minutes: 30,
            buffer_minutes: 0,
            advance_booking_days: 60,
            requires_approval: false,
            price_cents: None,
            currency: default_currency(),
            video_provider: VideoPreference::Hms,
            availability: Vec::new(),
        }
    }
}

impl Entity for BookingConfig {
    const KIND: &'static str = "BOOKING_CONFIG";

    fn entity_id(&self) -> String {
        "default".to_string()
    }
}

impl BookingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.slot_duration_minutes == 0 {
            return Err("slotDurationMinutes must be positive".to_string());
        }
        if self.price_cents.is_some_and(|p| p < 0) {
            return Err("priceCents cannot be negative".to_string());
        }
        if self.currency.len() != 3 {
            return Err("currency must be a 3-letter ISO code".to_string());
        }
        for window in &self.availability {
            if window.weekday > 6 {
                return Err(format!("Invalid weekday {}", window.weekday));
            }
            if window.end <= window.start {
                return Err(format!(
                    "Availability window on weekday {} ends before it starts",
                    window.weekday
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantSubscriber {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub unsubscribed: bool,
    pub subscribed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for TenantSubscriber {
    const KIND: &'static str = "SUBSCRIBER";

    fn entity_id(&self) -> String {
        self.email.clone()
    }
}

pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Sunrise Yoga & Co. "), "sunrise-yoga-co");
        assert_eq!(slugify("Cally"), "cally");
    }

    #[test]
    fn test_sender_address_prefers_verified_domain() {
        let mut tenant = Tenant::new("owner", "Sunrise Yoga", "owner@example.com");
        assert_eq!(tenant.sender_address("Cally <no-reply@cally.app>"), "Cally <no-reply@cally.app>");

        tenant.custom_domain = Some(CustomDomain {
            domain: "sunrise.yoga".to_string(),
            email_from: "hello@sunrise.yoga".to_string(),
            verified: false,
        });
        assert_eq!(tenant.sender_address("Cally <no-reply@cally.app>"), "Cally <no-reply@cally.app>");

        if let Some(domain) = tenant.custom_domain.as_mut() {
            domain.verified = true;
        }
        assert_eq!(
            tenant.sender_address("Cally <no-reply@cally.app>"),
            "Sunrise Yoga <hello@sunrise.yoga>"
        );
    }

    #[test]
    fn test_token_refresh_margin() {
        let now = Utc::now();
        let conn = OAuthConnection {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: now + Duration::seconds(30),
            account_email: None,
        };
        assert!(conn.needs_refresh(now));
        let fresh = OAuthConnection {
            expires_at: now + Duration::hours(1),
            ..conn
        };
        assert!(!fresh.needs_refresh(now));
    }

    #[test]
    fn test_booking_config_validation() {
        assert!(BookingConfig::default().validate().is_ok());

        let mut config = BookingConfig::default();
        config.availability.push(AvailabilityWindow {
            weekday: 2,
            start: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        });
        assert!(config.validate().is_err());

        let config = BookingConfig {
            slot_duration_minutes: 0,
            ..BookingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Jane@Example.COM ").as_deref(), Some("jane@example.com"));
        assert!(normalize_email("no-at-sign").is_none());
        assert!(normalize_email("a@localhost").is_none());
    }
}
