use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Router,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{
    normalize_email, BookingConfig, CalendarConnection, CustomDomain, OAuthConnection,
    StripeAccountConfig, SubscriptionConfig, Tenant, TenantSubscriber,
};
use crate::core::session::{AuthenticatedUser, CurrentTenant};
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn tenant_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::TENANT,
            get(get_tenant).post(create_tenant).put(update_tenant),
        )
        .route(
            ApiUrls::BOOKING_CONFIG,
            get(get_booking_config).put(update_booking_config),
        )
        .route(
            ApiUrls::SUBSCRIBERS,
            get(list_subscribers).post(upsert_subscriber),
        )
        .route(ApiUrls::SUBSCRIBER_BY_EMAIL, delete(delete_subscriber))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub account_email: Option<String>,
    pub sync_enabled: bool,
}

impl ConnectionStatus {
    fn calendar(conn: Option<&CalendarConnection>) -> Self {
        Self {
            connected: conn.is_some(),
            account_email: conn.and_then(|c| c.oauth.account_email.clone()),
            sync_enabled: conn.is_some_and(|c| c.sync_enabled),
        }
    }

    fn oauth(conn: Option<&OAuthConnection>) -> Self {
        Self {
            connected: conn.is_some(),
            account_email: conn.and_then(|c| c.account_email.clone()),
            sync_enabled: false,
        }
    }
}

/// Tenant profile as returned to the owner. OAuth tokens never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantView {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub timezone: String,
    pub custom_domain: Option<CustomDomain>,
    pub google_calendar: ConnectionStatus,
    pub outlook_calendar: ConnectionStatus,
    pub zoom: ConnectionStatus,
    pub stripe: Option<StripeAccountConfig>,
    pub subscription: Option<SubscriptionConfig>,
}

impl From<&Tenant> for TenantView {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id.clone(),
            name: tenant.name.clone(),
            slug: tenant.slug.clone(),
            email: tenant.email.clone(),
            timezone: tenant.timezone.clone(),
            custom_domain: tenant.custom_domain.clone(),
            google_calendar: ConnectionStatus::calendar(tenant.google_calendar.as_ref()),
            outlook_calendar: ConnectionStatus::calendar(tenant.outlook_calendar.as_ref()),
            zoom: ConnectionStatus::oauth(tenant.zoom.as_ref()),
            stripe: tenant.stripe.clone(),
            subscription: tenant.subscription.clone(),
        }
    }
}

async fn get_tenant(current: CurrentTenant) -> ApiResult<TenantView> {
    ok(TenantView::from(&current.tenant))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

async fn create_tenant(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateTenantRequest>,
) -> ApiResult<TenantView> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    if super::find_by_owner(&state.repo, &user.claims.sub)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Tenant already exists".to_string()));
    }

    let mut tenant = Tenant::new(&user.claims.sub, req.name.trim(), &user.claims.email);
    if let Some(tz) = req.timezone {
        tenant.timezone = tz;
    }
    super::save(&state.repo, &tenant).await?;
    info!("Created tenant {} for user {}", tenant.id, user.claims.sub);

    ok(TenantView::from(&tenant))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomainRequest {
    pub domain: String,
    pub email_from: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub custom_domain: Option<CustomDomainRequest>,
    #[serde(default)]
    pub remove_custom_domain: bool,
}

async fn update_tenant(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<UpdateTenantRequest>,
) -> ApiResult<TenantView> {
    let mut tenant = current.tenant;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Name cannot be empty".to_string()));
        }
        tenant.name = name.trim().to_string();
    }
    if let Some(tz) = req.timezone {
        tenant.timezone = tz;
    }
    if req.remove_custom_domain {
        tenant.custom_domain = None;
    } else if let Some(domain) = req.custom_domain {
        let email_from = normalize_email(&domain.email_from)
            .ok_or_else(|| ApiError::Validation("Invalid emailFrom address".to_string()))?;
        let domain_name = domain.domain.trim().to_lowercase();
        if !email_from.ends_with(&format!("@{domain_name}")) {
            return Err(ApiError::Validation(
                "emailFrom must belong to the custom domain".to_string(),
            ));
        }
        // Domain ownership is re-verified out of band after any change.
        tenant.custom_domain = Some(CustomDomain {
            domain: domain_name,
            email_from,
            verified: false,
        });
    }
    tenant.updated_at = Utc::now();

    super::save(&state.repo, &tenant).await?;
    ok(TenantView::from(&tenant))
}

async fn get_booking_config(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<BookingConfig> {
    ok(super::booking_config(&state.repo, current.id()).await?)
}

async fn update_booking_config(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(config): ApiJson<BookingConfig>,
) -> ApiResult<BookingConfig> {
    config.validate().map_err(ApiError::Validation)?;
    state.repo.put(current.id(), &config).await?;
    ok(config)
}

async fn list_subscribers(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<Vec<TenantSubscriber>> {
    let mut subscribers: Vec<TenantSubscriber> = state.repo.list(current.id()).await?;
    subscribers.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));
    ok(subscribers)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSubscriberRequest {
    pub email: String,
    pub name: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub unsubscribed: bool,
}

async fn upsert_subscriber(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<UpsertSubscriberRequest>,
) -> ApiResult<TenantSubscriber> {
    let email = normalize_email(&req.email)
        .ok_or_else(|| ApiError::Validation("Invalid email address".to_string()))?;
    let now = Utc::now();

    let subscriber = match state
        .repo
        .get::<TenantSubscriber>(current.id(), &email)
        .await?
    {
        Some(mut existing) => {
            if req.name.is_some() {
                existing.name = req.name;
            }
            if req.source.is_some() {
                existing.source = req.source;
            }
            for tag in req.tags {
                if !existing.tags.contains(&tag) {
                    existing.tags.push(tag);
                }
            }
            existing.unsubscribed = req.unsubscribed;
            existing.updated_at = now;
            existing
        }
        None => TenantSubscriber {
            email,
            name: req.name,
            source: req.source,
            tags: req.tags,
            unsubscribed: req.unsubscribed,
            subscribed_at: now,
            updated_at: now,
        },
    };

    state.repo.put(current.id(), &subscriber).await?;
    ok(subscriber)
}

async fn delete_subscriber(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(email): Path<String>,
) -> ApiResult<serde_json::Value> {
    let email = normalize_email(&email)
        .ok_or_else(|| ApiError::Validation("Invalid email address".to_string()))?;
    if !state
        .repo
        .delete::<TenantSubscriber>(current.id(), &email)
        .await?
    {
        return Err(ApiError::not_found("Subscriber"));
    }
    ok(serde_json::json!({ "deleted": email }))
}
