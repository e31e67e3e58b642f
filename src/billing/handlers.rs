use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::stripe_integration::{StripeError, StripeWebhookEvent};
use crate::calendar::CalendarEvent;
use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::tenants::{self, StripeAccountConfig, Tenant};

pub fn billing_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::STRIPE, get(stripe_status))
        .route(ApiUrls::STRIPE_CONNECT, post(stripe_connect))
        .route(ApiUrls::WEBHOOK_STRIPE, post(stripe_webhook))
}

impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::InvalidWebhook(msg) => ApiError::Validation(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeStatus {
    pub connected: bool,
    pub account_id: Option<String>,
    pub charges_enabled: bool,
    pub details_submitted: bool,
}

impl From<&Tenant> for StripeStatus {
    fn from(tenant: &Tenant) -> Self {
        let stripe = tenant.stripe.as_ref();
        Self {
            connected: stripe.is_some(),
            account_id: stripe.map(|s| s.account_id.clone()),
            charges_enabled: stripe.is_some_and(|s| s.charges_enabled),
            details_submitted: stripe.is_some_and(|s| s.details_submitted),
        }
    }
}

async fn stripe_status(current: CurrentTenant) -> ApiResult<StripeStatus> {
    ok(StripeStatus::from(&current.tenant))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectLink {
    pub account_id: String,
    pub url: String,
}

async fn stripe_connect(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<ConnectLink> {
    let mut tenant = current.tenant;

    let account_id = match tenant.stripe_account_id() {
        Some(id) => id.to_string(),
        None => {
            let account = state
                .payments
                .create_connected_account(&tenant.email, &tenant.id)
                .await?;
            info!("Created Stripe account {} for tenant {}", account.id, tenant.id);
            tenant.stripe = Some(StripeAccountConfig {
                account_id: account.id.clone(),
                charges_enabled: account.charges_enabled,
                details_submitted: account.details_submitted,
            });
            tenant.updated_at = Utc::now();
            tenants::save(&state.repo, &tenant).await?;
            account.id
        }
    };

    let settings_url = format!("{}/app/settings/payments", state.config.server.base_url);
    let url = state
        .payments
        .create_account_link(
            &account_id,
            &format!("{settings_url}?refresh=1"),
            &format!("{settings_url}?connected=1"),
        )
        .await?;

    ok(ConnectLink { account_id, url })
}

async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<serde_json::Value> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("Missing Stripe-Signature header".to_string()))?;
    let payload = std::str::from_utf8(&body)
        .map_err(|_| ApiError::Validation("Payload is not UTF-8".to_string()))?;

    let event = state.payments.verify_webhook_signature(payload, signature)?;
    debug!("Stripe webhook {} ({})", event.id, event.event_type);

    let handled = match event.event_type.as_str() {
        "account.updated" => account_updated(&state, &event).await?,
        "payment_intent.succeeded" => payment_succeeded(&state, &event).await?,
        _ => false,
    };

    ok(serde_json::json!({ "received": true, "handled": handled }))
}

async fn account_updated(state: &AppState, event: &StripeWebhookEvent) -> Result<bool, ApiError> {
    let object = &event.data.object;
    let Some(account_id) = object["id"].as_str() else {
        return Ok(false);
    };
    let Some(tenant_id) = object["metadata"]["tenant_id"].as_str() else {
        debug!("account.updated for {account_id} has no tenant_id metadata");
        return Ok(false);
    };

    let Some(mut tenant) = tenants::find_by_id(&state.repo, tenant_id).await? else {
        warn!("account.updated for unknown tenant {tenant_id}");
        return Ok(false);
    };
    if tenant.stripe_account_id() != Some(account_id) {
        warn!("Stripe account {account_id} does not belong to tenant {tenant_id}");
        return Ok(false);
    }

    tenant.stripe = Some(StripeAccountConfig {
        account_id: account_id.to_string(),
        charges_enabled: object["charges_enabled"].as_bool().unwrap_or(false),
        details_submitted: object["details_submitted"].as_bool().unwrap_or(false),
    });
    tenant.updated_at = Utc::now();
    tenants::save(&state.repo, &tenant).await?;
    Ok(true)
}

async fn payment_succeeded(state: &AppState, event: &StripeWebhookEvent) -> Result<bool, ApiError> {
    let object = &event.data.object;
    let metadata = &object["metadata"];
    let (Some(intent_id), Some(tenant_id), Some(event_id)) = (
        object["id"].as_str(),
        metadata["tenant_id"].as_str(),
        metadata["event_id"].as_str(),
    ) else {
        return Ok(false);
    };

    let Some(mut booking) = state
        .repo
        .get::<CalendarEvent>(tenant_id, event_id)
        .await?
    else {
        warn!("Payment {intent_id} references unknown event {event_id}");
        return Ok(false);
    };

    booking.stripe_payment_intent_id = Some(intent_id.to_string());
    booking.updated_at = Utc::now();
    state.repo.put(tenant_id, &booking).await?;
    info!("Attached payment {intent_id} to event {event_id}");
    Ok(true)
}
