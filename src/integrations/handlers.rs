use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{delete, get},
    Router,
};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::IntegrationProvider;
use crate::core::session::{sign_oauth_state, verify_oauth_state, CurrentTenant};
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiQuery;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::tenants::{self, CalendarConnection};

pub fn integration_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::INTEGRATION_CONNECT, get(connect))
        .route(ApiUrls::INTEGRATION_BY_PROVIDER, delete(disconnect))
        .route(ApiUrls::OAUTH_CALLBACK, get(oauth_callback))
}

fn parse_provider(raw: &str) -> Result<IntegrationProvider, ApiError> {
    raw.parse().map_err(ApiError::Validation)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub provider: IntegrationProvider,
    pub authorization_url: String,
}

async fn connect(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(provider): Path<String>,
) -> ApiResult<ConnectResponse> {
    let provider = parse_provider(&provider)?;
    let oauth_state = sign_oauth_state(
        current.id(),
        provider.as_str(),
        &state.config.auth.jwt_secret,
    )?;
    let authorization_url = state
        .oauth
        .get(provider)
        .authorize_url(&oauth_state)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    ok(ConnectResponse {
        provider,
        authorization_url,
    })
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Result<Redirect, ApiError> {
    let provider = parse_provider(&provider)?;
    let settings_url = format!("{}/app/settings/integrations", state.config.server.base_url);

    if let Some(error) = query.error {
        warn!("{provider} authorization was declined: {error}");
        return Ok(Redirect::to(&format!(
            "{settings_url}?error={}",
            urlencoding::encode(&error)
        )));
    }

    let (code, oauth_state) = query
        .code
        .zip(query.state)
        .ok_or_else(|| ApiError::Validation("Missing code or state".to_string()))?;
    let tenant_id = verify_oauth_state(
        &oauth_state,
        provider.as_str(),
        &state.config.auth.jwt_secret,
    )?;

    let mut tenant = tenants::find_by_id(&state.repo, &tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant"))?;

    let connection = state
        .oauth
        .get(provider)
        .exchange_code(&code)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    match provider {
        IntegrationProvider::Zoom => tenant.zoom = Some(connection),
        calendar => tenant.set_calendar_connection(calendar, Some(CalendarConnection::new(connection))),
    }
    tenant.updated_at = Utc::now();
    tenants::save(&state.repo, &tenant).await?;
    info!("Connected {provider} for tenant {}", tenant.id);

    Ok(Redirect::to(&format!(
        "{settings_url}?connected={}",
        provider.as_str()
    )))
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(provider): Path<String>,
) -> ApiResult<serde_json::Value> {
    let provider = parse_provider(&provider)?;
    let mut tenant = current.tenant;

    let was_connected = match provider {
        IntegrationProvider::Zoom => tenant.zoom.take().is_some(),
        calendar => {
            let existing = tenant.calendar_connection(calendar).is_some();
            tenant.set_calendar_connection(calendar, None);
            existing
        }
    };
    if !was_connected {
        return Err(ApiError::NotFound(format!("{provider} is not connected")));
    }

    tenant.updated_at = Utc::now();
    tenants::save(&state.repo, &tenant).await?;
    info!("Disconnected {provider} for tenant {}", tenant.id);

    ok(serde_json::json!({ "provider": provider, "connected": false }))
}
