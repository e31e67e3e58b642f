//! Tenant landing pages.

pub mod types;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::tenants::Tenant;

pub use types::{
    ComposableLandingPage, LandingPage, LandingPageConfig, Section, SectionContent,
    SimpleLandingPage, Theme,
};

pub fn landing_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::LANDING_PAGE, get(get_page).put(save_page))
        .route(ApiUrls::LANDING_PAGE_UPGRADE, post(upgrade_page))
}

async fn load_or_starter(state: &AppState, tenant: &Tenant) -> Result<LandingPage, ApiError> {
    Ok(state
        .repo
        .get::<LandingPage>(&tenant.id, "current")
        .await?
        .unwrap_or_else(|| LandingPage {
            config: LandingPageConfig::starter(&tenant.name),
            published: false,
            updated_at: Utc::now(),
        }))
}

async fn get_page(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<LandingPage> {
    ok(load_or_starter(&state, &current.tenant).await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePageRequest {
    pub config: LandingPageConfig,
    #[serde(default)]
    pub published: Option<bool>,
}

async fn save_page(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<SavePageRequest>,
) -> ApiResult<LandingPage> {
    req.config.validate().map_err(ApiError::Validation)?;

    let previous = load_or_starter(&state, &current.tenant).await?;
    let page = LandingPage {
        config: req.config,
        published: req.published.unwrap_or(previous.published),
        updated_at: Utc::now(),
    };
    state.repo.put(current.id(), &page).await?;
    ok(page)
}

async fn upgrade_page(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<LandingPage> {
    let mut page = load_or_starter(&state, &current.tenant).await?;
    let upgraded = page.config.upgraded().ok_or_else(|| {
        ApiError::Conflict("Landing page already uses composable sections".to_string())
    })?;

    page.config = LandingPageConfig::Composable(upgraded);
    page.config.validate().map_err(ApiError::Validation)?;
    page.updated_at = Utc::now();
    state.repo.put(current.id(), &page).await?;
    info!("Upgraded landing page for tenant {}", current.id());
    ok(page)
}
