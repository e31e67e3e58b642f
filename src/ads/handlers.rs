use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ledger::{self, LedgerError};
use super::types::{
    AdCampaign, AdCreative, AdCredit, AdTargeting, AdTransaction, CampaignStatus,
};
use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::storage::Repository;

pub fn ads_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::AD_CAMPAIGNS, get(list_campaigns).post(create_campaign))
        .route(
            ApiUrls::AD_CAMPAIGN_BY_ID,
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route(ApiUrls::AD_CAMPAIGN_SPEND, post(spend_on_campaign))
        .route(ApiUrls::AD_CAMPAIGN_REFUND, post(refund_campaign))
        .route(ApiUrls::AD_CREDITS, get(get_credits))
        .route(ApiUrls::AD_CREDITS_PURCHASE, post(purchase_credits))
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveAmount => ApiError::Validation(err.to_string()),
            _ => ApiError::Conflict(err.to_string()),
        }
    }
}

async fn load_credit(repo: &Repository, tenant_id: &str) -> Result<AdCredit, ApiError> {
    Ok(repo
        .get::<AdCredit>(tenant_id, "balance")
        .await?
        .unwrap_or_default())
}

async fn load_campaign(
    repo: &Repository,
    tenant_id: &str,
    id: &str,
) -> Result<AdCampaign, ApiError> {
    repo.get::<AdCampaign>(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))
}

async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<Vec<AdCampaign>> {
    let mut campaigns: Vec<AdCampaign> = state.repo.list(current.id()).await?;
    campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ok(campaigns)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub targeting: AdTargeting,
    pub creative: AdCreative,
    pub daily_budget_cents: i64,
    pub total_budget_cents: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

async fn create_campaign(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<CreateCampaignRequest>,
) -> ApiResult<AdCampaign> {
    let now = Utc::now();
    let campaign = AdCampaign {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        status: req.status.unwrap_or_default(),
        objective: req.objective,
        targeting: req.targeting,
        creative: req.creative,
        daily_budget_cents: req.daily_budget_cents,
        total_budget_cents: req.total_budget_cents,
        charged_cents: 0,
        spent_cents: 0,
        start_date: req.start_date,
        end_date: req.end_date,
        created_at: now,
        updated_at: now,
    };
    campaign.validate().map_err(ApiError::Validation)?;

    state.repo.put(current.id(), &campaign).await?;
    info!("Created ad campaign {} for tenant {}", campaign.id, current.id());
    ok(campaign)
}

async fn get_campaign(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<AdCampaign> {
    ok(load_campaign(&state.repo, current.id(), &id).await?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub status: Option<CampaignStatus>,
    pub objective: Option<String>,
    pub targeting: Option<AdTargeting>,
    pub creative: Option<AdCreative>,
    pub daily_budget_cents: Option<i64>,
    pub total_budget_cents: Option<i64>,
    /// Delivered spend as reported by the ad network.
    pub spent_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn apply_update(campaign: &mut AdCampaign, req: UpdateCampaignRequest) -> Result<(), ApiError> {
    if let Some(name) = req.name {
        campaign.name = name.trim().to_string();
    }
    if let Some(status) = req.status {
        campaign.status = status;
    }
    if req.objective.is_some() {
        campaign.objective = req.objective;
    }
    if let Some(targeting) = req.targeting {
        campaign.targeting = targeting;
    }
    if let Some(creative) = req.creative {
        campaign.creative = creative;
    }
    if let Some(daily) = req.daily_budget_cents {
        campaign.daily_budget_cents = daily;
    }
    if let Some(total) = req.total_budget_cents {
        campaign.total_budget_cents = total;
    }
    if let Some(spent) = req.spent_cents {
        if spent < campaign.spent_cents || spent > campaign.charged_cents {
            return Err(ApiError::Validation(format!(
                "spentCents must be between {} and {}",
                campaign.spent_cents, campaign.charged_cents
            )));
        }
        campaign.spent_cents = spent;
    }
    if req.start_date.is_some() {
        campaign.start_date = req.start_date;
    }
    if req.end_date.is_some() {
        campaign.end_date = req.end_date;
    }
    campaign.validate().map_err(ApiError::Validation)?;
    campaign.updated_at = Utc::now();
    Ok(())
}

async fn update_campaign(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateCampaignRequest>,
) -> ApiResult<AdCampaign> {
    let mut campaign = load_campaign(&state.repo, current.id(), &id).await?;
    apply_update(&mut campaign, req)?;
    state.repo.put(current.id(), &campaign).await?;
    ok(campaign)
}

async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let campaign = load_campaign(&state.repo, current.id(), &id).await?;
    if campaign.unspent_cents() > 0 {
        return Err(ApiError::Conflict(
            "Refund the campaign's unspent credit before deleting it".to_string(),
        ));
    }
    ok(state.repo.delete::<AdCampaign>(current.id(), &id).await?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    pub balance_cents: i64,
    pub currency: String,
    pub transactions: Vec<AdTransaction>,
}

async fn get_credits(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<CreditsResponse> {
    let credit = load_credit(&state.repo, current.id()).await?;
    let mut transactions: Vec<AdTransaction> = state.repo.list(current.id()).await?;
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    ok(CreditsResponse {
        balance_cents: credit.balance_cents,
        currency: credit.currency,
        transactions,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub balance_cents: i64,
    pub transaction: AdTransaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<AdCampaign>,
}

async fn purchase_credits(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<PurchaseRequest>,
) -> ApiResult<LedgerResponse> {
    let tenant_id = current.id();
    let intent_id = req.payment_intent_id.trim();
    if intent_id.is_empty() {
        return Err(ApiError::Validation("paymentIntentId is required".to_string()));
    }

    let existing: Vec<AdTransaction> = state.repo.list(tenant_id).await?;
    if existing
        .iter()
        .any(|t| t.payment_intent_id.as_deref() == Some(intent_id))
    {
        return Err(ApiError::Conflict(
            "This payment has already been credited".to_string(),
        ));
    }

    // Ad credit is bought on the platform account, not the tenant's.
    let intent = state.payments.retrieve_payment_intent(intent_id, None).await?;
    if !intent.succeeded() {
        return Err(ApiError::Validation(format!(
            "Payment {} has status {}",
            intent.id, intent.status
        )));
    }
    if let Some(owner) = intent.metadata.get("tenant_id") {
        if owner != tenant_id {
            return Err(ApiError::Validation(
                "Payment belongs to another account".to_string(),
            ));
        }
    }

    let amount = if intent.amount_received > 0 {
        intent.amount_received
    } else {
        intent.amount
    };
    let mut credit = load_credit(&state.repo, tenant_id).await?;
    let txn = ledger::purchase(&mut credit, amount, &intent.id)?;

    state.repo.put(tenant_id, &txn).await?;
    if let Err(e) = state.repo.put(tenant_id, &credit).await {
        // Without the balance update the ledger entry would block a retry.
        if let Err(cleanup) = state.repo.delete::<AdTransaction>(tenant_id, &txn.id).await {
            warn!("Failed to roll back ledger entry {}: {cleanup}", txn.id);
        }
        return Err(e.into());
    }

    info!(
        "Tenant {tenant_id} purchased {amount} cents of ad credit with {}",
        intent.id
    );
    ok(LedgerResponse {
        balance_cents: credit.balance_cents,
        transaction: txn,
        campaign: None,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRequest {
    pub amount_cents: i64,
}

async fn spend_on_campaign(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SpendRequest>,
) -> ApiResult<LedgerResponse> {
    let tenant_id = current.id();
    let mut campaign = load_campaign(&state.repo, tenant_id, &id).await?;
    let mut credit = load_credit(&state.repo, tenant_id).await?;

    let txn = ledger::spend(&mut credit, &mut campaign, req.amount_cents)?;
    state.repo.put(tenant_id, &credit).await?;
    state.repo.put(tenant_id, &campaign).await?;
    state.repo.put(tenant_id, &txn).await?;

    ok(LedgerResponse {
        balance_cents: credit.balance_cents,
        transaction: txn,
        campaign: Some(campaign),
    })
}

async fn refund_campaign(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<LedgerResponse> {
    let tenant_id = current.id();
    let mut campaign = load_campaign(&state.repo, tenant_id, &id).await?;
    let mut credit = load_credit(&state.repo, tenant_id).await?;

    let txn = ledger::refund_unspent(&mut credit, &mut campaign)?;
    state.repo.put(tenant_id, &credit).await?;
    state.repo.put(tenant_id, &campaign).await?;
    state.repo.put(tenant_id, &txn).await?;
    info!(
        "Returned {} cents from campaign {} to tenant {tenant_id}",
        txn.amount_cents, campaign.id
    );

    ok(LedgerResponse {
        balance_cents: credit.balance_cents,
        transaction: txn,
        campaign: Some(campaign),
    })
}
