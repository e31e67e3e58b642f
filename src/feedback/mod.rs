//! Post-session feedback requests and the public response endpoint.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::email::{self, templates};
use crate::storage::Entity;
use crate::tenants::normalize_email;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Sent,
    Responded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status: FeedbackStatus,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Entity for FeedbackRequest {
    const KIND: &'static str = "FEEDBACK";

    fn entity_id(&self) -> String {
        self.id.clone()
    }
}

impl FeedbackRequest {
    pub fn record_response(&mut self, rating: u8, comment: Option<String>) -> Result<(), ApiError> {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::Validation("Rating must be between 1 and 5".to_string()));
        }
        if self.status == FeedbackStatus::Responded {
            return Err(ApiError::Conflict("Feedback already submitted".to_string()));
        }
        self.rating = Some(rating);
        self.comment = comment.filter(|c| !c.trim().is_empty());
        self.status = FeedbackStatus::Responded;
        self.responded_at = Some(Utc::now());
        Ok(())
    }
}

pub fn feedback_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::FEEDBACK, get(list_requests).post(create_request))
        .route(ApiUrls::PUBLIC_FEEDBACK_RESPONSE, post(submit_response))
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<Vec<FeedbackRequest>> {
    let mut requests: Vec<FeedbackRequest> = state.repo.list(current.id()).await?;
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ok(requests)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub event_id: Option<String>,
    pub name: String,
    pub email: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackResponse {
    pub request: FeedbackRequest,
    pub warnings: Vec<String>,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<CreateFeedbackRequest>,
) -> ApiResult<CreateFeedbackResponse> {
    let email = normalize_email(&req.email)
        .ok_or_else(|| ApiError::Validation("Invalid email address".to_string()))?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }

    let mut request = FeedbackRequest {
        id: uuid::Uuid::new_v4().to_string(),
        event_id: req.event_id,
        name: name.to_string(),
        email,
        message: req.message,
        status: FeedbackStatus::Pending,
        rating: None,
        comment: None,
        created_at: Utc::now(),
        responded_at: None,
    };

    let tenant = &current.tenant;
    let response_url = format!(
        "{}/feedback/{}/{}",
        state.config.server.base_url, tenant.id, request.id
    );
    let message = templates::feedback_request(
        tenant,
        &request.name,
        &request.email,
        request.message.as_deref(),
        &response_url,
        &tenant.sender_address(&state.config.email.from),
    );

    let mut warnings = Vec::new();
    if email::send_or_warn(state.mailer.as_ref(), Some(message), &mut warnings).await {
        request.status = FeedbackStatus::Sent;
    }
    state.repo.put(current.id(), &request).await?;
    info!("Feedback request {} created for tenant {}", request.id, tenant.id);

    ok(CreateFeedbackResponse { request, warnings })
}

#[derive(Debug, Deserialize)]
pub struct FeedbackResponseBody {
    pub rating: u8,
    pub comment: Option<String>,
}

async fn submit_response(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, id)): Path<(String, String)>,
    ApiJson(body): ApiJson<FeedbackResponseBody>,
) -> ApiResult<serde_json::Value> {
    let mut request = state
        .repo
        .get::<FeedbackRequest>(&tenant_id, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Feedback request"))?;

    request.record_response(body.rating, body.comment)?;
    state.repo.put(&tenant_id, &request).await?;

    ok(serde_json::json!({ "id": request.id, "rating": request.rating }))
}
