use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::service::{
    self, CreateEventRequest, CreateEventResponse, DeleteEventResponse, UpdateEventRequest,
    UpdateEventResponse,
};
use super::types::CalendarEvent;
use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::{ApiJson, ApiQuery};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn calendar_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::CALENDAR_EVENTS,
            get(list_events).post(create_event),
        )
        .route(
            ApiUrls::CALENDAR_EVENT_BY_ID,
            get(get_event).put(update_event).delete(delete_event),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiQuery(query): ApiQuery<ListEventsQuery>,
) -> ApiResult<Vec<CalendarEvent>> {
    if let (Some(start), Some(end)) = (query.start, query.end) {
        if end <= start {
            return Err(ApiError::Validation("end must be after start".to_string()));
        }
    }
    ok(service::list_events(&state, current.id(), query.start, query.end).await?)
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> ApiResult<CreateEventResponse> {
    ok(service::create_event(&state, current.tenant, req).await?)
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<CalendarEvent> {
    ok(service::get_event(&state, current.id(), &id).await?)
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateEventRequest>,
) -> ApiResult<UpdateEventResponse> {
    ok(service::update_event(&state, current.tenant, &id, req).await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEventQuery {
    #[serde(default)]
    pub delete_all: bool,
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<DeleteEventQuery>,
) -> ApiResult<DeleteEventResponse> {
    ok(service::delete_event(&state, current.tenant, &id, query.delete_all).await?)
}
