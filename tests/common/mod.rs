#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use cally::calendar::{Attendee, CalendarEvent, EventStatus};
use cally::core::shared::test_utils::TestApp;
use cally::main_module::build_router;
use cally::tenants::Tenant;

pub struct Harness {
    pub app: TestApp,
    pub router: Router,
    pub tenant: Tenant,
    pub token: String,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(TestApp::new()).await
    }

    pub async fn with(app: TestApp) -> Self {
        let tenant = Tenant::new("owner-1", "Sunrise Yoga", "owner@sunrise.test");
        app.seed_tenant(&tenant).await;
        let token = app.token_for(&tenant);
        let router = build_router(app.state.clone());
        Self {
            app,
            router,
            tenant,
            token,
        }
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, method, uri, Some(&self.token), body).await
    }

    pub async fn store_event(&self, event: &CalendarEvent) {
        self.app
            .state
            .repo
            .put(&self.tenant.id, event)
            .await
            .expect("store event");
    }

    pub async fn load_event(&self, id: &str) -> Option<CalendarEvent> {
        self.app
            .state
            .repo
            .get::<CalendarEvent>(&self.tenant.id, id)
            .await
            .expect("load event")
    }

    /// A booked session tomorrow with a visitor attached.
    pub fn booking(&self, status: EventStatus) -> CalendarEvent {
        let start = Utc::now() + Duration::days(1);
        let mut event =
            CalendarEvent::new(&self.tenant.id, "Private session", start, start + Duration::hours(1));
        event.status = status;
        event.attendee = Some(Attendee {
            name: "Dana".to_string(),
            email: "dana@visitor.test".to_string(),
            phone: None,
        });
        event
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn time(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .expect("RFC 3339 timestamp")
}
