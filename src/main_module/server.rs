//! HTTP server initialization and routing

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{health_check, shutdown_signal};
use crate::ads::ads_routes;
use crate::assistant::assistant_routes;
use crate::billing::billing_routes;
use crate::calendar::calendar_routes;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::feedback::feedback_routes;
use crate::integrations::integration_routes;
use crate::landing::landing_routes;
use crate::meet::meet_routes;
use crate::tenants::tenant_routes;
use crate::waitlist::waitlist_routes;

/// Browser calls come from the app's own origin and carry the session cookie.
fn cors_layer(base_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match base_url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("APP_BASE_URL {base_url} is not a valid origin, cross-origin calls disabled");
            cors
        }
    }
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(ApiUrls::HEALTH, get(health_check))
        .merge(tenant_routes())
        .merge(calendar_routes())
        .merge(meet_routes())
        .merge(integration_routes())
        .merge(billing_routes())
        .merge(waitlist_routes())
        .merge(feedback_routes())
        .merge(landing_routes())
        .merge(ads_routes())
        .merge(assistant_routes());

    let cors = cors_layer(&app_state.config.server.base_url);

    api_router
        .with_state(app_state)
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let server = &app_state.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(std::io::Error::other)?;

    let app = build_router(app_state.clone());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {addr}: {e} - is another instance running?");
            return Err(e);
        }
    };
    info!("HTTP server listening on {addr}");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
