//! Session authentication and tenant resolution for `/api/data/app` routes.
//!
//! Sessions are HS256 JWTs issued by the identity layer in front of the app and
//! arrive either as a bearer token or in the session cookie.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
    RequestPartsExt,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_cookies::Cookies;

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::tenants::Tenant;

const OAUTH_STATE_TTL_MINUTES: i64 = 15;

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| {
            if auth.len() > 7 && auth[..7].eq_ignore_ascii_case("bearer ") {
                Some(auth[7..].trim().to_string())
            } else {
                None
            }
        })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn issue_session_token(
    sub: &str,
    email: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: sub.to_string(),
        email: email.to_string(),
        name: String::new(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign session: {e}")))
}

pub fn decode_session(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid or expired session".to_string()))
}

/// Authenticated user extractor
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);

        let token = match extract_bearer_token(&parts.headers) {
            Some(token) => token,
            None => parts
                .extract::<Cookies>()
                .await
                .ok()
                .and_then(|cookies| {
                    cookies
                        .get(&app.config.auth.cookie_name)
                        .map(|cookie| cookie.value().to_string())
                })
                .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?,
        };

        let claims = decode_session(&token, &app.config.auth.jwt_secret)?;
        Ok(AuthenticatedUser { claims })
    }
}

/// The session user together with the tenant they own.
#[derive(Debug, Clone)]
pub struct CurrentTenant {
    pub user: AuthenticatedUser,
    pub tenant: Tenant,
}

impl CurrentTenant {
    pub fn id(&self) -> &str {
        &self.tenant.id
    }
}

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let app = Arc::<AppState>::from_ref(state);

        let tenant = crate::tenants::find_by_owner(&app.repo, &user.claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("Tenant"))?;

        Ok(CurrentTenant { user, tenant })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OAuthState {
    tenant_id: String,
    provider: String,
    exp: i64,
}

/// Signed, short-lived `state` parameter for OAuth redirects.
pub fn sign_oauth_state(tenant_id: &str, provider: &str, secret: &str) -> Result<String, ApiError> {
    let state = OAuthState {
        tenant_id: tenant_id.to_string(),
        provider: provider.to_string(),
        exp: (Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).timestamp(),
    };
    encode(
        &Header::default(),
        &state,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign OAuth state: {e}")))
}

/// Returns the tenant id carried by a valid state for `provider`.
pub fn verify_oauth_state(state: &str, provider: &str, secret: &str) -> Result<String, ApiError> {
    let data = decode::<OAuthState>(
        state,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Validation("Invalid or expired OAuth state".to_string()))?;

    if data.claims.provider != provider {
        return Err(ApiError::Validation("OAuth state provider mismatch".to_string()));
    }
    Ok(data.claims.tenant_id)
}
