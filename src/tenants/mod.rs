//! Tenants: the business accounts that own calendars, subscribers and settings.

mod handlers;
pub mod types;

pub use handlers::tenant_routes;
pub use types::{
    normalize_email, AvailabilityWindow, BookingConfig, CalendarConnection, CustomDomain,
    OAuthConnection, StripeAccountConfig, SubscriptionConfig, SubscriptionStatus, Tenant,
    TenantSubscriber, VideoPreference,
};

use crate::storage::{Repository, Result};

pub async fn find_by_owner(repo: &Repository, owner_id: &str) -> Result<Option<Tenant>> {
    let tenants: Vec<Tenant> = repo
        .list_by_index(&types::owner_index_key(owner_id))
        .await?;
    Ok(tenants.into_iter().next())
}

pub async fn find_by_id(repo: &Repository, tenant_id: &str) -> Result<Option<Tenant>> {
    repo.get(tenant_id, tenant_id).await
}

pub async fn save(repo: &Repository, tenant: &Tenant) -> Result<()> {
    repo.put(&tenant.id, tenant).await
}

pub async fn booking_config(repo: &Repository, tenant_id: &str) -> Result<BookingConfig> {
    Ok(repo
        .get::<BookingConfig>(tenant_id, "default")
        .await?
        .unwrap_or_default())
}
