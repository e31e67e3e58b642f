use log::{info, warn};
use std::sync::Arc;

use crate::assistant::{ChatModel, OpenAiClient};
use crate::billing::{PaymentGateway, StripeClient};
use crate::calendar::{CalendarSync, SyncTarget};
use crate::core::config::{AppConfig, StorageBackend};
use crate::email::{self, Mailer};
use crate::integrations::{
    GoogleCalendarClient, MeetingScheduler, OAuthClients, OutlookCalendarClient, ZoomClient,
};
use crate::meet::{HmsClient, VideoProvider};
use crate::storage::Repository;

/// Everything a request handler needs. External services sit behind traits so
/// tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub repo: Repository,
    pub oauth: OAuthClients,
    pub calendar_sync: Arc<CalendarSync>,
    pub payments: Arc<dyn PaymentGateway>,
    pub video: Arc<dyn VideoProvider>,
    pub zoom: Arc<dyn MeetingScheduler>,
    pub mailer: Arc<dyn Mailer>,
    pub assistant: Arc<dyn ChatModel>,
}

impl AppState {
    pub async fn from_config(config: AppConfig) -> Self {
        let repo = repository_for(&config).await;
        let oauth = OAuthClients::from_config(&config);

        let calendar_sync = CalendarSync::new(vec![
            SyncTarget {
                calendar: Arc::new(GoogleCalendarClient::new(&config.google.api_base)),
                oauth: oauth.google.clone(),
            },
            SyncTarget {
                calendar: Arc::new(OutlookCalendarClient::new(&config.microsoft.api_base)),
                oauth: oauth.outlook.clone(),
            },
        ]);

        if config.stripe.secret_key.is_none() {
            warn!("STRIPE_SECRET_KEY not set, payment features are disabled");
        }
        if config.hms.access_key.is_none() {
            warn!("HMS_ACCESS_KEY not set, video rooms cannot be created");
        }

        Self {
            payments: Arc::new(StripeClient::from_config(&config.stripe)),
            video: Arc::new(HmsClient::new(config.hms.clone())),
            zoom: Arc::new(ZoomClient::new(&config.zoom.api_base)),
            mailer: email::mailer_from_config(&config.email),
            assistant: Arc::new(OpenAiClient::from_config(&config.openai)),
            calendar_sync: Arc::new(calendar_sync),
            oauth,
            repo,
            config,
        }
    }
}

async fn repository_for(config: &AppConfig) -> Repository {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Repository::in_memory()
        }
        #[cfg(feature = "dynamo")]
        StorageBackend::Dynamo => {
            let store = crate::storage::DynamoStore::new(
                config.storage.table_name.clone(),
                config.storage.endpoint_url.as_deref(),
            )
            .await;
            Repository::new(Arc::new(store))
        }
        #[cfg(not(feature = "dynamo"))]
        StorageBackend::Dynamo => {
            warn!("Built without the dynamo feature, falling back to in-memory storage");
            Repository::in_memory()
        }
    }
}
