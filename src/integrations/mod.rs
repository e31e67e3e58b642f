//! Third-party account connections: OAuth for Google, Outlook and Zoom, plus
//! the calendar and meeting clients that use those connections.

pub mod google_calendar;
mod handlers;
pub mod oauth;
pub mod outlook_calendar;
pub mod zoom;

pub use google_calendar::GoogleCalendarClient;
pub use handlers::integration_routes;
pub use oauth::{IntegrationProvider, OAuthClient, OAuthError, OAuthProvider};
pub use outlook_calendar::OutlookCalendarClient;
pub use zoom::{MeetingScheduler, ZoomClient, ZoomError, ZoomMeeting};

use std::sync::Arc;

use crate::core::config::AppConfig;

/// One OAuth client per provider.
#[derive(Clone)]
pub struct OAuthClients {
    pub google: Arc<dyn OAuthProvider>,
    pub outlook: Arc<dyn OAuthProvider>,
    pub zoom: Arc<dyn OAuthProvider>,
}

impl OAuthClients {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            google: Arc::new(OAuthClient::google(config.google.clone())),
            outlook: Arc::new(OAuthClient::microsoft(config.microsoft.clone())),
            zoom: Arc::new(OAuthClient::zoom(config.zoom.clone())),
        }
    }

    pub fn get(&self, provider: IntegrationProvider) -> Arc<dyn OAuthProvider> {
        match provider {
            IntegrationProvider::Google => self.google.clone(),
            IntegrationProvider::Outlook => self.outlook.clone(),
            IntegrationProvider::Zoom => self.zoom.clone(),
        }
    }
}
