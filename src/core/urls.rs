#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Health
    pub const HEALTH: &'static str = "/health";

    // Tenant profile - JSON APIs
    pub const TENANT: &'static str = "/api/data/app/tenant";
    pub const BOOKING_CONFIG: &'static str = "/api/data/app/booking-config";

    // Calendar - JSON APIs
    pub const CALENDAR_EVENTS: &'static str = "/api/data/app/calendar/events";
    pub const CALENDAR_EVENT_BY_ID: &'static str = "/api/data/app/calendar/events/{id}";
    pub const CALENDAR_EVENT_RECORDING_START: &'static str =
        "/api/data/app/calendar/events/{id}/recording/start";
    pub const CALENDAR_EVENT_RECORDING_STOP: &'static str =
        "/api/data/app/calendar/events/{id}/recording/stop";
    pub const CALENDAR_EVENT_TRANSCRIPT: &'static str =
        "/api/data/app/calendar/events/{id}/transcript";
    pub const CALENDAR_EVENT_JOIN: &'static str = "/api/data/app/calendar/events/{id}/join";

    // Integrations - JSON APIs
    pub const INTEGRATION_CONNECT: &'static str = "/api/data/app/integrations/{provider}/connect";
    pub const INTEGRATION_BY_PROVIDER: &'static str = "/api/data/app/integrations/{provider}";
    pub const OAUTH_CALLBACK: &'static str = "/api/auth/{provider}/callback";

    // Stripe - JSON APIs
    pub const STRIPE: &'static str = "/api/data/app/stripe";
    pub const STRIPE_CONNECT: &'static str = "/api/data/app/stripe/connect";

    // Audience - JSON APIs
    pub const SUBSCRIBERS: &'static str = "/api/data/app/subscribers";
    pub const SUBSCRIBER_BY_EMAIL: &'static str = "/api/data/app/subscribers/{email}";
    pub const WAITLIST: &'static str = "/api/data/app/waitlist";
    pub const WAITLIST_BY_ID: &'static str = "/api/data/app/waitlist/{id}";
    pub const FEEDBACK: &'static str = "/api/data/app/feedback";
    pub const PUBLIC_FEEDBACK_RESPONSE: &'static str =
        "/api/public/tenants/{tenant_id}/feedback/{id}";

    // Landing page - JSON APIs
    pub const LANDING_PAGE: &'static str = "/api/data/app/landing-page";
    pub const LANDING_PAGE_UPGRADE: &'static str = "/api/data/app/landing-page/upgrade";

    // Ads - JSON APIs
    pub const AD_CAMPAIGNS: &'static str = "/api/data/app/ads/campaigns";
    pub const AD_CAMPAIGN_BY_ID: &'static str = "/api/data/app/ads/campaigns/{id}";
    pub const AD_CAMPAIGN_SPEND: &'static str = "/api/data/app/ads/campaigns/{id}/spend";
    pub const AD_CAMPAIGN_REFUND: &'static str = "/api/data/app/ads/campaigns/{id}/refund";
    pub const AD_CREDITS: &'static str = "/api/data/app/ads/credits";
    pub const AD_CREDITS_PURCHASE: &'static str = "/api/data/app/ads/credits/purchase";

    // Assistant - JSON APIs
    pub const KNOWLEDGE: &'static str = "/api/data/app/knowledge";
    pub const KNOWLEDGE_BY_ID: &'static str = "/api/data/app/knowledge/{id}";
    pub const ASSISTANT_CHAT: &'static str = "/api/data/app/assistant/chat";

    // Webhooks
    pub const WEBHOOK_STRIPE: &'static str = "/api/webhooks/stripe";
    pub const WEBHOOK_HMS: &'static str = "/api/webhooks/hms";
}
