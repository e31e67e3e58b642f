//! In-process fakes for every external service plus a ready-made [`AppState`].
//! Compiled for unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::assistant::{AssistantError, ChatMessage, ChatModel};
use crate::billing::{
    ConnectedAccount, PaymentGateway, PaymentIntent, StripeError, StripeRefund,
    StripeWebhookEvent,
};
use crate::calendar::{CalendarEvent, CalendarProvider, CalendarSync, SyncError, SyncTarget};
use crate::core::config::AppConfig;
use crate::core::session::issue_session_token;
use crate::core::shared::state::AppState;
use crate::email::{EmailError, EmailMessage, Mailer};
use crate::integrations::{
    IntegrationProvider, MeetingScheduler, OAuthClients, OAuthError, OAuthProvider, ZoomError,
    ZoomMeeting,
};
use crate::meet::{HmsError, VideoProvider};
use crate::storage::{ItemStore, MemoryStore, Repository, StorageError, StoredItem};
use crate::tenants::{self, CalendarConnection, OAuthConnection, Tenant};

pub const TEST_JWT_SECRET: &str = "test-secret-key-with-at-least-32-characters";
pub const TEST_BASE_URL: &str = "https://app.test";
pub const TEST_HMS_WEBHOOK_SECRET: &str = "hms-webhook-secret";
pub const TEST_INTENT_AMOUNT: i64 = 5000;

pub fn test_config() -> AppConfig {
    let vars: HashMap<String, String> = [
        ("STORAGE_BACKEND", "memory"),
        ("JWT_SECRET", TEST_JWT_SECRET),
        ("APP_BASE_URL", TEST_BASE_URL),
        ("HMS_WEBHOOK_SECRET", TEST_HMS_WEBHOOK_SECRET),
        ("EMAIL_FROM", "CallyGo <no-reply@callygo.test>"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    AppConfig::from_map(&vars)
}

pub fn oauth_connection(expires_at: DateTime<Utc>) -> OAuthConnection {
    OAuthConnection {
        access_token: "access-token".to_string(),
        refresh_token: Some("refresh-token".to_string()),
        expires_at,
        account_email: Some("owner@example.com".to_string()),
    }
}

/// A tenant with Google Calendar connected. `expired` makes the stored access
/// token due for refresh.
pub fn connected_tenant(expired: bool) -> Tenant {
    let mut tenant = Tenant::new("owner-1", "Sunrise Yoga", "owner@example.com");
    let expires_at = if expired {
        Utc::now() - Duration::hours(1)
    } else {
        Utc::now() + Duration::hours(1)
    };
    tenant.set_calendar_connection(
        IntegrationProvider::Google,
        Some(CalendarConnection::new(oauth_connection(expires_at))),
    );
    tenant
}

/// Memory store whose puts or deletes fail for sort keys starting with
/// `fail_prefix`.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_prefix: String,
    fail_puts: bool,
    fail_deletes: bool,
}

impl FlakyStore {
    pub fn failing_writes(fail_prefix: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_prefix: fail_prefix.to_string(),
            fail_puts: true,
            fail_deletes: false,
        }
    }

    pub fn failing_deletes(fail_prefix: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_prefix: fail_prefix.to_string(),
            fail_puts: false,
            fail_deletes: true,
        }
    }

    fn throttled() -> StorageError {
        StorageError::Backend("ProvisionedThroughputExceededException".to_string())
    }
}

#[async_trait]
impl ItemStore for FlakyStore {
    async fn get(&self, pk: &str, sk: &str) -> crate::storage::Result<Option<StoredItem>> {
        self.inner.get(pk, sk).await
    }

    async fn put(&self, item: StoredItem) -> crate::storage::Result<()> {
        if self.fail_puts && item.sk.starts_with(&self.fail_prefix) {
            return Err(Self::throttled());
        }
        self.inner.put(item).await
    }

    async fn delete(&self, pk: &str, sk: &str) -> crate::storage::Result<bool> {
        if self.fail_deletes && sk.starts_with(&self.fail_prefix) {
            return Err(Self::throttled());
        }
        self.inner.delete(pk, sk).await
    }

    async fn query_prefix(
        &self,
        pk: &str,
        sk_prefix: &str,
    ) -> crate::storage::Result<Vec<StoredItem>> {
        self.inner.query_prefix(pk, sk_prefix).await
    }

    async fn query_index(&self, gsi1pk: &str) -> crate::storage::Result<Vec<StoredItem>> {
        self.inner.query_index(gsi1pk).await
    }

    async fn ping(&self) -> crate::storage::Result<()> {
        self.inner.ping().await
    }
}

pub struct FakeCalendar {
    provider: IntegrationProvider,
    fail: bool,
    counter: AtomicUsize,
    upserted: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeCalendar {
    pub fn new(provider: IntegrationProvider) -> Self {
        Self {
            provider,
            fail: false,
            counter: AtomicUsize::new(0),
            upserted: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(provider: IntegrationProvider) -> Self {
        Self {
            fail: true,
            ..Self::new(provider)
        }
    }

    /// Ids of the local events pushed, in call order.
    pub fn upserted(&self) -> Vec<String> {
        self.upserted.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// External ids removed, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    fn provider(&self) -> IntegrationProvider {
        self.provider
    }

    async fn upsert_event(
        &self,
        _connection: &CalendarConnection,
        event: &CalendarEvent,
        external_id: Option<&str>,
    ) -> Result<String, SyncError> {
        if self.fail {
            return Err(SyncError::Api {
                status: 503,
                message: "calendar unavailable".to_string(),
            });
        }
        if let Ok(mut upserted) = self.upserted.lock() {
            upserted.push(event.id.clone());
        }
        Ok(match external_id {
            Some(id) => id.to_string(),
            None => {
                let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                format!("{}-{n}", self.provider)
            }
        })
    }

    async fn delete_event(
        &self,
        _connection: &CalendarConnection,
        external_id: &str,
    ) -> Result<(), SyncError> {
        if self.fail {
            return Err(SyncError::Network("connection reset".to_string()));
        }
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(external_id.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeOAuth;

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!("https://auth.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthConnection, OAuthError> {
        if code == "bad-code" {
            return Err(OAuthError::Api("invalid_grant".to_string()));
        }
        let mut connection = oauth_connection(Utc::now() + Duration::hours(1));
        connection.access_token = format!("token-{code}");
        Ok(connection)
    }

    async fn refresh(&self, connection: &OAuthConnection) -> Result<OAuthConnection, OAuthError> {
        Ok(OAuthConnection {
            access_token: "refreshed-token".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            ..connection.clone()
        })
    }
}

pub struct FakePayments {
    intent_status: String,
    fail_refunds: bool,
    intent_metadata: HashMap<String, String>,
    refund_keys: Mutex<Vec<String>>,
}

impl Default for FakePayments {
    fn default() -> Self {
        Self::with_intent_status("succeeded")
    }
}

impl FakePayments {
    pub fn with_intent_status(status: &str) -> Self {
        Self {
            intent_status: status.to_string(),
            fail_refunds: false,
            intent_metadata: HashMap::new(),
            refund_keys: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_refunds() -> Self {
        Self {
            fail_refunds: true,
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.intent_metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Idempotency keys of every refund request, in call order.
    pub fn refund_keys(&self) -> Vec<String> {
        self.refund_keys.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        _account: Option<&str>,
    ) -> Result<PaymentIntent, StripeError> {
        let succeeded = self.intent_status == "succeeded";
        Ok(PaymentIntent {
            id: payment_intent_id.to_string(),
            status: self.intent_status.clone(),
            amount: TEST_INTENT_AMOUNT,
            amount_received: if succeeded { TEST_INTENT_AMOUNT } else { 0 },
            currency: "usd".to_string(),
            metadata: self.intent_metadata.clone(),
        })
    }

    async fn refund_payment_intent(
        &self,
        payment_intent_id: &str,
        _account: Option<&str>,
        idempotency_key: &str,
    ) -> Result<StripeRefund, StripeError> {
        if let Ok(mut keys) = self.refund_keys.lock() {
            keys.push(idempotency_key.to_string());
        }
        if self.fail_refunds {
            return Err(StripeError::ApiError("charge_already_refunded".to_string()));
        }
        Ok(StripeRefund {
            id: format!("re_{payment_intent_id}"),
            status: "succeeded".to_string(),
            amount: TEST_INTENT_AMOUNT,
            currency: "usd".to_string(),
        })
    }

    async fn create_connected_account(
        &self,
        _email: &str,
        _tenant_id: &str,
    ) -> Result<ConnectedAccount, StripeError> {
        Ok(ConnectedAccount {
            id: "acct_test".to_string(),
            charges_enabled: false,
            details_submitted: false,
        })
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, StripeError> {
        Ok(ConnectedAccount {
            id: account_id.to_string(),
            charges_enabled: true,
            details_submitted: true,
        })
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<String, StripeError> {
        Ok(format!("https://connect.stripe.test/setup/{account_id}"))
    }

    fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<StripeWebhookEvent, StripeError> {
        if signature != "valid" {
            return Err(StripeError::InvalidWebhook("signature mismatch".to_string()));
        }
        serde_json::from_str(payload).map_err(|e| StripeError::ParseError(e.to_string()))
    }
}

#[derive(Default)]
pub struct FakeVideo {
    fail_start: bool,
    rooms: AtomicUsize,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
}

impl FakeVideo {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VideoProvider for FakeVideo {
    async fn create_room(&self, _name: &str) -> Result<String, HmsError> {
        let n = self.rooms.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("room-{n}"))
    }

    async fn start_recording(&self, room_id: &str) -> Result<(), HmsError> {
        if self.fail_start {
            return Err(HmsError::Api("recording already running".to_string()));
        }
        if let Ok(mut started) = self.started.lock() {
            started.push(room_id.to_string());
        }
        Ok(())
    }

    async fn stop_recording(&self, room_id: &str) -> Result<(), HmsError> {
        if let Ok(mut stopped) = self.stopped.lock() {
            stopped.push(room_id.to_string());
        }
        Ok(())
    }

    fn auth_token(&self, room_id: &str, user_id: &str, role: &str) -> Result<String, HmsError> {
        Ok(format!("token-{room_id}-{user_id}-{role}"))
    }
}

#[derive(Default)]
pub struct FakeZoom {
    topics: Mutex<Vec<String>>,
}

impl FakeZoom {
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MeetingScheduler for FakeZoom {
    async fn create_meeting(
        &self,
        _connection: &OAuthConnection,
        topic: &str,
        _start: DateTime<Utc>,
        _duration_minutes: i64,
    ) -> Result<ZoomMeeting, ZoomError> {
        if let Ok(mut topics) = self.topics.lock() {
            topics.push(topic.to_string());
        }
        Ok(ZoomMeeting {
            id: 123_456,
            join_url: "https://zoom.us/j/123456".to_string(),
            start_url: None,
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    fail: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Transport("421 service not available".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

pub struct FakeChatModel {
    reply: Option<String>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChatModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        self.reply.clone().ok_or(AssistantError::NotConfigured)
    }
}

/// An [`AppState`] wired to fakes, with handles to inspect what they saw.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub payments: Arc<FakePayments>,
    pub video: Arc<FakeVideo>,
    pub zoom: Arc<FakeZoom>,
    pub mailer: Arc<RecordingMailer>,
    pub google: Arc<FakeCalendar>,
    pub assistant: Arc<FakeChatModel>,
}

pub struct TestAppBuilder {
    repo: Repository,
    payments: FakePayments,
    video: FakeVideo,
    mailer: RecordingMailer,
    google: FakeCalendar,
    assistant: FakeChatModel,
}

impl TestAppBuilder {
    pub fn repo(mut self, repo: Repository) -> Self {
        self.repo = repo;
        self
    }

    pub fn payments(mut self, payments: FakePayments) -> Self {
        self.payments = payments;
        self
    }

    pub fn video(mut self, video: FakeVideo) -> Self {
        self.video = video;
        self
    }

    pub fn mailer(mut self, mailer: RecordingMailer) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn google(mut self, google: FakeCalendar) -> Self {
        self.google = google;
        self
    }

    pub fn assistant(mut self, assistant: FakeChatModel) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn build(self) -> TestApp {
        let fake_oauth: Arc<dyn OAuthProvider> = Arc::new(FakeOAuth);
        let oauth = OAuthClients {
            google: fake_oauth.clone(),
            outlook: fake_oauth.clone(),
            zoom: fake_oauth.clone(),
        };

        let payments = Arc::new(self.payments);
        let video = Arc::new(self.video);
        let zoom = Arc::new(FakeZoom::default());
        let mailer = Arc::new(self.mailer);
        let google = Arc::new(self.google);
        let assistant = Arc::new(self.assistant);

        let state = AppState {
            config: test_config(),
            repo: self.repo,
            calendar_sync: Arc::new(CalendarSync::new(vec![SyncTarget {
                calendar: google.clone(),
                oauth: fake_oauth,
            }])),
            oauth,
            payments: payments.clone(),
            video: video.clone(),
            zoom: zoom.clone(),
            mailer: mailer.clone(),
            assistant: assistant.clone(),
        };

        TestApp {
            state: Arc::new(state),
            payments,
            video,
            zoom,
            mailer,
            google,
            assistant,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            repo: Repository::in_memory(),
            payments: FakePayments::default(),
            video: FakeVideo::default(),
            mailer: RecordingMailer::default(),
            google: FakeCalendar::new(IntegrationProvider::Google),
            assistant: FakeChatModel::replying("Happy to help!"),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn seed_tenant(&self, tenant: &Tenant) {
        if let Err(e) = tenants::save(&self.state.repo, tenant).await {
            panic!("failed to seed tenant: {e}");
        }
    }

    /// Bearer token for the tenant's owner.
    pub fn token_for(&self, tenant: &Tenant) -> String {
        match issue_session_token(
            &tenant.owner_id,
            &tenant.email,
            TEST_JWT_SECRET,
            Duration::hours(1),
        ) {
            Ok(token) => token,
            Err(e) => panic!("failed to issue test token: {e}"),
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
