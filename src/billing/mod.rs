//! Stripe Connect for tenants: onboarding, booking payments and refunds.

mod handlers;
pub mod refunds;
pub mod stripe_integration;

pub use handlers::billing_routes;
pub use refunds::{refund_booking, refund_idempotency_key};
pub use stripe_integration::{
    ConnectedAccount, PaymentGateway, PaymentIntent, StripeClient, StripeError, StripeRefund,
    StripeWebhookEvent,
};
