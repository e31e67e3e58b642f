use chrono::Utc;
use log::{error, info};

use super::stripe_integration::PaymentGateway;
use crate::calendar::{CalendarEvent, RefundRecord, RefundStatus};
use crate::tenants::Tenant;

pub fn refund_idempotency_key(event_id: &str) -> String {
    format!("refund-{event_id}")
}

/// Fully refunds the payment attached to a cancelled booking.
///
/// Returns `None` when the booking carries no payment. A previous successful
/// refund is returned unchanged without calling Stripe again. Failures are
/// returned as a `failed` record rather than an error so the cancellation
/// itself still goes through.
pub async fn refund_booking(
    payments: &dyn PaymentGateway,
    tenant: &Tenant,
    event: &CalendarEvent,
) -> Option<RefundRecord> {
    let payment_intent_id = event.stripe_payment_intent_id.as_deref()?;

    if let Some(previous) = event.refund.as_ref().filter(|r| r.succeeded()) {
        info!("Event {} already refunded ({:?})", event.id, previous.refund_id);
        return Some(previous.clone());
    }

    let account = tenant.stripe_account_id();
    let record = |status, reason: Option<String>| RefundRecord {
        status,
        refund_id: None,
        amount: None,
        currency: None,
        reason,
        attempted_at: Utc::now(),
    };

    let intent = match payments
        .retrieve_payment_intent(payment_intent_id, account)
        .await
    {
        Ok(intent) => intent,
        Err(e) => {
            error!("Failed to look up payment {payment_intent_id} for event {}: {e}", event.id);
            return Some(record(RefundStatus::Failed, Some(e.to_string())));
        }
    };

    if !intent.succeeded() {
        return Some(record(
            RefundStatus::Skipped,
            Some(format!("Payment status is {}", intent.status)),
        ));
    }

    match payments
        .refund_payment_intent(
            payment_intent_id,
            account,
            &refund_idempotency_key(&event.id),
        )
        .await
    {
        Ok(refund) => {
            info!(
                "Refunded {} {} for event {} ({})",
                refund.amount, refund.currency, event.id, refund.id
            );
            Some(RefundRecord {
                status: RefundStatus::Succeeded,
                refund_id: Some(refund.id),
                amount: Some(refund.amount),
                currency: Some(refund.currency),
                reason: None,
                attempted_at: Utc::now(),
            })
        }
        Err(e) => {
            error!("Refund failed for event {}: {e}", event.id);
            Some(RefundRecord {
                amount: Some(intent.amount),
                currency: Some(intent.currency),
                ..record(RefundStatus::Failed, Some(e.to_string()))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::FakePayments;
    use chrono::Duration;

    fn paid_event() -> (Tenant, CalendarEvent) {
        let tenant = Tenant::new("owner", "Studio", "owner@example.com");
        let start = Utc::now() + Duration::days(2);
        let mut event = CalendarEvent::new(&tenant.id, "Session", start, start + Duration::hours(1));
        event.stripe_payment_intent_id = Some("pi_1".to_string());
        (tenant, event)
    }

    #[tokio::test]
    async fn test_no_payment_no_refund() {
        let (tenant, mut event) = paid_event();
        event.stripe_payment_intent_id = None;
        let payments = FakePayments::default();
        assert!(refund_booking(&payments, &tenant, &event).await.is_none());
        assert!(payments.refund_keys().is_empty());
    }

    #[tokio::test]
    async fn test_successful_refund_uses_idempotency_key() {
        let (tenant, event) = paid_event();
        let payments = FakePayments::default();

        let record = refund_booking(&payments, &tenant, &event).await.unwrap();
        assert_eq!(record.status, RefundStatus::Succeeded);
        assert_eq!(record.amount, Some(5000));
        assert_eq!(payments.refund_keys(), vec![format!("refund-{}", event.id)]);
    }

    #[tokio::test]
    async fn test_previous_refund_is_not_repeated() {
        let (tenant, mut event) = paid_event();
        let payments = FakePayments::default();
        event.refund = refund_booking(&payments, &tenant, &event).await;

        let again = refund_booking(&payments, &tenant, &event).await.unwrap();
        assert!(again.succeeded());
        assert_eq!(payments.refund_keys().len(), 1);
    }

    #[tokio::test]
    async fn test_unpaid_intent_is_skipped_and_failure_recorded() {
        let (tenant, event) = paid_event();
        let unpaid = FakePayments::with_intent_status("requires_payment_method");
        let record = refund_booking(&unpaid, &tenant, &event).await.unwrap();
        assert_eq!(record.status, RefundStatus::Skipped);

        let failing = FakePayments::failing_refunds();
        let record = refund_booking(&failing, &tenant, &event).await.unwrap();
        assert_eq!(record.status, RefundStatus::Failed);
        assert!(record.reason.is_some());
    }
}
