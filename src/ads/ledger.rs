//! Ad credit accounting. Every balance change produces a ledger entry carrying
//! the balance after it was applied.

use chrono::Utc;

use super::types::{AdCampaign, AdCredit, AdTransaction, TransactionKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be positive")]
    NonPositiveAmount,
    #[error("Insufficient ad credit: balance {balance}, requested {requested}")]
    InsufficientCredit { balance: i64, requested: i64 },
    #[error("Campaign budget exceeded: {remaining} remaining, requested {requested}")]
    BudgetExceeded { remaining: i64, requested: i64 },
    #[error("Nothing to refund")]
    NothingToRefund,
}

/// Sort-friendly ledger id: entries list in chronological order.
fn transaction_id() -> String {
    format!(
        "{:013}-{}",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

fn entry(
    kind: TransactionKind,
    amount_cents: i64,
    balance_after_cents: i64,
    description: String,
) -> AdTransaction {
    AdTransaction {
        id: transaction_id(),
        kind,
        amount_cents,
        balance_after_cents,
        campaign_id: None,
        payment_intent_id: None,
        description,
        created_at: Utc::now(),
    }
}

pub fn purchase(
    credit: &mut AdCredit,
    amount_cents: i64,
    payment_intent_id: &str,
) -> Result<AdTransaction, LedgerError> {
    if amount_cents <= 0 {
        return Err(LedgerError::NonPositiveAmount);
    }
    credit.balance_cents += amount_cents;
    credit.updated_at = Utc::now();

    let mut txn = entry(
        TransactionKind::Purchase,
        amount_cents,
        credit.balance_cents,
        "Ad credit purchase".to_string(),
    );
    txn.payment_intent_id = Some(payment_intent_id.to_string());
    Ok(txn)
}

/// Moves credit from the balance to `campaign`. Neither the balance nor the
/// campaign's remaining budget may go below zero.
pub fn spend(
    credit: &mut AdCredit,
    campaign: &mut AdCampaign,
    amount_cents: i64,
) -> Result<AdTransaction, LedgerError> {
    if amount_cents <= 0 {
        return Err(LedgerError::NonPositiveAmount);
    }
    if amount_cents > credit.balance_cents {
        return Err(LedgerError::InsufficientCredit {
            balance: credit.balance_cents,
            requested: amount_cents,
        });
    }
    if amount_cents > campaign.remaining_budget_cents() {
        return Err(LedgerError::BudgetExceeded {
            remaining: campaign.remaining_budget_cents(),
            requested: amount_cents,
        });
    }

    let now = Utc::now();
    credit.balance_cents -= amount_cents;
    credit.updated_at = now;
    campaign.charged_cents += amount_cents;
    campaign.updated_at = now;

    let mut txn = entry(
        TransactionKind::Spend,
        -amount_cents,
        credit.balance_cents,
        format!("Spend on campaign {}", campaign.name),
    );
    txn.campaign_id = Some(campaign.id.clone());
    Ok(txn)
}

/// Returns the charged-but-undelivered part of a campaign to the balance.
pub fn refund_unspent(
    credit: &mut AdCredit,
    campaign: &mut AdCampaign,
) -> Result<AdTransaction, LedgerError> {
    let amount_cents = campaign.unspent_cents();
    if amount_cents <= 0 {
        return Err(LedgerError::NothingToRefund);
    }

    let now = Utc::now();
    credit.balance_cents += amount_cents;
    credit.updated_at = now;
    campaign.charged_cents = campaign.spent_cents;
    campaign.updated_at = now;

    let mut txn = entry(
        TransactionKind::Refund,
        amount_cents,
        credit.balance_cents,
        format!("Unspent credit returned from campaign {}", campaign.name),
    );
    txn.campaign_id = Some(campaign.id.clone());
    Ok(txn)
}
