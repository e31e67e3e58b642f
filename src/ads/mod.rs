//! Ad campaigns paid for from a prepaid credit balance.

mod handlers;
pub mod ledger;
pub mod types;

pub use handlers::ads_routes;
pub use ledger::LedgerError;
pub use types::{
    AdCampaign, AdCreative, AdCredit, AdTargeting, AdTransaction, CampaignStatus,
    TransactionKind,
};
