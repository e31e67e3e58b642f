use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Entity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdTargeting {
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub age_min: Option<u8>,
    #[serde(default)]
    pub age_max: Option<u8>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdCreative {
    pub headline: String,
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_cta")]
    pub call_to_action: String,
    pub destination_url: String,
}

fn default_cta() -> String {
    "Book now".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdCampaign {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub targeting: AdTargeting,
    pub creative: AdCreative,
    pub daily_budget_cents: i64,
    pub total_budget_cents: i64,
    /// Credit moved from the tenant balance to this campaign.
    #[serde(default)]
    pub charged_cents: i64,
    /// Portion of the charged credit actually delivered as ads.
    #[serde(default)]
    pub spent_cents: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for AdCampaign {
    const KIND: &'static str = "AD_CAMPAIGN";

    fn entity_id(&self) -> String {
        self.id.clone()
    }
}

impl AdCampaign {
    pub fn remaining_budget_cents(&self) -> i64 {
        self.total_budget_cents - self.charged_cents
    }

    pub fn unspent_cents(&self) -> i64 {
        self.charged_cents - self.spent_cents
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Campaign name is required".to_string());
        }
        if self.creative.headline.trim().is_empty() {
            return Err("Headline is required".to_string());
        }
        if !self.creative.destination_url.starts_with("https://")
            && !self.creative.destination_url.starts_with("http://")
        {
            return Err("destinationUrl must be an http(s) URL".to_string());
        }
        if self.daily_budget_cents <= 0 || self.total_budget_cents <= 0 {
            return Err("Budgets must be positive".to_string());
        }
        if self.daily_budget_cents > self.total_budget_cents {
            return Err("Daily budget cannot exceed total budget".to_string());
        }
        if self.total_budget_cents < self.charged_cents {
            return Err("Total budget cannot be below the credit already charged".to_string());
        }
        if let (Some(min), Some(max)) = (self.targeting.age_min, self.targeting.age_max) {
            if min > max {
                return Err("ageMin cannot exceed ageMax".to_string());
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err("endDate cannot be before startDate".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdCredit {
    pub balance_cents: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for AdCredit {
    fn default() -> Self {
        Self {
            balance_cents: 0,
            currency: "usd".to_string(),
            updated_at: Utc::now(),
        }
    }
}

impl Entity for AdCredit {
    const KIND: &'static str = "AD_CREDIT";

    fn entity_id(&self) -> String {
        "balance".to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Spend,
    Refund,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdTransaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for AdTransaction {
    const KIND: &'static str = "AD_TXN";

    fn entity_id(&self) -> String {
        self.id.clone()
    }
}
