use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-user generation counters for the current monthly period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserQuota {
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub monthly_generations: u32,
    pub share_count: u32,
}

impl UserQuota {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: Some(Utc::now()),
            monthly_generations: 0,
            share_count: 0,
        }
    }
}

/// Why the quota policy allowed or denied a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum QuotaReason {
    WithinBaseAllowance,
    BonusUnlocked,
    SharesRequired,
    MonthlyLimitReached,
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: QuotaReason,
    pub remaining_generations: u32,
    /// Shares still needed to unlock the bonus allowance.
    pub shares_needed: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub usage: UserQuota,
    pub decision: QuotaDecision,
}
