use std::sync::Arc;

use crate::{
    errors::{AppError, Result},
    models::{QuotaDecision, QuotaReason, UsageResponse, UserQuota},
    services::{quota_policy::QuotaPolicy, quota_store::QuotaStore},
};

/// Ties the quota store to the policy. Every read failure is a denial.
#[derive(Clone)]
pub struct QuotaManager {
    store: Arc<dyn QuotaStore>,
    policy: QuotaPolicy,
}

#[derive(Debug)]
pub struct QuotaCheckResult {
    pub decision: QuotaDecision,
    pub usage: Option<UserQuota>,
}

impl QuotaManager {
    pub fn new(store: Arc<dyn QuotaStore>, policy: QuotaPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn QuotaStore> {
        &self.store
    }

    /// Creates the user's record if needed. Safe on every authentication.
    pub async fn register_user(&self, user_id: &str) -> Result<()> {
        self.store.ensure_user_document(user_id).await
    }

    pub async fn check_generation(&self, user_id: &str) -> QuotaCheckResult {
        match self.store.get_usage_stats(user_id).await {
            Ok(usage) => QuotaCheckResult {
                decision: self.policy.evaluate(&usage),
                usage: Some(usage),
            },
            Err(e) => {
                tracing::warn!("Quota read failed for {}, denying generation: {}", user_id, e);
                QuotaCheckResult {
                    decision: self.policy.deny_unavailable(),
                    usage: None,
                }
            }
        }
    }

    pub async fn can_generate(&self, user_id: &str) -> bool {
        self.check_generation(user_id).await.decision.allowed
    }

    /// Like [`QuotaManager::check_generation`] but turns a denial into the
    /// error the caller should see.
    pub async fn require_generation_allowed(&self, user_id: &str) -> Result<QuotaDecision> {
        let check = self.check_generation(user_id).await;
        let decision = check.decision;

        if decision.allowed {
            return Ok(decision);
        }

        Err(match decision.reason {
            QuotaReason::StoreUnavailable => {
                AppError::StoreUnavailable("quota could not be read".to_string())
            }
            QuotaReason::SharesRequired => AppError::QuotaExceeded(format!(
                "You've used your {} free stories this month. Share BraveBunny {} more time{} to unlock {} bonus stories.",
                self.policy.base_limit,
                decision.shares_needed,
                if decision.shares_needed == 1 { "" } else { "s" },
                self.policy.bonus_limit,
            )),
            _ => AppError::QuotaExceeded(
                "You've reached this month's story limit. New stories unlock next month.".to_string(),
            ),
        })
    }

    pub async fn record_generation(&self, user_id: &str) -> Result<u32> {
        self.store.record_generation(user_id).await
    }

    pub async fn record_share(&self, user_id: &str) -> Result<UsageResponse> {
        self.store.record_share(user_id).await?;
        self.get_quota_status(user_id).await
    }

    pub async fn reset_monthly_generations(&self, user_id: &str) -> Result<()> {
        self.store.reset_monthly_generations(user_id).await
    }

    pub async fn get_quota_status(&self, user_id: &str) -> Result<UsageResponse> {
        let usage = self.store.get_usage_stats(user_id).await?;
        let decision = self.policy.evaluate(&usage);
        Ok(UsageResponse { usage, decision })
    }
}
