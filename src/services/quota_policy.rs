use crate::models::{QuotaDecision, QuotaReason, UserQuota};

/// Free generations every user gets per month.
pub const BASE_LIMIT: u32 = 3;
/// Extra generations unlocked by sharing.
pub const BONUS_LIMIT: u32 = 3;
/// Shares needed before the bonus generations unlock.
pub const SHARE_REQUIREMENT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub base_limit: u32,
    pub bonus_limit: u32,
    pub share_requirement: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            base_limit: BASE_LIMIT,
            bonus_limit: BONUS_LIMIT,
            share_requirement: SHARE_REQUIREMENT,
        }
    }
}

impl QuotaPolicy {
    pub fn can_generate(&self, quota: &UserQuota) -> bool {
        self.evaluate(quota).allowed
    }

    pub fn evaluate(&self, quota: &UserQuota) -> QuotaDecision {
        let used = quota.monthly_generations;
        let bonus_unlocked = quota.share_count >= self.share_requirement;
        let ceiling = self.base_limit + self.bonus_limit;
        let shares_needed = self.share_requirement.saturating_sub(quota.share_count);

        let reason = if used < self.base_limit {
            QuotaReason::WithinBaseAllowance
        } else if used < ceiling && bonus_unlocked {
            QuotaReason::BonusUnlocked
        } else if used < ceiling {
            QuotaReason::SharesRequired
        } else {
            QuotaReason::MonthlyLimitReached
        };

        let remaining_generations = if bonus_unlocked {
            ceiling.saturating_sub(used)
        } else {
            self.base_limit.saturating_sub(used)
        };

        QuotaDecision {
            allowed: matches!(
                reason,
                QuotaReason::WithinBaseAllowance | QuotaReason::BonusUnlocked
            ),
            reason,
            remaining_generations,
            shares_needed,
        }
    }

    /// Decision used when the counters could not be read at all.
    pub fn deny_unavailable(&self) -> QuotaDecision {
        QuotaDecision {
            allowed: false,
            reason: QuotaReason::StoreUnavailable,
            remaining_generations: 0,
            shares_needed: 0,
        }
    }
}

/// Convenience wrapper over the default policy.
pub fn can_generate(quota: &UserQuota) -> bool {
    QuotaPolicy::default().can_generate(quota)
}
