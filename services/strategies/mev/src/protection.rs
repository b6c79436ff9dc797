//! Privacy policy
//!
//! Chooses how strongly a submission must be shielded from third-party
//! visibility. The incentive to front-run scales with value, so larger
//! expected profit maps to a stronger privacy requirement.

use crate::submission::SubmissionOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::PrivacyLevel;

/// Privacy policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyPolicyConfig {
    /// Level used below every threshold
    pub base_level: PrivacyLevel,
    /// Net profit at or above which `Enhanced` is required
    pub enhanced_threshold: Decimal,
    /// Net profit at or above which `Maximum` is required
    pub maximum_threshold: Decimal,
    pub allow_public_fallback: bool,
    pub fast_mode: bool,
    pub max_block_wait: u64,
}

impl Default for PrivacyPolicyConfig {
    fn default() -> Self {
        Self {
            base_level: PrivacyLevel::Basic,
            enhanced_threshold: Decimal::from(100),
            maximum_threshold: Decimal::from(1000),
            allow_public_fallback: false,
            fast_mode: false,
            max_block_wait: 3,
        }
    }
}

impl PrivacyPolicyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.enhanced_threshold > self.maximum_threshold {
            return Err(format!(
                "enhanced_threshold {} exceeds maximum_threshold {}",
                self.enhanced_threshold, self.maximum_threshold
            ));
        }
        if self.max_block_wait == 0 {
            return Err("max_block_wait must be positive".to_string());
        }
        Ok(())
    }
}

/// Maps expected net profit to submission options
#[derive(Debug, Clone, Default)]
pub struct PrivacyPolicy {
    config: PrivacyPolicyConfig,
}

impl PrivacyPolicy {
    pub fn new(config: PrivacyPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrivacyPolicyConfig {
        &self.config
    }

    /// Required privacy for a trade netting `net_profit`; never below the base
    pub fn level_for(&self, net_profit: Decimal) -> PrivacyLevel {
        let by_value = if net_profit >= self.config.maximum_threshold {
            PrivacyLevel::Maximum
        } else if net_profit >= self.config.enhanced_threshold {
            PrivacyLevel::Enhanced
        } else {
            PrivacyLevel::Public
        };
        by_value.max(self.config.base_level)
    }

    pub fn options_for(&self, net_profit: Decimal) -> SubmissionOptions {
        SubmissionOptions {
            privacy_level: self.level_for(net_profit),
            allow_public_fallback: self.config.allow_public_fallback,
            fast_mode: self.config.fast_mode,
            max_block_wait: self.config.max_block_wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_privacy_scales_with_profit() {
        let policy = PrivacyPolicy::default();
        assert_eq!(policy.level_for(dec!(45)), PrivacyLevel::Basic);
        assert_eq!(policy.level_for(dec!(100)), PrivacyLevel::Enhanced);
        assert_eq!(policy.level_for(dec!(5000)), PrivacyLevel::Maximum);
    }

    #[test]
    fn test_base_level_is_a_floor() {
        let policy = PrivacyPolicy::new(PrivacyPolicyConfig {
            base_level: PrivacyLevel::Enhanced,
            ..Default::default()
        });
        assert_eq!(policy.level_for(dec!(1)), PrivacyLevel::Enhanced);

        let options = policy.options_for(dec!(2000));
        assert_eq!(options.privacy_level, PrivacyLevel::Maximum);
        assert_eq!(options.max_block_wait, 3);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = PrivacyPolicyConfig {
            enhanced_threshold: dec!(10),
            maximum_threshold: dec!(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
