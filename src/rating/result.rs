//! Priced result and audit trail types
//!
//! A `PricingResult` is produced once per calculation and never mutated; a
//! new quote version is created instead of editing a priced result. The
//! factor impacts carry enough detail for a regulator to reconstruct the
//! quoted premium from the filed rate.

use serde::{Deserialize, Serialize};

use super::discounts::AppliedDiscount;
use super::surcharges::AppliedSurcharge;

/// Per-factor dollar impact, reported in application order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorImpact {
    /// Factor name, e.g. "territory"
    pub name: String,

    /// The multiplier applied
    pub factor: f64,

    /// Running premium before this factor
    pub premium_before: f64,

    /// Running premium after this factor
    pub premium_after: f64,

    /// Dollar impact of this factor at its position in the order
    pub dollar_impact: f64,
}

/// Advisory statistical refinements attached to a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalAdjustments {
    /// GLM factor applied during composition, when the model succeeded
    pub glm_factor: Option<f64>,

    /// Frequency multiplier from the frequency-severity model (advisory)
    pub frequency_factor: Option<f64>,

    /// Severity multiplier from the frequency-severity model (advisory)
    pub severity_factor: Option<f64>,

    /// Frequency x severity pure-premium factor (advisory)
    pub pure_premium_factor: Option<f64>,

    /// Catastrophe loading applied during composition, when present
    pub catastrophe_loading: Option<f64>,
}

impl StatisticalAdjustments {
    pub fn is_empty(&self) -> bool {
        self.glm_factor.is_none()
            && self.frequency_factor.is_none()
            && self.severity_factor.is_none()
            && self.pure_premium_factor.is_none()
            && self.catastrophe_loading.is_none()
    }
}

/// The final priced output for one quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub quote_id: String,

    /// Sum of per-coverage base premiums, before risk factors
    pub base_premium: f64,

    /// Base premium after multiplicative factor composition
    pub factored_premium: f64,

    /// Per-factor audit trail in application order
    pub factor_impacts: Vec<FactorImpact>,

    pub applied_discounts: Vec<AppliedDiscount>,

    pub total_discount_amount: f64,

    pub applied_surcharges: Vec<AppliedSurcharge>,

    pub total_surcharge_amount: f64,

    /// Statistical refinements, absent when the layer was skipped entirely
    pub statistical: Option<StatisticalAdjustments>,

    pub final_premium: f64,

    /// Set when a soft failure forced a neutral substitution somewhere
    pub degraded: bool,

    /// Internal audit notes (degradations, skipped adjustments)
    pub audit_notes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistical_adjustments_empty() {
        let mut adj = StatisticalAdjustments::default();
        assert!(adj.is_empty());
        adj.glm_factor = Some(1.05);
        assert!(!adj.is_empty());
    }

    #[test]
    fn test_result_serializes() {
        let result = PricingResult {
            quote_id: "Q-1".into(),
            base_premium: 500.0,
            factored_premium: 540.0,
            factor_impacts: vec![FactorImpact {
                name: "territory".into(),
                factor: 1.2,
                premium_before: 500.0,
                premium_after: 600.0,
                dollar_impact: 100.0,
            }],
            applied_discounts: Vec::new(),
            total_discount_amount: 0.0,
            applied_surcharges: Vec::new(),
            total_surcharge_amount: 0.0,
            statistical: None,
            final_premium: 540.0,
            degraded: false,
            audit_notes: Vec::new(),
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: PricingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
