//! Credit-based insurance scoring
//!
//! Maps a bucketed credit tier to a rating multiplier, with a hard
//! jurisdictional prohibition where credit-based rating is legally
//! forbidden. Also produces an informational insurance-specific score in
//! [200, 997] which is never itself applied as a premium factor.

use serde::{Deserialize, Serialize};

use crate::error::RatingError;
use crate::quote::Product;

/// Insurance score output band
pub const INSURANCE_SCORE_MIN: f64 = 200.0;
pub const INSURANCE_SCORE_MAX: f64 = 997.0;

/// State/product pairs where credit-based rating is legally forbidden.
/// This is a hard rule: never bypassed, never retried.
const PROHIBITED: &[(&str, Product)] = &[
    ("CA", Product::Auto),
    ("CA", Product::Home),
    ("HI", Product::Auto),
    ("MA", Product::Auto),
    ("MI", Product::Auto),
    ("MD", Product::Home),
];

/// One filed credit tier: scores at or above `min_score` not claimed by a
/// higher tier fall into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTier {
    pub name: String,
    pub min_score: u16,
    pub factor: f64,
}

/// Credit scorer configured with filed tiers
#[derive(Debug, Clone)]
pub struct CreditBasedInsuranceScorer {
    /// Tiers sorted by descending `min_score`
    tiers: Vec<CreditTier>,
}

impl CreditBasedInsuranceScorer {
    /// Build with custom tiers; they are sorted by descending score floor
    pub fn with_tiers(mut tiers: Vec<CreditTier>) -> Self {
        tiers.sort_by(|a, b| b.min_score.cmp(&a.min_score));
        Self { tiers }
    }

    /// Default filed tier table
    pub fn default_filed() -> Self {
        Self::with_tiers(vec![
            CreditTier {
                name: "excellent".into(),
                min_score: 800,
                factor: 0.85,
            },
            CreditTier {
                name: "good".into(),
                min_score: 740,
                factor: 0.90,
            },
            CreditTier {
                name: "average".into(),
                min_score: 670,
                factor: 1.00,
            },
            CreditTier {
                name: "below_average".into(),
                min_score: 580,
                factor: 1.15,
            },
            CreditTier {
                name: "poor".into(),
                min_score: 300,
                factor: 1.30,
            },
        ])
    }

    /// Whether credit-based rating is legal for the state/product
    pub fn is_permitted(state: &str, product: Product) -> bool {
        !PROHIBITED
            .iter()
            .any(|(s, p)| *s == state && *p == product)
    }

    /// Tier name for a credit score
    pub fn tier_name(&self, credit_score: u16) -> &str {
        self.tier_for(credit_score).map(|t| t.name.as_str()).unwrap_or("poor")
    }

    fn tier_for(&self, credit_score: u16) -> Option<&CreditTier> {
        self.tiers.iter().find(|t| credit_score >= t.min_score)
    }

    /// Credit rating factor for the bucketed tier. Hard
    /// `ProhibitedJurisdiction` error where forbidden.
    pub fn calculate_credit_factor(
        &self,
        credit_score: u16,
        state: &str,
        product: Product,
    ) -> Result<f64, RatingError> {
        if !Self::is_permitted(state, product) {
            return Err(RatingError::ProhibitedJurisdiction {
                state: state.to_string(),
                product: product.as_str().to_string(),
            });
        }
        if !(300..=850).contains(&credit_score) {
            return Err(RatingError::InvalidInput(format!(
                "credit score must be in [300, 850], got {}",
                credit_score
            )));
        }
        let tier = self
            .tier_for(credit_score)
            .ok_or_else(|| RatingError::InvalidInput("empty credit tier table".to_string()))?;
        Ok(tier.factor)
    }

    /// Informational insurance-specific score in [200, 997], blending
    /// credit score, payment history, utilization, length of credit and
    /// inquiry count. Never applied as a premium factor.
    pub fn calculate_insurance_score(
        &self,
        credit_score: u16,
        payment_history: f64,
        utilization: f64,
        credit_history_years: f64,
        inquiry_count: u32,
    ) -> Result<f64, RatingError> {
        if !(300..=850).contains(&credit_score) {
            return Err(RatingError::InvalidInput(format!(
                "credit score must be in [300, 850], got {}",
                credit_score
            )));
        }
        if !(0.0..=1.0).contains(&payment_history) {
            return Err(RatingError::InvalidInput(format!(
                "payment history must be in [0, 1], got {}",
                payment_history
            )));
        }
        if !(utilization >= 0.0) || !utilization.is_finite() {
            return Err(RatingError::InvalidInput(format!(
                "utilization must be non-negative, got {}",
                utilization
            )));
        }
        if !(credit_history_years >= 0.0) || !credit_history_years.is_finite() {
            return Err(RatingError::InvalidInput(format!(
                "credit history years must be non-negative, got {}",
                credit_history_years
            )));
        }

        // Credit score anchors [200, 700]; the remaining components add or
        // subtract around it
        let base = 200.0 + (credit_score as f64 - 300.0) / 550.0 * 500.0;
        let payment = payment_history * 150.0;
        let usage = (1.0 - utilization.min(1.0)) * 80.0;
        let history = (credit_history_years.min(25.0) / 25.0) * 47.0;
        let inquiries = (inquiry_count as f64 * 8.0).min(60.0);

        let score = base + payment + usage + history - inquiries;
        Ok(score.clamp(INSURANCE_SCORE_MIN, INSURANCE_SCORE_MAX))
    }
}

impl Default for CreditBasedInsuranceScorer {
    fn default() -> Self {
        Self::default_filed()
    }
}
