//! Error taxonomy for the rating pipeline
//!
//! Errors split into two families with different handling at stage
//! boundaries:
//! - Hard errors (`InvalidInput`, `InvalidFactor`, `InvalidDiscount`,
//!   `ProhibitedJurisdiction`, `RateNotFound`) abort the calculation. No
//!   partial premium is ever returned.
//! - Soft errors (`ExternalDataUnavailable`, `StatisticalModelError`) are
//!   caught at their stage, converted to neutral contributions, and flagged
//!   on the result as a degraded calculation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage a calculation failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingStage {
    LoadingRates,
    ComputingFactors,
    ApplyingDiscounts,
    ApplyingSurcharges,
    Finalizing,
}

impl RatingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingStage::LoadingRates => "LOADING_RATES",
            RatingStage::ComputingFactors => "COMPUTING_FACTORS",
            RatingStage::ApplyingDiscounts => "APPLYING_DISCOUNTS",
            RatingStage::ApplyingSurcharges => "APPLYING_SURCHARGES",
            RatingStage::Finalizing => "FINALIZING",
        }
    }
}

/// Library-level error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatingError {
    /// Malformed or out-of-range caller input. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A multiplicative factor was zero, negative, or non-finite
    #[error("invalid factor '{name}': {value}")]
    InvalidFactor { name: String, value: f64 },

    /// A discount rate or cap failed validation
    #[error("invalid discount '{code}': {reason}")]
    InvalidDiscount { code: String, reason: String },

    /// Credit-based rating is legally forbidden for this state/product.
    /// Never bypassed, never retried.
    #[error("credit-based rating prohibited in {state} for {product}")]
    ProhibitedJurisdiction { state: String, product: String },

    /// No filed rate covers the requested state/product/coverage/date.
    /// Fatal for the quote; surfaced for manual handling.
    #[error("no filed rate for {state}/{product}/{coverage} as of {as_of}")]
    RateNotFound {
        state: String,
        product: String,
        coverage: String,
        as_of: NaiveDate,
    },

    /// Soft: an external lookup failed or timed out. The caller substitutes
    /// a neutral factor and continues.
    #[error("external data unavailable: {0}")]
    ExternalDataUnavailable(String),

    /// Soft: a statistical refinement failed. The base result stands.
    #[error("statistical model error: {0}")]
    StatisticalModelError(String),
}

impl RatingError {
    /// Soft errors degrade the calculation instead of aborting it
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            RatingError::ExternalDataUnavailable(_) | RatingError::StatisticalModelError(_)
        )
    }
}

/// A hard failure attributed to the pipeline stage that raised it
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rating failed at {}: {cause}", stage.as_str())]
pub struct StageError {
    pub stage: RatingStage,
    #[source]
    pub cause: RatingError,
}

impl StageError {
    pub fn new(stage: RatingStage, cause: RatingError) -> Self {
        Self { stage, cause }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_vs_hard() {
        assert!(RatingError::ExternalDataUnavailable("vin service".into()).is_soft());
        assert!(RatingError::StatisticalModelError("bad link".into()).is_soft());
        assert!(!RatingError::InvalidInput("limit".into()).is_soft());
        assert!(!RatingError::ProhibitedJurisdiction {
            state: "CA".into(),
            product: "auto".into()
        }
        .is_soft());
    }

    #[test]
    fn test_stage_error_display() {
        let err = StageError::new(
            RatingStage::LoadingRates,
            RatingError::RateNotFound {
                state: "TX".into(),
                product: "auto".into(),
                coverage: "liability".into(),
                as_of: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("LOADING_RATES"));
        assert!(msg.contains("TX/auto/liability"));
    }
}
