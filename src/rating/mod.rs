//! Core rating calculators: premium, discounts, surcharges, credit and
//! statistical refinements

pub mod credit;
pub mod discounts;
pub mod factor;
pub mod models;
pub mod premium;
pub mod result;
pub mod surcharges;

pub use credit::CreditBasedInsuranceScorer;
pub use discounts::{AppliedDiscount, DiscountCalculator, EligibleDiscount};
pub use factor::{round_cents, FactorMap};
pub use models::{FrequencySeverity, LinkFunction, StatisticalRatingModels};
pub use premium::PremiumCalculator;
pub use result::{FactorImpact, PricingResult, StatisticalAdjustments};
pub use surcharges::{
    AppliedSurcharge, Severity, SurchargeCalculator, SurchargeSummary, SurchargeSummaryRow,
};
