//! Priority-ordered, capped discount stacking
//!
//! Policy for non-stackable discounts: a present non-stackable discount
//! fully replaces the stack. Only the single highest-value non-stackable
//! discount applies and every other discount is discarded.
//!
//! When the additive sum of stackable rates exceeds the jurisdiction cap,
//! every applied rate is scaled proportionally so the sum equals the cap
//! exactly. The lowest-priority discount is never silently dropped.

use serde::{Deserialize, Serialize};

use crate::error::RatingError;
use crate::quote::QuoteRequest;
use crate::tables::DiscountRule;

/// A discount that passed eligibility, ready for stacking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleDiscount {
    pub code: String,

    /// Filed rate against the premium basis
    pub rate: f64,

    pub stackable: bool,

    /// Ascending priority; lower applies first
    pub priority: u32,
}

/// One applied discount with its filed and effective rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,

    /// Filed rate
    pub rate: f64,

    /// Rate actually applied after cap scaling
    pub applied_rate: f64,

    /// Dollar amount off the premium basis
    pub amount: f64,
}

/// Stateless discount stacking calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscountCalculator;

impl DiscountCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate filed rules against the quote and convert the eligible ones
    /// for stacking
    pub fn eligible_discounts(
        &self,
        rules: &[DiscountRule],
        quote: &QuoteRequest,
        basis: f64,
    ) -> Vec<EligibleDiscount> {
        rules
            .iter()
            .filter(|r| r.eligible(quote))
            .map(|r| EligibleDiscount {
                code: r.code.clone(),
                rate: r.rate_for(basis),
                stackable: r.stackable,
                priority: r.priority,
            })
            .collect()
    }

    /// Stack eligible discounts against the premium basis under the state
    /// cap. Returns the applied discounts (in application order) and the
    /// total discount amount.
    pub fn calculate_stacked_discounts(
        &self,
        base_premium: f64,
        discounts: &[EligibleDiscount],
        state_cap: f64,
    ) -> Result<(Vec<AppliedDiscount>, f64), RatingError> {
        if !(state_cap > 0.0 && state_cap <= 1.0) {
            return Err(RatingError::InvalidDiscount {
                code: "STATE_CAP".to_string(),
                reason: format!("cap must be in (0, 1], got {}", state_cap),
            });
        }
        for d in discounts {
            if !(d.rate > 0.0) || !d.rate.is_finite() {
                return Err(RatingError::InvalidDiscount {
                    code: d.code.clone(),
                    reason: format!("rate must be positive, got {}", d.rate),
                });
            }
        }

        if discounts.is_empty() {
            return Ok((Vec::new(), 0.0));
        }

        // Ascending priority, code as a deterministic tie-break
        let mut ordered: Vec<&EligibleDiscount> = discounts.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.code.cmp(&b.code)));

        // A non-stackable discount replaces the whole stack: keep only the
        // single highest-value one
        if ordered.iter().any(|d| !d.stackable) {
            let best = ordered
                .iter()
                .filter(|d| !d.stackable)
                .max_by(|a, b| a.rate.total_cmp(&b.rate).then(b.code.cmp(&a.code)))
                .expect("non-stackable discount present");
            let applied_rate = best.rate.min(state_cap);
            let amount = base_premium * applied_rate;
            let applied = AppliedDiscount {
                code: best.code.clone(),
                rate: best.rate,
                applied_rate,
                amount,
            };
            return Ok((vec![applied], amount));
        }

        let sum: f64 = ordered.iter().map(|d| d.rate).sum();
        if sum <= state_cap {
            let applied: Vec<AppliedDiscount> = ordered
                .iter()
                .map(|d| AppliedDiscount {
                    code: d.code.clone(),
                    rate: d.rate,
                    applied_rate: d.rate,
                    amount: base_premium * d.rate,
                })
                .collect();
            let total = applied.iter().map(|d| d.amount).sum();
            return Ok((applied, total));
        }

        // Over the cap: scale every rate proportionally so the sum equals
        // the cap exactly
        let scale = state_cap / sum;
        let applied: Vec<AppliedDiscount> = ordered
            .iter()
            .map(|d| AppliedDiscount {
                code: d.code.clone(),
                rate: d.rate,
                applied_rate: d.rate * scale,
                amount: base_premium * d.rate * scale,
            })
            .collect();
        Ok((applied, base_premium * state_cap))
    }
}
