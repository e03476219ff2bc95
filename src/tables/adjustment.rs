//! Filed discount and surcharge rules
//!
//! Rules are immutable reference data: code, applicability, value, an
//! eligibility/trigger predicate, and a priority (ascending = applied
//! first). The calculators in `rating` evaluate and stack them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::quote::{Product, QuoteRequest, VehicleType};

/// How an adjustment value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentKind {
    /// Value is a rate applied to the premium basis
    Percentage,
    /// Value is a flat dollar amount
    Fixed,
}

/// Eligibility predicate for a discount rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiscountCondition {
    /// Holds another active policy with the carrier
    MultiPolicy,
    /// Premium paid in full at bind
    PaidInFull,
    /// Insured owns their home
    Homeowner,
    /// Member of a filed affinity group
    AffinityGroup,
    /// Every driver is clean within the filed limits
    GoodDriver { max_violations: u32, max_accidents: u32 },
    /// Any driver at or under the age limit with good-student status
    GoodStudent { max_age: u8 },
    /// Youngest driver at or over the age floor
    MatureDriver { min_age: u8 },
    /// Vehicle carries at least this many qualifying safety features
    AntiTheft { min_safety_features: u32 },
}

impl DiscountCondition {
    pub fn eligible(&self, quote: &QuoteRequest) -> bool {
        match self {
            DiscountCondition::MultiPolicy => quote.multi_policy,
            DiscountCondition::PaidInFull => quote.paid_in_full,
            DiscountCondition::Homeowner => quote.homeowner,
            DiscountCondition::AffinityGroup => quote.affinity_group.is_some(),
            DiscountCondition::GoodDriver {
                max_violations,
                max_accidents,
            } => quote.drivers.iter().all(|d| {
                d.violation_count <= *max_violations
                    && d.accident_count <= *max_accidents
                    && d.dui_count == 0
            }),
            DiscountCondition::GoodStudent { max_age } => quote
                .drivers
                .iter()
                .any(|d| d.good_student && d.age <= *max_age),
            DiscountCondition::MatureDriver { min_age } => {
                quote.youngest_driver_age() >= *min_age
            }
            DiscountCondition::AntiTheft {
                min_safety_features,
            } => quote.vehicle.safety_features >= *min_safety_features,
        }
    }
}

/// A filed discount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountRule {
    /// Filed code, e.g. "MULTI_POLICY"
    pub code: String,

    /// Applicable products
    pub products: Vec<Product>,

    /// Applicable states; empty means all
    pub states: Vec<String>,

    pub kind: AdjustmentKind,

    /// Rate for `Percentage`, dollars for `Fixed`
    pub value: f64,

    /// Optional per-rule cap on the effective rate
    pub cap: Option<f64>,

    pub condition: DiscountCondition,

    /// Non-stackable discounts replace the whole stack when present
    pub stackable: bool,

    /// Ascending priority; lower applies first
    pub priority: u32,

    pub valid_from: NaiveDate,

    pub valid_until: Option<NaiveDate>,
}

impl DiscountRule {
    /// True when this rule is filed for the state/product and in its
    /// validity window
    pub fn applies_to(&self, state: &str, product: Product, as_of: NaiveDate) -> bool {
        if !self.products.contains(&product) {
            return false;
        }
        if !self.states.is_empty() && !self.states.iter().any(|s| s == state) {
            return false;
        }
        if as_of < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => as_of < until,
            None => true,
        }
    }

    /// Applicability plus the eligibility predicate
    pub fn eligible(&self, quote: &QuoteRequest) -> bool {
        self.applies_to(&quote.state, quote.product, quote.effective_date)
            && self.condition.eligible(quote)
    }

    /// Effective rate against the premium basis, with the per-rule cap
    pub fn rate_for(&self, basis: f64) -> f64 {
        let raw = match self.kind {
            AdjustmentKind::Percentage => self.value,
            AdjustmentKind::Fixed => {
                if basis > 0.0 {
                    self.value / basis
                } else {
                    0.0
                }
            }
        };
        match self.cap {
            Some(cap) => raw.min(cap),
            None => raw,
        }
    }
}

/// Trigger predicate for a surcharge rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurchargeTrigger {
    /// Fires at or above the conviction count; the highest matching tier
    /// wins per driver
    DuiTier { min_convictions: u32 },
    /// SR-22 filing fee, fires once per driver with a DUI or high-severity
    /// risk trigger
    Sr22Filing,
    /// Driver at or under the age limit
    YoungDriver { max_age: u8 },
    /// Driver licensed for fewer than the filed years
    InexperiencedDriver { min_years: u32 },
    /// Composite weighted violation/accident score at or above threshold
    HighRiskComposite { threshold: f64 },
    /// Vehicle-level trigger for high-performance classes
    HighPerformanceVehicle,
}

/// A filed surcharge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurchargeRule {
    /// Filed code, e.g. "DUI_TIER_1"
    pub code: String,

    pub products: Vec<Product>,

    /// Applicable states; empty means all
    pub states: Vec<String>,

    pub kind: AdjustmentKind,

    /// Rate for `Percentage`, dollars for `Fixed`
    pub value: f64,

    pub trigger: SurchargeTrigger,

    /// Ascending priority; controls reporting order
    pub priority: u32,

    pub valid_from: NaiveDate,

    pub valid_until: Option<NaiveDate>,
}

impl SurchargeRule {
    pub fn applies_to(&self, state: &str, product: Product, as_of: NaiveDate) -> bool {
        if !self.products.contains(&product) {
            return false;
        }
        if !self.states.is_empty() && !self.states.iter().any(|s| s == state) {
            return false;
        }
        if as_of < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => as_of < until,
            None => true,
        }
    }

    /// Vehicle-level triggers apply per quote, not per driver
    pub fn is_vehicle_level(&self) -> bool {
        matches!(self.trigger, SurchargeTrigger::HighPerformanceVehicle)
    }

    pub fn vehicle_triggers(&self, vehicle_type: VehicleType) -> bool {
        match self.trigger {
            SurchargeTrigger::HighPerformanceVehicle => {
                matches!(vehicle_type, VehicleType::SportsCar | VehicleType::Luxury)
            }
            _ => false,
        }
    }
}

/// Default filed discount set used by tests and the demo CLI
pub fn default_discount_rules() -> Vec<DiscountRule> {
    let eff = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
    let all_products = vec![Product::Auto, Product::Home, Product::Renters];
    let rule = |code: &str,
                value: f64,
                condition: DiscountCondition,
                stackable: bool,
                priority: u32| DiscountRule {
        code: code.to_string(),
        products: all_products.clone(),
        states: Vec::new(),
        kind: AdjustmentKind::Percentage,
        value,
        cap: None,
        condition,
        stackable,
        priority,
        valid_from: eff,
        valid_until: None,
    };

    vec![
        rule(
            "GROUP_AFFINITY",
            0.20,
            DiscountCondition::AffinityGroup,
            false,
            5,
        ),
        rule("MULTI_POLICY", 0.10, DiscountCondition::MultiPolicy, true, 10),
        rule(
            "SAFE_DRIVER",
            0.15,
            DiscountCondition::GoodDriver {
                max_violations: 0,
                max_accidents: 0,
            },
            true,
            20,
        ),
        rule(
            "GOOD_STUDENT",
            0.08,
            DiscountCondition::GoodStudent { max_age: 25 },
            true,
            30,
        ),
        rule(
            "MATURE_DRIVER",
            0.05,
            DiscountCondition::MatureDriver { min_age: 55 },
            true,
            35,
        ),
        rule(
            "ANTI_THEFT",
            0.05,
            DiscountCondition::AntiTheft {
                min_safety_features: 2,
            },
            true,
            40,
        ),
        rule("PAID_IN_FULL", 0.05, DiscountCondition::PaidInFull, true, 50),
        rule("HOMEOWNER", 0.03, DiscountCondition::Homeowner, true, 60),
    ]
}

/// Default filed surcharge set used by tests and the demo CLI
pub fn default_surcharge_rules() -> Vec<SurchargeRule> {
    let eff = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
    let auto = vec![Product::Auto];
    let rule = |code: &str,
                kind: AdjustmentKind,
                value: f64,
                trigger: SurchargeTrigger,
                priority: u32| SurchargeRule {
        code: code.to_string(),
        products: auto.clone(),
        states: Vec::new(),
        kind,
        value,
        trigger,
        priority,
        valid_from: eff,
        valid_until: None,
    };

    vec![
        rule(
            "DUI_TIER_1",
            AdjustmentKind::Percentage,
            0.50,
            SurchargeTrigger::DuiTier { min_convictions: 1 },
            10,
        ),
        rule(
            "DUI_TIER_2",
            AdjustmentKind::Percentage,
            1.00,
            SurchargeTrigger::DuiTier { min_convictions: 2 },
            10,
        ),
        rule(
            "DUI_TIER_3",
            AdjustmentKind::Percentage,
            1.50,
            SurchargeTrigger::DuiTier { min_convictions: 3 },
            10,
        ),
        rule(
            "SR22_FILING",
            AdjustmentKind::Fixed,
            50.0,
            SurchargeTrigger::Sr22Filing,
            15,
        ),
        rule(
            "YOUNG_DRIVER",
            AdjustmentKind::Percentage,
            0.15,
            SurchargeTrigger::YoungDriver { max_age: 24 },
            20,
        ),
        rule(
            "INEXPERIENCED",
            AdjustmentKind::Percentage,
            0.10,
            SurchargeTrigger::InexperiencedDriver { min_years: 3 },
            25,
        ),
        rule(
            "HIGH_RISK",
            AdjustmentKind::Percentage,
            0.25,
            SurchargeTrigger::HighRiskComposite { threshold: 0.60 },
            30,
        ),
        rule(
            "PERFORMANCE_VEHICLE",
            AdjustmentKind::Percentage,
            0.10,
            SurchargeTrigger::HighPerformanceVehicle,
            40,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::{CoverageSelection, CoverageType, Driver, Vehicle, VehicleType};

    fn quote() -> QuoteRequest {
        QuoteRequest {
            quote_id: "Q-1".into(),
            state: "TX".into(),
            product: Product::Auto,
            effective_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            vehicle: Vehicle {
                vin: "1HGCM82633A004352".into(),
                vehicle_type: VehicleType::Sedan,
                model_year: 2022,
                safety_features: 3,
                theft_rate_index: 1.0,
                garage_zip: "75201".into(),
            },
            drivers: vec![Driver {
                age: 35,
                violation_count: 0,
                accident_count: 0,
                dui_count: 0,
                years_licensed: 18,
                license_state: "TX".into(),
                good_student: false,
            }],
            coverages: vec![CoverageSelection {
                coverage: CoverageType::Liability,
                limit: 100_000.0,
                deductible: 0.0,
            }],
            credit_score: Some(750),
            multi_policy: true,
            paid_in_full: false,
            homeowner: false,
            affinity_group: None,
        }
    }

    #[test]
    fn test_discount_eligibility() {
        let rules = default_discount_rules();
        let q = quote();

        let eligible: Vec<&str> = rules
            .iter()
            .filter(|r| r.eligible(&q))
            .map(|r| r.code.as_str())
            .collect();
        assert_eq!(eligible, vec!["MULTI_POLICY", "SAFE_DRIVER", "ANTI_THEFT"]);
    }

    #[test]
    fn test_validity_window() {
        let mut rule = default_discount_rules().remove(1);
        rule.valid_until = NaiveDate::from_ymd_opt(2026, 1, 1);
        let q = quote();
        assert!(!rule.eligible(&q));
    }

    #[test]
    fn test_state_restriction() {
        let mut rule = default_discount_rules().remove(1);
        rule.states = vec!["CA".into()];
        assert!(!rule.eligible(&quote()));
        rule.states = vec!["TX".into()];
        assert!(rule.eligible(&quote()));
    }

    #[test]
    fn test_fixed_rule_rate_conversion() {
        let mut rule = default_discount_rules().remove(1);
        rule.kind = AdjustmentKind::Fixed;
        rule.value = 54.0;
        assert!((rule.rate_for(540.0) - 0.10).abs() < 1e-12);
        assert_eq!(rule.rate_for(0.0), 0.0);
    }

    #[test]
    fn test_per_rule_cap() {
        let mut rule = default_discount_rules().remove(1);
        rule.value = 0.50;
        rule.cap = Some(0.25);
        assert_eq!(rule.rate_for(1000.0), 0.25);
    }

    #[test]
    fn test_vehicle_trigger() {
        let rules = default_surcharge_rules();
        let perf = rules
            .iter()
            .find(|r| r.code == "PERFORMANCE_VEHICLE")
            .unwrap();
        assert!(perf.is_vehicle_level());
        assert!(perf.vehicle_triggers(VehicleType::SportsCar));
        assert!(perf.vehicle_triggers(VehicleType::Luxury));
        assert!(!perf.vehicle_triggers(VehicleType::Minivan));
    }
}
