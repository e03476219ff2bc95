//! Per-driver surcharge triggers with a state cap
//!
//! Surcharges are independently triggered per driver and additive, up to a
//! per-state maximum expressed as a multiple of base premium. When the
//! additive sum would exceed the cap, every entry is scaled proportionally
//! and marked `capped`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RatingError;
use crate::quote::{Driver, Product, Vehicle};
use crate::tables::adjustment::{
    default_surcharge_rules, AdjustmentKind, SurchargeRule, SurchargeTrigger,
};

use chrono::NaiveDate;
use std::collections::HashMap;

/// Weights for the composite high-risk score
const VIOLATION_WEIGHT: f64 = 0.15;
const ACCIDENT_WEIGHT: f64 = 0.25;

/// Fallback cap multiple for states without a filed cap
const DEFAULT_CAP_MULTIPLE: f64 = 2.50;

/// Severity band of a composite high-risk surcharge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Rate multiplier applied on top of the filed high-risk rate
    fn rate_multiplier(&self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 1.5,
            Severity::High => 2.0,
        }
    }
}

/// One applied surcharge entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedSurcharge {
    pub code: String,

    /// Index into the quote's driver list; absent for vehicle-level entries
    pub driver_index: Option<usize>,

    /// Present only for composite high-risk entries
    pub severity: Option<Severity>,

    /// Effective rate against the premium basis (after any cap scaling)
    pub rate: f64,

    pub amount: f64,

    /// Set when the state cap forced proportional scaling
    pub capped: bool,
}

/// Summary row grouping entries by code and severity for audit reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurchargeSummaryRow {
    pub code: String,
    pub severity: Option<Severity>,
    pub count: usize,
    pub total_amount: f64,
}

/// Audit summary of all applied surcharges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurchargeSummary {
    pub rows: Vec<SurchargeSummaryRow>,
    pub total_amount: f64,
}

/// Surcharge calculator configured with filed rules and state caps
#[derive(Debug, Clone)]
pub struct SurchargeCalculator {
    rules: Vec<SurchargeRule>,

    /// Maximum total surcharge as a multiple of base premium, by state
    cap_multiples: HashMap<String, f64>,

    default_cap_multiple: f64,
}

impl SurchargeCalculator {
    pub fn new(rules: Vec<SurchargeRule>, cap_multiples: HashMap<String, f64>) -> Self {
        Self {
            rules,
            cap_multiples,
            default_cap_multiple: DEFAULT_CAP_MULTIPLE,
        }
    }

    /// Default filed rules and cap multiples used by tests and the demo CLI
    pub fn default_filed() -> Self {
        let mut cap_multiples = HashMap::new();
        cap_multiples.insert("TX".to_string(), 2.50);
        cap_multiples.insert("CA".to_string(), 2.25);
        cap_multiples.insert("FL".to_string(), 2.75);
        cap_multiples.insert("NY".to_string(), 2.00);
        Self::new(default_surcharge_rules(), cap_multiples)
    }

    pub fn cap_multiple(&self, state: &str) -> f64 {
        self.cap_multiples
            .get(state)
            .copied()
            .unwrap_or(self.default_cap_multiple)
    }

    /// Composite weighted violation/accident score for one driver
    pub fn high_risk_score(driver: &Driver) -> f64 {
        driver.violation_count as f64 * VIOLATION_WEIGHT
            + driver.accident_count as f64 * ACCIDENT_WEIGHT
    }

    fn severity_for(score: f64, threshold: f64) -> Severity {
        if score >= threshold + 0.8 {
            Severity::High
        } else if score >= threshold + 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Evaluate every filed surcharge against every driver (and the
    /// vehicle), then apply the state cap. Returns entries in rule-priority
    /// order and the total surcharge amount.
    pub fn calculate_all_surcharges(
        &self,
        drivers: &[Driver],
        vehicle: &Vehicle,
        state: &str,
        product: Product,
        base_premium: f64,
        as_of: NaiveDate,
    ) -> Result<(Vec<AppliedSurcharge>, f64), RatingError> {
        if !(base_premium > 0.0) || !base_premium.is_finite() {
            return Err(RatingError::InvalidInput(format!(
                "base premium must be positive, got {}",
                base_premium
            )));
        }

        let active: Vec<&SurchargeRule> = {
            let mut rules: Vec<&SurchargeRule> = self
                .rules
                .iter()
                .filter(|r| r.applies_to(state, product, as_of))
                .collect();
            rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.code.cmp(&b.code)));
            rules
        };

        let mut entries = Vec::new();

        for (idx, driver) in drivers.iter().enumerate() {
            entries.extend(self.driver_entries(idx, driver, &active, base_premium));
        }

        for rule in active.iter().filter(|r| r.is_vehicle_level()) {
            if rule.vehicle_triggers(vehicle.vehicle_type) {
                let amount = match rule.kind {
                    AdjustmentKind::Percentage => base_premium * rule.value,
                    AdjustmentKind::Fixed => rule.value,
                };
                entries.push(AppliedSurcharge {
                    code: rule.code.clone(),
                    driver_index: None,
                    severity: None,
                    rate: amount / base_premium,
                    amount,
                    capped: false,
                });
            }
        }

        // State cap: scale proportionally, never truncate entries
        let total: f64 = entries.iter().map(|e| e.amount).sum();
        let max_total = base_premium * self.cap_multiple(state);
        if total > max_total && total > 0.0 {
            let scale = max_total / total;
            for entry in &mut entries {
                entry.amount *= scale;
                entry.rate *= scale;
                entry.capped = true;
            }
            return Ok((entries, max_total));
        }

        Ok((entries, total))
    }

    /// Evaluate the per-driver triggers for one driver
    fn driver_entries(
        &self,
        idx: usize,
        driver: &Driver,
        active: &[&SurchargeRule],
        base_premium: f64,
    ) -> Vec<AppliedSurcharge> {
        let mut entries = Vec::new();
        let mut dui_fired = false;
        let mut high_severity = false;

        // Highest matching DUI tier wins
        let dui_rule = active
            .iter()
            .filter_map(|r| match r.trigger {
                SurchargeTrigger::DuiTier { min_convictions }
                    if driver.dui_count >= min_convictions =>
                {
                    Some((min_convictions, *r))
                }
                _ => None,
            })
            .max_by_key(|(min, _)| *min);
        if let Some((_, rule)) = dui_rule {
            dui_fired = true;
            entries.push(AppliedSurcharge {
                code: rule.code.clone(),
                driver_index: Some(idx),
                severity: None,
                rate: rule.value,
                amount: base_premium * rule.value,
                capped: false,
            });
        }

        for rule in active {
            match rule.trigger {
                SurchargeTrigger::YoungDriver { max_age } if driver.age <= max_age => {
                    entries.push(AppliedSurcharge {
                        code: rule.code.clone(),
                        driver_index: Some(idx),
                        severity: None,
                        rate: rule.value,
                        amount: base_premium * rule.value,
                        capped: false,
                    });
                }
                SurchargeTrigger::InexperiencedDriver { min_years }
                    if driver.years_licensed < min_years =>
                {
                    entries.push(AppliedSurcharge {
                        code: rule.code.clone(),
                        driver_index: Some(idx),
                        severity: None,
                        rate: rule.value,
                        amount: base_premium * rule.value,
                        capped: false,
                    });
                }
                SurchargeTrigger::HighRiskComposite { threshold } => {
                    let score = Self::high_risk_score(driver);
                    if score >= threshold {
                        let severity = Self::severity_for(score, threshold);
                        if severity == Severity::High {
                            high_severity = true;
                        }
                        let rate = rule.value * severity.rate_multiplier();
                        entries.push(AppliedSurcharge {
                            code: rule.code.clone(),
                            driver_index: Some(idx),
                            severity: Some(severity),
                            rate,
                            amount: base_premium * rate,
                            capped: false,
                        });
                    }
                }
                _ => {}
            }
        }

        // SR-22 filing fee fires once per driver on a DUI or high-severity
        // risk trigger
        if dui_fired || high_severity {
            if let Some(rule) = active
                .iter()
                .find(|r| matches!(r.trigger, SurchargeTrigger::Sr22Filing))
            {
                let amount = match rule.kind {
                    AdjustmentKind::Fixed => rule.value,
                    AdjustmentKind::Percentage => base_premium * rule.value,
                };
                entries.push(AppliedSurcharge {
                    code: rule.code.clone(),
                    driver_index: Some(idx),
                    severity: None,
                    rate: amount / base_premium,
                    amount,
                    capped: false,
                });
            }
        }

        entries
    }

    /// Group applied entries by code and severity for audit reporting
    pub fn summarize(surcharges: &[AppliedSurcharge]) -> SurchargeSummary {
        let mut groups: BTreeMap<(String, Option<Severity>), (usize, f64)> = BTreeMap::new();
        for s in surcharges {
            let slot = groups.entry((s.code.clone(), s.severity)).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += s.amount;
        }
        let rows: Vec<SurchargeSummaryRow> = groups
            .into_iter()
            .map(|((code, severity), (count, total_amount))| SurchargeSummaryRow {
                code,
                severity,
                count,
                total_amount,
            })
            .collect();
        let total_amount = rows.iter().map(|r| r.total_amount).sum();
        SurchargeSummary {
            rows,
            total_amount,
        }
    }
}
