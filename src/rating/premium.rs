//! Base premium and risk factor calculations
//!
//! The composition contract: the final premium equals
//! `base_premium x product(factors)` (multiplication is commutative), but
//! the *reported* per-factor dollar impacts follow the map's insertion
//! order so the audit trail is reproducible.

use crate::error::RatingError;
use crate::quote::{Driver, Vehicle, VehicleType};
use crate::tables::TerritoryTable;

use super::factor::{round_cents, FactorMap};
use super::result::FactorImpact;

/// Driver factor band filed for the driver risk score
const DRIVER_FACTOR_FLOOR: f64 = 0.8;
const DRIVER_FACTOR_SPAN: f64 = 0.7;

/// Stateless premium calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct PremiumCalculator;

impl PremiumCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Base premium = coverage limit x base rate x exposure units, rounded
    /// to cents. All arguments must be strictly positive.
    pub fn calculate_base_premium(
        &self,
        coverage_limit: f64,
        base_rate: f64,
        exposure_units: f64,
    ) -> Result<f64, RatingError> {
        for (name, value) in [
            ("coverage_limit", coverage_limit),
            ("base_rate", base_rate),
            ("exposure_units", exposure_units),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(RatingError::InvalidInput(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(round_cents(coverage_limit * base_rate * exposure_units))
    }

    /// Apply every factor multiplicatively and report per-factor impacts in
    /// insertion order. Rounding happens only at the terminal step.
    pub fn apply_multiplicative_factors(
        &self,
        base_premium: f64,
        factors: &FactorMap,
    ) -> Result<(f64, Vec<FactorImpact>), RatingError> {
        for (name, value) in factors.iter() {
            if !(value > 0.0) || !value.is_finite() {
                return Err(RatingError::InvalidFactor {
                    name: name.to_string(),
                    value,
                });
            }
        }

        let mut impacts = Vec::with_capacity(factors.len());
        let mut running = base_premium;
        for (name, value) in factors.iter() {
            let after = running * value;
            impacts.push(FactorImpact {
                name: name.to_string(),
                factor: value,
                premium_before: running,
                premium_after: after,
                dollar_impact: after - running,
            });
            running = after;
        }

        Ok((running, impacts))
    }

    /// Credibility-weighted territory blend:
    /// `credibility * (zip_loss_cost / base_loss_cost) + (1 - credibility)`.
    /// Unknown ZIPs fall back to the neutral factor 1.0 rather than failing.
    pub fn calculate_territory_factor(&self, zip: &str, table: &TerritoryTable) -> f64 {
        let Some(territory) = table.get(zip) else {
            return 1.0;
        };
        if table.base_loss_cost <= 0.0 {
            return 1.0;
        }
        let credibility = territory.credibility.clamp(0.0, 1.0);
        let relative = territory.zip_loss_cost / table.base_loss_cost;
        credibility * relative + (1.0 - credibility)
    }

    /// Driver risk score in [0, 1] plus explanatory risk factors.
    /// Monotonic in age-inverse, violation count and accident count.
    pub fn calculate_driver_risk_score(&self, driver: &Driver) -> (f64, Vec<String>) {
        let mut reasons = Vec::new();

        // Age component: decreasing with age, zero from 75 up
        let age_component = ((75.0 - driver.age as f64) / 200.0).clamp(0.0, 0.30);
        if driver.age < 25 {
            reasons.push(format!("youthful driver (age {})", driver.age));
        }

        let violation_component = (driver.violation_count as f64 * 0.12).min(0.40);
        if driver.violation_count > 0 {
            reasons.push(format!("{} moving violation(s)", driver.violation_count));
        }

        let accident_component = (driver.accident_count as f64 * 0.15).min(0.45);
        if driver.accident_count > 0 {
            reasons.push(format!("{} at-fault accident(s)", driver.accident_count));
        }

        let dui_component = (driver.dui_count as f64 * 0.25).min(0.50);
        if driver.dui_count > 0 {
            reasons.push(format!("{} DUI conviction(s)", driver.dui_count));
        }

        let score =
            (age_component + violation_component + accident_component + dui_component).min(1.0);
        (score, reasons)
    }

    /// Map a [0, 1] driver risk score into the filed multiplier band
    pub fn driver_factor_from_score(&self, score: f64) -> f64 {
        DRIVER_FACTOR_FLOOR + DRIVER_FACTOR_SPAN * score.clamp(0.0, 1.0)
    }

    /// Vehicle risk multiplier from type base risk, age depreciation,
    /// safety-feature credit and theft-rate adjustment. Always positive.
    pub fn calculate_vehicle_risk_score(&self, vehicle: &Vehicle, vehicle_age_years: u32) -> f64 {
        let base = match vehicle.vehicle_type {
            VehicleType::Minivan => 0.92,
            VehicleType::Sedan => 1.00,
            VehicleType::Suv => 1.05,
            VehicleType::Truck => 1.08,
            VehicleType::Electric => 1.10,
            VehicleType::Luxury => 1.35,
            VehicleType::SportsCar => 1.45,
        };

        // Depreciation lowers insured value 1.5%/year, floored at 75%
        let depreciation = (1.0 - 0.015 * vehicle_age_years as f64).max(0.75);

        // 2% credit per safety feature, capped at 15%
        let safety = 1.0 - (0.02 * vehicle.safety_features as f64).min(0.15);

        // 10% of the theft index deviation from average
        let theft = 1.0 + 0.10 * (vehicle.theft_rate_index - 1.0);

        (base * depreciation * safety * theft).max(0.40)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::tables::{TerritoryFactor, TerritoryRepository};
    use crate::quote::Product;

    fn driver(age: u8, violations: u32, accidents: u32) -> Driver {
        Driver {
            age,
            violation_count: violations,
            accident_count: accidents,
            dui_count: 0,
            years_licensed: 10,
            license_state: "TX".into(),
            good_student: false,
        }
    }

    #[test]
    fn test_base_premium_scenario() {
        let calc = PremiumCalculator::new();
        let base = calc.calculate_base_premium(100_000.0, 0.005, 1.0).unwrap();
        assert_eq!(base, 500.00);
    }

    #[test]
    fn test_base_premium_linear() {
        let calc = PremiumCalculator::new();
        let one = calc.calculate_base_premium(50_000.0, 0.004, 1.0).unwrap();
        let double_limit = calc.calculate_base_premium(100_000.0, 0.004, 1.0).unwrap();
        let double_units = calc.calculate_base_premium(50_000.0, 0.004, 2.0).unwrap();
        assert_relative_eq!(double_limit, one * 2.0);
        assert_relative_eq!(double_units, one * 2.0);
        assert!(one >= 0.0);
    }

    #[test]
    fn test_base_premium_rejects_non_positive() {
        let calc = PremiumCalculator::new();
        assert!(calc.calculate_base_premium(0.0, 0.005, 1.0).is_err());
        assert!(calc.calculate_base_premium(100_000.0, -0.005, 1.0).is_err());
        assert!(calc.calculate_base_premium(100_000.0, 0.005, 0.0).is_err());
    }

    #[test]
    fn test_factor_composition_scenario() {
        let calc = PremiumCalculator::new();
        let mut factors = FactorMap::new();
        factors.insert("territory", 1.2);
        factors.insert("driver_age", 0.9);

        let (premium, impacts) = calc.apply_multiplicative_factors(500.0, &factors).unwrap();
        assert_relative_eq!(premium, 540.0);

        assert_eq!(impacts.len(), 2);
        assert_eq!(impacts[0].name, "territory");
        assert_relative_eq!(impacts[0].dollar_impact, 100.0);
        assert_eq!(impacts[1].name, "driver_age");
        assert_relative_eq!(impacts[1].premium_after, 540.0);
    }

    #[test]
    fn test_factor_composition_order_independent_product() {
        let calc = PremiumCalculator::new();
        let mut forward = FactorMap::new();
        forward.insert("a", 1.2);
        forward.insert("b", 0.9);
        forward.insert("c", 1.15);

        let mut reverse = FactorMap::new();
        reverse.insert("c", 1.15);
        reverse.insert("b", 0.9);
        reverse.insert("a", 1.2);

        let (p1, _) = calc.apply_multiplicative_factors(500.0, &forward).unwrap();
        let (p2, _) = calc.apply_multiplicative_factors(500.0, &reverse).unwrap();
        assert_relative_eq!(p1, p2, max_relative = 1e-12);
        assert_relative_eq!(p1, 500.0 * forward.product(), max_relative = 1e-12);
    }

    #[test]
    fn test_invalid_factor_rejected() {
        let calc = PremiumCalculator::new();
        let mut factors = FactorMap::new();
        factors.insert("territory", 1.2);
        factors.insert("broken", 0.0);

        let err = calc
            .apply_multiplicative_factors(500.0, &factors)
            .unwrap_err();
        assert!(matches!(err, RatingError::InvalidFactor { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_territory_blend() {
        let calc = PremiumCalculator::new();
        let repo = TerritoryRepository::default_filed();
        let tx = repo.table_for("TX", Product::Auto).unwrap();

        // 75201: credibility 0.80, loss 540 vs base 480
        // 0.8 * (540/480) + 0.2 = 1.1
        let factor = calc.calculate_territory_factor("75201", tx);
        assert_relative_eq!(factor, 1.1, max_relative = 1e-12);

        // Unknown ZIP is neutral
        assert_eq!(calc.calculate_territory_factor("00000", tx), 1.0);
    }

    #[test]
    fn test_territory_zero_base_loss_cost_neutral() {
        let calc = PremiumCalculator::new();
        let mut table = TerritoryTable::new("TX", Product::Auto, 0.0);
        table.insert(TerritoryFactor {
            zip: "75201".into(),
            base_factor: 1.0,
            loss_ratio_factor: 1.0,
            catastrophe_factor: 1.0,
            zip_loss_cost: 540.0,
            credibility: 0.8,
        });
        assert_eq!(calc.calculate_territory_factor("75201", &table), 1.0);
    }

    #[test]
    fn test_driver_score_monotonic() {
        let calc = PremiumCalculator::new();

        // Monotonic in age-inverse
        let (young, _) = calc.calculate_driver_risk_score(&driver(18, 0, 0));
        let (mid, _) = calc.calculate_driver_risk_score(&driver(40, 0, 0));
        let (old, _) = calc.calculate_driver_risk_score(&driver(70, 0, 0));
        assert!(young > mid && mid > old);

        // Monotonic in violations and accidents
        let (v0, _) = calc.calculate_driver_risk_score(&driver(40, 0, 0));
        let (v2, _) = calc.calculate_driver_risk_score(&driver(40, 2, 0));
        let (a1, _) = calc.calculate_driver_risk_score(&driver(40, 0, 1));
        assert!(v2 > v0);
        assert!(a1 > v0);
    }

    #[test]
    fn test_driver_score_bounded_with_reasons() {
        let calc = PremiumCalculator::new();
        let mut bad = driver(17, 10, 10);
        bad.dui_count = 3;
        let (score, reasons) = calc.calculate_driver_risk_score(&bad);
        assert!(score <= 1.0 && score >= 0.0);
        assert_eq!(reasons.len(), 4);

        let factor = calc.driver_factor_from_score(score);
        assert!(factor >= 0.8 && factor <= 1.5);
    }

    #[test]
    fn test_vehicle_score_positive() {
        let calc = PremiumCalculator::new();
        let vehicle = Vehicle {
            vin: "1HGCM82633A004352".into(),
            vehicle_type: VehicleType::SportsCar,
            model_year: 2010,
            safety_features: 10,
            theft_rate_index: 2.5,
            garage_zip: "75201".into(),
        };
        let score = calc.calculate_vehicle_risk_score(&vehicle, 16);
        assert!(score > 0.0);

        // Sports car rates above an identical sedan
        let sedan = Vehicle {
            vehicle_type: VehicleType::Sedan,
            ..vehicle
        };
        assert!(score > calc.calculate_vehicle_risk_score(&sedan, 16));
    }
}
