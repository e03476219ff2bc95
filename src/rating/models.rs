//! Statistical rating models: GLM factors, frequency-severity, catastrophe
//! loading
//!
//! This is an advisory refinement layer. Every failure here is a soft
//! `StatisticalModelError`; the base rating pipeline must never block on it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RatingError;
use crate::quote::{CoverageSelection, Driver, Vehicle, VehicleType};
use crate::tables::TerritoryFactor;

/// Safety band the GLM output is clamped to
pub const GLM_FACTOR_MIN: f64 = 0.1;
pub const GLM_FACTOR_MAX: f64 = 10.0;

/// Coefficient name carrying the GLM intercept
pub const INTERCEPT: &str = "intercept";

/// GLM link function relating the linear predictor to the factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFunction {
    Log,
    Logit,
    Identity,
}

/// Frequency-severity decomposition of expected loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencySeverity {
    /// Expected claim frequency multiplier
    pub frequency: f64,

    /// Expected claim severity multiplier
    pub severity: f64,

    /// Frequency x severity pure-premium factor
    pub pure_premium: f64,
}

/// Catastrophe peril loading for a ZIP prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CatZone {
    peril: String,

    /// Additive loading rate per exposed coverage
    loading_rate: f64,
}

/// Statistical rating models configured with filed coefficients and
/// catastrophe zones
#[derive(Debug, Clone)]
pub struct StatisticalRatingModels {
    /// Filed GLM coefficients by term name (including `intercept`)
    glm_coefficients: HashMap<String, f64>,

    /// Catastrophe zones keyed by 3-digit ZIP prefix
    cat_zones: HashMap<String, CatZone>,
}

impl StatisticalRatingModels {
    pub fn new(glm_coefficients: HashMap<String, f64>) -> Self {
        Self {
            glm_coefficients,
            cat_zones: HashMap::new(),
        }
    }

    /// Default filed model set used by tests and the demo CLI
    pub fn default_filed() -> Self {
        let mut glm_coefficients = HashMap::new();
        glm_coefficients.insert(INTERCEPT.to_string(), 0.0);
        glm_coefficients.insert("driver_age_inverse".to_string(), 0.90);
        glm_coefficients.insert("violations".to_string(), 0.06);
        glm_coefficients.insert("accidents".to_string(), 0.09);
        glm_coefficients.insert("vehicle_age".to_string(), -0.005);

        let mut cat_zones = HashMap::new();
        // Miami-Dade: hurricane; Gulf coast Texas: wind/hail; LA basin: wildfire
        cat_zones.insert(
            "331".to_string(),
            CatZone {
                peril: "hurricane".to_string(),
                loading_rate: 0.12,
            },
        );
        cat_zones.insert(
            "770".to_string(),
            CatZone {
                peril: "wind_hail".to_string(),
                loading_rate: 0.06,
            },
        );
        cat_zones.insert(
            "900".to_string(),
            CatZone {
                peril: "wildfire".to_string(),
                loading_rate: 0.08,
            },
        );

        Self {
            glm_coefficients,
            cat_zones,
        }
    }

    /// Filed GLM coefficients (for feature construction by the caller)
    pub fn glm_coefficients(&self) -> &HashMap<String, f64> {
        &self.glm_coefficients
    }

    /// Build the GLM feature vector for a driver and vehicle age
    pub fn glm_features(driver: &Driver, vehicle_age_years: u32) -> HashMap<String, f64> {
        let mut features = HashMap::new();
        features.insert(
            "driver_age_inverse".to_string(),
            25.0 / driver.age.max(16) as f64,
        );
        features.insert("violations".to_string(), driver.violation_count as f64);
        features.insert("accidents".to_string(), driver.accident_count as f64);
        features.insert("vehicle_age".to_string(), vehicle_age_years as f64);
        features
    }

    /// Linear predictor through the inverse link, clamped to the safety
    /// band. Every coefficient term (except the intercept) must have a
    /// matching feature.
    pub fn calculate_generalized_linear_model_factor(
        &self,
        features: &HashMap<String, f64>,
        coefficients: &HashMap<String, f64>,
        link: LinkFunction,
    ) -> Result<f64, RatingError> {
        let mut eta = coefficients.get(INTERCEPT).copied().unwrap_or(0.0);

        // Sorted term order keeps the summation deterministic
        let mut terms: Vec<(&String, &f64)> = coefficients
            .iter()
            .filter(|(name, _)| name.as_str() != INTERCEPT)
            .collect();
        terms.sort_by(|a, b| a.0.cmp(b.0));

        for (name, coef) in terms {
            let feature = features.get(name).ok_or_else(|| {
                RatingError::StatisticalModelError(format!("missing feature '{}'", name))
            })?;
            eta += coef * feature;
        }

        let factor = match link {
            LinkFunction::Log => eta.exp(),
            LinkFunction::Logit => 1.0 / (1.0 + (-eta).exp()),
            LinkFunction::Identity => eta,
        };

        if !factor.is_finite() {
            return Err(RatingError::StatisticalModelError(format!(
                "non-finite GLM output from eta {}",
                eta
            )));
        }

        Ok(factor.clamp(GLM_FACTOR_MIN, GLM_FACTOR_MAX))
    }

    /// Run the filed GLM with a log link over the standard feature vector
    pub fn filed_glm_factor(
        &self,
        driver: &Driver,
        vehicle_age_years: u32,
    ) -> Result<f64, RatingError> {
        let features = Self::glm_features(driver, vehicle_age_years);
        // Normalize against the baseline driver so a clean 25-year-old
        // rates at 1.0
        let baseline: HashMap<String, f64> = [
            ("driver_age_inverse".to_string(), 1.0),
            ("violations".to_string(), 0.0),
            ("accidents".to_string(), 0.0),
            ("vehicle_age".to_string(), 0.0),
        ]
        .into_iter()
        .collect();

        let raw = self.calculate_generalized_linear_model_factor(
            &features,
            &self.glm_coefficients,
            LinkFunction::Log,
        )?;
        let base = self.calculate_generalized_linear_model_factor(
            &baseline,
            &self.glm_coefficients,
            LinkFunction::Log,
        )?;
        Ok((raw / base).clamp(GLM_FACTOR_MIN, GLM_FACTOR_MAX))
    }

    /// Independent frequency and severity multipliers plus their product
    /// as a pure-premium factor
    pub fn calculate_frequency_severity_model(
        &self,
        driver: &Driver,
        vehicle: &Vehicle,
        vehicle_age_years: u32,
        territory: Option<&TerritoryFactor>,
    ) -> Result<FrequencySeverity, RatingError> {
        let mut frequency = 1.0
            + 0.08 * driver.violation_count as f64
            + 0.12 * driver.accident_count as f64;
        if driver.age < 25 {
            frequency += 0.15;
        }
        if let Some(t) = territory {
            frequency *= t.base_factor;
        }

        let mut severity = match vehicle.vehicle_type {
            VehicleType::Minivan => 0.95,
            VehicleType::Sedan => 1.00,
            VehicleType::Suv => 1.06,
            VehicleType::Truck => 1.08,
            VehicleType::Electric => 1.20,
            VehicleType::Luxury => 1.40,
            VehicleType::SportsCar => 1.30,
        };
        severity *= (1.0 - 0.015 * vehicle_age_years as f64).max(0.75);
        if let Some(t) = territory {
            severity *= t.loss_ratio_factor;
        }

        if !(frequency > 0.0) || !(severity > 0.0) {
            return Err(RatingError::StatisticalModelError(format!(
                "non-positive frequency/severity: {} / {}",
                frequency, severity
            )));
        }

        Ok(FrequencySeverity {
            frequency,
            severity,
            pure_premium: frequency * severity,
        })
    }

    /// Exposure-based catastrophe loading for cat-prone ZIPs, as a
    /// multiplicative factor >= 1.0. Only catastrophe-exposed coverages
    /// contribute.
    pub fn calculate_catastrophe_loading(
        &self,
        zip: &str,
        coverages: &[CoverageSelection],
        territory: Option<&TerritoryFactor>,
    ) -> Result<f64, RatingError> {
        // get(..3) also rejects multibyte input that lands off a char
        // boundary, without panicking
        let Some(prefix) = zip.get(..3) else {
            return Err(RatingError::StatisticalModelError(format!(
                "malformed ZIP '{}'",
                zip
            )));
        };
        let Some(zone) = self.cat_zones.get(prefix) else {
            return Ok(1.0);
        };

        let exposed = coverages
            .iter()
            .filter(|c| c.coverage.is_catastrophe_exposed())
            .count();
        if exposed == 0 {
            return Ok(1.0);
        }

        let mut loading = 1.0 + zone.loading_rate * exposed as f64;
        if let Some(t) = territory {
            // Filed territory cat multiplier sharpens the zone loading
            loading = 1.0 + (loading - 1.0) * t.catastrophe_factor;
        }
        Ok(loading)
    }
}

impl Default for StatisticalRatingModels {
    fn default() -> Self {
        Self::default_filed()
    }
}
