//! External data integration: weather, crime and VIN lookups
//!
//! These are the only operations in the pipeline performing network I/O.
//! Every call is timeout-bounded by the caller and degrades to the neutral
//! factor 1.0 on failure, so a slow or broken dependency costs accuracy,
//! never the quote.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::RatingError;

/// Validated vehicle attributes from a VIN lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleData {
    pub vin: String,

    /// Whether the VIN decoded to a known vehicle
    pub valid: bool,

    /// Refreshed theft index for the decoded model, when the source has one
    pub theft_rate_index: Option<f64>,
}

/// Async seam to third-party data providers
#[async_trait]
pub trait ExternalDataIntegrator: Send + Sync {
    /// Weather peril risk factor for a ZIP and effective date
    async fn get_weather_risk_factor(&self, zip: &str, date: NaiveDate)
        -> Result<f64, RatingError>;

    /// Crime risk factor for a ZIP
    async fn get_crime_risk_factor(&self, zip: &str) -> Result<f64, RatingError>;

    /// Decode and validate a VIN
    async fn validate_vehicle_data(&self, vin: &str) -> Result<VehicleData, RatingError>;
}

/// In-memory integrator backed by static lookup maps. Unknown keys return
/// the neutral factor; used by tests and the demo CLI.
#[derive(Debug, Clone, Default)]
pub struct StaticDataIntegrator {
    weather: HashMap<String, f64>,
    crime: HashMap<String, f64>,
}

impl StaticDataIntegrator {
    pub fn new(weather: HashMap<String, f64>, crime: HashMap<String, f64>) -> Self {
        Self { weather, crime }
    }

    /// A small plausible data set for demos
    pub fn sample_data() -> Self {
        let mut weather = HashMap::new();
        weather.insert("33139".to_string(), 1.12);
        weather.insert("77002".to_string(), 1.06);
        let mut crime = HashMap::new();
        crime.insert("90210".to_string(), 1.05);
        crime.insert("10001".to_string(), 1.08);
        Self::new(weather, crime)
    }
}

#[async_trait]
impl ExternalDataIntegrator for StaticDataIntegrator {
    async fn get_weather_risk_factor(
        &self,
        zip: &str,
        _date: NaiveDate,
    ) -> Result<f64, RatingError> {
        Ok(self.weather.get(zip).copied().unwrap_or(1.0))
    }

    async fn get_crime_risk_factor(&self, zip: &str) -> Result<f64, RatingError> {
        Ok(self.crime.get(zip).copied().unwrap_or(1.0))
    }

    async fn validate_vehicle_data(&self, vin: &str) -> Result<VehicleData, RatingError> {
        Ok(VehicleData {
            vin: vin.to_string(),
            valid: vin.len() == 17,
            theft_rate_index: None,
        })
    }
}

/// Await a factor lookup under a timeout. Failures and timeouts substitute
/// the neutral factor 1.0 and return an audit note; a valid positive factor
/// passes through untouched.
pub async fn factor_with_timeout<Fut>(
    name: &str,
    timeout: Duration,
    fut: Fut,
) -> (f64, Option<String>)
where
    Fut: std::future::Future<Output = Result<f64, RatingError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(factor)) if factor > 0.0 && factor.is_finite() => (factor, None),
        Ok(Ok(factor)) => {
            warn!("{} returned invalid factor {}, substituting 1.0", name, factor);
            (
                1.0,
                Some(format!("{}: invalid factor {}, neutral substituted", name, factor)),
            )
        }
        Ok(Err(e)) => {
            warn!("{} unavailable: {}", name, e);
            (1.0, Some(format!("{} unavailable: {}", name, e)))
        }
        Err(_) => {
            warn!("{} timed out after {:?}", name, timeout);
            (
                1.0,
                Some(format!("{} timed out after {:?}", name, timeout)),
            )
        }
    }
}

/// Await a VIN decode under a timeout. Failures and timeouts return no
/// data and an audit note, so the caller keeps the quoted vehicle
/// attributes.
pub async fn vehicle_data_with_timeout<Fut>(
    timeout: Duration,
    fut: Fut,
) -> (Option<VehicleData>, Option<String>)
where
    Fut: std::future::Future<Output = Result<VehicleData, RatingError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(data)) => (Some(data), None),
        Ok(Err(e)) => {
            warn!("vin lookup unavailable: {}", e);
            (None, Some(format!("vin lookup unavailable: {}", e)))
        }
        Err(_) => {
            warn!("vin lookup timed out after {:?}", timeout);
            (
                None,
                Some(format!("vin lookup timed out after {:?}", timeout)),
            )
        }
    }
}
