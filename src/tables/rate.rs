//! Filed rate tables keyed by state, product, coverage and effective date
//!
//! A `RateTableEntry` is immutable once loaded and versioned by effective
//! date: a new filing adds a new entry, it never mutates an old one.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RatingError;
use crate::quote::{CoverageType, Product, VehicleType};

/// One filed rate row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTableEntry {
    /// Two-letter state
    pub state: String,

    pub product: Product,

    pub coverage: CoverageType,

    /// Base rate applied per dollar of coverage limit
    pub base_rate: f64,

    /// Floor for the final premium under this filing
    pub min_premium: f64,

    /// Ceiling for the final premium under this filing
    pub max_premium: f64,

    /// Sparse filed territory adjustments, keyed by 5-digit ZIP or
    /// 3-digit ZIP prefix
    pub territory_factors: HashMap<String, f64>,

    /// Sparse filed vehicle-class adjustments, keyed by vehicle type code
    pub vehicle_factors: HashMap<String, f64>,

    /// Sparse filed driver adjustments, keyed by age band "lo-hi"
    pub driver_factors: HashMap<String, f64>,

    /// Sparse filed credit-tier overrides, keyed by tier name
    pub credit_factors: HashMap<String, f64>,

    pub effective_date: NaiveDate,

    /// Open-ended filing when absent
    pub expiration_date: Option<NaiveDate>,
}

impl RateTableEntry {
    /// True when this filing covers the given date
    pub fn in_force(&self, as_of: NaiveDate) -> bool {
        if as_of < self.effective_date {
            return false;
        }
        match self.expiration_date {
            Some(exp) => as_of < exp,
            None => true,
        }
    }

    /// Filed territory adjustment: exact ZIP match wins over the 3-digit
    /// prefix, unknown territory is neutral
    pub fn territory_adjustment(&self, zip: &str) -> f64 {
        if let Some(&f) = self.territory_factors.get(zip) {
            return f;
        }
        // get(..3) rather than [..3]: a non-ASCII zip must price neutral,
        // not panic on a char boundary
        if let Some(prefix) = zip.get(..3) {
            if let Some(&f) = self.territory_factors.get(prefix) {
                return f;
            }
        }
        1.0
    }

    /// Filed vehicle-class adjustment, neutral when the class is not filed
    pub fn vehicle_adjustment(&self, vehicle_type: VehicleType) -> f64 {
        self.vehicle_factors
            .get(vehicle_type.as_str())
            .copied()
            .unwrap_or(1.0)
    }

    /// Filed driver age-band adjustment. Bands are keyed "lo-hi" inclusive;
    /// keys are scanned in sorted order so overlapping filings resolve
    /// deterministically.
    pub fn driver_adjustment(&self, age: u8) -> f64 {
        let mut keys: Vec<&String> = self.driver_factors.keys().collect();
        keys.sort();
        for key in keys {
            if let Some((lo, hi)) = parse_age_band(key) {
                if age >= lo && age <= hi {
                    return self.driver_factors[key];
                }
            }
        }
        1.0
    }
}

fn parse_age_band(key: &str) -> Option<(u8, u8)> {
    let (lo, hi) = key.split_once('-')?;
    Some((lo.parse().ok()?, hi.parse().ok()?))
}

/// Read-only rate lookup seam consumed by the engine
pub trait RateTableRepository: Send + Sync {
    /// Find the filed rate in force for the key, preferring the most
    /// recently effective filing when several are in force
    fn lookup(
        &self,
        state: &str,
        product: Product,
        coverage: CoverageType,
        as_of: NaiveDate,
    ) -> Result<&RateTableEntry, RatingError>;
}

/// In-memory rate table backing the repository trait
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateTable {
    entries: Vec<RateTableEntry>,
}

impl InMemoryRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: RateTableEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the default filed table used by tests and the demo CLI
    pub fn default_filed() -> Self {
        let eff = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        let mut table = Self::new();

        let auto_states = ["TX", "CA", "FL", "NY"];
        for state in auto_states {
            for (coverage, base_rate) in [
                (CoverageType::Liability, 0.005),
                (CoverageType::Collision, 0.004),
                (CoverageType::Comprehensive, 0.003),
            ] {
                let mut entry = RateTableEntry {
                    state: state.to_string(),
                    product: Product::Auto,
                    coverage,
                    base_rate,
                    min_premium: 50.0,
                    max_premium: 25_000.0,
                    territory_factors: HashMap::new(),
                    vehicle_factors: HashMap::new(),
                    driver_factors: HashMap::new(),
                    credit_factors: HashMap::new(),
                    effective_date: eff,
                    expiration_date: None,
                };
                entry
                    .vehicle_factors
                    .insert("sports_car".to_string(), 1.10);
                entry.driver_factors.insert("16-24".to_string(), 1.05);
                if state == "FL" {
                    // Coastal ZIP prefixes carry a filed territory load
                    entry.territory_factors.insert("331".to_string(), 1.08);
                }
                if state == "TX" {
                    entry.credit_factors.insert("excellent".to_string(), 0.83);
                }
                table.insert(entry);
            }
        }

        for state in ["TX", "FL"] {
            table.insert(RateTableEntry {
                state: state.to_string(),
                product: Product::Home,
                coverage: CoverageType::Dwelling,
                base_rate: 0.0035,
                min_premium: 200.0,
                max_premium: 50_000.0,
                territory_factors: HashMap::new(),
                vehicle_factors: HashMap::new(),
                driver_factors: HashMap::new(),
                credit_factors: HashMap::new(),
                effective_date: eff,
                expiration_date: None,
            });
        }

        table
    }

    /// Build from CSV-loaded reference data
    pub fn from_loaded(loaded: &super::loader::LoadedTables) -> Self {
        Self {
            entries: loaded.rate_entries.clone(),
        }
    }
}

impl RateTableRepository for InMemoryRateTable {
    fn lookup(
        &self,
        state: &str,
        product: Product,
        coverage: CoverageType,
        as_of: NaiveDate,
    ) -> Result<&RateTableEntry, RatingError> {
        self.entries
            .iter()
            .filter(|e| {
                e.state == state && e.product == product && e.coverage == coverage
                    && e.in_force(as_of)
            })
            .max_by_key(|e| e.effective_date)
            .ok_or_else(|| RatingError::RateNotFound {
                state: state.to_string(),
                product: product.as_str().to_string(),
                coverage: coverage.as_str().to_string(),
                as_of,
            })
    }
}
