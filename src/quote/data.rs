//! Input data structures for a rating request
//!
//! All of these are created once per quote request by the orchestration
//! service and stay immutable for the duration of a calculation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Insurance product line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    Auto,
    Home,
    Renters,
    Life,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Auto => "auto",
            Product::Home => "home",
            Product::Renters => "renters",
            Product::Life => "life",
        }
    }

    /// Parse the filed product code (as it appears in rate-table CSVs)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "auto" => Some(Product::Auto),
            "home" => Some(Product::Home),
            "renters" => Some(Product::Renters),
            "life" => Some(Product::Life),
            _ => None,
        }
    }
}

/// Coverage type within a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverageType {
    Liability,
    Collision,
    Comprehensive,
    Dwelling,
    PersonalProperty,
    TermLife,
}

impl CoverageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageType::Liability => "liability",
            CoverageType::Collision => "collision",
            CoverageType::Comprehensive => "comprehensive",
            CoverageType::Dwelling => "dwelling",
            CoverageType::PersonalProperty => "personal_property",
            CoverageType::TermLife => "term_life",
        }
    }

    /// Parse the filed coverage code (as it appears in rate-table CSVs)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "liability" => Some(CoverageType::Liability),
            "collision" => Some(CoverageType::Collision),
            "comprehensive" => Some(CoverageType::Comprehensive),
            "dwelling" => Some(CoverageType::Dwelling),
            "personal_property" => Some(CoverageType::PersonalProperty),
            "term_life" => Some(CoverageType::TermLife),
            _ => None,
        }
    }

    /// Coverages exposed to catastrophe perils (wind/hail/wildfire)
    pub fn is_catastrophe_exposed(&self) -> bool {
        matches!(
            self,
            CoverageType::Comprehensive | CoverageType::Dwelling | CoverageType::PersonalProperty
        )
    }
}

/// Vehicle body class used for base risk lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Sedan,
    Suv,
    Truck,
    Minivan,
    SportsCar,
    Luxury,
    Electric,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Sedan => "sedan",
            VehicleType::Suv => "suv",
            VehicleType::Truck => "truck",
            VehicleType::Minivan => "minivan",
            VehicleType::SportsCar => "sports_car",
            VehicleType::Luxury => "luxury",
            VehicleType::Electric => "electric",
        }
    }
}

/// A rated driver on the quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    /// Attained age in years
    pub age: u8,

    /// Moving violations in the lookback window
    pub violation_count: u32,

    /// At-fault accidents in the lookback window
    pub accident_count: u32,

    /// DUI convictions in the lookback window
    pub dui_count: u32,

    /// Years since first licensed
    pub years_licensed: u32,

    /// Two-letter licensing state
    pub license_state: String,

    /// Qualifies for the good-student discount
    pub good_student: bool,
}

/// The vehicle being rated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: String,

    pub vehicle_type: VehicleType,

    /// Model year, e.g. 2022
    pub model_year: u32,

    /// Count of qualifying safety features (ABS, lane assist, ...)
    pub safety_features: u32,

    /// Theft rate relative to the national average (1.0 = average)
    pub theft_rate_index: f64,

    /// 5-digit garaging ZIP
    pub garage_zip: String,
}

impl Vehicle {
    /// Vehicle age in whole years as of the given date (0 for future model years)
    pub fn age_years(&self, as_of: NaiveDate) -> u32 {
        (as_of.year() as i64 - self.model_year as i64).max(0) as u32
    }
}

/// A single requested coverage with its limit and deductible
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSelection {
    pub coverage: CoverageType,

    /// Coverage limit in dollars
    pub limit: f64,

    /// Deductible in dollars (0 for liability-style coverages)
    pub deductible: f64,
}

/// A complete rating request, pre-validated by the quote-orchestration
/// service upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub quote_id: String,

    /// Two-letter rating state
    pub state: String,

    pub product: Product,

    pub effective_date: NaiveDate,

    pub vehicle: Vehicle,

    /// 1..N rated drivers
    pub drivers: Vec<Driver>,

    /// 1..N requested coverages
    pub coverages: Vec<CoverageSelection>,

    /// FICO-style credit score, absent when not collected
    pub credit_score: Option<u16>,

    /// Holds another active policy with the carrier
    pub multi_policy: bool,

    /// Premium paid in full at bind
    pub paid_in_full: bool,

    /// Insured owns their home
    pub homeowner: bool,

    /// Affinity group membership code, if any
    pub affinity_group: Option<String>,
}

impl QuoteRequest {
    /// Youngest driver age on the quote; rating assumes at least one driver
    pub fn youngest_driver_age(&self) -> u8 {
        self.drivers.iter().map(|d| d.age).min().unwrap_or(0)
    }

    /// Largest deductible across requested coverages
    pub fn max_deductible(&self) -> f64 {
        self.coverages
            .iter()
            .map(|c| c.deductible)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_codes_round_trip() {
        for p in [Product::Auto, Product::Home, Product::Renters, Product::Life] {
            assert_eq!(Product::from_code(p.as_str()), Some(p));
        }
        assert_eq!(Product::from_code("boat"), None);
    }

    #[test]
    fn test_vehicle_age() {
        let vehicle = Vehicle {
            vin: "1HGCM82633A004352".into(),
            vehicle_type: VehicleType::Sedan,
            model_year: 2020,
            safety_features: 3,
            theft_rate_index: 1.0,
            garage_zip: "75201".into(),
        };
        let as_of = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert_eq!(vehicle.age_years(as_of), 6);

        // Future model year clamps to 0
        let next_year = Vehicle {
            model_year: 2027,
            ..vehicle
        };
        assert_eq!(next_year.age_years(as_of), 0);
    }

    #[test]
    fn test_catastrophe_exposure() {
        assert!(CoverageType::Comprehensive.is_catastrophe_exposed());
        assert!(CoverageType::Dwelling.is_catastrophe_exposed());
        assert!(!CoverageType::Liability.is_catastrophe_exposed());
    }
}
