//! CSV-based reference table loader
//!
//! Loads filed rating tables from CSV files in data/tables/

use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;

use crate::quote::{CoverageType, Product};

use super::rate::RateTableEntry;
use super::territory::TerritoryFactor;

/// Default path to the reference table directory
pub const DEFAULT_TABLES_PATH: &str = "data/tables";

fn parse_product(code: &str) -> Result<Product, Box<dyn Error>> {
    Product::from_code(code).ok_or_else(|| format!("unknown product code '{}'", code).into())
}

fn parse_coverage(code: &str) -> Result<CoverageType, Box<dyn Error>> {
    CoverageType::from_code(code).ok_or_else(|| format!("unknown coverage code '{}'", code).into())
}

/// Load filed base rates from CSV
/// Columns: state,product,coverage,base_rate,min_premium,max_premium,effective_date
pub fn load_base_rates(path: &Path) -> Result<Vec<RateTableEntry>, Box<dyn Error>> {
    let file = File::open(path.join("base_rates.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut entries = Vec::new();

    for result in reader.records() {
        let record = result?;
        entries.push(RateTableEntry {
            state: record[0].to_string(),
            product: parse_product(&record[1])?,
            coverage: parse_coverage(&record[2])?,
            base_rate: record[3].parse()?,
            min_premium: record[4].parse()?,
            max_premium: record[5].parse()?,
            territory_factors: HashMap::new(),
            vehicle_factors: HashMap::new(),
            driver_factors: HashMap::new(),
            credit_factors: HashMap::new(),
            effective_date: record[6].parse::<NaiveDate>()?,
            expiration_date: None,
        });
    }

    Ok(entries)
}

/// Load ZIP-level territory factors from CSV
/// Columns: state,product,zip,base_factor,loss_ratio_factor,catastrophe_factor,zip_loss_cost,credibility
pub fn load_territory_factors(
    path: &Path,
) -> Result<Vec<(String, Product, TerritoryFactor)>, Box<dyn Error>> {
    let file = File::open(path.join("territory_factors.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut factors = Vec::new();

    for result in reader.records() {
        let record = result?;
        factors.push((
            record[0].to_string(),
            parse_product(&record[1])?,
            TerritoryFactor {
                zip: record[2].to_string(),
                base_factor: record[3].parse()?,
                loss_ratio_factor: record[4].parse()?,
                catastrophe_factor: record[5].parse()?,
                zip_loss_cost: record[6].parse()?,
                credibility: record[7].parse()?,
            },
        ));
    }

    Ok(factors)
}

/// Load state base loss costs from CSV
/// Columns: state,product,base_loss_cost
pub fn load_state_loss_costs(
    path: &Path,
) -> Result<HashMap<(String, Product), f64>, Box<dyn Error>> {
    let file = File::open(path.join("state_loss_costs.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut costs = HashMap::new();

    for result in reader.records() {
        let record = result?;
        costs.insert(
            (record[0].to_string(), parse_product(&record[1])?),
            record[2].parse()?,
        );
    }

    Ok(costs)
}

/// Load per-state surcharge cap multiples from CSV
/// Columns: state,cap_multiple
pub fn load_surcharge_caps(path: &Path) -> Result<HashMap<String, f64>, Box<dyn Error>> {
    let file = File::open(path.join("surcharge_caps.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut caps = HashMap::new();

    for result in reader.records() {
        let record = result?;
        caps.insert(record[0].to_string(), record[1].parse()?);
    }

    Ok(caps)
}

/// All CSV-loadable reference tables
pub struct LoadedTables {
    pub rate_entries: Vec<RateTableEntry>,
    pub territory_factors: Vec<(String, Product, TerritoryFactor)>,
    pub state_loss_costs: HashMap<(String, Product), f64>,
    pub surcharge_caps: HashMap<String, f64>,
}

impl LoadedTables {
    /// Load all tables from the default path
    pub fn load_default() -> Result<Self, Box<dyn Error>> {
        Self::load_from(Path::new(DEFAULT_TABLES_PATH))
    }

    /// Load all tables from a specific path
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            rate_entries: load_base_rates(path)?,
            territory_factors: load_territory_factors(path)?,
            state_loss_costs: load_state_loss_costs(path)?,
            surcharge_caps: load_surcharge_caps(path)?,
        })
    }
}
