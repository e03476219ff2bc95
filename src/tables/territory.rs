//! Territory factor tables: state + ZIP + product level risk multipliers
//!
//! Each ZIP carries its loss cost and a credibility weight against the
//! state base loss cost; the premium calculator blends the two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::quote::Product;

/// Filed factors for one ZIP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryFactor {
    /// 5-digit ZIP
    pub zip: String,

    /// Base territory multiplier
    pub base_factor: f64,

    /// Loss-ratio experience multiplier
    pub loss_ratio_factor: f64,

    /// Catastrophe exposure multiplier (1.0 = no cat exposure)
    pub catastrophe_factor: f64,

    /// Annual loss cost per exposure for this ZIP
    pub zip_loss_cost: f64,

    /// Statistical weight (0-1) given to the ZIP loss data versus the
    /// state base loss cost
    pub credibility: f64,
}

/// Territory table for one state and product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryTable {
    pub state: String,

    pub product: Product,

    /// State base annual loss cost per exposure
    pub base_loss_cost: f64,

    zips: HashMap<String, TerritoryFactor>,
}

impl TerritoryTable {
    pub fn new(state: impl Into<String>, product: Product, base_loss_cost: f64) -> Self {
        Self {
            state: state.into(),
            product,
            base_loss_cost,
            zips: HashMap::new(),
        }
    }

    pub fn insert(&mut self, factor: TerritoryFactor) {
        self.zips.insert(factor.zip.clone(), factor);
    }

    pub fn get(&self, zip: &str) -> Option<&TerritoryFactor> {
        self.zips.get(zip)
    }

    pub fn len(&self) -> usize {
        self.zips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zips.is_empty()
    }

    /// ZIPs in sorted order, for deterministic precomputation
    pub fn zips(&self) -> Vec<&TerritoryFactor> {
        let mut all: Vec<&TerritoryFactor> = self.zips.values().collect();
        all.sort_by(|a, b| a.zip.cmp(&b.zip));
        all
    }
}

/// All territory tables keyed by state and product
#[derive(Debug, Clone, Default)]
pub struct TerritoryRepository {
    tables: HashMap<(String, Product), TerritoryTable>,
}

impl TerritoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: TerritoryTable) {
        self.tables
            .insert((table.state.clone(), table.product), table);
    }

    pub fn table_for(&self, state: &str, product: Product) -> Option<&TerritoryTable> {
        self.tables.get(&(state.to_string(), product))
    }

    /// Build the default filed territory set used by tests and the demo CLI
    pub fn default_filed() -> Self {
        let mut repo = Self::new();

        let mut tx = TerritoryTable::new("TX", Product::Auto, 480.0);
        tx.insert(TerritoryFactor {
            zip: "75201".into(),
            base_factor: 1.05,
            loss_ratio_factor: 1.02,
            catastrophe_factor: 1.04,
            zip_loss_cost: 540.0,
            credibility: 0.80,
        });
        tx.insert(TerritoryFactor {
            zip: "78701".into(),
            base_factor: 0.98,
            loss_ratio_factor: 0.95,
            catastrophe_factor: 1.00,
            zip_loss_cost: 450.0,
            credibility: 0.70,
        });
        repo.insert(tx);

        let mut fl = TerritoryTable::new("FL", Product::Auto, 620.0);
        fl.insert(TerritoryFactor {
            zip: "33139".into(),
            base_factor: 1.20,
            loss_ratio_factor: 1.15,
            catastrophe_factor: 1.35,
            zip_loss_cost: 810.0,
            credibility: 0.90,
        });
        repo.insert(fl);

        let mut ca = TerritoryTable::new("CA", Product::Auto, 550.0);
        ca.insert(TerritoryFactor {
            zip: "90210".into(),
            base_factor: 1.10,
            loss_ratio_factor: 1.05,
            catastrophe_factor: 1.18,
            zip_loss_cost: 660.0,
            credibility: 0.85,
        });
        repo.insert(ca);

        repo
    }

    /// Build from CSV-loaded reference data
    pub fn from_loaded(loaded: &super::loader::LoadedTables) -> Self {
        let mut repo = Self::new();
        for ((state, product), base_loss_cost) in &loaded.state_loss_costs {
            repo.insert(TerritoryTable::new(state.clone(), *product, *base_loss_cost));
        }
        for (state, product, factor) in &loaded.territory_factors {
            let key = (state.clone(), *product);
            let table = repo
                .tables
                .entry(key)
                .or_insert_with(|| TerritoryTable::new(state.clone(), *product, 0.0));
            table.insert(factor.clone());
        }
        repo
    }
}
