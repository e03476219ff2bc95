//! Filed reference tables: rates, discounts, surcharges, territories
//!
//! Everything in this module is read-only during a calculation. Refreshing
//! a table (a new filing) is an out-of-band operation that invalidates the
//! result cache wholesale.

pub mod adjustment;
pub mod loader;
pub mod rate;
pub mod territory;

pub use adjustment::{
    default_discount_rules, default_surcharge_rules, AdjustmentKind, DiscountCondition,
    DiscountRule, SurchargeRule, SurchargeTrigger,
};
pub use loader::LoadedTables;
pub use rate::{InMemoryRateTable, RateTableEntry, RateTableRepository};
pub use territory::{TerritoryFactor, TerritoryRepository, TerritoryTable};
