//! Quote-scoped input data for a single rating request

mod data;

pub use data::{
    CoverageSelection, CoverageType, Driver, Product, QuoteRequest, Vehicle, VehicleType,
};
