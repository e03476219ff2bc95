//! Rating Engine - High-performance premium calculation for multi-line insurance products
//!
//! This library provides:
//! - Base premium calculation from filed, date-versioned rate tables
//! - Multiplicative factor composition with a full per-factor audit trail
//! - Credibility-weighted territory rating
//! - Capped discount stacking and per-driver surcharge triggers
//! - Credit-based insurance scoring with jurisdictional prohibitions
//! - Statistical refinements (GLM, frequency-severity, catastrophe loading)
//! - Result caching with request fingerprinting and latency metrics

pub mod cache;
pub mod engine;
pub mod error;
pub mod external;
pub mod pipeline;
pub mod quote;
pub mod rating;
pub mod tables;

// Re-export commonly used types
pub use engine::{EngineConfig, RatingEngine};
pub use error::{RatingError, RatingStage, StageError};
pub use external::{ExternalDataIntegrator, StaticDataIntegrator};
pub use quote::{CoverageSelection, CoverageType, Driver, Product, QuoteRequest, Vehicle, VehicleType};
pub use rating::{DiscountCalculator, PremiumCalculator, PricingResult, SurchargeCalculator};
