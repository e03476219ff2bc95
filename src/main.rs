//! Rating Engine CLI
//!
//! Command-line interface for pricing a sample quote against the filed
//! reference tables

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;

use rating_engine::quote::{
    CoverageSelection, CoverageType, Driver, Product, QuoteRequest, Vehicle, VehicleType,
};
use rating_engine::{RatingEngine, StaticDataIntegrator};

#[derive(Parser, Debug)]
#[command(name = "rating_engine", about = "Price a sample quote")]
struct Args {
    /// Two-letter rating state
    #[arg(long, default_value = "TX")]
    state: String,

    /// 5-digit garaging ZIP
    #[arg(long, default_value = "75201")]
    zip: String,

    /// Liability coverage limit in dollars
    #[arg(long, default_value_t = 100_000.0)]
    limit: f64,

    /// Primary driver age
    #[arg(long, default_value_t = 35)]
    age: u8,

    /// Moving violations in the lookback window
    #[arg(long, default_value_t = 0)]
    violations: u32,

    /// DUI convictions in the lookback window
    #[arg(long, default_value_t = 0)]
    duis: u32,

    /// FICO-style credit score
    #[arg(long)]
    credit_score: Option<u16>,

    /// Effective date (YYYY-MM-DD)
    #[arg(long, default_value = "2026-03-01")]
    effective_date: String,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let effective_date = NaiveDate::parse_from_str(&args.effective_date, "%Y-%m-%d")
        .context("effective date must be YYYY-MM-DD")?;

    let quote = QuoteRequest {
        quote_id: "DEMO-0001".to_string(),
        state: args.state.clone(),
        product: Product::Auto,
        effective_date,
        vehicle: Vehicle {
            vin: "1HGCM82633A004352".to_string(),
            vehicle_type: VehicleType::Sedan,
            model_year: 2022,
            safety_features: 3,
            theft_rate_index: 1.0,
            garage_zip: args.zip.clone(),
        },
        drivers: vec![Driver {
            age: args.age,
            violation_count: args.violations,
            accident_count: 0,
            dui_count: args.duis,
            years_licensed: (args.age as u32).saturating_sub(18),
            license_state: args.state.clone(),
            good_student: false,
        }],
        coverages: vec![CoverageSelection {
            coverage: CoverageType::Liability,
            limit: args.limit,
            deductible: 0.0,
        }],
        credit_score: args.credit_score,
        multi_policy: true,
        paid_in_full: false,
        homeowner: false,
        affinity_group: None,
    };

    let engine = RatingEngine::with_filed_defaults(Arc::new(StaticDataIntegrator::sample_data()));
    engine.warm_caches();

    let result = engine
        .calculate_premium(&quote)
        .await
        .context("rating failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Rating Engine v0.1.0");
    println!("====================\n");
    println!("Quote: {} ({} auto, effective {})", result.quote_id, args.state, effective_date);
    println!("  Base premium:     ${:>10.2}", result.base_premium);
    println!();

    println!("Factors:");
    for impact in &result.factor_impacts {
        println!(
            "  {:<14} x{:<8.4} {:>10.2} -> {:>10.2}  ({:+.2})",
            impact.name,
            impact.factor,
            impact.premium_before,
            impact.premium_after,
            impact.dollar_impact
        );
    }
    println!("  Factored premium: ${:>10.2}", result.factored_premium);
    println!();

    if !result.applied_discounts.is_empty() {
        println!("Discounts:");
        for d in &result.applied_discounts {
            println!(
                "  {:<14} {:>6.2}% applied  -${:.2}",
                d.code,
                d.applied_rate * 100.0,
                d.amount
            );
        }
        println!("  Total discounts:  -${:.2}", result.total_discount_amount);
        println!();
    }

    if !result.applied_surcharges.is_empty() {
        println!("Surcharges:");
        for s in &result.applied_surcharges {
            let driver = s
                .driver_index
                .map(|i| format!("driver {}", i))
                .unwrap_or_else(|| "vehicle".to_string());
            println!("  {:<14} ({})  +${:.2}", s.code, driver, s.amount);
        }
        println!("  Total surcharges: +${:.2}", result.total_surcharge_amount);
        println!();
    }

    if !result.audit_notes.is_empty() {
        println!("Notes:");
        for note in &result.audit_notes {
            println!("  - {}", note);
        }
        println!();
    }

    println!("Final premium:      ${:>10.2}", result.final_premium);
    if result.degraded {
        println!("(degraded: neutral substitutions were applied)");
    }

    let snapshot = engine.metrics();
    println!(
        "\nPipeline: {} request(s), cache hit rate {:.0}%",
        snapshot.requests,
        snapshot.cache_hit_rate * 100.0
    );

    Ok(())
}
