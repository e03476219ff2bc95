//! Rating pipeline performance layer
//!
//! Wraps the result cache with latency metrics and a warm-up step that
//! precomputes territory blend factors for the configured hot states, so
//! the first quote in a busy market does not pay the full cold cost.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::cache::QuoteCache;
use crate::quote::Product;
use crate::rating::{PremiumCalculator, PricingResult};
use crate::tables::TerritoryRepository;

/// Bound on retained latency samples; the window slides once full
const MAX_LATENCY_SAMPLES: usize = 4_096;

/// Latency recorder with percentile readout
#[derive(Debug, Default)]
pub struct RatingMetrics {
    samples: Mutex<Vec<Duration>>,
}

impl RatingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, latency: Duration) {
        let mut samples = self
            .samples
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if samples.len() >= MAX_LATENCY_SAMPLES {
            samples.remove(0);
        }
        samples.push(latency);
    }

    pub fn sample_count(&self) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Nearest-rank percentile over the retained window; `None` with no
    /// samples
    pub fn percentile(&self, pct: f64) -> Option<Duration> {
        let samples = self
            .samples
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.clamp(1, sorted.len()) - 1])
    }
}

/// Point-in-time pipeline statistics
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub requests: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub p50_micros: Option<u128>,
    pub p95_micros: Option<u128>,
    pub p99_micros: Option<u128>,
}

/// Cache + metrics + precomputed territory factors for hot states
pub struct RatingPipeline {
    cache: Arc<QuoteCache>,
    metrics: RatingMetrics,
    hot_states: Vec<String>,
    precomputed_territory: RwLock<HashMap<(String, Product, String), f64>>,
}

impl RatingPipeline {
    pub fn new(cache: Arc<QuoteCache>, hot_states: Vec<String>) -> Self {
        Self {
            cache,
            metrics: RatingMetrics::new(),
            hot_states,
            precomputed_territory: RwLock::new(HashMap::new()),
        }
    }

    /// Precompute territory blend factors for every ZIP of every hot-state
    /// table. ZIPs are independent so the blends compute in parallel.
    pub fn warm(&self, territories: &TerritoryRepository) {
        let calc = PremiumCalculator::new();
        let products = [
            Product::Auto,
            Product::Home,
            Product::Renters,
            Product::Life,
        ];

        let mut warmed: Vec<((String, Product, String), f64)> = Vec::new();
        for state in &self.hot_states {
            for product in products {
                let Some(table) = territories.table_for(state, product) else {
                    continue;
                };
                let blends: Vec<((String, Product, String), f64)> = table
                    .zips()
                    .par_iter()
                    .map(|territory| {
                        let factor = calc.calculate_territory_factor(&territory.zip, table);
                        ((state.clone(), product, territory.zip.clone()), factor)
                    })
                    .collect();
                warmed.extend(blends);
            }
        }

        let count = warmed.len();
        let mut precomputed = self
            .precomputed_territory
            .write()
            .unwrap_or_else(|e| e.into_inner());
        precomputed.extend(warmed);
        info!(
            "warmed {} territory factors across {} hot state(s)",
            count,
            self.hot_states.len()
        );
    }

    /// Precomputed territory blend, when the state was warmed
    pub fn precomputed_territory_factor(
        &self,
        state: &str,
        product: Product,
        zip: &str,
    ) -> Option<f64> {
        self.precomputed_territory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(state.to_string(), product, zip.to_string()))
            .copied()
    }

    /// Run a computation through the cache, timing the whole call
    pub async fn execute<E, F, Fut>(
        &self,
        fingerprint: u64,
        compute: F,
    ) -> Result<PricingResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PricingResult, E>>,
    {
        let started = Instant::now();
        let outcome = self.cache.get_or_compute(fingerprint, compute).await;
        self.metrics.record(started.elapsed());
        outcome
    }

    /// Drop precomputed factors, forcing recomputation on next warm
    pub fn clear_precomputed(&self) {
        self.precomputed_territory
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            requests: self.metrics.sample_count(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            cache_hit_rate: self.cache.hit_rate(),
            p50_micros: self.metrics.percentile(50.0).map(|d| d.as_micros()),
            p95_micros: self.metrics.percentile(95.0).map(|d| d.as_micros()),
            p99_micros: self.metrics.percentile(99.0).map(|d| d.as_micros()),
        }
    }
}
