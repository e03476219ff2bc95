//! Quote result caching with request fingerprinting
//!
//! Identical rating inputs always produce identical premiums, so results
//! are cached under a fingerprint of the rating-relevant request fields.
//! The fingerprint deliberately excludes `quote_id` (two quotes with the
//! same risk profile share a cache entry) and includes the rate-table
//! generation counter, so a table reload naturally orphans stale entries.
//!
//! Concurrent requests for the same fingerprint are collapsed: one caller
//! computes, the rest wait on a per-fingerprint gate and read the cached
//! result. The cache never computes anything itself; computation stays
//! with the caller.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use log::debug;

use crate::quote::QuoteRequest;
use crate::rating::PricingResult;

/// Cache sizing and expiry settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry time-to-live
    pub ttl: Duration,

    /// Entry count bound; oldest entries are evicted past it
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 10_000,
        }
    }
}

/// Fingerprint of the rating-relevant request fields plus the rate-table
/// generation. Driver hashes are sorted so driver order does not split
/// cache entries, and coverages are sorted by coverage code for the same
/// reason. Floats hash by bit pattern.
pub fn fingerprint(quote: &QuoteRequest, table_generation: u64) -> u64 {
    let mut hasher = DefaultHasher::new();

    table_generation.hash(&mut hasher);
    quote.state.hash(&mut hasher);
    quote.product.hash(&mut hasher);
    quote.effective_date.hash(&mut hasher);

    quote.vehicle.vin.hash(&mut hasher);
    quote.vehicle.vehicle_type.hash(&mut hasher);
    quote.vehicle.model_year.hash(&mut hasher);
    quote.vehicle.safety_features.hash(&mut hasher);
    quote.vehicle.theft_rate_index.to_bits().hash(&mut hasher);
    quote.vehicle.garage_zip.hash(&mut hasher);

    let mut driver_hashes: Vec<u64> = quote
        .drivers
        .iter()
        .map(|d| {
            let mut h = DefaultHasher::new();
            d.age.hash(&mut h);
            d.violation_count.hash(&mut h);
            d.accident_count.hash(&mut h);
            d.dui_count.hash(&mut h);
            d.years_licensed.hash(&mut h);
            d.license_state.hash(&mut h);
            d.good_student.hash(&mut h);
            h.finish()
        })
        .collect();
    driver_hashes.sort_unstable();
    driver_hashes.hash(&mut hasher);

    let mut coverages: Vec<(&'static str, u64, u64)> = quote
        .coverages
        .iter()
        .map(|c| {
            (
                c.coverage.as_str(),
                c.limit.to_bits(),
                c.deductible.to_bits(),
            )
        })
        .collect();
    coverages.sort_unstable();
    coverages.hash(&mut hasher);

    quote.credit_score.hash(&mut hasher);
    quote.multi_policy.hash(&mut hasher);
    quote.paid_in_full.hash(&mut hasher);
    quote.homeowner.hash(&mut hasher);
    quote.affinity_group.hash(&mut hasher);

    hasher.finish()
}

struct CacheEntry {
    result: PricingResult,
    inserted_at: Instant,
}

/// Bounded TTL cache of pricing results keyed by request fingerprint
pub struct QuoteCache {
    config: CacheConfig,
    entries: RwLock<HashMap<u64, CacheEntry>>,
    in_flight: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QuoteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a live entry, counting the hit or miss
    pub fn get(&self, fingerprint: u64) -> Option<PricingResult> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner());
        match entries.get(&fingerprint) {
            Some(entry) if entry.inserted_at.elapsed() < self.config.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.result.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Live-entry lookup without touching the hit/miss counters
    fn peek(&self, fingerprint: u64) -> Option<PricingResult> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner());
        entries
            .get(&fingerprint)
            .filter(|e| e.inserted_at.elapsed() < self.config.ttl)
            .map(|e| e.result.clone())
    }

    /// Insert a result, evicting expired entries and then the oldest live
    /// entries past the size bound
    pub fn insert(&self, fingerprint: u64, result: PricingResult) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, e| e.inserted_at.elapsed() < self.config.ttl);
        while entries.len() >= self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| *k);
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
        entries.insert(
            fingerprint,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Compute-through lookup that collapses concurrent identical requests.
    /// Exactly one caller per fingerprint runs `compute`; the rest wait and
    /// read its cached result.
    pub async fn get_or_compute<E, F, Fut>(
        &self,
        fingerprint: u64,
        compute: F,
    ) -> Result<PricingResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PricingResult, E>>,
    {
        if let Some(result) = self.get(fingerprint) {
            return Ok(result);
        }

        let gate = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            in_flight
                .entry(fingerprint)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = gate.lock().await;

        // A racing caller may have populated the entry while we waited;
        // this re-check does not count toward hit/miss stats
        if let Some(result) = self.peek(fingerprint) {
            drop(guard);
            self.release_gate(fingerprint, gate);
            return Ok(result);
        }

        let outcome = compute().await;
        if let Ok(result) = &outcome {
            self.insert(fingerprint, result.clone());
            debug!("cached result for fingerprint {:016x}", fingerprint);
        }

        drop(guard);
        self.release_gate(fingerprint, gate);

        outcome
    }

    /// Drop a caller's gate handle and remove the map entry once no other
    /// caller holds one. The last caller out clears the slot, so the gate
    /// map only ever holds fingerprints with work actually in flight.
    fn release_gate(&self, fingerprint: u64, gate: Arc<tokio::sync::Mutex<()>>) {
        drop(gate);
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if in_flight
            .get(&fingerprint)
            .map(|g| Arc::strong_count(g) == 1)
            .unwrap_or(false)
        {
            in_flight.remove(&fingerprint);
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Drop every cached entry
    pub fn invalidate(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Release cached state on engine teardown
    pub fn shutdown(&self) {
        self.invalidate();
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit fraction over all lookups; 0.0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::{CoverageSelection, CoverageType, Driver, Product, Vehicle, VehicleType};
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicU32;

    fn sample_quote(quote_id: &str) -> QuoteRequest {
        QuoteRequest {
            quote_id: quote_id.to_string(),
            state: "TX".into(),
            product: Product::Auto,
            effective_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            vehicle: Vehicle {
                vin: "1HGCM82633A004352".into(),
                vehicle_type: VehicleType::Sedan,
                model_year: 2022,
                safety_features: 4,
                theft_rate_index: 1.0,
                garage_zip: "75201".into(),
            },
            drivers: vec![Driver {
                age: 35,
                violation_count: 0,
                accident_count: 0,
                dui_count: 0,
                years_licensed: 17,
                license_state: "TX".into(),
                good_student: false,
            }],
            coverages: vec![CoverageSelection {
                coverage: CoverageType::Liability,
                limit: 100_000.0,
                deductible: 0.0,
            }],
            credit_score: Some(750),
            multi_policy: true,
            paid_in_full: false,
            homeowner: false,
            affinity_group: None,
        }
    }

    fn sample_result(premium: f64) -> PricingResult {
        PricingResult {
            quote_id: "Q-1".into(),
            base_premium: premium,
            factored_premium: premium,
            factor_impacts: Vec::new(),
            applied_discounts: Vec::new(),
            total_discount_amount: 0.0,
            applied_surcharges: Vec::new(),
            total_surcharge_amount: 0.0,
            statistical: None,
            final_premium: premium,
            degraded: false,
            audit_notes: Vec::new(),
        }
    }

    #[test]
    fn test_fingerprint_ignores_quote_id() {
        let a = sample_quote("Q-1");
        let b = sample_quote("Q-2");
        assert_eq!(fingerprint(&a, 0), fingerprint(&b, 0));
    }

    #[test]
    fn test_fingerprint_sensitive_to_inputs() {
        let a = sample_quote("Q-1");
        let mut b = sample_quote("Q-1");
        b.drivers[0].violation_count = 2;
        assert_ne!(fingerprint(&a, 0), fingerprint(&b, 0));

        // Table reload changes the fingerprint even for identical inputs
        assert_ne!(fingerprint(&a, 0), fingerprint(&a, 1));
    }

    #[test]
    fn test_fingerprint_ignores_driver_order() {
        let mut a = sample_quote("Q-1");
        a.drivers.push(Driver {
            age: 19,
            violation_count: 1,
            accident_count: 0,
            dui_count: 0,
            years_licensed: 2,
            license_state: "TX".into(),
            good_student: true,
        });
        let mut b = a.clone();
        b.drivers.reverse();
        assert_eq!(fingerprint(&a, 0), fingerprint(&b, 0));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = QuoteCache::new(CacheConfig {
            ttl: Duration::from_millis(0),
            max_entries: 10,
        });
        cache.insert(42, sample_result(500.0));
        assert!(cache.get(42).is_none());
    }

    #[test]
    fn test_size_bound_evicts_oldest() {
        let cache = QuoteCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        cache.insert(1, sample_result(100.0));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(2, sample_result(200.0));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(3, sample_result(300.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn test_hit_rate() {
        let cache = QuoteCache::default();
        cache.insert(7, sample_result(500.0));
        assert!(cache.get(7).is_some());
        assert!(cache.get(8).is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_compute_once() {
        let cache = Arc::new(QuoteCache::default());
        let computations = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let computations = computations.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute::<std::convert::Infallible, _, _>(99, || async move {
                        computations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(sample_result(500.0))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.final_premium, 500.0);
        }
        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_gate_entries_released_after_compute() {
        let cache = QuoteCache::default();
        for fp in 0..100u64 {
            cache
                .get_or_compute::<std::convert::Infallible, _, _>(fp, || async move {
                    Ok(sample_result(fp as f64))
                })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 100);
        // No work in flight, so the gate map must be empty
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_compute_not_cached() {
        let cache = QuoteCache::default();
        let outcome = cache
            .get_or_compute::<String, _, _>(5, || async { Err("boom".to_string()) })
            .await;
        assert!(outcome.is_err());
        assert!(cache.get(5).is_none());
    }

    #[test]
    fn test_invalidate_clears() {
        let cache = QuoteCache::default();
        cache.insert(1, sample_result(100.0));
        cache.invalidate();
        assert!(cache.is_empty());
    }
}
