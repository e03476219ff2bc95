//! The rating engine: staged orchestration of the full premium calculation
//!
//! Stage order is fixed: load rates, compute factors, apply discounts,
//! apply surcharges, finalize. Hard errors abort the calculation and carry
//! the stage that raised them; soft failures substitute neutral values and
//! mark the result degraded. Identical inputs always price identically, so
//! results flow through the fingerprint cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::cache::{self, CacheConfig, QuoteCache};
use crate::error::{RatingError, RatingStage, StageError};
use crate::external::{factor_with_timeout, vehicle_data_with_timeout, ExternalDataIntegrator};
use crate::pipeline::{PipelineSnapshot, RatingPipeline};
use crate::quote::QuoteRequest;
use crate::rating::{
    round_cents, CreditBasedInsuranceScorer, DiscountCalculator, FactorMap, PremiumCalculator,
    PricingResult, StatisticalAdjustments, StatisticalRatingModels, SurchargeCalculator,
};
use crate::tables::{
    default_discount_rules, default_surcharge_rules, DiscountRule, InMemoryRateTable, LoadedTables,
    RateTableEntry, RateTableRepository, TerritoryRepository,
};

/// Engine-level configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-call timeout for each external data lookup
    pub external_timeout: Duration,

    /// Total discount cap for states without a filed cap
    pub default_discount_cap: f64,

    /// Filed per-state total discount caps
    pub state_discount_caps: HashMap<String, f64>,

    /// States whose territory factors are precomputed at warm-up
    pub hot_states: Vec<String>,

    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut state_discount_caps = HashMap::new();
        state_discount_caps.insert("NY".to_string(), 0.30);
        state_discount_caps.insert("FL".to_string(), 0.45);
        Self {
            external_timeout: Duration::from_millis(250),
            default_discount_cap: 0.40,
            state_discount_caps,
            hot_states: vec!["TX".to_string(), "CA".to_string(), "FL".to_string()],
            cache: CacheConfig::default(),
        }
    }
}

/// Orchestrates the staged rating pipeline over injected reference data
pub struct RatingEngine {
    rates: Arc<dyn RateTableRepository>,
    territories: TerritoryRepository,
    discount_rules: Vec<DiscountRule>,
    premium: PremiumCalculator,
    discounts: DiscountCalculator,
    surcharges: SurchargeCalculator,
    credit: CreditBasedInsuranceScorer,
    models: StatisticalRatingModels,
    external: Arc<dyn ExternalDataIntegrator>,
    pipeline: RatingPipeline,
    config: EngineConfig,

    /// Bumped on every table reload; part of the cache fingerprint
    table_generation: AtomicU64,
}

impl RatingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rates: Arc<dyn RateTableRepository>,
        territories: TerritoryRepository,
        discount_rules: Vec<DiscountRule>,
        surcharges: SurchargeCalculator,
        credit: CreditBasedInsuranceScorer,
        models: StatisticalRatingModels,
        external: Arc<dyn ExternalDataIntegrator>,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(QuoteCache::new(config.cache.clone()));
        let pipeline = RatingPipeline::new(cache, config.hot_states.clone());
        Self {
            rates,
            territories,
            discount_rules,
            premium: PremiumCalculator::new(),
            discounts: DiscountCalculator::new(),
            surcharges,
            credit,
            models,
            external,
            pipeline,
            config,
            table_generation: AtomicU64::new(0),
        }
    }

    /// Engine over the default filed reference data, for tests and the
    /// demo CLI
    pub fn with_filed_defaults(external: Arc<dyn ExternalDataIntegrator>) -> Self {
        Self::new(
            Arc::new(InMemoryRateTable::default_filed()),
            TerritoryRepository::default_filed(),
            default_discount_rules(),
            SurchargeCalculator::default_filed(),
            CreditBasedInsuranceScorer::default_filed(),
            StatisticalRatingModels::default_filed(),
            external,
            EngineConfig::default(),
        )
    }

    /// Engine over CSV-loaded reference tables
    pub fn from_loaded(
        loaded: &LoadedTables,
        external: Arc<dyn ExternalDataIntegrator>,
        config: EngineConfig,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryRateTable::from_loaded(loaded)),
            TerritoryRepository::from_loaded(loaded),
            default_discount_rules(),
            SurchargeCalculator::new(default_surcharge_rules(), loaded.surcharge_caps.clone()),
            CreditBasedInsuranceScorer::default_filed(),
            StatisticalRatingModels::default_filed(),
            external,
            config,
        )
    }

    /// Filed total discount cap for a state
    pub fn discount_cap(&self, state: &str) -> f64 {
        self.config
            .state_discount_caps
            .get(state)
            .copied()
            .unwrap_or(self.config.default_discount_cap)
    }

    /// Precompute hot-state territory factors
    pub fn warm_caches(&self) {
        self.pipeline.warm(&self.territories);
    }

    /// Invalidate cached results and precomputed factors after a rate
    /// table reload
    pub fn invalidate_tables(&self) {
        self.table_generation.fetch_add(1, Ordering::AcqRel);
        self.pipeline.cache().invalidate();
        self.pipeline.clear_precomputed();
        info!("rate tables invalidated, cache cleared");
    }

    pub fn metrics(&self) -> PipelineSnapshot {
        self.pipeline.snapshot()
    }

    /// Release cached state on teardown
    pub fn shutdown(&self) {
        self.pipeline.cache().shutdown();
    }

    /// Price one quote through the cache. Identical inputs share one
    /// computation and one cached result.
    pub async fn calculate_premium(
        &self,
        quote: &QuoteRequest,
    ) -> Result<PricingResult, StageError> {
        let generation = self.table_generation.load(Ordering::Acquire);
        let fingerprint = cache::fingerprint(quote, generation);
        let mut result = self
            .pipeline
            .execute(fingerprint, || self.rate_uncached(quote))
            .await?;
        // A cache hit may carry the quote id of the request that computed it
        result.quote_id = quote.quote_id.clone();
        Ok(result)
    }

    /// Price a batch of quotes in order
    pub async fn rate_batch(
        &self,
        quotes: &[QuoteRequest],
    ) -> Vec<Result<PricingResult, StageError>> {
        let mut results = Vec::with_capacity(quotes.len());
        for quote in quotes {
            results.push(self.calculate_premium(quote).await);
        }
        results
    }

    async fn rate_uncached(&self, quote: &QuoteRequest) -> Result<PricingResult, StageError> {
        let mut notes: Vec<String> = Vec::new();
        let mut degraded = false;

        // LOADING_RATES: per-coverage filed rate lookup and base premium
        let (base_premium, min_premium, max_premium, primary) = self
            .load_rates(quote)
            .map_err(|e| StageError::new(RatingStage::LoadingRates, e))?;

        // COMPUTING_FACTORS: the independent sub-calculations are built as
        // futures and dispatched through a single join, then aggregated
        // sequentially below
        let as_of = quote.effective_date;
        let vehicle_age = quote.vehicle.age_years(as_of);
        let zip = quote.vehicle.garage_zip.as_str();
        let territory_table = self.territories.table_for(&quote.state, quote.product);
        let territory_row = territory_table.and_then(|t| t.get(zip));

        let territory_fut = async {
            let blend = self
                .pipeline
                .precomputed_territory_factor(&quote.state, quote.product, zip)
                .unwrap_or_else(|| match territory_table {
                    Some(table) => self.premium.calculate_territory_factor(zip, table),
                    None => 1.0,
                });
            blend * primary.territory_adjustment(zip)
        };

        // Worst driver drives the factor and the statistical models
        let driver_fut = async {
            let mut scored: Vec<(usize, f64, Vec<String>)> = quote
                .drivers
                .iter()
                .enumerate()
                .map(|(idx, d)| {
                    let (score, reasons) = self.premium.calculate_driver_risk_score(d);
                    (idx, score, reasons)
                })
                .collect();
            let (worst_idx, worst_score) = scored
                .iter()
                .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(idx, score, _)| (*idx, *score))
                .ok_or_else(|| RatingError::InvalidInput("quote has no drivers".to_string()))?;
            let reasons = std::mem::take(&mut scored[worst_idx].2);
            let factor = self.premium.driver_factor_from_score(worst_score)
                * primary.driver_adjustment(quote.youngest_driver_age());
            Ok::<(f64, usize, Vec<String>), RatingError>((factor, worst_idx, reasons))
        };

        // The VIN decode may refresh the theft index; on lookup failure or
        // timeout the quoted value stands and the result is marked degraded
        let vehicle_fut = async {
            let (data, lookup_note) = vehicle_data_with_timeout(
                self.config.external_timeout,
                self.external.validate_vehicle_data(&quote.vehicle.vin),
            )
            .await;
            let lookup_failed = lookup_note.is_some();
            let mut note = lookup_note;
            let mut vehicle = quote.vehicle.clone();
            if let Some(data) = data {
                if !data.valid {
                    note = Some(format!(
                        "vin {} did not validate, quoted theft index retained",
                        data.vin
                    ));
                } else if let Some(index) = data
                    .theft_rate_index
                    .filter(|i| *i > 0.0 && i.is_finite())
                {
                    vehicle.theft_rate_index = index;
                }
            }
            let factor = self.premium.calculate_vehicle_risk_score(&vehicle, vehicle_age)
                * primary.vehicle_adjustment(quote.vehicle.vehicle_type);
            (factor, note, lookup_failed)
        };

        let credit_fut = async {
            let mut factor = None;
            let mut note = None;
            if let Some(score) = quote.credit_score {
                if CreditBasedInsuranceScorer::is_permitted(&quote.state, quote.product) {
                    let filed = self
                        .credit
                        .calculate_credit_factor(score, &quote.state, quote.product)?;
                    let tier = self.credit.tier_name(score);
                    factor = Some(primary.credit_factors.get(tier).copied().unwrap_or(filed));
                } else {
                    note = Some(format!(
                        "credit-based rating skipped: prohibited in {} for {}",
                        quote.state,
                        quote.product.as_str()
                    ));
                }
            }
            Ok::<(Option<f64>, Option<String>), RatingError>((factor, note))
        };

        let (
            territory_factor,
            driver_out,
            (vehicle_factor, vin_note, vin_degraded),
            credit_out,
            (weather, weather_note),
            (crime, crime_note),
        ) = tokio::join!(
            territory_fut,
            driver_fut,
            vehicle_fut,
            credit_fut,
            factor_with_timeout(
                "weather",
                self.config.external_timeout,
                self.external.get_weather_risk_factor(zip, as_of),
            ),
            factor_with_timeout(
                "crime",
                self.config.external_timeout,
                self.external.get_crime_risk_factor(zip),
            ),
        );

        let (driver_factor, worst_idx, driver_reasons) =
            driver_out.map_err(|e| StageError::new(RatingStage::ComputingFactors, e))?;
        let worst_driver = &quote.drivers[worst_idx];
        for reason in &driver_reasons {
            notes.push(format!("driver risk: {}", reason));
        }

        let (credit_factor, credit_note) =
            credit_out.map_err(|e| StageError::new(RatingStage::ComputingFactors, e))?;
        if let Some(note) = credit_note {
            notes.push(note);
        }

        if vin_degraded {
            degraded = true;
        }
        if let Some(note) = vin_note {
            notes.push(note);
        }
        for note in [weather_note, crime_note].into_iter().flatten() {
            degraded = true;
            notes.push(note);
        }

        let deductible_factor = Self::deductible_factor(quote.max_deductible());

        let mut statistical = StatisticalAdjustments::default();

        let glm_factor = match self.models.filed_glm_factor(worst_driver, vehicle_age) {
            Ok(factor) => {
                statistical.glm_factor = Some(factor);
                factor
            }
            Err(e) if e.is_soft() => {
                degraded = true;
                notes.push(format!("glm unavailable: {}", e));
                1.0
            }
            Err(e) => return Err(StageError::new(RatingStage::ComputingFactors, e)),
        };

        let cat_loading = match self.models.calculate_catastrophe_loading(
            zip,
            &quote.coverages,
            territory_row,
        ) {
            Ok(loading) => {
                if loading > 1.0 {
                    statistical.catastrophe_loading = Some(loading);
                }
                loading
            }
            Err(e) if e.is_soft() => {
                degraded = true;
                notes.push(format!("catastrophe loading unavailable: {}", e));
                1.0
            }
            Err(e) => return Err(StageError::new(RatingStage::ComputingFactors, e)),
        };

        // Frequency-severity stays advisory: reported, never multiplied in
        match self.models.calculate_frequency_severity_model(
            worst_driver,
            &quote.vehicle,
            vehicle_age,
            territory_row,
        ) {
            Ok(fs) => {
                statistical.frequency_factor = Some(fs.frequency);
                statistical.severity_factor = Some(fs.severity);
                statistical.pure_premium_factor = Some(fs.pure_premium);
            }
            Err(e) => {
                degraded = true;
                notes.push(format!("frequency-severity model unavailable: {}", e));
            }
        }

        let mut factors = FactorMap::new();
        factors.insert("territory", territory_factor);
        factors.insert("driver", driver_factor);
        factors.insert("vehicle", vehicle_factor);
        factors.insert("deductible", deductible_factor);
        if let Some(factor) = credit_factor {
            factors.insert("credit", factor);
        }
        factors.insert("weather", weather);
        factors.insert("crime", crime);
        factors.insert("glm", glm_factor);
        if cat_loading > 1.0 {
            factors.insert("catastrophe", cat_loading);
        }

        let (factored_premium, factor_impacts) = self
            .premium
            .apply_multiplicative_factors(base_premium, &factors)
            .map_err(|e| StageError::new(RatingStage::ComputingFactors, e))?;

        // APPLYING_DISCOUNTS
        let eligible =
            self.discounts
                .eligible_discounts(&self.discount_rules, quote, factored_premium);
        let (applied_discounts, total_discount_amount) = self
            .discounts
            .calculate_stacked_discounts(factored_premium, &eligible, self.discount_cap(&quote.state))
            .map_err(|e| StageError::new(RatingStage::ApplyingDiscounts, e))?;

        // APPLYING_SURCHARGES
        let (applied_surcharges, total_surcharge_amount) = self
            .surcharges
            .calculate_all_surcharges(
                &quote.drivers,
                &quote.vehicle,
                &quote.state,
                quote.product,
                factored_premium,
                as_of,
            )
            .map_err(|e| StageError::new(RatingStage::ApplyingSurcharges, e))?;

        // FINALIZING
        let unclamped = factored_premium - total_discount_amount + total_surcharge_amount;
        if !unclamped.is_finite() {
            return Err(StageError::new(
                RatingStage::Finalizing,
                RatingError::InvalidInput(format!("non-finite premium {}", unclamped)),
            ));
        }
        let clamped = unclamped.clamp(min_premium, max_premium);
        if clamped != unclamped {
            notes.push(format!(
                "premium clamped to filed band [{:.2}, {:.2}]",
                min_premium, max_premium
            ));
        }

        Ok(PricingResult {
            quote_id: quote.quote_id.clone(),
            base_premium: round_cents(base_premium),
            factored_premium: round_cents(factored_premium),
            factor_impacts,
            applied_discounts,
            total_discount_amount: round_cents(total_discount_amount),
            applied_surcharges,
            total_surcharge_amount: round_cents(total_surcharge_amount),
            statistical: if statistical.is_empty() {
                None
            } else {
                Some(statistical)
            },
            final_premium: round_cents(clamped),
            degraded,
            audit_notes: notes,
        })
    }

    /// Per-coverage lookup and base premium, plus the summed filed premium
    /// band and the primary entry carrying the sparse adjustment tables
    fn load_rates(
        &self,
        quote: &QuoteRequest,
    ) -> Result<(f64, f64, f64, &RateTableEntry), RatingError> {
        if quote.drivers.is_empty() {
            return Err(RatingError::InvalidInput(
                "quote has no drivers".to_string(),
            ));
        }
        if quote.coverages.is_empty() {
            return Err(RatingError::InvalidInput(
                "quote has no coverages".to_string(),
            ));
        }

        let mut base_premium = 0.0;
        let mut min_premium = 0.0;
        let mut max_premium = 0.0;
        let mut primary: Option<&RateTableEntry> = None;

        for selection in &quote.coverages {
            let entry = self.rates.lookup(
                &quote.state,
                quote.product,
                selection.coverage,
                quote.effective_date,
            )?;
            base_premium +=
                self.premium
                    .calculate_base_premium(selection.limit, entry.base_rate, 1.0)?;
            min_premium += entry.min_premium;
            max_premium += entry.max_premium;
            primary.get_or_insert(entry);
        }

        // coverages is non-empty, so primary is set
        let primary = primary.ok_or_else(|| {
            RatingError::InvalidInput("quote has no coverages".to_string())
        })?;
        Ok((base_premium, min_premium, max_premium, primary))
    }

    /// Filed deductible credit steps
    fn deductible_factor(max_deductible: f64) -> f64 {
        if max_deductible >= 2500.0 {
            0.92
        } else if max_deductible >= 1000.0 {
            0.95
        } else if max_deductible >= 500.0 {
            0.97
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{StaticDataIntegrator, VehicleData};
    use crate::quote::{CoverageSelection, CoverageType, Driver, Product, Vehicle, VehicleType};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FailingIntegrator;

    #[async_trait]
    impl ExternalDataIntegrator for FailingIntegrator {
        async fn get_weather_risk_factor(
            &self,
            _zip: &str,
            _date: NaiveDate,
        ) -> Result<f64, RatingError> {
            Err(RatingError::ExternalDataUnavailable("weather feed down".into()))
        }

        async fn get_crime_risk_factor(&self, _zip: &str) -> Result<f64, RatingError> {
            Err(RatingError::ExternalDataUnavailable("crime feed down".into()))
        }

        async fn validate_vehicle_data(&self, _vin: &str) -> Result<VehicleData, RatingError> {
            Err(RatingError::ExternalDataUnavailable("vin decoder down".into()))
        }
    }

    struct TheftFeedIntegrator;

    #[async_trait]
    impl ExternalDataIntegrator for TheftFeedIntegrator {
        async fn get_weather_risk_factor(
            &self,
            _zip: &str,
            _date: NaiveDate,
        ) -> Result<f64, RatingError> {
            Ok(1.0)
        }

        async fn get_crime_risk_factor(&self, _zip: &str) -> Result<f64, RatingError> {
            Ok(1.0)
        }

        async fn validate_vehicle_data(&self, vin: &str) -> Result<VehicleData, RatingError> {
            Ok(VehicleData {
                vin: vin.to_string(),
                valid: true,
                theft_rate_index: Some(2.5),
            })
        }
    }

    fn engine() -> RatingEngine {
        RatingEngine::with_filed_defaults(Arc::new(StaticDataIntegrator::sample_data()))
    }

    fn tx_quote(quote_id: &str) -> QuoteRequest {
        QuoteRequest {
            quote_id: quote_id.to_string(),
            state: "TX".into(),
            product: Product::Auto,
            effective_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            vehicle: Vehicle {
                vin: "1HGCM82633A004352".into(),
                vehicle_type: VehicleType::Sedan,
                model_year: 2022,
                safety_features: 3,
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

    #[tokio::test]
    async fn test_full_pipeline_tx_auto() {
        let engine = engine();
        let result = engine.calculate_premium(&tx_quote("Q-1")).await.unwrap();

        // Liability: 100k x 0.005
        assert_eq!(result.base_premium, 500.00);
        assert!(result.final_premium > 0.0);
        assert!(!result.degraded);

        // Factor audit trail starts with territory and reconstructs the
        // factored premium
        assert_eq!(result.factor_impacts[0].name, "territory");
        let last = result.factor_impacts.last().unwrap();
        assert!((last.premium_after - result.factored_premium).abs() < 0.01);

        // Multi-policy discount applied against the factored premium
        assert!(result
            .applied_discounts
            .iter()
            .any(|d| d.code == "MULTI_POLICY"));
        assert!(result.applied_surcharges.is_empty());

        // Credit factor present: TX permits credit-based rating
        assert!(result.factor_impacts.iter().any(|f| f.name == "credit"));
    }

    #[tokio::test]
    async fn test_identical_inputs_price_identically() {
        let engine = engine();
        let a = engine.calculate_premium(&tx_quote("Q-1")).await.unwrap();
        let b = engine.calculate_premium(&tx_quote("Q-2")).await.unwrap();

        assert_eq!(a.final_premium, b.final_premium);
        assert_eq!(a.factor_impacts, b.factor_impacts);

        // The second call hit the cache
        assert!(engine.metrics().cache_hits >= 1);
    }

    #[tokio::test]
    async fn test_degraded_on_external_failure() {
        let engine = RatingEngine::with_filed_defaults(Arc::new(FailingIntegrator));
        let result = engine.calculate_premium(&tx_quote("Q-1")).await.unwrap();

        assert!(result.degraded);
        assert!(result.final_premium > 0.0);
        assert!(result
            .audit_notes
            .iter()
            .any(|n| n.contains("weather") || n.contains("crime")));
        // The failed VIN decode leaves the quoted theft index in place
        assert!(result
            .audit_notes
            .iter()
            .any(|n| n.contains("vin lookup unavailable")));

        // Neutral substitution: external factors are exactly 1.0
        for name in ["weather", "crime"] {
            let impact = result
                .factor_impacts
                .iter()
                .find(|f| f.name == name)
                .unwrap();
            assert_eq!(impact.factor, 1.0);
        }
    }

    #[tokio::test]
    async fn test_vin_decode_refreshes_theft_index() {
        let baseline = engine().calculate_premium(&tx_quote("Q-1")).await.unwrap();

        let engine = RatingEngine::with_filed_defaults(Arc::new(TheftFeedIntegrator));
        let refreshed = engine.calculate_premium(&tx_quote("Q-1")).await.unwrap();

        let vehicle_factor = |r: &PricingResult| {
            r.factor_impacts
                .iter()
                .find(|f| f.name == "vehicle")
                .unwrap()
                .factor
        };
        // Theft index 2.5 from the decoder rates above the quoted 1.0
        assert!(vehicle_factor(&refreshed) > vehicle_factor(&baseline));
        assert!(!refreshed.degraded);
        assert!(refreshed.final_premium > baseline.final_premium);
    }

    #[tokio::test]
    async fn test_prohibited_state_skips_credit() {
        let engine = engine();
        let mut quote = tx_quote("Q-1");
        quote.state = "CA".into();
        quote.vehicle.garage_zip = "90210".into();
        quote.drivers[0].license_state = "CA".into();

        let result = engine.calculate_premium(&quote).await.unwrap();

        assert!(!result.factor_impacts.iter().any(|f| f.name == "credit"));
        assert!(result
            .audit_notes
            .iter()
            .any(|n| n.contains("prohibited in CA")));
        assert!(result.final_premium > 0.0);
    }

    #[tokio::test]
    async fn test_rate_not_found_aborts_at_loading() {
        let engine = engine();
        let mut quote = tx_quote("Q-1");
        quote.state = "WY".into();

        let err = engine.calculate_premium(&quote).await.unwrap_err();
        assert_eq!(err.stage, RatingStage::LoadingRates);
        assert!(matches!(err.cause, RatingError::RateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_surcharges_flow_through() {
        let engine = engine();
        let mut quote = tx_quote("Q-1");
        quote.drivers[0].dui_count = 1;
        quote.credit_score = None;

        let result = engine.calculate_premium(&quote).await.unwrap();
        assert!(result
            .applied_surcharges
            .iter()
            .any(|s| s.code == "DUI_TIER_1"));
        assert!(result
            .applied_surcharges
            .iter()
            .any(|s| s.code == "SR22_FILING"));
        assert!(result.total_surcharge_amount > 0.0);
        assert!(result.final_premium > result.factored_premium);
    }

    #[tokio::test]
    async fn test_min_premium_clamp() {
        let engine = engine();
        let mut quote = tx_quote("Q-1");
        // Tiny limit prices below the filed floor
        quote.coverages[0].limit = 1_000.0;
        quote.credit_score = None;
        quote.multi_policy = false;

        let result = engine.calculate_premium(&quote).await.unwrap();
        assert!(result.final_premium >= 50.0);
        assert!(result
            .audit_notes
            .iter()
            .any(|n| n.contains("clamped")));
    }

    #[tokio::test]
    async fn test_catastrophe_loading_in_miami() {
        let engine = engine();
        let mut quote = tx_quote("Q-1");
        quote.state = "FL".into();
        quote.vehicle.garage_zip = "33139".into();
        quote.coverages.push(CoverageSelection {
            coverage: CoverageType::Comprehensive,
            limit: 30_000.0,
            deductible: 500.0,
        });

        let result = engine.calculate_premium(&quote).await.unwrap();
        assert!(result
            .factor_impacts
            .iter()
            .any(|f| f.name == "catastrophe" && f.factor > 1.0));
        let statistical = result.statistical.unwrap();
        assert!(statistical.catastrophe_loading.unwrap() > 1.0);
    }

    #[tokio::test]
    async fn test_invalidate_tables_forces_recompute() {
        let engine = engine();
        let quote = tx_quote("Q-1");

        let first = engine.calculate_premium(&quote).await.unwrap();
        engine.invalidate_tables();
        let second = engine.calculate_premium(&quote).await.unwrap();

        // Same tables, so the same price, but recomputed under a new
        // fingerprint generation
        assert_eq!(first.final_premium, second.final_premium);
        assert!(engine.metrics().cache_misses >= 2);
    }

    #[tokio::test]
    async fn test_warm_caches_precomputes_territory() {
        let engine = engine();
        engine.warm_caches();
        let result = engine.calculate_premium(&tx_quote("Q-1")).await.unwrap();
        let territory = result
            .factor_impacts
            .iter()
            .find(|f| f.name == "territory")
            .unwrap();
        // 75201 blend: 0.8 * (540/480) + 0.2 = 1.1
        assert!((territory.factor - 1.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_coverages_rejected() {
        let engine = engine();
        let mut quote = tx_quote("Q-1");
        quote.coverages.clear();

        let err = engine.calculate_premium(&quote).await.unwrap_err();
        assert_eq!(err.stage, RatingStage::LoadingRates);
        assert!(matches!(err.cause, RatingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_engine_from_csv_tables() {
        let loaded = LoadedTables::load_default().unwrap();
        let engine = RatingEngine::from_loaded(
            &loaded,
            Arc::new(StaticDataIntegrator::sample_data()),
            EngineConfig::default(),
        );

        let result = engine.calculate_premium(&tx_quote("Q-1")).await.unwrap();
        assert!(result.final_premium > 0.0);
        assert_eq!(engine.surcharges.cap_multiple("FL"), 2.75);
    }

    #[tokio::test]
    async fn test_rate_batch_preserves_order() {
        let engine = engine();
        let mut risky = tx_quote("Q-2");
        risky.drivers[0].violation_count = 3;

        let results = engine.rate_batch(&[tx_quote("Q-1"), risky]).await;
        assert_eq!(results.len(), 2);
        let clean = results[0].as_ref().unwrap();
        let risky = results[1].as_ref().unwrap();
        assert!(risky.final_premium > clean.final_premium);
        assert_eq!(clean.quote_id, "Q-1");
    }
}
