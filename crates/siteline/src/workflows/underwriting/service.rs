use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;

use super::constraints::{
    compile_fire_access, compile_permitting, compile_site_plan, compile_stormwater, compile_zoning,
    FireAccessBundle, PermittingBundle, SiteParameters, StormwaterBundle, ZoningBundle,
};
use super::domain::{
    CardProvenance, CompletionStatus, PipelineError, PipelineStage, RecordId, UnderwritingReport,
    UnderwritingRequest,
};
use super::envelope::{EnvelopeFallbacks, EnvelopeReducer};
use super::failure::{Clock, FailureHub, RepairHandler, RepairOutcome, Severity, SystemClock};
use super::feasibility::{
    Advisory, DoctrineThresholds, FatalFlaw, FeasibilityEngine, FeasibilityInput,
    FinancingAssumptions, FlawCode, WarningCode,
};
use super::jurisdiction::{CardStore, UsePermission};
use super::vault::{DecisionVault, VaultError};
use super::verdict::{DimensionScores, Verdict, VerdictAggregator, VerdictWeights, WeightError};
use crate::workflows::market::{BenchmarkConfidence, RentBenchmark, RentBenchmarkProvider};

/// Tunable doctrine for one service instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnderwritingConfig {
    pub doctrine: DoctrineThresholds,
    pub financing: FinancingAssumptions,
    pub weights: VerdictWeights,
    pub fallbacks: EnvelopeFallbacks,
    pub card_max_age_days: i64,
}

impl Default for UnderwritingConfig {
    fn default() -> Self {
        Self {
            doctrine: DoctrineThresholds::default(),
            financing: FinancingAssumptions::default(),
            weights: VerdictWeights::default(),
            fallbacks: EnvelopeFallbacks::default(),
            card_max_age_days: 180,
        }
    }
}

/// Orchestrates one sequential pipeline per request: compile constraints,
/// reduce the envelope, price feasibility, aggregate the verdict, persist.
/// Every run owns a fresh failure ledger; nothing is shared across requests.
pub struct UnderwritingService<C, M, V> {
    cards: Arc<C>,
    market: Arc<M>,
    vault: Arc<V>,
    reducer: EnvelopeReducer,
    engine: FeasibilityEngine,
    aggregator: VerdictAggregator,
    clock: Arc<dyn Clock>,
    card_max_age_days: i64,
    repair_handlers: Vec<(String, Arc<dyn RepairHandler>)>,
}

impl<C, M, V> UnderwritingService<C, M, V>
where
    C: CardStore + 'static,
    M: RentBenchmarkProvider + 'static,
    V: DecisionVault + 'static,
{
    pub fn new(
        cards: Arc<C>,
        market: Arc<M>,
        vault: Arc<V>,
        config: UnderwritingConfig,
    ) -> Result<Self, WeightError> {
        Ok(Self {
            cards,
            market,
            vault,
            reducer: EnvelopeReducer::new(config.fallbacks),
            engine: FeasibilityEngine::new(config.financing, config.doctrine),
            aggregator: VerdictAggregator::new(config.weights)?,
            clock: Arc::new(SystemClock),
            card_max_age_days: config.card_max_age_days,
            repair_handlers: Vec::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Corrective actions cloned into each run's failure hub.
    pub fn register_repair_handler(
        &mut self,
        failure_type: &str,
        handler: Arc<dyn RepairHandler>,
    ) {
        self.repair_handlers
            .push((failure_type.to_string(), handler));
    }

    pub fn fetch_record(&self, id: &RecordId) -> Result<Option<UnderwritingReport>, VaultError> {
        self.vault.fetch_record(id)
    }

    /// Entry point: always returns a best-effort decision object. Stage
    /// failures degrade to absent fields plus ledger entries; they never
    /// abort the pipeline.
    pub fn underwrite(&self, request: UnderwritingRequest) -> UnderwritingReport {
        let mut hub = FailureHub::new(self.clock.clone());
        for (failure_type, handler) in &self.repair_handlers {
            hub.register_handler(failure_type, handler.clone());
        }
        let mut errors: Vec<PipelineError> = Vec::new();

        let jurisdiction = request.jurisdiction_key();
        let card = match self.cards.get_card(&jurisdiction, request.asset_class) {
            Ok(card) => card,
            Err(source) => {
                errors.push(PipelineError {
                    stage: PipelineStage::CardLookup,
                    message: source.to_string(),
                });
                hub.report(
                    "jurisdiction",
                    "card_store",
                    "card_store_unavailable",
                    Severity::Error,
                    source.to_string(),
                    BTreeMap::new(),
                );
                None
            }
        };

        let now = self.clock.now();
        let card_stale = card
            .as_ref()
            .is_some_and(|card| card.is_stale(now, self.card_max_age_days));
        let card_provenance = CardProvenance {
            available: card.is_some(),
            fetched_at: card.as_ref().map(|card| card.fetched_at),
            age_days: card.as_ref().map(|card| card.card_age_days(now)),
            stale: card_stale,
        };
        if card.is_none() && errors.is_empty() {
            hub.report(
                "jurisdiction",
                "card_store",
                "card_missing",
                Severity::Warning,
                format!("no cached card for {jurisdiction}"),
                BTreeMap::new(),
            );
        }
        if card_stale {
            hub.report(
                "jurisdiction",
                "card_store",
                "card_stale",
                Severity::Warning,
                format!(
                    "card for {jurisdiction} exceeds the {} day revalidation window",
                    self.card_max_age_days
                ),
                BTreeMap::new(),
            );
        }

        let site = SiteParameters {
            gross_acres: request.requested_acres,
            asset_class: request.asset_class,
        };

        // Fixed compiler order; each spoke is fault-isolated by construction.
        let card_ref = card.as_ref();
        let zoning = compile_zoning(card_ref, card_stale);
        let site_plan = compile_site_plan(card_ref, card_stale);
        let stormwater = compile_stormwater(card_ref, card_stale);
        let fire_access = compile_fire_access(card_ref, card_stale);
        let permitting = compile_permitting(card_ref, card_stale);

        let blocked = zoning.blocked_fields();
        if !blocked.is_empty() {
            hub.report(
                "constraints",
                "zoning",
                "section_blocked",
                Severity::Warning,
                format!("implausible cached values demoted: {}", blocked.join(", ")),
                BTreeMap::new(),
            );
        }

        let mut unknowns = zoning.unknowns();
        unknowns.extend(site_plan.unknowns());
        unknowns.extend(stormwater.unknowns());
        unknowns.extend(fire_access.unknowns());
        unknowns.extend(permitting.unknowns());

        let envelope =
            self.reducer
                .reduce(&site, &zoning, &site_plan, &stormwater, &fire_access);
        if !envelope.valid && !envelope.missing_constraints.is_empty() {
            hub.report(
                "envelope",
                "reducer",
                "missing_required_constraints",
                Severity::Error,
                format!(
                    "envelope refused: {}",
                    envelope.missing_constraints.join(", ")
                ),
                BTreeMap::new(),
            );
        }

        let benchmark = match self.market.rent_benchmark(&request.zip) {
            Ok(benchmark) => benchmark,
            Err(source) => {
                errors.push(PipelineError {
                    stage: PipelineStage::MarketData,
                    message: source.to_string(),
                });
                hub.report(
                    "market",
                    "rent_benchmark",
                    "benchmark_unavailable",
                    Severity::Warning,
                    source.to_string(),
                    BTreeMap::new(),
                );
                None
            }
        };

        // Guardrail-refused envelopes skip feasibility entirely; a computed
        // zero-net envelope still flows through so ZeroAcreage surfaces.
        let feasibility = if envelope.missing_constraints.is_empty() {
            let acreage = envelope.net_buildable_acres.unwrap_or(0.0);
            let density = envelope.sqft_per_acre_ceiling.unwrap_or(0.0);
            let mut result = self.engine.evaluate(&FeasibilityInput {
                acreage,
                rent_per_sqft_month: benchmark
                    .as_ref()
                    .map(|benchmark| benchmark.avg_price_per_sqft_month),
                density_sqft_per_acre: density,
            });
            self.append_benchmark_advisories(&mut result.warnings, benchmark.as_ref());
            Some(result)
        } else {
            None
        };

        let mut fatal_flaws: Vec<String> = feasibility
            .as_ref()
            .map(|result| result.fatal_flaws.iter().map(FatalFlaw::summary).collect())
            .unwrap_or_default();
        if let Some(flaw) = eligibility_flaw(&zoning) {
            fatal_flaws.push(flaw.summary());
        }

        let scores = DimensionScores {
            feasibility: feasibility
                .as_ref()
                .map(|result| score_feasibility(result, self.engine.doctrine())),
            demand: score_demand(
                benchmark.as_ref(),
                self.engine.assumptions().default_rent_per_sqft_month,
            ),
            zoning: score_zoning(&zoning),
            permits: score_permits(&permitting),
            civil: score_civil(&stormwater, &fire_access),
        };

        let confidence = confidence_for(
            &envelope.assumptions,
            &unknowns,
            &card_provenance,
            feasibility.as_ref(),
        );
        let verdict: Verdict = self.aggregator.decide(&scores, fatal_flaws, confidence);

        hub.escalate_overdue();

        let completion = completion_for(&errors, &envelope.missing_constraints, &feasibility);

        let mut report = UnderwritingReport {
            request,
            jurisdiction,
            card: card_provenance,
            assumptions: envelope.assumptions.clone(),
            envelope,
            feasibility,
            verdict,
            unknowns,
            errors,
            failures: Vec::new(),
            completion,
            record_id: None,
            generated_at: self.clock.now(),
        };

        self.persist(&mut report, &mut hub);
        report.failures = hub.into_events();
        report
    }

    /// Write-once persistence after the verdict is final. A vault failure is
    /// ledger material, never grounds to lose the report.
    fn persist(&self, report: &mut UnderwritingReport, hub: &mut FailureHub) {
        match self.vault.save_record(report) {
            Ok(id) => report.record_id = Some(id),
            Err(source) => {
                let event_id = hub.report(
                    "persistence",
                    "vault",
                    "vault_write_failed",
                    Severity::Error,
                    source.to_string(),
                    BTreeMap::new(),
                );
                let retried = matches!(
                    hub.attempt_auto_repair(event_id),
                    Ok(RepairOutcome::Repaired { .. })
                );
                if retried {
                    if let Ok(id) = self.vault.save_record(report) {
                        report.record_id = Some(id);
                        return;
                    }
                }
                report.errors.push(PipelineError {
                    stage: PipelineStage::Persistence,
                    message: source.to_string(),
                });
            }
        }
    }

    fn append_benchmark_advisories(
        &self,
        warnings: &mut Vec<Advisory>,
        benchmark: Option<&RentBenchmark>,
    ) {
        let Some(benchmark) = benchmark else {
            return;
        };
        if benchmark.confidence == BenchmarkConfidence::Low {
            warnings.push(Advisory {
                code: WarningCode::LowBenchmarkConfidence,
                message: format!(
                    "rent benchmark backed by only {} comp(s)",
                    benchmark.sample_size
                ),
                threshold: None,
                actual: Some(f64::from(benchmark.sample_size)),
            });
        }
        if let Some(as_of) = benchmark.as_of {
            let today = self.clock.now().date_naive();
            if today - as_of > Duration::days(365) {
                warnings.push(Advisory {
                    code: WarningCode::StaleMarketData,
                    message: format!("rent benchmark dated {as_of}"),
                    threshold: None,
                    actual: None,
                });
            }
        }
    }
}

fn eligibility_flaw(zoning: &ZoningBundle) -> Option<FatalFlaw> {
    match zoning.storage_use.current_value() {
        Some(UsePermission::Prohibited) => Some(FatalFlaw {
            code: FlawCode::UseProhibited,
            message: "storage use is prohibited in this district".to_string(),
            threshold: None,
            actual: None,
        }),
        _ => None,
    }
}

fn score_feasibility(
    result: &super::feasibility::FeasibilityResult,
    doctrine: &DoctrineThresholds,
) -> f64 {
    let floor = doctrine.min_noi_per_acre_month;
    let ratio = if floor > 0.0 {
        result.noi_per_acre_month / floor
    } else {
        0.0
    };

    if result.pass_fail {
        let mut score = 60.0 + 40.0 * (ratio - 1.0).clamp(0.0, 1.0);
        if result
            .warnings
            .iter()
            .any(|warning| warning.code == WarningCode::DscrBelowTarget)
        {
            score -= 10.0;
        }
        score.clamp(0.0, 100.0)
    } else {
        (40.0 * ratio.clamp(0.0, 1.0)).clamp(0.0, 100.0)
    }
}

fn score_demand(benchmark: Option<&RentBenchmark>, default_rent: f64) -> f64 {
    let Some(benchmark) = benchmark else {
        return 40.0;
    };
    let base: f64 = match benchmark.confidence {
        BenchmarkConfidence::High => 85.0,
        BenchmarkConfidence::Medium => 70.0,
        BenchmarkConfidence::Low => 55.0,
    };
    let bonus = if benchmark.avg_price_per_sqft_month >= default_rent * 1.2 {
        10.0
    } else if benchmark.avg_price_per_sqft_month >= default_rent {
        5.0
    } else {
        0.0
    };
    (base + bonus).min(100.0)
}

fn score_zoning(zoning: &ZoningBundle) -> f64 {
    match zoning.storage_use.current_value() {
        Some(UsePermission::Permitted) => 90.0,
        Some(UsePermission::Conditional) => 60.0,
        Some(UsePermission::Prohibited) => 10.0,
        None => 40.0,
    }
}

fn score_permits(permitting: &PermittingBundle) -> f64 {
    let mut score: f64 = match permitting.review_timeline_days.current_value() {
        Some(days) if *days <= 90 => 85.0,
        Some(days) if *days <= 180 => 70.0,
        Some(_) => 50.0,
        None => 55.0,
    };
    if permitting.grading_permit_required.current_value() == Some(&true) {
        score -= 5.0;
    }
    if permitting.improvement_bond_required.current_value() == Some(&true) {
        score -= 5.0;
    }
    score.clamp(0.0, 100.0)
}

fn score_civil(stormwater: &StormwaterBundle, fire_access: &FireAccessBundle) -> f64 {
    let mut score: f64 = match stormwater.management_plan_required.current_value() {
        Some(true) => {
            if stormwater.detention_pct_of_gross.current_value().is_some() {
                80.0
            } else {
                65.0
            }
        }
        Some(false) => 90.0,
        None => 45.0,
    };
    let fire_resolved = match fire_access.fire_lane_required.current_value() {
        Some(true) => fire_access.lane_width_ft.current_value().is_some(),
        Some(false) => true,
        None => false,
    };
    if fire_resolved {
        score += 5.0;
    }
    score.clamp(0.0, 100.0)
}

fn confidence_for(
    assumptions: &[String],
    unknowns: &[super::knowledge::UnknownField],
    card: &CardProvenance,
    feasibility: Option<&super::feasibility::FeasibilityResult>,
) -> f64 {
    let mut confidence = 1.0;
    confidence -= 0.05 * assumptions.len() as f64;
    for unknown in unknowns {
        confidence -= if unknown.blocks_calculation { 0.10 } else { 0.03 };
    }
    if !card.available || card.stale {
        confidence -= 0.05;
    }
    if let Some(result) = feasibility {
        confidence -= 0.05 * result.warnings.len() as f64;
    }
    confidence.clamp(0.05, 1.0)
}

fn completion_for(
    errors: &[PipelineError],
    missing_constraints: &[String],
    feasibility: &Option<super::feasibility::FeasibilityResult>,
) -> CompletionStatus {
    let card_lookup_failed = errors
        .iter()
        .any(|error| error.stage == PipelineStage::CardLookup);
    if card_lookup_failed && !missing_constraints.is_empty() {
        return CompletionStatus::Failed;
    }
    if !missing_constraints.is_empty() || feasibility.is_none() || !errors.is_empty() {
        return CompletionStatus::Partial;
    }
    CompletionStatus::Complete
}
