use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::envelope::BuildabilityEnvelope;
use super::failure::FailureEvent;
use super::feasibility::FeasibilityResult;
use super::jurisdiction::{AssetClass, JurisdictionKey};
use super::knowledge::UnknownField;
use super::verdict::Verdict;

/// Identifier assigned by the vault once a decision is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One underwriting request for a candidate parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingRequest {
    pub zip: String,
    pub state: String,
    pub county: String,
    pub asset_class: AssetClass,
    pub requested_acres: f64,
    pub coordinates: Option<Coordinates>,
}

impl UnderwritingRequest {
    pub fn jurisdiction_key(&self) -> JurisdictionKey {
        JurisdictionKey {
            state: self.state.clone(),
            county: self.county.clone(),
            zip: self.zip.clone(),
        }
    }
}

/// How much of the pipeline produced usable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    Partial,
    Failed,
}

impl CompletionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::Partial => "partial",
            CompletionStatus::Failed => "failed",
        }
    }
}

/// Pipeline stages for error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    CardLookup,
    ZoningCompiler,
    SitePlanCompiler,
    StormwaterCompiler,
    FireAccessCompiler,
    PermittingCompiler,
    EnvelopeReduction,
    MarketData,
    Feasibility,
    Verdict,
    Persistence,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            PipelineStage::CardLookup => "card_lookup",
            PipelineStage::ZoningCompiler => "zoning_compiler",
            PipelineStage::SitePlanCompiler => "site_plan_compiler",
            PipelineStage::StormwaterCompiler => "stormwater_compiler",
            PipelineStage::FireAccessCompiler => "fire_access_compiler",
            PipelineStage::PermittingCompiler => "permitting_compiler",
            PipelineStage::EnvelopeReduction => "envelope_reduction",
            PipelineStage::MarketData => "market_data",
            PipelineStage::Feasibility => "feasibility",
            PipelineStage::Verdict => "verdict",
            PipelineStage::Persistence => "persistence",
        }
    }
}

/// A caught stage failure, degraded to a report entry instead of an abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineError {
    pub stage: PipelineStage,
    pub message: String,
}

/// Provenance of the jurisdiction card backing a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardProvenance {
    pub available: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_days: Option<i64>,
    pub stale: bool,
}

/// The full decision object returned by the entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingReport {
    pub request: UnderwritingRequest,
    pub jurisdiction: JurisdictionKey,
    pub card: CardProvenance,
    pub envelope: BuildabilityEnvelope,
    pub feasibility: Option<FeasibilityResult>,
    pub verdict: Verdict,
    pub unknowns: Vec<UnknownField>,
    pub assumptions: Vec<String>,
    pub errors: Vec<PipelineError>,
    pub failures: Vec<FailureEvent>,
    pub completion: CompletionStatus,
    pub record_id: Option<RecordId>,
    pub generated_at: DateTime<Utc>,
}
