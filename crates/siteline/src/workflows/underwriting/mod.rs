//! The constraint-to-verdict engine: compiles jurisdiction constraints and
//! site geometry into a buildability envelope under a three-state knowledge
//! model, prices the envelope against market rents, and aggregates a weighted
//! PROCEED/EVALUATE/WALK verdict, all wrapped by a per-run failure ledger.

pub mod constraints;
pub mod domain;
pub mod envelope;
pub mod failure;
pub mod feasibility;
pub mod jurisdiction;
pub mod knowledge;
pub mod router;
pub mod service;
pub mod vault;
pub mod verdict;

pub use domain::{
    CardProvenance, CompletionStatus, Coordinates, PipelineError, PipelineStage, RecordId,
    UnderwritingReport, UnderwritingRequest,
};
pub use envelope::{
    BuildabilityEnvelope, EnvelopeFallbacks, EnvelopeReducer, EnvelopeReduction, ReductionBasis,
    ReductionCategory,
};
pub use failure::{
    Clock, EscalationPolicy, FailureEvent, FailureHub, RepairError, RepairHandler, RepairOutcome,
    ResolutionStatus, RetryPolicy, Severity, SystemClock,
};
pub use feasibility::{
    Advisory, DoctrineThresholds, FatalFlaw, FeasibilityEngine, FeasibilityInput,
    FeasibilityResult, FinancingAssumptions, FlawCode, WarningCode,
};
pub use jurisdiction::{
    AssetClass, BondingSection, CardStore, CardStoreError, FireAccessSection, GradingSection,
    JurisdictionCard, JurisdictionKey, SectionConfidence, SectionProvenance, SitePlanSection,
    StormwaterSection, UsePermission, ZoningSection,
};
pub use knowledge::{
    check_envelope_requirements, AuthorityScope, Criticality, EnvelopeReadiness, FieldAudit,
    FieldSource, KnowledgeField, KnowledgeState, ResearchMethod, UnknownField,
};
pub use router::underwriting_router;
pub use service::{UnderwritingConfig, UnderwritingService};
pub use vault::{DecisionVault, VaultError};
pub use verdict::{
    Decision, Dimension, DimensionScores, Verdict, VerdictAggregator, VerdictWeights,
    WeightedContribution, WeightError,
};
