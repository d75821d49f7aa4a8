//! Constraint compilers: one per regulatory discipline, executed in a fixed
//! order by the orchestrator. Each turns the cached jurisdiction card plus
//! site parameters into a typed bundle of knowledge fields. A missing card,
//! missing section, or implausible cached value degrades the affected fields
//! to Unknown/Blocked; compilers never abort the pipeline.

pub mod fire_access;
pub mod permitting;
pub mod site_plan;
pub mod stormwater;
pub mod zoning;

pub use fire_access::{compile_fire_access, FireAccessBundle};
pub use permitting::{compile_permitting, PermittingBundle};
pub use site_plan::{compile_site_plan, SitePlanBundle};
pub use stormwater::{compile_stormwater, StormwaterBundle};
pub use zoning::{compile_zoning, ZoningBundle};

use serde::{Deserialize, Serialize};

use super::jurisdiction::AssetClass;
use super::knowledge::{Criticality, KnowledgeField};

/// Site-specific inputs shared by every compiler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteParameters {
    pub gross_acres: f64,
    pub asset_class: AssetClass,
}

/// Compilers own the criticality doctrine; cached cards may carry older tags.
pub(crate) fn retag<T>(mut field: KnowledgeField<T>, criticality: Criticality) -> KnowledgeField<T> {
    field.criticality = criticality;
    field
}

pub(crate) fn staled<T>(mut field: KnowledgeField<T>, card_stale: bool) -> KnowledgeField<T> {
    if card_stale {
        field.mark_stale();
    }
    field
}
