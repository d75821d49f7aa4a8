use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::knowledge::KnowledgeField;

/// Identifies the regulatory jurisdiction a site falls under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JurisdictionKey {
    pub state: String,
    pub county: String,
    pub zip: String,
}

impl fmt::Display for JurisdictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.county, self.state, self.zip)
    }
}

/// Storage product being underwritten. Each class carries its own density
/// defaults used when a jurisdiction card cannot supply coverage/stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    SingleStorySelfStorage,
    MultiStorySelfStorage,
    BoatAndRvStorage,
}

impl AssetClass {
    pub const fn label(self) -> &'static str {
        match self {
            AssetClass::SingleStorySelfStorage => "single-story self-storage",
            AssetClass::MultiStorySelfStorage => "multi-story self-storage",
            AssetClass::BoatAndRvStorage => "boat & RV storage",
        }
    }

    /// Rentable share of the built footprint (hallways, office, mechanical).
    pub const fn efficiency_factor(self) -> f64 {
        match self {
            AssetClass::SingleStorySelfStorage => 0.85,
            AssetClass::MultiStorySelfStorage => 0.80,
            AssetClass::BoatAndRvStorage => 0.95,
        }
    }

    /// Fallback density ceiling when coverage or stories are unresolved.
    pub const fn default_density_sqft_per_acre(self) -> f64 {
        match self {
            AssetClass::SingleStorySelfStorage => 15_000.0,
            AssetClass::MultiStorySelfStorage => 38_000.0,
            AssetClass::BoatAndRvStorage => 20_000.0,
        }
    }
}

/// Confidence tier for a card section as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionConfidence {
    Verified,
    Reported,
    Inferred,
}

impl SectionConfidence {
    pub const fn label(self) -> &'static str {
        match self {
            SectionConfidence::Verified => "verified",
            SectionConfidence::Reported => "reported",
            SectionConfidence::Inferred => "inferred",
        }
    }
}

/// Section-level provenance attached to each bundle of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionProvenance {
    pub confidence: SectionConfidence,
    pub source_note: String,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Whether the asset class may operate on the parcel at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsePermission {
    Permitted,
    Conditional,
    Prohibited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoningSection {
    pub front_setback_ft: KnowledgeField<f64>,
    pub side_setback_ft: KnowledgeField<f64>,
    pub rear_setback_ft: KnowledgeField<f64>,
    pub max_lot_coverage: KnowledgeField<f64>,
    pub max_stories: KnowledgeField<u8>,
    pub storage_use: KnowledgeField<UsePermission>,
    pub provenance: SectionProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePlanSection {
    pub site_plan_required: KnowledgeField<bool>,
    pub landscape_buffer_pct: KnowledgeField<f64>,
    pub parking_area_pct: KnowledgeField<f64>,
    pub review_timeline_days: KnowledgeField<u32>,
    pub provenance: SectionProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormwaterSection {
    pub management_plan_required: KnowledgeField<bool>,
    pub detention_pct_of_gross: KnowledgeField<f64>,
    pub provenance: SectionProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireAccessSection {
    pub fire_lane_required: KnowledgeField<bool>,
    pub lane_width_ft: KnowledgeField<f64>,
    pub hydrant_spacing_ft: KnowledgeField<f64>,
    pub provenance: SectionProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingSection {
    pub grading_permit_required: KnowledgeField<bool>,
    pub max_slope_pct: KnowledgeField<f64>,
    pub provenance: SectionProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondingSection {
    pub improvement_bond_required: KnowledgeField<bool>,
    pub bond_per_acre: KnowledgeField<f64>,
    pub provenance: SectionProvenance,
}

/// Cached regulatory constants for a (jurisdiction, asset class) pair.
///
/// Immutable snapshot: compilers read it, nothing in the engine mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionCard {
    pub key: JurisdictionKey,
    pub asset_class: AssetClass,
    pub zoning: ZoningSection,
    pub site_plan: SitePlanSection,
    pub stormwater: StormwaterSection,
    pub fire_access: FireAccessSection,
    pub grading: GradingSection,
    pub bonding: BondingSection,
    pub fetched_at: DateTime<Utc>,
}

impl JurisdictionCard {
    pub fn card_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_days()
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        self.card_age_days(now) > max_age_days
    }
}

/// Read-only card lookup, resolved by the orchestration layer.
pub trait CardStore: Send + Sync {
    fn get_card(
        &self,
        key: &JurisdictionKey,
        asset_class: AssetClass,
    ) -> Result<Option<JurisdictionCard>, CardStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CardStoreError {
    #[error("card store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn card_fetched_at(fetched_at: DateTime<Utc>) -> JurisdictionCard {
        use super::super::knowledge::{AuthorityScope, Criticality, KnowledgeField};

        let provenance = SectionProvenance {
            confidence: SectionConfidence::Verified,
            source_note: "unit fixture".to_string(),
            verified_at: Some(fetched_at),
        };
        let unknown_f64 = || {
            KnowledgeField::<f64>::unknown(Criticality::Informational, AuthorityScope::Municipal)
        };

        JurisdictionCard {
            key: JurisdictionKey {
                state: "IA".to_string(),
                county: "Polk".to_string(),
                zip: "50309".to_string(),
            },
            asset_class: AssetClass::SingleStorySelfStorage,
            zoning: ZoningSection {
                front_setback_ft: unknown_f64(),
                side_setback_ft: unknown_f64(),
                rear_setback_ft: unknown_f64(),
                max_lot_coverage: unknown_f64(),
                max_stories: KnowledgeField::unknown(
                    Criticality::RequiredForApproval,
                    AuthorityScope::Municipal,
                ),
                storage_use: KnowledgeField::unknown(
                    Criticality::RequiredForApproval,
                    AuthorityScope::Municipal,
                ),
                provenance: provenance.clone(),
            },
            site_plan: SitePlanSection {
                site_plan_required: KnowledgeField::unknown(
                    Criticality::Informational,
                    AuthorityScope::Municipal,
                ),
                landscape_buffer_pct: unknown_f64(),
                parking_area_pct: unknown_f64(),
                review_timeline_days: KnowledgeField::unknown(
                    Criticality::Informational,
                    AuthorityScope::Municipal,
                ),
                provenance: provenance.clone(),
            },
            stormwater: StormwaterSection {
                management_plan_required: KnowledgeField::unknown(
                    Criticality::RequiredForEnvelope,
                    AuthorityScope::SpecialDistrict,
                ),
                detention_pct_of_gross: unknown_f64(),
                provenance: provenance.clone(),
            },
            fire_access: FireAccessSection {
                fire_lane_required: KnowledgeField::unknown(
                    Criticality::RequiredForEnvelope,
                    AuthorityScope::SpecialDistrict,
                ),
                lane_width_ft: unknown_f64(),
                hydrant_spacing_ft: unknown_f64(),
                provenance: provenance.clone(),
            },
            grading: GradingSection {
                grading_permit_required: KnowledgeField::unknown(
                    Criticality::Informational,
                    AuthorityScope::County,
                ),
                max_slope_pct: unknown_f64(),
                provenance: provenance.clone(),
            },
            bonding: BondingSection {
                improvement_bond_required: KnowledgeField::unknown(
                    Criticality::Informational,
                    AuthorityScope::County,
                ),
                bond_per_acre: unknown_f64(),
                provenance,
            },
            fetched_at,
        }
    }

    #[test]
    fn card_age_and_staleness() {
        let fetched = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let card = card_fetched_at(fetched);
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();

        assert_eq!(card.card_age_days(now), 90);
        assert!(card.is_stale(now, 60));
        assert!(!card.is_stale(now, 120));
    }
}
