use serde::{Deserialize, Serialize};

use super::constraints::{
    FireAccessBundle, SitePlanBundle, SiteParameters, StormwaterBundle, ZoningBundle,
};
use super::knowledge::check_envelope_requirements;

pub const SQFT_PER_ACRE: f64 = 43_560.0;

/// Land consumed by a single constraint category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionCategory {
    SetbackArea,
    StormwaterDetention,
    FireLane,
    LandscapeBuffer,
    Parking,
}

impl ReductionCategory {
    pub const fn label(self) -> &'static str {
        match self {
            ReductionCategory::SetbackArea => "setback area",
            ReductionCategory::StormwaterDetention => "stormwater detention",
            ReductionCategory::FireLane => "fire lane",
            ReductionCategory::LandscapeBuffer => "landscape buffer",
            ReductionCategory::Parking => "parking",
        }
    }
}

/// Whether a reduction came from a confirmed constraint or a documented
/// percentage-of-gross fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionBasis {
    KnownValue,
    FallbackPercentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeReduction {
    pub category: ReductionCategory,
    pub acres: f64,
    pub basis: ReductionBasis,
    pub note: String,
}

/// The geometrically derived maximum developable area after constraint
/// reductions. `valid` is true only when no `RequiredForEnvelope` field is
/// effectively unknown and net acreage is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildabilityEnvelope {
    pub gross_acres: f64,
    pub net_buildable_acres: Option<f64>,
    pub sqft_per_acre_ceiling: Option<f64>,
    pub max_buildable_sqft: Option<f64>,
    pub reduction_breakdown: Vec<EnvelopeReduction>,
    pub assumptions: Vec<String>,
    pub valid: bool,
    pub invalid_reason: Option<String>,
    pub missing_constraints: Vec<String>,
}

impl BuildabilityEnvelope {
    fn refused(gross_acres: f64, missing: Vec<String>, reason: String) -> Self {
        Self {
            gross_acres,
            net_buildable_acres: None,
            sqft_per_acre_ceiling: None,
            max_buildable_sqft: None,
            reduction_breakdown: Vec::new(),
            assumptions: Vec::new(),
            valid: false,
            invalid_reason: Some(reason),
            missing_constraints: missing,
        }
    }
}

/// Percentage-of-gross fallbacks for non-required constraint categories.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeFallbacks {
    pub stormwater_detention_pct: f64,
    pub fire_lane_pct: f64,
    pub landscape_buffer_pct: f64,
    pub parking_pct: f64,
}

impl Default for EnvelopeFallbacks {
    fn default() -> Self {
        Self {
            stormwater_detention_pct: 0.15,
            fire_lane_pct: 0.05,
            landscape_buffer_pct: 0.05,
            parking_pct: 0.02,
        }
    }
}

/// Reduces the constraint bundles into a buildability envelope. Refuses to
/// produce numbers when any required constraint is effectively unknown; never
/// substitutes an estimate for a required field.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeReducer {
    fallbacks: EnvelopeFallbacks,
}

impl EnvelopeReducer {
    pub fn new(fallbacks: EnvelopeFallbacks) -> Self {
        Self { fallbacks }
    }

    pub fn reduce(
        &self,
        site: &SiteParameters,
        zoning: &ZoningBundle,
        site_plan: &SitePlanBundle,
        stormwater: &StormwaterBundle,
        fire_access: &FireAccessBundle,
    ) -> BuildabilityEnvelope {
        let gross_acres = site.gross_acres;

        let mut audits = zoning.audits();
        audits.extend(site_plan.audits());
        audits.extend(stormwater.audits());
        audits.extend(fire_access.audits());

        let readiness = check_envelope_requirements(&audits);
        if !readiness.can_calculate {
            let mut missing: Vec<String> = readiness
                .missing_required_fields
                .iter()
                .map(|name| name.to_string())
                .collect();
            missing.extend(readiness.stale_fields.iter().map(|name| name.to_string()));
            let reason = readiness
                .block_reason
                .unwrap_or_else(|| "required constraints unresolved".to_string());
            return BuildabilityEnvelope::refused(gross_acres, missing, reason);
        }

        let mut assumptions = Vec::new();
        let mut breakdown = Vec::new();

        // The guardrail passed, so every accessor below is a confirmed value.
        let front = zoning.front_setback_ft.current_value().copied().unwrap_or(0.0);
        let side = zoning.side_setback_ft.current_value().copied().unwrap_or(0.0);
        let rear = zoning.rear_setback_ft.current_value().copied().unwrap_or(0.0);
        breakdown.push(setback_reduction(gross_acres, front, side, rear));

        breakdown.push(self.stormwater_reduction(gross_acres, stormwater, &mut assumptions));
        breakdown.push(self.fire_lane_reduction(gross_acres, fire_access, &mut assumptions));
        breakdown.push(self.landscape_reduction(gross_acres, site_plan, &mut assumptions));
        breakdown.push(self.parking_reduction(gross_acres, site_plan, &mut assumptions));

        let total_reduction: f64 = breakdown.iter().map(|entry| entry.acres).sum();
        let net_buildable_acres = (gross_acres - total_reduction).max(0.0);

        let ceiling = density_ceiling(site, zoning, &mut assumptions);
        let max_buildable_sqft = net_buildable_acres * ceiling;

        let valid = net_buildable_acres > 0.0;
        let invalid_reason = if valid {
            None
        } else {
            Some("constraint reductions consume the entire parcel".to_string())
        };

        BuildabilityEnvelope {
            gross_acres,
            net_buildable_acres: Some(net_buildable_acres),
            sqft_per_acre_ceiling: Some(ceiling),
            max_buildable_sqft: Some(max_buildable_sqft),
            reduction_breakdown: breakdown,
            assumptions,
            valid,
            invalid_reason,
            missing_constraints: Vec::new(),
        }
    }

    fn stormwater_reduction(
        &self,
        gross_acres: f64,
        stormwater: &StormwaterBundle,
        assumptions: &mut Vec<String>,
    ) -> EnvelopeReduction {
        let required = stormwater
            .management_plan_required
            .current_value()
            .copied()
            .unwrap_or(false);
        if !required {
            return EnvelopeReduction {
                category: ReductionCategory::StormwaterDetention,
                acres: 0.0,
                basis: ReductionBasis::KnownValue,
                note: "no stormwater management plan required".to_string(),
            };
        }

        match stormwater.detention_pct_of_gross.current_value() {
            Some(pct) => EnvelopeReduction {
                category: ReductionCategory::StormwaterDetention,
                acres: gross_acres * pct,
                basis: ReductionBasis::KnownValue,
                note: format!("detention sized at {:.0}% of gross per card", pct * 100.0),
            },
            None => {
                let pct = self.fallbacks.stormwater_detention_pct;
                assumptions.push(format!(
                    "stormwater detention assumed at {:.0}% of gross acreage (card did not size it)",
                    pct * 100.0
                ));
                EnvelopeReduction {
                    category: ReductionCategory::StormwaterDetention,
                    acres: gross_acres * pct,
                    basis: ReductionBasis::FallbackPercentage,
                    note: format!("fallback {:.0}% of gross", pct * 100.0),
                }
            }
        }
    }

    fn fire_lane_reduction(
        &self,
        gross_acres: f64,
        fire_access: &FireAccessBundle,
        assumptions: &mut Vec<String>,
    ) -> EnvelopeReduction {
        let required = fire_access
            .fire_lane_required
            .current_value()
            .copied()
            .unwrap_or(false);
        if !required {
            return EnvelopeReduction {
                category: ReductionCategory::FireLane,
                acres: 0.0,
                basis: ReductionBasis::KnownValue,
                note: "no dedicated fire lane required".to_string(),
            };
        }

        match fire_access.lane_width_ft.current_value() {
            Some(width) => {
                let frontage_ft = (gross_acres * SQFT_PER_ACRE).sqrt();
                EnvelopeReduction {
                    category: ReductionCategory::FireLane,
                    acres: width * frontage_ft / SQFT_PER_ACRE,
                    basis: ReductionBasis::KnownValue,
                    note: format!("{width:.0} ft lane along one frontage"),
                }
            }
            None => {
                let pct = self.fallbacks.fire_lane_pct;
                assumptions.push(format!(
                    "fire lane assumed at {:.0}% of gross acreage (lane width unresolved)",
                    pct * 100.0
                ));
                EnvelopeReduction {
                    category: ReductionCategory::FireLane,
                    acres: gross_acres * pct,
                    basis: ReductionBasis::FallbackPercentage,
                    note: format!("fallback {:.0}% of gross", pct * 100.0),
                }
            }
        }
    }

    fn landscape_reduction(
        &self,
        gross_acres: f64,
        site_plan: &SitePlanBundle,
        assumptions: &mut Vec<String>,
    ) -> EnvelopeReduction {
        match site_plan.landscape_buffer_pct.current_value() {
            Some(pct) => EnvelopeReduction {
                category: ReductionCategory::LandscapeBuffer,
                acres: gross_acres * pct,
                basis: ReductionBasis::KnownValue,
                note: format!("buffer at {:.0}% of gross per card", pct * 100.0),
            },
            None => {
                let pct = self.fallbacks.landscape_buffer_pct;
                assumptions.push(format!(
                    "landscape buffer assumed at {:.0}% of gross acreage",
                    pct * 100.0
                ));
                EnvelopeReduction {
                    category: ReductionCategory::LandscapeBuffer,
                    acres: gross_acres * pct,
                    basis: ReductionBasis::FallbackPercentage,
                    note: format!("fallback {:.0}% of gross", pct * 100.0),
                }
            }
        }
    }

    fn parking_reduction(
        &self,
        gross_acres: f64,
        site_plan: &SitePlanBundle,
        assumptions: &mut Vec<String>,
    ) -> EnvelopeReduction {
        match site_plan.parking_area_pct.current_value() {
            Some(pct) => EnvelopeReduction {
                category: ReductionCategory::Parking,
                acres: gross_acres * pct,
                basis: ReductionBasis::KnownValue,
                note: format!("parking at {:.0}% of gross per card", pct * 100.0),
            },
            None => {
                let pct = self.fallbacks.parking_pct;
                assumptions.push(format!(
                    "parking assumed at {:.0}% of gross acreage",
                    pct * 100.0
                ));
                EnvelopeReduction {
                    category: ReductionCategory::Parking,
                    acres: gross_acres * pct,
                    basis: ReductionBasis::FallbackPercentage,
                    note: format!("fallback {:.0}% of gross", pct * 100.0),
                }
            }
        }
    }
}

/// Square-parcel approximation: the buildable rectangle is the parcel side
/// less the side setbacks in one direction and front/rear in the other.
fn setback_reduction(gross_acres: f64, front: f64, side: f64, rear: f64) -> EnvelopeReduction {
    let parcel_side_ft = (gross_acres * SQFT_PER_ACRE).sqrt();
    let buildable_width = (parcel_side_ft - 2.0 * side).max(0.0);
    let buildable_depth = (parcel_side_ft - front - rear).max(0.0);
    let buildable_acres = buildable_width * buildable_depth / SQFT_PER_ACRE;
    let acres = (gross_acres - buildable_acres).max(0.0);

    EnvelopeReduction {
        category: ReductionCategory::SetbackArea,
        acres,
        basis: ReductionBasis::KnownValue,
        note: format!("setbacks {front:.0}/{side:.0}/{rear:.0} ft on a square parcel"),
    }
}

fn density_ceiling(
    site: &SiteParameters,
    zoning: &ZoningBundle,
    assumptions: &mut Vec<String>,
) -> f64 {
    let coverage = zoning.max_lot_coverage.current_value().copied();
    let stories = zoning.max_stories.current_value().copied();

    match (coverage, stories) {
        (Some(coverage), Some(stories)) => {
            coverage * f64::from(stories) * site.asset_class.efficiency_factor() * SQFT_PER_ACRE
        }
        _ => {
            let default = site.asset_class.default_density_sqft_per_acre();
            assumptions.push(format!(
                "density ceiling defaulted to {default:.0} sqft/acre for {} (coverage or stories unresolved)",
                site.asset_class.label()
            ));
            default
        }
    }
}
