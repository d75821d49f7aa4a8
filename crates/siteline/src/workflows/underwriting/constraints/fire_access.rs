use super::super::jurisdiction::JurisdictionCard;
use super::super::knowledge::{
    AuthorityScope, Criticality, FieldAudit, KnowledgeField, ResearchMethod, UnknownField,
};
use super::{retag, staled};
use serde::{Deserialize, Serialize};

/// Fire apparatus access requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireAccessBundle {
    pub fire_lane_required: KnowledgeField<bool>,
    pub lane_width_ft: KnowledgeField<f64>,
    pub hydrant_spacing_ft: KnowledgeField<f64>,
}

const MAX_PLAUSIBLE_LANE_WIDTH_FT: f64 = 60.0;

pub fn compile_fire_access(card: Option<&JurisdictionCard>, card_stale: bool) -> FireAccessBundle {
    let Some(card) = card else {
        return FireAccessBundle {
            fire_lane_required: KnowledgeField::unknown(
                Criticality::RequiredForEnvelope,
                AuthorityScope::SpecialDistrict,
            ),
            lane_width_ft: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::SpecialDistrict,
            ),
            hydrant_spacing_ft: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::SpecialDistrict,
            ),
        };
    };

    let section = &card.fire_access;

    FireAccessBundle {
        fire_lane_required: staled(
            retag(
                section.fire_lane_required.clone(),
                Criticality::RequiredForEnvelope,
            ),
            card_stale,
        ),
        lane_width_ft: staled(
            sanitize_width(retag(
                section.lane_width_ft.clone(),
                Criticality::Informational,
            )),
            card_stale,
        ),
        hydrant_spacing_ft: staled(
            retag(
                section.hydrant_spacing_ft.clone(),
                Criticality::Informational,
            ),
            card_stale,
        ),
    }
}

fn sanitize_width(field: KnowledgeField<f64>) -> KnowledgeField<f64> {
    match field.current_value() {
        Some(value) if *value <= 0.0 || *value > MAX_PLAUSIBLE_LANE_WIDTH_FT => {
            KnowledgeField::blocked(field.criticality, field.authority_scope)
        }
        _ => field,
    }
}

impl FireAccessBundle {
    pub fn audits(&self) -> Vec<FieldAudit> {
        vec![
            self.fire_lane_required.audit("fire_lane_required"),
            self.lane_width_ft.audit("lane_width_ft"),
            self.hydrant_spacing_ft.audit("hydrant_spacing_ft"),
        ]
    }

    pub fn unknowns(&self) -> Vec<UnknownField> {
        let mut unknowns = Vec::new();
        if self.fire_lane_required.is_effectively_unknown() {
            unknowns.push(UnknownField {
                field: "fire_lane_required".to_string(),
                research_method: ResearchMethod::JurisdictionStaffCall,
                blocks_calculation: true,
            });
        }
        for (name, unresolved) in [
            ("lane_width_ft", self.lane_width_ft.is_effectively_unknown()),
            (
                "hydrant_spacing_ft",
                self.hydrant_spacing_ft.is_effectively_unknown(),
            ),
        ] {
            if unresolved {
                unknowns.push(UnknownField {
                    field: name.to_string(),
                    research_method: ResearchMethod::OrdinanceLookup,
                    blocks_calculation: false,
                });
            }
        }
        unknowns
    }
}
