use super::super::jurisdiction::{JurisdictionCard, UsePermission};
use super::super::knowledge::{
    AuthorityScope, Criticality, FieldAudit, KnowledgeField, ResearchMethod, UnknownField,
};
use super::{retag, staled};
use serde::{Deserialize, Serialize};

/// Setback envelopes, lot coverage, height, and use eligibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoningBundle {
    pub front_setback_ft: KnowledgeField<f64>,
    pub side_setback_ft: KnowledgeField<f64>,
    pub rear_setback_ft: KnowledgeField<f64>,
    pub max_lot_coverage: KnowledgeField<f64>,
    pub max_stories: KnowledgeField<u8>,
    pub storage_use: KnowledgeField<UsePermission>,
}

const MAX_PLAUSIBLE_SETBACK_FT: f64 = 200.0;

pub fn compile_zoning(card: Option<&JurisdictionCard>, card_stale: bool) -> ZoningBundle {
    let Some(card) = card else {
        return ZoningBundle {
            front_setback_ft: KnowledgeField::unknown(
                Criticality::RequiredForEnvelope,
                AuthorityScope::Municipal,
            ),
            side_setback_ft: KnowledgeField::unknown(
                Criticality::RequiredForEnvelope,
                AuthorityScope::Municipal,
            ),
            rear_setback_ft: KnowledgeField::unknown(
                Criticality::RequiredForEnvelope,
                AuthorityScope::Municipal,
            ),
            max_lot_coverage: KnowledgeField::unknown(
                Criticality::RequiredForApproval,
                AuthorityScope::Municipal,
            ),
            max_stories: KnowledgeField::unknown(
                Criticality::RequiredForApproval,
                AuthorityScope::Municipal,
            ),
            storage_use: KnowledgeField::unknown(
                Criticality::RequiredForApproval,
                AuthorityScope::Municipal,
            ),
        };
    };

    let zoning = &card.zoning;

    ZoningBundle {
        front_setback_ft: staled(
            sanitize_setback(retag(
                zoning.front_setback_ft.clone(),
                Criticality::RequiredForEnvelope,
            )),
            card_stale,
        ),
        side_setback_ft: staled(
            sanitize_setback(retag(
                zoning.side_setback_ft.clone(),
                Criticality::RequiredForEnvelope,
            )),
            card_stale,
        ),
        rear_setback_ft: staled(
            sanitize_setback(retag(
                zoning.rear_setback_ft.clone(),
                Criticality::RequiredForEnvelope,
            )),
            card_stale,
        ),
        max_lot_coverage: staled(
            sanitize_fraction(retag(
                zoning.max_lot_coverage.clone(),
                Criticality::RequiredForApproval,
            )),
            card_stale,
        ),
        max_stories: staled(
            retag(zoning.max_stories.clone(), Criticality::RequiredForApproval),
            card_stale,
        ),
        storage_use: staled(
            retag(zoning.storage_use.clone(), Criticality::RequiredForApproval),
            card_stale,
        ),
    }
}

/// A cached setback outside the plausible range is a research failure, not a
/// usable value: demote it to Blocked so the guardrail refuses it.
fn sanitize_setback(field: KnowledgeField<f64>) -> KnowledgeField<f64> {
    match field.current_value() {
        Some(value) if *value < 0.0 || *value > MAX_PLAUSIBLE_SETBACK_FT => {
            KnowledgeField::blocked(field.criticality, field.authority_scope)
        }
        _ => field,
    }
}

fn sanitize_fraction(field: KnowledgeField<f64>) -> KnowledgeField<f64> {
    match field.current_value() {
        Some(value) if *value <= 0.0 || *value > 1.0 => {
            KnowledgeField::blocked(field.criticality, field.authority_scope)
        }
        _ => field,
    }
}

impl ZoningBundle {
    pub fn audits(&self) -> Vec<FieldAudit> {
        vec![
            self.front_setback_ft.audit("front_setback_ft"),
            self.side_setback_ft.audit("side_setback_ft"),
            self.rear_setback_ft.audit("rear_setback_ft"),
            self.max_lot_coverage.audit("max_lot_coverage"),
            self.max_stories.audit("max_stories"),
            self.storage_use.audit("storage_use"),
        ]
    }

    pub fn unknowns(&self) -> Vec<UnknownField> {
        let mut unknowns = Vec::new();
        for (name, unresolved, blocks) in [
            (
                "front_setback_ft",
                self.front_setback_ft.is_effectively_unknown(),
                true,
            ),
            (
                "side_setback_ft",
                self.side_setback_ft.is_effectively_unknown(),
                true,
            ),
            (
                "rear_setback_ft",
                self.rear_setback_ft.is_effectively_unknown(),
                true,
            ),
            (
                "max_lot_coverage",
                self.max_lot_coverage.is_effectively_unknown(),
                false,
            ),
            (
                "max_stories",
                self.max_stories.is_effectively_unknown(),
                false,
            ),
        ] {
            if unresolved {
                unknowns.push(UnknownField {
                    field: name.to_string(),
                    research_method: ResearchMethod::OrdinanceLookup,
                    blocks_calculation: blocks,
                });
            }
        }
        if self.storage_use.is_effectively_unknown() {
            unknowns.push(UnknownField {
                field: "storage_use".to_string(),
                research_method: ResearchMethod::JurisdictionStaffCall,
                blocks_calculation: false,
            });
        }
        unknowns
    }

    pub fn blocked_fields(&self) -> Vec<&'static str> {
        self.audits()
            .into_iter()
            .filter(|audit| audit.state == super::super::knowledge::KnowledgeState::Blocked)
            .map(|audit| audit.name)
            .collect()
    }
}
