use super::super::jurisdiction::JurisdictionCard;
use super::super::knowledge::{
    AuthorityScope, Criticality, FieldAudit, KnowledgeField, ResearchMethod, UnknownField,
};
use super::{retag, staled};
use serde::{Deserialize, Serialize};

/// Entitlement and permitting posture: approval timeline, grading permit,
/// and improvement bonding. Feeds the permits/civil verdict dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermittingBundle {
    pub review_timeline_days: KnowledgeField<u32>,
    pub grading_permit_required: KnowledgeField<bool>,
    pub max_slope_pct: KnowledgeField<f64>,
    pub improvement_bond_required: KnowledgeField<bool>,
    pub bond_per_acre: KnowledgeField<f64>,
}

pub fn compile_permitting(card: Option<&JurisdictionCard>, card_stale: bool) -> PermittingBundle {
    let Some(card) = card else {
        return PermittingBundle {
            review_timeline_days: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::Municipal,
            ),
            grading_permit_required: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::County,
            ),
            max_slope_pct: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::County,
            ),
            improvement_bond_required: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::County,
            ),
            bond_per_acre: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::County,
            ),
        };
    };

    PermittingBundle {
        review_timeline_days: staled(
            retag(
                card.site_plan.review_timeline_days.clone(),
                Criticality::Informational,
            ),
            card_stale,
        ),
        grading_permit_required: staled(
            retag(
                card.grading.grading_permit_required.clone(),
                Criticality::Informational,
            ),
            card_stale,
        ),
        max_slope_pct: staled(
            retag(card.grading.max_slope_pct.clone(), Criticality::Informational),
            card_stale,
        ),
        improvement_bond_required: staled(
            retag(
                card.bonding.improvement_bond_required.clone(),
                Criticality::Informational,
            ),
            card_stale,
        ),
        bond_per_acre: staled(
            retag(card.bonding.bond_per_acre.clone(), Criticality::Informational),
            card_stale,
        ),
    }
}

impl PermittingBundle {
    pub fn audits(&self) -> Vec<FieldAudit> {
        vec![
            self.review_timeline_days.audit("review_timeline_days"),
            self.grading_permit_required.audit("grading_permit_required"),
            self.max_slope_pct.audit("max_slope_pct"),
            self.improvement_bond_required
                .audit("improvement_bond_required"),
            self.bond_per_acre.audit("bond_per_acre"),
        ]
    }

    pub fn unknowns(&self) -> Vec<UnknownField> {
        self.audits()
            .into_iter()
            .filter(|audit| {
                audit.state != super::super::knowledge::KnowledgeState::Known || audit.stale
            })
            .map(|audit| UnknownField {
                field: audit.name.to_string(),
                research_method: ResearchMethod::JurisdictionStaffCall,
                blocks_calculation: false,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_card_degrades_without_blocking() {
        let bundle = compile_permitting(None, false);
        let unknowns = bundle.unknowns();
        assert_eq!(unknowns.len(), 5);
        assert!(unknowns.iter().all(|unknown| !unknown.blocks_calculation));
    }
}
