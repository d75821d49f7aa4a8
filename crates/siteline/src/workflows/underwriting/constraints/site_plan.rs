use super::super::jurisdiction::JurisdictionCard;
use super::super::knowledge::{
    AuthorityScope, Criticality, FieldAudit, KnowledgeField, ResearchMethod, UnknownField,
};
use super::{retag, staled};
use serde::{Deserialize, Serialize};

/// Site-plan review obligations and the land they consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePlanBundle {
    pub site_plan_required: KnowledgeField<bool>,
    pub landscape_buffer_pct: KnowledgeField<f64>,
    pub parking_area_pct: KnowledgeField<f64>,
    pub review_timeline_days: KnowledgeField<u32>,
}

pub fn compile_site_plan(card: Option<&JurisdictionCard>, card_stale: bool) -> SitePlanBundle {
    let Some(card) = card else {
        return SitePlanBundle {
            site_plan_required: KnowledgeField::unknown(
                Criticality::RequiredForApproval,
                AuthorityScope::Municipal,
            ),
            landscape_buffer_pct: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::Municipal,
            ),
            parking_area_pct: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::Municipal,
            ),
            review_timeline_days: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::Municipal,
            ),
        };
    };

    let section = &card.site_plan;

    SitePlanBundle {
        site_plan_required: staled(
            retag(
                section.site_plan_required.clone(),
                Criticality::RequiredForApproval,
            ),
            card_stale,
        ),
        landscape_buffer_pct: staled(
            sanitize_pct(retag(
                section.landscape_buffer_pct.clone(),
                Criticality::Informational,
            )),
            card_stale,
        ),
        parking_area_pct: staled(
            sanitize_pct(retag(
                section.parking_area_pct.clone(),
                Criticality::Informational,
            )),
            card_stale,
        ),
        review_timeline_days: staled(
            retag(
                section.review_timeline_days.clone(),
                Criticality::Informational,
            ),
            card_stale,
        ),
    }
}

/// Land-consumption shares above half the parcel are treated as bad data.
fn sanitize_pct(field: KnowledgeField<f64>) -> KnowledgeField<f64> {
    match field.current_value() {
        Some(value) if *value < 0.0 || *value > 0.5 => {
            KnowledgeField::blocked(field.criticality, field.authority_scope)
        }
        _ => field,
    }
}

impl SitePlanBundle {
    pub fn audits(&self) -> Vec<FieldAudit> {
        vec![
            self.site_plan_required.audit("site_plan_required"),
            self.landscape_buffer_pct.audit("landscape_buffer_pct"),
            self.parking_area_pct.audit("parking_area_pct"),
            self.review_timeline_days.audit("review_timeline_days"),
        ]
    }

    pub fn unknowns(&self) -> Vec<UnknownField> {
        let mut unknowns = Vec::new();
        if self.site_plan_required.is_effectively_unknown() {
            unknowns.push(UnknownField {
                field: "site_plan_required".to_string(),
                research_method: ResearchMethod::JurisdictionStaffCall,
                blocks_calculation: false,
            });
        }
        for (name, unresolved) in [
            (
                "landscape_buffer_pct",
                self.landscape_buffer_pct.is_effectively_unknown(),
            ),
            (
                "parking_area_pct",
                self.parking_area_pct.is_effectively_unknown(),
            ),
            (
                "review_timeline_days",
                self.review_timeline_days.is_effectively_unknown(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_card_yields_unknowns_that_do_not_block() {
        let bundle = compile_site_plan(None, false);
        assert!(bundle.site_plan_required.is_effectively_unknown());
        assert!(bundle
            .unknowns()
            .iter()
            .all(|unknown| !unknown.blocks_calculation));
    }
}
