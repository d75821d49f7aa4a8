use super::super::jurisdiction::JurisdictionCard;
use super::super::knowledge::{
    AuthorityScope, Criticality, FieldAudit, KnowledgeField, ResearchMethod, UnknownField,
};
use super::{retag, staled};
use serde::{Deserialize, Serialize};

/// Stormwater management obligations. The plan-required flag gates the
/// envelope: without it we cannot say whether detention eats into the parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormwaterBundle {
    pub management_plan_required: KnowledgeField<bool>,
    pub detention_pct_of_gross: KnowledgeField<f64>,
}

pub fn compile_stormwater(card: Option<&JurisdictionCard>, card_stale: bool) -> StormwaterBundle {
    let Some(card) = card else {
        return StormwaterBundle {
            management_plan_required: KnowledgeField::unknown(
                Criticality::RequiredForEnvelope,
                AuthorityScope::SpecialDistrict,
            ),
            detention_pct_of_gross: KnowledgeField::unknown(
                Criticality::Informational,
                AuthorityScope::SpecialDistrict,
            ),
        };
    };

    let section = &card.stormwater;

    StormwaterBundle {
        management_plan_required: staled(
            retag(
                section.management_plan_required.clone(),
                Criticality::RequiredForEnvelope,
            ),
            card_stale,
        ),
        detention_pct_of_gross: staled(
            sanitize_pct(retag(
                section.detention_pct_of_gross.clone(),
                Criticality::Informational,
            )),
            card_stale,
        ),
    }
}

fn sanitize_pct(field: KnowledgeField<f64>) -> KnowledgeField<f64> {
    match field.current_value() {
        Some(value) if *value < 0.0 || *value > 0.5 => {
            KnowledgeField::blocked(field.criticality, field.authority_scope)
        }
        _ => field,
    }
}

impl StormwaterBundle {
    pub fn audits(&self) -> Vec<FieldAudit> {
        vec![
            self.management_plan_required
                .audit("stormwater_plan_required"),
            self.detention_pct_of_gross.audit("detention_pct_of_gross"),
        ]
    }

    pub fn unknowns(&self) -> Vec<UnknownField> {
        let mut unknowns = Vec::new();
        if self.management_plan_required.is_effectively_unknown() {
            unknowns.push(UnknownField {
                field: "stormwater_plan_required".to_string(),
                research_method: ResearchMethod::JurisdictionStaffCall,
                blocks_calculation: true,
            });
        }
        if self.detention_pct_of_gross.is_effectively_unknown() {
            unknowns.push(UnknownField {
                field: "detention_pct_of_gross".to_string(),
                research_method: ResearchMethod::GisQuery,
                blocks_calculation: false,
            });
        }
        unknowns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_flag_blocks_when_missing() {
        let bundle = compile_stormwater(None, false);
        let blocking: Vec<_> = bundle
            .unknowns()
            .into_iter()
            .filter(|unknown| unknown.blocks_calculation)
            .map(|unknown| unknown.field)
            .collect();
        assert_eq!(blocking, vec!["stormwater_plan_required"]);
    }
}
