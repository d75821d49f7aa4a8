use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a regulatory or geometric fact is confirmed, never researched, or
/// researched but undeterminable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnowledgeState {
    Known,
    Unknown,
    Blocked,
}

impl KnowledgeState {
    pub const fn label(self) -> &'static str {
        match self {
            KnowledgeState::Known => "known",
            KnowledgeState::Unknown => "unknown",
            KnowledgeState::Blocked => "blocked",
        }
    }
}

/// How essential a fact is to downstream computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criticality {
    RequiredForEnvelope,
    RequiredForApproval,
    Informational,
}

/// Regulatory body a constraint originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityScope {
    Municipal,
    County,
    State,
    SpecialDistrict,
}

/// Where a field's value came from, for audit trails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSource {
    Ordinance { citation: String },
    StaffConfirmation,
    CachedCard,
    SiteSurvey,
    MarketBenchmark,
    DefaultAssumption,
}

/// Typed wrapper for a single regulatory or geometric fact.
///
/// The value slot is private: it is populated only by the `known` constructor,
/// so a field can never claim `Known` without carrying a value, and consumers
/// can never read a value out of a stale or unresolved field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeField<T> {
    value: Option<T>,
    pub state: KnowledgeState,
    pub criticality: Criticality,
    pub source: FieldSource,
    pub authority_scope: AuthorityScope,
    pub verified_at: Option<DateTime<Utc>>,
    pub revalidation_required: bool,
}

impl<T> KnowledgeField<T> {
    pub fn known(
        value: T,
        criticality: Criticality,
        source: FieldSource,
        authority_scope: AuthorityScope,
        verified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            value: Some(value),
            state: KnowledgeState::Known,
            criticality,
            source,
            authority_scope,
            verified_at,
            revalidation_required: false,
        }
    }

    pub fn unknown(criticality: Criticality, authority_scope: AuthorityScope) -> Self {
        Self {
            value: None,
            state: KnowledgeState::Unknown,
            criticality,
            source: FieldSource::CachedCard,
            authority_scope,
            verified_at: None,
            revalidation_required: false,
        }
    }

    pub fn blocked(criticality: Criticality, authority_scope: AuthorityScope) -> Self {
        Self {
            value: None,
            state: KnowledgeState::Blocked,
            criticality,
            source: FieldSource::CachedCard,
            authority_scope,
            verified_at: None,
            revalidation_required: false,
        }
    }

    /// Staleness guard: a field needing revalidation is treated exactly like
    /// an Unknown one, regardless of the value it still carries.
    pub fn is_effectively_unknown(&self) -> bool {
        match self.state {
            KnowledgeState::Unknown | KnowledgeState::Blocked => true,
            KnowledgeState::Known => self.revalidation_required,
        }
    }

    /// The confirmed value, if this field is effectively known.
    pub fn current_value(&self) -> Option<&T> {
        if self.is_effectively_unknown() {
            None
        } else {
            self.value.as_ref()
        }
    }

    /// Flag the field for revalidation (e.g. its jurisdiction card aged out).
    pub fn mark_stale(&mut self) {
        self.revalidation_required = true;
    }

    /// Type-erased snapshot used by the envelope guardrail.
    pub fn audit(&self, name: &'static str) -> FieldAudit {
        FieldAudit {
            name,
            criticality: self.criticality,
            state: self.state,
            stale: self.state == KnowledgeState::Known && self.revalidation_required,
        }
    }
}

/// Erased view of one field, enough for requirement checks without the value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldAudit {
    pub name: &'static str,
    pub criticality: Criticality,
    pub state: KnowledgeState,
    pub stale: bool,
}

/// Outcome of inspecting the `RequiredForEnvelope` fields before reduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeReadiness {
    pub can_calculate: bool,
    pub missing_required_fields: Vec<&'static str>,
    pub stale_fields: Vec<&'static str>,
    pub block_reason: Option<String>,
}

/// Inspect only fields tagged `RequiredForEnvelope`; any missing or stale one
/// blocks calculation entirely. There is no concept of "mostly known".
pub fn check_envelope_requirements(audits: &[FieldAudit]) -> EnvelopeReadiness {
    let mut missing_required_fields = Vec::new();
    let mut stale_fields = Vec::new();

    for audit in audits {
        if audit.criticality != Criticality::RequiredForEnvelope {
            continue;
        }
        match audit.state {
            KnowledgeState::Unknown | KnowledgeState::Blocked => {
                missing_required_fields.push(audit.name);
            }
            KnowledgeState::Known if audit.stale => stale_fields.push(audit.name),
            KnowledgeState::Known => {}
        }
    }

    let can_calculate = missing_required_fields.is_empty() && stale_fields.is_empty();
    let block_reason = if can_calculate {
        None
    } else {
        Some(format!(
            "{} required constraint(s) unresolved, {} stale",
            missing_required_fields.len(),
            stale_fields.len()
        ))
    };

    EnvelopeReadiness {
        can_calculate,
        missing_required_fields,
        stale_fields,
        block_reason,
    }
}

/// How an unresolved fact would be researched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchMethod {
    OrdinanceLookup,
    JurisdictionStaffCall,
    SiteSurvey,
    GisQuery,
    MarketStudy,
}

impl ResearchMethod {
    pub const fn label(self) -> &'static str {
        match self {
            ResearchMethod::OrdinanceLookup => "ordinance lookup",
            ResearchMethod::JurisdictionStaffCall => "jurisdiction staff call",
            ResearchMethod::SiteSurvey => "site survey",
            ResearchMethod::GisQuery => "GIS query",
            ResearchMethod::MarketStudy => "market study",
        }
    }
}

/// Absence of information, distinct from a negative finding: names the field,
/// how it would be researched, and whether it blocks a downstream stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownField {
    pub field: String,
    pub research_method: ResearchMethod,
    pub blocks_calculation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_field(value: f64, criticality: Criticality) -> KnowledgeField<f64> {
        KnowledgeField::known(
            value,
            criticality,
            FieldSource::Ordinance {
                citation: "Sec. 17-204".to_string(),
            },
            AuthorityScope::Municipal,
            None,
        )
    }

    #[test]
    fn known_field_exposes_value() {
        let field = known_field(25.0, Criticality::RequiredForEnvelope);
        assert!(!field.is_effectively_unknown());
        assert_eq!(field.current_value(), Some(&25.0));
    }

    #[test]
    fn stale_known_field_is_effectively_unknown() {
        let mut field = known_field(25.0, Criticality::RequiredForEnvelope);
        field.mark_stale();
        assert_eq!(field.state, KnowledgeState::Known);
        assert!(field.is_effectively_unknown());
        assert_eq!(field.current_value(), None);
    }

    #[test]
    fn blocked_field_never_exposes_value() {
        let field: KnowledgeField<f64> =
            KnowledgeField::blocked(Criticality::Informational, AuthorityScope::County);
        assert!(field.is_effectively_unknown());
        assert_eq!(field.current_value(), None);
    }

    #[test]
    fn guardrail_lists_every_missing_required_field() {
        let audits = vec![
            known_field(30.0, Criticality::RequiredForEnvelope).audit("front_setback_ft"),
            KnowledgeField::<f64>::unknown(
                Criticality::RequiredForEnvelope,
                AuthorityScope::Municipal,
            )
            .audit("side_setback_ft"),
            KnowledgeField::<f64>::blocked(
                Criticality::RequiredForEnvelope,
                AuthorityScope::Municipal,
            )
            .audit("rear_setback_ft"),
        ];

        let readiness = check_envelope_requirements(&audits);
        assert!(!readiness.can_calculate);
        assert_eq!(
            readiness.missing_required_fields,
            vec!["side_setback_ft", "rear_setback_ft"]
        );
        assert!(readiness.stale_fields.is_empty());
        assert!(readiness.block_reason.is_some());
    }

    #[test]
    fn guardrail_flags_stale_required_fields() {
        let mut setback = known_field(30.0, Criticality::RequiredForEnvelope);
        setback.mark_stale();
        let readiness = check_envelope_requirements(&[setback.audit("front_setback_ft")]);
        assert!(!readiness.can_calculate);
        assert_eq!(readiness.stale_fields, vec!["front_setback_ft"]);
    }

    #[test]
    fn non_required_unknowns_do_not_block() {
        let audits = vec![
            known_field(30.0, Criticality::RequiredForEnvelope).audit("front_setback_ft"),
            KnowledgeField::<f64>::unknown(Criticality::Informational, AuthorityScope::County)
                .audit("hydrant_spacing_ft"),
            KnowledgeField::<f64>::unknown(
                Criticality::RequiredForApproval,
                AuthorityScope::Municipal,
            )
            .audit("max_lot_coverage"),
        ];

        let readiness = check_envelope_requirements(&audits);
        assert!(readiness.can_calculate);
        assert!(readiness.block_reason.is_none());
    }
}
