use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use siteline::error::AppError;
use siteline::workflows::market::{RentCompBook, RentCompImportError};
use siteline::workflows::underwriting::{
    AssetClass, AuthorityScope, BondingSection, CardStore, CardStoreError, Criticality,
    DecisionVault, FieldSource, FireAccessSection, GradingSection, JurisdictionCard,
    JurisdictionKey, KnowledgeField, RecordId, SectionConfidence, SectionProvenance,
    SitePlanSection, StormwaterSection, UnderwritingConfig, UnderwritingReport,
    UnderwritingService, UsePermission, VaultError, ZoningSection,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) type ApiUnderwritingService =
    UnderwritingService<InMemoryCardStore, RentCompBook, InMemoryDecisionVault>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Card cache seeded with demo jurisdictions so the service is usable out of
/// the box: one fully researched card and one with unresolved setbacks.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCardStore {
    cards: Arc<Mutex<HashMap<(String, AssetClass), JurisdictionCard>>>,
}

impl InMemoryCardStore {
    pub(crate) fn seeded() -> Self {
        let store = Self::default();
        store.insert(downtown_card());
        store.insert(suburb_card_with_unknown_setbacks());
        store
    }

    pub(crate) fn insert(&self, card: JurisdictionCard) {
        let mut guard = self.cards.lock().expect("card mutex poisoned");
        guard.insert((card.key.zip.clone(), card.asset_class), card);
    }
}

impl CardStore for InMemoryCardStore {
    fn get_card(
        &self,
        key: &JurisdictionKey,
        asset_class: AssetClass,
    ) -> Result<Option<JurisdictionCard>, CardStoreError> {
        let guard = self.cards.lock().expect("card mutex poisoned");
        Ok(guard.get(&(key.zip.clone(), asset_class)).cloned())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryDecisionVault {
    records: Mutex<HashMap<String, UnderwritingReport>>,
    sequence: AtomicU64,
}

impl DecisionVault for InMemoryDecisionVault {
    fn save_record(&self, report: &UnderwritingReport) -> Result<RecordId, VaultError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let record_id = RecordId(format!("uw-{id:06}"));
        let mut stored = report.clone();
        stored.record_id = Some(record_id.clone());
        self.records
            .lock()
            .map_err(|_| VaultError::Unavailable("vault mutex poisoned".to_string()))?
            .insert(record_id.0.clone(), stored);
        Ok(record_id)
    }

    fn fetch_record(&self, id: &RecordId) -> Result<Option<UnderwritingReport>, VaultError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| VaultError::Unavailable("vault mutex poisoned".to_string()))?;
        Ok(guard.get(&id.0).cloned())
    }
}

/// Rent comps bundled for demos; production deployments point `--rent-csv`
/// at a current comp-survey export.
const DEMO_RENT_CSV: &str = "\
Zip,Avg Rent Per Sqft Month,Sample Size,As Of
50309,1.45,14,2026-06-01
50266,1.28,9,2026-06-01
50023,1.05,4,2026-05-15
52240,0.92,2,2026-04-01
";

pub(crate) fn rent_book(path: Option<PathBuf>) -> Result<RentCompBook, RentCompImportError> {
    match path {
        Some(path) => RentCompBook::from_path(path),
        None => RentCompBook::from_reader(std::io::Cursor::new(DEMO_RENT_CSV)),
    }
}

pub(crate) fn build_service(
    rent_csv: Option<PathBuf>,
) -> Result<Arc<ApiUnderwritingService>, AppError> {
    let cards = Arc::new(InMemoryCardStore::seeded());
    let book = Arc::new(rent_book(rent_csv)?);
    let vault = Arc::new(InMemoryDecisionVault::default());
    let service = UnderwritingService::new(cards, book, vault, UnderwritingConfig::default())?;
    Ok(Arc::new(service))
}

fn ordinance(citation: &str) -> FieldSource {
    FieldSource::Ordinance {
        citation: citation.to_string(),
    }
}

fn verified_provenance(note: &str) -> SectionProvenance {
    SectionProvenance {
        confidence: SectionConfidence::Verified,
        source_note: note.to_string(),
        verified_at: Some(Utc::now() - Duration::days(21)),
    }
}

fn downtown_card() -> JurisdictionCard {
    let verified = Some(Utc::now() - Duration::days(21));
    JurisdictionCard {
        key: JurisdictionKey {
            state: "IA".to_string(),
            county: "Polk".to_string(),
            zip: "50309".to_string(),
        },
        asset_class: AssetClass::SingleStorySelfStorage,
        zoning: ZoningSection {
            front_setback_ft: KnowledgeField::known(
                30.0,
                Criticality::RequiredForEnvelope,
                ordinance("Des Moines Code Sec. 134-1273"),
                AuthorityScope::Municipal,
                verified,
            ),
            side_setback_ft: KnowledgeField::known(
                15.0,
                Criticality::RequiredForEnvelope,
                ordinance("Des Moines Code Sec. 134-1273"),
                AuthorityScope::Municipal,
                verified,
            ),
            rear_setback_ft: KnowledgeField::known(
                20.0,
                Criticality::RequiredForEnvelope,
                ordinance("Des Moines Code Sec. 134-1273"),
                AuthorityScope::Municipal,
                verified,
            ),
            max_lot_coverage: KnowledgeField::known(
                0.45,
                Criticality::RequiredForApproval,
                ordinance("Des Moines Code Sec. 134-1280"),
                AuthorityScope::Municipal,
                verified,
            ),
            max_stories: KnowledgeField::known(
                1u8,
                Criticality::RequiredForApproval,
                ordinance("Des Moines Code Sec. 134-1280"),
                AuthorityScope::Municipal,
                verified,
            ),
            storage_use: KnowledgeField::known(
                UsePermission::Permitted,
                Criticality::RequiredForApproval,
                FieldSource::StaffConfirmation,
                AuthorityScope::Municipal,
                verified,
            ),
            provenance: verified_provenance("planning staff review"),
        },
        site_plan: SitePlanSection {
            site_plan_required: KnowledgeField::known(
                true,
                Criticality::RequiredForApproval,
                ordinance("Des Moines Code Sec. 82-212"),
                AuthorityScope::Municipal,
                verified,
            ),
            landscape_buffer_pct: KnowledgeField::known(
                0.04,
                Criticality::Informational,
                ordinance("Des Moines Code Sec. 42-96"),
                AuthorityScope::Municipal,
                verified,
            ),
            parking_area_pct: KnowledgeField::known(
                0.02,
                Criticality::Informational,
                ordinance("Des Moines Code Sec. 134-1300"),
                AuthorityScope::Municipal,
                verified,
            ),
            review_timeline_days: KnowledgeField::known(
                90u32,
                Criticality::Informational,
                FieldSource::StaffConfirmation,
                AuthorityScope::Municipal,
                verified,
            ),
            provenance: verified_provenance("planning staff review"),
        },
        stormwater: StormwaterSection {
            management_plan_required: KnowledgeField::known(
                true,
                Criticality::RequiredForEnvelope,
                ordinance("Des Moines Code Ch. 106"),
                AuthorityScope::SpecialDistrict,
                verified,
            ),
            detention_pct_of_gross: KnowledgeField::known(
                0.12,
                Criticality::Informational,
                FieldSource::SiteSurvey,
                AuthorityScope::SpecialDistrict,
                verified,
            ),
            provenance: verified_provenance("watershed district standards"),
        },
        fire_access: FireAccessSection {
            fire_lane_required: KnowledgeField::known(
                true,
                Criticality::RequiredForEnvelope,
                FieldSource::StaffConfirmation,
                AuthorityScope::SpecialDistrict,
                verified,
            ),
            lane_width_ft: KnowledgeField::known(
                26.0,
                Criticality::Informational,
                ordinance("IFC Appendix D"),
                AuthorityScope::SpecialDistrict,
                verified,
            ),
            hydrant_spacing_ft: KnowledgeField::known(
                400.0,
                Criticality::Informational,
                ordinance("IFC Appendix C"),
                AuthorityScope::SpecialDistrict,
                verified,
            ),
            provenance: verified_provenance("fire marshal plan review notes"),
        },
        grading: GradingSection {
            grading_permit_required: KnowledgeField::known(
                true,
                Criticality::Informational,
                ordinance("Polk County grading ordinance"),
                AuthorityScope::County,
                verified,
            ),
            max_slope_pct: KnowledgeField::known(
                8.0,
                Criticality::Informational,
                FieldSource::SiteSurvey,
                AuthorityScope::County,
                verified,
            ),
            provenance: verified_provenance("county engineer checklist"),
        },
        bonding: BondingSection {
            improvement_bond_required: KnowledgeField::known(
                false,
                Criticality::Informational,
                FieldSource::StaffConfirmation,
                AuthorityScope::County,
                verified,
            ),
            bond_per_acre: KnowledgeField::known(
                0.0,
                Criticality::Informational,
                FieldSource::StaffConfirmation,
                AuthorityScope::County,
                verified,
            ),
            provenance: verified_provenance("county engineer checklist"),
        },
        fetched_at: Utc::now() - Duration::days(10),
    }
}

fn suburb_card_with_unknown_setbacks() -> JurisdictionCard {
    let mut card = downtown_card();
    card.key = JurisdictionKey {
        state: "IA".to_string(),
        county: "Dallas".to_string(),
        zip: "50266".to_string(),
    };
    card.zoning.front_setback_ft =
        KnowledgeField::unknown(Criticality::RequiredForEnvelope, AuthorityScope::Municipal);
    card.zoning.side_setback_ft =
        KnowledgeField::unknown(Criticality::RequiredForEnvelope, AuthorityScope::Municipal);
    card.zoning.rear_setback_ft =
        KnowledgeField::unknown(Criticality::RequiredForEnvelope, AuthorityScope::Municipal);
    card.zoning.provenance = SectionProvenance {
        confidence: SectionConfidence::Inferred,
        source_note: "ordinance rewrite in progress; setbacks pending staff call".to_string(),
        verified_at: None,
    };
    card
}
