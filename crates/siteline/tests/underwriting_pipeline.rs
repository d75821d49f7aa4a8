//! End-to-end specifications for the underwriting pipeline and its HTTP
//! surface: compile constraints, reduce the envelope, price feasibility,
//! aggregate the verdict, persist, all through the public service facade.

mod common {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};

    use siteline::workflows::market::{
        BenchmarkConfidence, MarketDataError, RentBenchmark, RentBenchmarkProvider,
    };
    use siteline::workflows::underwriting::{
        AssetClass, AuthorityScope, BondingSection, CardStore, CardStoreError, Criticality,
        DecisionVault, FieldSource, FireAccessSection, GradingSection, JurisdictionCard,
        JurisdictionKey, KnowledgeField, RecordId, SectionConfidence, SectionProvenance,
        SitePlanSection, StormwaterSection, UnderwritingConfig, UnderwritingReport,
        UnderwritingRequest, UnderwritingService, UsePermission, VaultError, ZoningSection,
    };

    pub(super) fn known<T>(value: T, criticality: Criticality) -> KnowledgeField<T> {
        KnowledgeField::known(
            value,
            criticality,
            FieldSource::Ordinance {
                citation: "Sec. 134-1273".to_string(),
            },
            AuthorityScope::Municipal,
            None,
        )
    }

    fn provenance() -> SectionProvenance {
        SectionProvenance {
            confidence: SectionConfidence::Verified,
            source_note: "planning staff review 2026-06".to_string(),
            verified_at: None,
        }
    }

    pub(super) fn jurisdiction_key() -> JurisdictionKey {
        JurisdictionKey {
            state: "IA".to_string(),
            county: "Polk".to_string(),
            zip: "50309".to_string(),
        }
    }

    pub(super) fn complete_card() -> JurisdictionCard {
        JurisdictionCard {
            key: jurisdiction_key(),
            asset_class: AssetClass::SingleStorySelfStorage,
            zoning: ZoningSection {
                front_setback_ft: known(30.0, Criticality::RequiredForEnvelope),
                side_setback_ft: known(15.0, Criticality::RequiredForEnvelope),
                rear_setback_ft: known(20.0, Criticality::RequiredForEnvelope),
                max_lot_coverage: known(0.45, Criticality::RequiredForApproval),
                max_stories: known(1u8, Criticality::RequiredForApproval),
                storage_use: known(UsePermission::Permitted, Criticality::RequiredForApproval),
                provenance: provenance(),
            },
            site_plan: SitePlanSection {
                site_plan_required: known(true, Criticality::RequiredForApproval),
                landscape_buffer_pct: known(0.04, Criticality::Informational),
                parking_area_pct: known(0.02, Criticality::Informational),
                review_timeline_days: known(90u32, Criticality::Informational),
                provenance: provenance(),
            },
            stormwater: StormwaterSection {
                management_plan_required: known(true, Criticality::RequiredForEnvelope),
                detention_pct_of_gross: known(0.12, Criticality::Informational),
                provenance: provenance(),
            },
            fire_access: FireAccessSection {
                fire_lane_required: known(true, Criticality::RequiredForEnvelope),
                lane_width_ft: known(26.0, Criticality::Informational),
                hydrant_spacing_ft: known(400.0, Criticality::Informational),
                provenance: provenance(),
            },
            grading: GradingSection {
                grading_permit_required: known(true, Criticality::Informational),
                max_slope_pct: known(8.0, Criticality::Informational),
                provenance: provenance(),
            },
            bonding: BondingSection {
                improvement_bond_required: known(false, Criticality::Informational),
                bond_per_acre: known(0.0, Criticality::Informational),
                provenance: provenance(),
            },
            fetched_at: Utc::now() - Duration::days(10),
        }
    }

    pub(super) fn card_with_unknown_setbacks() -> JurisdictionCard {
        let mut card = complete_card();
        card.zoning.front_setback_ft = KnowledgeField::unknown(
            Criticality::RequiredForEnvelope,
            AuthorityScope::Municipal,
        );
        card.zoning.side_setback_ft = KnowledgeField::unknown(
            Criticality::RequiredForEnvelope,
            AuthorityScope::Municipal,
        );
        card.zoning.rear_setback_ft = KnowledgeField::unknown(
            Criticality::RequiredForEnvelope,
            AuthorityScope::Municipal,
        );
        card
    }

    pub(super) fn request() -> UnderwritingRequest {
        UnderwritingRequest {
            zip: "50309".to_string(),
            state: "IA".to_string(),
            county: "Polk".to_string(),
            asset_class: AssetClass::SingleStorySelfStorage,
            requested_acres: 5.0,
            coordinates: None,
        }
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryCardStore {
        cards: Arc<Mutex<HashMap<String, JurisdictionCard>>>,
    }

    impl MemoryCardStore {
        pub(super) fn with_card(card: JurisdictionCard) -> Arc<Self> {
            let store = Self::default();
            store
                .cards
                .lock()
                .expect("card mutex poisoned")
                .insert(card.key.zip.clone(), card);
            Arc::new(store)
        }

        pub(super) fn empty() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    impl CardStore for MemoryCardStore {
        fn get_card(
            &self,
            key: &JurisdictionKey,
            _asset_class: AssetClass,
        ) -> Result<Option<JurisdictionCard>, CardStoreError> {
            let guard = self.cards.lock().expect("card mutex poisoned");
            Ok(guard.get(&key.zip).cloned())
        }
    }

    pub(super) struct UnavailableCardStore;

    impl CardStore for UnavailableCardStore {
        fn get_card(
            &self,
            _key: &JurisdictionKey,
            _asset_class: AssetClass,
        ) -> Result<Option<JurisdictionCard>, CardStoreError> {
            Err(CardStoreError::Unavailable(
                "card database offline".to_string(),
            ))
        }
    }

    #[derive(Clone)]
    pub(super) struct FixedRentProvider {
        benchmark: Option<RentBenchmark>,
    }

    impl FixedRentProvider {
        pub(super) fn strong_market() -> Arc<Self> {
            Arc::new(Self {
                benchmark: Some(RentBenchmark {
                    avg_price_per_sqft_month: 1.45,
                    confidence: BenchmarkConfidence::High,
                    sample_size: 14,
                    as_of: None,
                }),
            })
        }

        pub(super) fn no_data() -> Arc<Self> {
            Arc::new(Self { benchmark: None })
        }
    }

    impl RentBenchmarkProvider for FixedRentProvider {
        fn rent_benchmark(&self, _zip: &str) -> Result<Option<RentBenchmark>, MarketDataError> {
            Ok(self.benchmark.clone())
        }
    }

    #[derive(Default)]
    pub(super) struct MemoryVault {
        records: Mutex<HashMap<String, UnderwritingReport>>,
        sequence: AtomicU64,
    }

    impl MemoryVault {
        pub(super) fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(super) fn len(&self) -> usize {
            self.records.lock().expect("vault mutex poisoned").len()
        }
    }

    impl DecisionVault for MemoryVault {
        fn save_record(&self, report: &UnderwritingReport) -> Result<RecordId, VaultError> {
            let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let record_id = RecordId(format!("uw-{id:06}"));
            let mut stored = report.clone();
            stored.record_id = Some(record_id.clone());
            self.records
                .lock()
                .expect("vault mutex poisoned")
                .insert(record_id.0.clone(), stored);
            Ok(record_id)
        }

        fn fetch_record(&self, id: &RecordId) -> Result<Option<UnderwritingReport>, VaultError> {
            let guard = self.records.lock().expect("vault mutex poisoned");
            Ok(guard.get(&id.0).cloned())
        }
    }

    pub(super) struct OfflineVault;

    impl DecisionVault for OfflineVault {
        fn save_record(&self, _report: &UnderwritingReport) -> Result<RecordId, VaultError> {
            Err(VaultError::Unavailable("write timed out".to_string()))
        }

        fn fetch_record(&self, _id: &RecordId) -> Result<Option<UnderwritingReport>, VaultError> {
            Err(VaultError::Unavailable("read timed out".to_string()))
        }
    }

    pub(super) fn build_service(
        cards: Arc<MemoryCardStore>,
        market: Arc<FixedRentProvider>,
        vault: Arc<MemoryVault>,
    ) -> UnderwritingService<MemoryCardStore, FixedRentProvider, MemoryVault> {
        UnderwritingService::new(cards, market, vault, UnderwritingConfig::default())
            .expect("default weights valid")
    }
}

mod pipeline {
    use super::common::*;
    use siteline::workflows::underwriting::{
        CompletionStatus, Decision, FlawCode, UnderwritingConfig, UnderwritingService,
    };

    #[test]
    fn complete_card_produces_a_proceed_verdict() {
        let vault = MemoryVault::shared();
        let service = build_service(
            MemoryCardStore::with_card(complete_card()),
            FixedRentProvider::strong_market(),
            vault.clone(),
        );

        let report = service.underwrite(request());

        assert_eq!(report.completion, CompletionStatus::Complete);
        assert!(report.card.available);
        assert!(!report.card.stale);
        assert!(report.envelope.valid);
        assert!(report.envelope.net_buildable_acres.is_some());

        let feasibility = report.feasibility.as_ref().expect("feasibility computed");
        assert!(feasibility.pass_fail);
        assert!(feasibility.noi_per_acre_month >= 5_000.0);

        assert_eq!(report.verdict.decision, Decision::Proceed);
        assert!(report.verdict.score >= 75.0);
        assert!(report.verdict.fatal_flaws.is_empty());
        assert!(report.errors.is_empty());

        let record_id = report.record_id.as_ref().expect("record persisted");
        assert_eq!(vault.len(), 1);
        let stored = service
            .fetch_record(record_id)
            .expect("vault readable")
            .expect("record present");
        assert_eq!(stored.verdict.decision, Decision::Proceed);
    }

    #[test]
    fn unknown_setbacks_refuse_the_envelope_and_cap_the_verdict() {
        let service = build_service(
            MemoryCardStore::with_card(card_with_unknown_setbacks()),
            FixedRentProvider::strong_market(),
            MemoryVault::shared(),
        );

        let report = service.underwrite(request());

        assert!(!report.envelope.valid);
        assert_eq!(report.envelope.net_buildable_acres, None);
        assert_eq!(report.envelope.max_buildable_sqft, None);
        assert_eq!(
            report.envelope.missing_constraints,
            vec!["front_setback_ft", "side_setback_ft", "rear_setback_ft"]
        );
        assert!(report.feasibility.is_none());
        assert_eq!(report.completion, CompletionStatus::Partial);

        // Strong auxiliary scores cannot push an unresolved envelope past
        // Evaluate.
        assert_eq!(report.verdict.decision, Decision::Evaluate);

        let blocking: Vec<_> = report
            .unknowns
            .iter()
            .filter(|unknown| unknown.blocks_calculation)
            .map(|unknown| unknown.field.as_str())
            .collect();
        assert_eq!(
            blocking,
            vec!["front_setback_ft", "side_setback_ft", "rear_setback_ft"]
        );
        assert!(report
            .failures
            .iter()
            .any(|event| event.failure_type == "missing_required_constraints"));
    }

    #[test]
    fn identical_requests_produce_identical_numbers() {
        let service = build_service(
            MemoryCardStore::with_card(complete_card()),
            FixedRentProvider::strong_market(),
            MemoryVault::shared(),
        );

        let first = service.underwrite(request());
        let second = service.underwrite(request());

        let first_json = serde_json::to_value(&first).expect("serializes");
        let second_json = serde_json::to_value(&second).expect("serializes");
        for section in ["envelope", "feasibility", "verdict", "unknowns", "assumptions"] {
            assert_eq!(
                first_json.get(section),
                second_json.get(section),
                "section {section} differed between runs"
            );
        }
    }

    #[test]
    fn prohibited_use_forces_walk_despite_strong_economics() {
        let mut card = complete_card();
        card.zoning.storage_use = known(
            siteline::workflows::underwriting::UsePermission::Prohibited,
            siteline::workflows::underwriting::Criticality::RequiredForApproval,
        );
        let service = build_service(
            MemoryCardStore::with_card(card),
            FixedRentProvider::strong_market(),
            MemoryVault::shared(),
        );

        let report = service.underwrite(request());

        let feasibility = report.feasibility.as_ref().expect("feasibility computed");
        assert!(feasibility.pass_fail);
        assert_eq!(report.verdict.decision, Decision::Walk);
        assert!(report
            .verdict
            .fatal_flaws
            .iter()
            .any(|flaw| flaw.contains(FlawCode::UseProhibited.as_str())));
    }

    #[test]
    fn missing_card_degrades_to_a_partial_report() {
        let service = build_service(
            MemoryCardStore::empty(),
            FixedRentProvider::strong_market(),
            MemoryVault::shared(),
        );

        let report = service.underwrite(request());

        assert!(!report.card.available);
        assert!(!report.envelope.valid);
        assert!(report.feasibility.is_none());
        assert_eq!(report.completion, CompletionStatus::Partial);
        assert!(report
            .failures
            .iter()
            .any(|event| event.failure_type == "card_missing"));
    }

    #[test]
    fn card_store_outage_fails_the_run_but_still_reports() {
        let service = UnderwritingService::new(
            std::sync::Arc::new(UnavailableCardStore),
            FixedRentProvider::strong_market(),
            MemoryVault::shared(),
            UnderwritingConfig::default(),
        )
        .expect("default weights valid");

        let report = service.underwrite(request());

        assert_eq!(report.completion, CompletionStatus::Failed);
        assert!(!report.card.available);
        assert!(report
            .errors
            .iter()
            .any(|error| error.message.contains("offline")));
        assert!(report
            .failures
            .iter()
            .any(|event| event.failure_type == "card_store_unavailable"));
    }

    #[test]
    fn missing_rent_benchmark_defaults_with_warnings() {
        let service = build_service(
            MemoryCardStore::with_card(complete_card()),
            FixedRentProvider::no_data(),
            MemoryVault::shared(),
        );

        let report = service.underwrite(request());
        let feasibility = report.feasibility.as_ref().expect("feasibility computed");

        assert!((feasibility.rent_used_per_sqft_month - 1.10).abs() < 1e-9);
        let codes: Vec<_> = feasibility
            .warnings
            .iter()
            .map(|warning| warning.code)
            .collect();
        assert!(codes.contains(&siteline::workflows::underwriting::WarningCode::MissingRentData));
        assert!(
            codes.contains(&siteline::workflows::underwriting::WarningCode::EstimatedValuesUsed)
        );
    }

    #[test]
    fn vault_outage_never_loses_the_report() {
        let service = UnderwritingService::new(
            MemoryCardStore::with_card(complete_card()),
            FixedRentProvider::strong_market(),
            std::sync::Arc::new(OfflineVault),
            UnderwritingConfig::default(),
        )
        .expect("default weights valid");

        let report = service.underwrite(request());

        assert_eq!(report.record_id, None);
        assert_eq!(report.verdict.decision, Decision::Proceed);
        assert!(report
            .failures
            .iter()
            .any(|event| event.failure_type == "vault_write_failed"));
        assert!(report.errors.iter().any(|error| {
            error.stage == siteline::workflows::underwriting::PipelineStage::Persistence
        }));
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use siteline::workflows::underwriting::underwriting_router;
    use tower::ServiceExt;

    fn build_router() -> (
        axum::Router,
        Arc<MemoryVault>,
    ) {
        let vault = MemoryVault::shared();
        let service = Arc::new(build_service(
            MemoryCardStore::with_card(complete_card()),
            FixedRentProvider::strong_market(),
            vault.clone(),
        ));
        (underwriting_router(service), vault)
    }

    #[tokio::test]
    async fn post_evaluation_returns_the_full_decision_object() {
        let (router, vault) = build_router();

        let body = serde_json::to_vec(&request()).expect("serialize request");
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/underwriting/evaluations")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(
            payload
                .pointer("/verdict/decision")
                .and_then(Value::as_str),
            Some("proceed")
        );
        assert_eq!(
            payload.pointer("/completion").and_then(Value::as_str),
            Some("complete")
        );
        assert!(payload.pointer("/envelope/net_buildable_acres").is_some());
        assert!(payload.pointer("/record_id").is_some());
        assert_eq!(vault.len(), 1);
    }

    #[tokio::test]
    async fn get_evaluation_round_trips_the_stored_record() {
        let (router, _vault) = build_router();

        let body = serde_json::to_vec(&request()).expect("serialize request");
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/underwriting/evaluations")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        let record_id = payload
            .pointer("/record_id")
            .and_then(Value::as_str)
            .expect("record id present")
            .to_string();

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/underwriting/evaluations/{record_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let stored: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(
            stored.pointer("/record_id").and_then(Value::as_str),
            Some(record_id.as_str())
        );
        assert_eq!(
            stored.pointer("/verdict/decision").and_then(Value::as_str),
            Some("proceed")
        );
    }

    #[tokio::test]
    async fn get_unknown_record_returns_not_found() {
        let (router, _vault) = build_router();

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/underwriting/evaluations/uw-999999")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert!(payload.get("error").is_some());
    }
}
