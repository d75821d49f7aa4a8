//! Doctrine scenarios pinned against the public feasibility and verdict
//! APIs. These mirror the underwriting desk's reference cases.

use siteline::workflows::underwriting::{
    Decision, DimensionScores, DoctrineThresholds, FeasibilityEngine, FeasibilityInput,
    FinancingAssumptions, FlawCode, VerdictAggregator, VerdictWeights, WarningCode,
};

fn engine() -> FeasibilityEngine {
    FeasibilityEngine::new(
        FinancingAssumptions::default(),
        DoctrineThresholds::default(),
    )
}

#[test]
fn five_acres_at_strong_rent_clears_doctrine() {
    let result = engine().evaluate(&FeasibilityInput {
        acreage: 5.0,
        rent_per_sqft_month: Some(1.50),
        density_sqft_per_acre: 25_000.0,
    });

    assert!((result.gross_monthly_revenue - 187_500.0).abs() < 1e-6);
    assert!(result.noi_per_acre_month >= 5_000.0);
    assert!(result.pass_fail);
    assert!(result.fatal_flaws.is_empty());
}

#[test]
fn two_acres_at_quarter_rent_fails_doctrine() {
    let result = engine().evaluate(&FeasibilityInput {
        acreage: 2.0,
        rent_per_sqft_month: Some(0.25),
        density_sqft_per_acre: 25_000.0,
    });

    assert!(result.noi_per_acre_month < 5_000.0);
    assert!((result.noi_per_acre_month - 3_748.5).abs() < 1.0);
    assert!(!result.pass_fail);
    assert!(result
        .fatal_flaws
        .iter()
        .any(|flaw| flaw.code == FlawCode::NoiBelowDoctrine));
}

#[test]
fn stress_floor_is_three_quarters_of_the_base_floor() {
    let doctrine = DoctrineThresholds::default();
    assert!(
        (doctrine.min_stressed_noi_per_acre_month - 0.75 * doctrine.min_noi_per_acre_month).abs()
            < f64::EPSILON
    );
}

#[test]
fn dscr_shortfall_is_never_fatal() {
    let heavy_build = FinancingAssumptions {
        hard_cost_per_sqft: 200.0,
        ..FinancingAssumptions::default()
    };
    let result = FeasibilityEngine::new(heavy_build, DoctrineThresholds::default()).evaluate(
        &FeasibilityInput {
            acreage: 5.0,
            rent_per_sqft_month: Some(1.50),
            density_sqft_per_acre: 25_000.0,
        },
    );

    assert!(result.dscr < 1.25);
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.code == WarningCode::DscrBelowTarget));
    assert!(result.fatal_flaws.is_empty());
}

#[test]
fn score_eighty_proceeds_unless_a_fatal_flaw_is_present() {
    let aggregator = VerdictAggregator::new(VerdictWeights::default()).expect("weights valid");
    let scores = DimensionScores {
        feasibility: Some(80.0),
        demand: 80.0,
        zoning: 80.0,
        permits: 80.0,
        civil: 80.0,
    };

    let clean = aggregator.decide(&scores, Vec::new(), 0.9);
    assert!((clean.score - 80.0).abs() < 1e-9);
    assert_eq!(clean.decision, Decision::Proceed);

    let flawed = aggregator.decide(
        &scores,
        vec!["noi_below_doctrine: NOI below floor".to_string()],
        0.9,
    );
    assert!((flawed.score - 80.0).abs() < 1e-9);
    assert_eq!(flawed.decision, Decision::Walk);
}

#[test]
fn evaluation_is_deterministic_across_runs() {
    let input = FeasibilityInput {
        acreage: 11.25,
        rent_per_sqft_month: Some(0.97),
        density_sqft_per_acre: 21_750.0,
    };
    let first = serde_json::to_value(engine().evaluate(&input)).expect("serializes");
    let second = serde_json::to_value(engine().evaluate(&input)).expect("serializes");
    assert_eq!(first, second);
}
