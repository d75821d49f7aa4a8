use serde::{Deserialize, Serialize};

/// Underwriting constants applied to every deal. Defaults reflect current
/// house doctrine for ground-up storage development.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancingAssumptions {
    pub vacancy_rate: f64,
    pub collection_loss_rate: f64,
    pub opex_ratio: f64,
    pub hard_cost_per_sqft: f64,
    pub land_cost_per_acre: f64,
    pub ltv: f64,
    pub interest_rate: f64,
    pub amortization_years: u32,
    pub target_cap_rate: f64,
    pub default_rent_per_sqft_month: f64,
}

impl Default for FinancingAssumptions {
    fn default() -> Self {
        Self {
            vacancy_rate: 0.10,
            collection_loss_rate: 0.02,
            opex_ratio: 0.32,
            hard_cost_per_sqft: 65.0,
            land_cost_per_acre: 100_000.0,
            ltv: 0.75,
            interest_rate: 0.07,
            amortization_years: 25,
            target_cap_rate: 0.065,
            default_rent_per_sqft_month: 1.10,
        }
    }
}

/// Fixed doctrine floors. The stressed floor is kept as its own dial rather
/// than being derived from the base floor; the defaults satisfy
/// `min_stressed == stress_haircut * min_noi` and a test pins that down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoctrineThresholds {
    pub min_noi_per_acre_month: f64,
    pub min_stressed_noi_per_acre_month: f64,
    pub min_dscr: f64,
    pub stress_haircut: f64,
    pub min_yield_on_cost: f64,
}

impl Default for DoctrineThresholds {
    fn default() -> Self {
        Self {
            min_noi_per_acre_month: 5_000.0,
            min_stressed_noi_per_acre_month: 3_750.0,
            min_dscr: 1.25,
            stress_haircut: 0.75,
            min_yield_on_cost: 0.07,
        }
    }
}

/// Machine-readable fatal flaw codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlawCode {
    ZeroAcreage,
    NoiBelowDoctrine,
    StressedNoiFailure,
    UseProhibited,
}

impl FlawCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            FlawCode::ZeroAcreage => "zero_acreage",
            FlawCode::NoiBelowDoctrine => "noi_below_doctrine",
            FlawCode::StressedNoiFailure => "stressed_noi_failure",
            FlawCode::UseProhibited => "use_prohibited",
        }
    }
}

/// A condition that unconditionally blocks a positive outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalFlaw {
    pub code: FlawCode,
    pub message: String,
    pub threshold: Option<f64>,
    pub actual: Option<f64>,
}

impl FatalFlaw {
    pub fn summary(&self) -> String {
        format!("{}: {}", self.code.as_str(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningCode {
    DscrBelowTarget,
    MissingRentData,
    EstimatedValuesUsed,
    LowYieldOnCost,
    LowBenchmarkConfidence,
    StaleMarketData,
}

impl WarningCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            WarningCode::DscrBelowTarget => "dscr_below_target",
            WarningCode::MissingRentData => "missing_rent_data",
            WarningCode::EstimatedValuesUsed => "estimated_values_used",
            WarningCode::LowYieldOnCost => "low_yield_on_cost",
            WarningCode::LowBenchmarkConfidence => "low_benchmark_confidence",
            WarningCode::StaleMarketData => "stale_market_data",
        }
    }
}

/// Advisory finding. Never blocks pass/fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub code: WarningCode,
    pub message: String,
    pub threshold: Option<f64>,
    pub actual: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityInput {
    pub acreage: f64,
    pub rent_per_sqft_month: Option<f64>,
    pub density_sqft_per_acre: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityResult {
    pub gross_monthly_revenue: f64,
    pub gross_annual_revenue: f64,
    pub effective_gross_income: f64,
    pub operating_expenses: f64,
    pub noi_annual: f64,
    pub noi_per_acre_month: f64,
    pub stressed_noi_per_acre_month: f64,
    pub total_development_cost: f64,
    pub loan_amount: f64,
    pub debt_service_annual: f64,
    pub dscr: f64,
    pub yield_on_cost: f64,
    pub implied_value: f64,
    pub rent_used_per_sqft_month: f64,
    pub pass_fail: bool,
    pub fatal_flaws: Vec<FatalFlaw>,
    pub warnings: Vec<Advisory>,
}

impl FeasibilityResult {
    fn zeroed(fatal_flaws: Vec<FatalFlaw>) -> Self {
        Self {
            gross_monthly_revenue: 0.0,
            gross_annual_revenue: 0.0,
            effective_gross_income: 0.0,
            operating_expenses: 0.0,
            noi_annual: 0.0,
            noi_per_acre_month: 0.0,
            stressed_noi_per_acre_month: 0.0,
            total_development_cost: 0.0,
            loan_amount: 0.0,
            debt_service_annual: 0.0,
            dscr: 0.0,
            yield_on_cost: 0.0,
            implied_value: 0.0,
            rent_used_per_sqft_month: 0.0,
            pass_fail: false,
            fatal_flaws,
            warnings: Vec::new(),
        }
    }
}

/// Deterministic pure function from envelope + market inputs to a financial
/// verdict component. No I/O, no clocks, no randomness.
#[derive(Debug, Clone, Default)]
pub struct FeasibilityEngine {
    assumptions: FinancingAssumptions,
    doctrine: DoctrineThresholds,
}

impl FeasibilityEngine {
    pub fn new(assumptions: FinancingAssumptions, doctrine: DoctrineThresholds) -> Self {
        Self {
            assumptions,
            doctrine,
        }
    }

    pub fn doctrine(&self) -> &DoctrineThresholds {
        &self.doctrine
    }

    pub fn assumptions(&self) -> &FinancingAssumptions {
        &self.assumptions
    }

    pub fn evaluate(&self, input: &FeasibilityInput) -> FeasibilityResult {
        if input.acreage <= 0.0 {
            return FeasibilityResult::zeroed(vec![FatalFlaw {
                code: FlawCode::ZeroAcreage,
                message: format!("acreage {} is not developable", input.acreage),
                threshold: Some(0.0),
                actual: Some(input.acreage),
            }]);
        }

        let mut warnings = Vec::new();
        let rent = match input.rent_per_sqft_month {
            Some(rent) => rent,
            None => {
                let default_rent = self.assumptions.default_rent_per_sqft_month;
                warnings.push(Advisory {
                    code: WarningCode::MissingRentData,
                    message: "no market rent benchmark for this zip".to_string(),
                    threshold: None,
                    actual: None,
                });
                warnings.push(Advisory {
                    code: WarningCode::EstimatedValuesUsed,
                    message: format!("defaulted rent to ${default_rent:.2}/sqft/month"),
                    threshold: None,
                    actual: Some(default_rent),
                });
                default_rent
            }
        };

        let rentable_sqft = input.acreage * input.density_sqft_per_acre;
        let gross_monthly_revenue = rentable_sqft * rent;
        let gross_annual_revenue = gross_monthly_revenue * 12.0;
        let effective_gross_income = gross_annual_revenue
            * (1.0 - self.assumptions.vacancy_rate)
            * (1.0 - self.assumptions.collection_loss_rate);
        let operating_expenses = effective_gross_income * self.assumptions.opex_ratio;
        let noi_annual = effective_gross_income - operating_expenses;
        let noi_per_acre_month = noi_annual / input.acreage / 12.0;
        let stressed_noi_per_acre_month = noi_per_acre_month * self.doctrine.stress_haircut;

        let total_development_cost = rentable_sqft * self.assumptions.hard_cost_per_sqft
            + input.acreage * self.assumptions.land_cost_per_acre;
        let loan_amount = total_development_cost * self.assumptions.ltv;
        let debt_service_annual = annual_debt_service(
            loan_amount,
            self.assumptions.interest_rate,
            self.assumptions.amortization_years,
        );
        let dscr = if debt_service_annual > 0.0 {
            noi_annual / debt_service_annual
        } else {
            0.0
        };
        let yield_on_cost = if total_development_cost > 0.0 {
            noi_annual / total_development_cost
        } else {
            0.0
        };
        let implied_value = if self.assumptions.target_cap_rate > 0.0 {
            noi_annual / self.assumptions.target_cap_rate
        } else {
            0.0
        };

        let mut fatal_flaws = Vec::new();
        if noi_per_acre_month < self.doctrine.min_noi_per_acre_month {
            fatal_flaws.push(FatalFlaw {
                code: FlawCode::NoiBelowDoctrine,
                message: format!(
                    "NOI ${noi_per_acre_month:.0}/acre/month is below the ${:.0} doctrine floor",
                    self.doctrine.min_noi_per_acre_month
                ),
                threshold: Some(self.doctrine.min_noi_per_acre_month),
                actual: Some(noi_per_acre_month),
            });
        }
        if stressed_noi_per_acre_month < self.doctrine.min_stressed_noi_per_acre_month {
            fatal_flaws.push(FatalFlaw {
                code: FlawCode::StressedNoiFailure,
                message: format!(
                    "stressed NOI ${stressed_noi_per_acre_month:.0}/acre/month fails the ${:.0} floor",
                    self.doctrine.min_stressed_noi_per_acre_month
                ),
                threshold: Some(self.doctrine.min_stressed_noi_per_acre_month),
                actual: Some(stressed_noi_per_acre_month),
            });
        }

        // Thin coverage is an advisory for the debt desk, never a deal-killer.
        if dscr > 0.0 && dscr < self.doctrine.min_dscr {
            warnings.push(Advisory {
                code: WarningCode::DscrBelowTarget,
                message: format!(
                    "DSCR {dscr:.2} below the {:.2} target",
                    self.doctrine.min_dscr
                ),
                threshold: Some(self.doctrine.min_dscr),
                actual: Some(dscr),
            });
        }
        if yield_on_cost < self.doctrine.min_yield_on_cost {
            warnings.push(Advisory {
                code: WarningCode::LowYieldOnCost,
                message: format!(
                    "yield on cost {:.1}% below the {:.1}% target",
                    yield_on_cost * 100.0,
                    self.doctrine.min_yield_on_cost * 100.0
                ),
                threshold: Some(self.doctrine.min_yield_on_cost),
                actual: Some(yield_on_cost),
            });
        }

        let pass_fail = fatal_flaws.is_empty();

        FeasibilityResult {
            gross_monthly_revenue,
            gross_annual_revenue,
            effective_gross_income,
            operating_expenses,
            noi_annual,
            noi_per_acre_month,
            stressed_noi_per_acre_month,
            total_development_cost,
            loan_amount,
            debt_service_annual,
            dscr,
            yield_on_cost,
            implied_value,
            rent_used_per_sqft_month: rent,
            pass_fail,
            fatal_flaws,
            warnings,
        }
    }
}

/// Standard fixed-rate amortization, annualized.
fn annual_debt_service(loan_amount: f64, annual_rate: f64, amortization_years: u32) -> f64 {
    if loan_amount <= 0.0 || amortization_years == 0 {
        return 0.0;
    }
    let n = f64::from(amortization_years * 12);
    let monthly_rate = annual_rate / 12.0;
    let monthly_payment = if monthly_rate.abs() < f64::EPSILON {
        loan_amount / n
    } else {
        loan_amount * monthly_rate / (1.0 - (1.0 + monthly_rate).powf(-n))
    };
    monthly_payment * 12.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FeasibilityEngine {
        FeasibilityEngine::default()
    }

    #[test]
    fn stressed_floor_tracks_the_haircut_on_defaults() {
        let doctrine = DoctrineThresholds::default();
        assert!(
            (doctrine.min_stressed_noi_per_acre_month
                - doctrine.stress_haircut * doctrine.min_noi_per_acre_month)
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn stressed_noi_is_exactly_the_haircut_of_base_noi() {
        for (acreage, rent, density) in [
            (5.0, 1.50, 25_000.0),
            (2.0, 0.25, 25_000.0),
            (13.7, 0.92, 17_500.0),
        ] {
            let result = engine().evaluate(&FeasibilityInput {
                acreage,
                rent_per_sqft_month: Some(rent),
                density_sqft_per_acre: density,
            });
            assert!(
                (result.stressed_noi_per_acre_month - result.noi_per_acre_month * 0.75).abs()
                    < 1e-9
            );
        }
    }

    #[test]
    fn strong_site_passes_with_expected_revenue() {
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
    fn weak_rent_fails_the_noi_doctrine_floor() {
        let result = engine().evaluate(&FeasibilityInput {
            acreage: 2.0,
            rent_per_sqft_month: Some(0.25),
            density_sqft_per_acre: 25_000.0,
        });

        assert!((result.noi_per_acre_month - 3_748.5).abs() < 0.5);
        assert!(!result.pass_fail);
        assert!(result
            .fatal_flaws
            .iter()
            .any(|flaw| flaw.code == FlawCode::NoiBelowDoctrine
                && flaw.threshold == Some(5_000.0)
                && flaw.actual.is_some()));
    }

    #[test]
    fn non_positive_acreage_zeroes_every_monetary_output() {
        for acreage in [0.0, -3.2] {
            let result = engine().evaluate(&FeasibilityInput {
                acreage,
                rent_per_sqft_month: Some(1.50),
                density_sqft_per_acre: 25_000.0,
            });

            assert!(!result.pass_fail);
            assert!(result
                .fatal_flaws
                .iter()
                .any(|flaw| flaw.code == FlawCode::ZeroAcreage));
            assert_eq!(result.gross_monthly_revenue, 0.0);
            assert_eq!(result.noi_annual, 0.0);
            assert_eq!(result.loan_amount, 0.0);
            assert_eq!(result.debt_service_annual, 0.0);
            assert_eq!(result.implied_value, 0.0);
        }
    }

    #[test]
    fn thin_dscr_is_a_warning_never_a_fatal_flaw() {
        // High rent clears the NOI floor while heavy construction cost sinks
        // coverage below the 1.25 target.
        let expensive = FinancingAssumptions {
            hard_cost_per_sqft: 200.0,
            ..FinancingAssumptions::default()
        };
        let result = FeasibilityEngine::new(expensive, DoctrineThresholds::default()).evaluate(
            &FeasibilityInput {
                acreage: 5.0,
                rent_per_sqft_month: Some(1.50),
                density_sqft_per_acre: 25_000.0,
            },
        );

        assert!(result.dscr > 0.0 && result.dscr < 1.25);
        assert!(result.pass_fail);
        assert!(result.fatal_flaws.is_empty());
        assert!(result
            .warnings
            .iter()
            .any(|warning| warning.code == WarningCode::DscrBelowTarget));
    }

    #[test]
    fn missing_rent_defaults_and_warns() {
        let result = engine().evaluate(&FeasibilityInput {
            acreage: 5.0,
            rent_per_sqft_month: None,
            density_sqft_per_acre: 25_000.0,
        });

        assert!((result.rent_used_per_sqft_month - 1.10).abs() < 1e-9);
        let codes: Vec<_> = result.warnings.iter().map(|warning| warning.code).collect();
        assert!(codes.contains(&WarningCode::MissingRentData));
        assert!(codes.contains(&WarningCode::EstimatedValuesUsed));
    }

    #[test]
    fn identical_inputs_produce_identical_numbers() {
        let input = FeasibilityInput {
            acreage: 7.3,
            rent_per_sqft_month: Some(1.12),
            density_sqft_per_acre: 18_400.0,
        };
        let first = engine().evaluate(&input);
        let second = engine().evaluate(&input);
        assert_eq!(first, second);
    }
}
