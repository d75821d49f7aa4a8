use serde::{Deserialize, Serialize};

/// Final disposition for a candidate site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    Evaluate,
    Walk,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Proceed => "proceed",
            Decision::Evaluate => "evaluate",
            Decision::Walk => "walk",
        }
    }
}

/// Scored dimensions feeding the weighted verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Feasibility,
    Demand,
    Zoning,
    Permits,
    Civil,
}

impl Dimension {
    pub const fn label(self) -> &'static str {
        match self {
            Dimension::Feasibility => "feasibility",
            Dimension::Demand => "demand",
            Dimension::Zoning => "zoning",
            Dimension::Permits => "permits",
            Dimension::Civil => "civil",
        }
    }

    pub const fn ordered() -> [Dimension; 5] {
        [
            Dimension::Feasibility,
            Dimension::Demand,
            Dimension::Zoning,
            Dimension::Permits,
            Dimension::Civil,
        ]
    }
}

/// Relative weight of each dimension. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictWeights {
    pub feasibility: f64,
    pub demand: f64,
    pub zoning: f64,
    pub permits: f64,
    pub civil: f64,
}

impl Default for VerdictWeights {
    fn default() -> Self {
        Self {
            feasibility: 0.35,
            demand: 0.20,
            zoning: 0.20,
            permits: 0.15,
            civil: 0.10,
        }
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("dimension weights sum to {sum:.4}, expected 1.0")]
    DoesNotSumToOne { sum: f64 },
    #[error("dimension weight for {dimension} is negative")]
    Negative { dimension: &'static str },
}

impl VerdictWeights {
    pub fn validate(&self) -> Result<(), WeightError> {
        for (dimension, weight) in Dimension::ordered()
            .into_iter()
            .map(|dimension| (dimension, self.get(dimension)))
        {
            if weight < 0.0 {
                return Err(WeightError::Negative {
                    dimension: dimension.label(),
                });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightError::DoesNotSumToOne { sum });
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.feasibility + self.demand + self.zoning + self.permits + self.civil
    }

    pub const fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Feasibility => self.feasibility,
            Dimension::Demand => self.demand,
            Dimension::Zoning => self.zoning,
            Dimension::Permits => self.permits,
            Dimension::Civil => self.civil,
        }
    }
}

/// Raw 0..100 score for each dimension. `feasibility` is absent when the
/// envelope was refused: absence of information is not a zero score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub feasibility: Option<f64>,
    pub demand: f64,
    pub zoning: f64,
    pub permits: f64,
    pub civil: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedContribution {
    pub dimension: Dimension,
    pub weight: f64,
    pub raw_score: f64,
    pub weighted: f64,
}

/// One weighted decision for the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub score: f64,
    pub weighted_contributions: Vec<WeightedContribution>,
    pub fatal_flaws: Vec<String>,
    pub confidence: f64,
}

/// Combines dimension scores into a decision, with fatal-flaw override.
#[derive(Debug, Clone)]
pub struct VerdictAggregator {
    weights: VerdictWeights,
    proceed_threshold: f64,
    evaluate_threshold: f64,
}

impl VerdictAggregator {
    pub fn new(weights: VerdictWeights) -> Result<Self, WeightError> {
        weights.validate()?;
        Ok(Self {
            weights,
            proceed_threshold: 75.0,
            evaluate_threshold: 50.0,
        })
    }

    pub fn weights(&self) -> &VerdictWeights {
        &self.weights
    }

    /// When feasibility could not be scored, its weight is redistributed over
    /// the remaining dimensions and the decision is capped at Evaluate: a
    /// site can never Proceed without a computed envelope.
    pub fn decide(
        &self,
        scores: &DimensionScores,
        fatal_flaws: Vec<String>,
        confidence: f64,
    ) -> Verdict {
        let feasibility_scored = scores.feasibility.is_some();
        let active_weight: f64 = if feasibility_scored {
            1.0
        } else {
            (1.0 - self.weights.feasibility).max(f64::EPSILON)
        };

        let mut contributions = Vec::new();
        let mut score = 0.0;
        for dimension in Dimension::ordered() {
            let raw = match dimension {
                Dimension::Feasibility => match scores.feasibility {
                    Some(raw) => raw,
                    None => continue,
                },
                Dimension::Demand => scores.demand,
                Dimension::Zoning => scores.zoning,
                Dimension::Permits => scores.permits,
                Dimension::Civil => scores.civil,
            };
            let raw = raw.clamp(0.0, 100.0);
            let weight = self.weights.get(dimension) / active_weight;
            let weighted = raw * weight;
            score += weighted;
            contributions.push(WeightedContribution {
                dimension,
                weight,
                raw_score: raw,
                weighted,
            });
        }

        let mut decision = if score >= self.proceed_threshold {
            Decision::Proceed
        } else if score >= self.evaluate_threshold {
            Decision::Evaluate
        } else {
            Decision::Walk
        };

        if !feasibility_scored && decision == Decision::Proceed {
            decision = Decision::Evaluate;
        }

        if !fatal_flaws.is_empty() {
            decision = Decision::Walk;
        }

        Verdict {
            decision,
            score,
            weighted_contributions: contributions,
            fatal_flaws,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> VerdictAggregator {
        VerdictAggregator::new(VerdictWeights::default()).expect("default weights valid")
    }

    fn scores(feasibility: f64) -> DimensionScores {
        DimensionScores {
            feasibility: Some(feasibility),
            demand: 80.0,
            zoning: 80.0,
            permits: 80.0,
            civil: 80.0,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!(VerdictWeights::default().validate().is_ok());
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let weights = VerdictWeights {
            feasibility: 0.5,
            ..VerdictWeights::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(WeightError::DoesNotSumToOne { .. })
        ));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = VerdictWeights {
            feasibility: 0.55,
            demand: -0.2,
            zoning: 0.3,
            permits: 0.2,
            civil: 0.15,
        };
        assert!(matches!(
            weights.validate(),
            Err(WeightError::Negative { dimension: "demand" })
        ));
    }

    #[test]
    fn high_score_without_flaws_proceeds() {
        let verdict = aggregator().decide(&scores(80.0), Vec::new(), 0.9);
        assert!((verdict.score - 80.0).abs() < 1e-9);
        assert_eq!(verdict.decision, Decision::Proceed);
    }

    #[test]
    fn same_score_with_a_fatal_flaw_walks() {
        let verdict = aggregator().decide(
            &scores(80.0),
            vec!["noi_below_doctrine: NOI below floor".to_string()],
            0.9,
        );
        assert!((verdict.score - 80.0).abs() < 1e-9);
        assert_eq!(verdict.decision, Decision::Walk);
    }

    #[test]
    fn decision_thresholds_are_inclusive() {
        let mid = DimensionScores {
            feasibility: Some(50.0),
            demand: 50.0,
            zoning: 50.0,
            permits: 50.0,
            civil: 50.0,
        };
        assert_eq!(
            aggregator().decide(&mid, Vec::new(), 0.5).decision,
            Decision::Evaluate
        );

        let exactly_75 = DimensionScores {
            feasibility: Some(75.0),
            demand: 75.0,
            zoning: 75.0,
            permits: 75.0,
            civil: 75.0,
        };
        assert_eq!(
            aggregator().decide(&exactly_75, Vec::new(), 0.5).decision,
            Decision::Proceed
        );

        let low = DimensionScores {
            feasibility: Some(20.0),
            demand: 49.0,
            zoning: 49.0,
            permits: 49.0,
            civil: 49.0,
        };
        assert_eq!(
            aggregator().decide(&low, Vec::new(), 0.5).decision,
            Decision::Walk
        );
    }

    #[test]
    fn contributions_sum_to_the_score() {
        let verdict = aggregator().decide(&scores(63.0), Vec::new(), 0.8);
        let total: f64 = verdict
            .weighted_contributions
            .iter()
            .map(|entry| entry.weighted)
            .sum();
        assert!((total - verdict.score).abs() < 1e-9);
    }

    #[test]
    fn unscored_feasibility_renormalizes_and_caps_at_evaluate() {
        let partial = DimensionScores {
            feasibility: None,
            demand: 95.0,
            zoning: 90.0,
            permits: 80.0,
            civil: 85.0,
        };
        let verdict = aggregator().decide(&partial, Vec::new(), 0.4);
        assert!(verdict.score > 75.0, "renormalized score was {}", verdict.score);
        assert_eq!(verdict.decision, Decision::Evaluate);
        assert_eq!(verdict.weighted_contributions.len(), 4);
    }
}
