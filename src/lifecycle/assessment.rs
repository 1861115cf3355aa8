use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::ApplicationId;

/// One independent axis of applicant evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Income,
    Employment,
    Family,
    Wealth,
    Demographic,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Income,
        Dimension::Employment,
        Dimension::Family,
        Dimension::Wealth,
        Dimension::Demographic,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Dimension::Income => "income",
            Dimension::Employment => "employment",
            Dimension::Family => "family",
            Dimension::Wealth => "wealth",
            Dimension::Demographic => "demographic",
        }
    }
}

/// Per-dimension weights. Two deployed weight sets disagree in this domain,
/// so the values are always caller configuration; the aggregator only
/// validates that they form a convex combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub income: f64,
    pub employment: f64,
    pub family: f64,
    pub wealth: f64,
    pub demographic: f64,
}

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

impl DimensionWeights {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Income => self.income,
            Dimension::Employment => self.employment,
            Dimension::Family => self.family,
            Dimension::Wealth => self.wealth,
            Dimension::Demographic => self.demographic,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum()
    }
}

/// Scoring policy: weights plus the decision band boundaries. Thresholds are
/// configuration, not constants; the defaults used in deployments live in
/// `config`, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentConfig {
    pub weights: DimensionWeights,
    pub approval_threshold: f64,
    pub rejection_threshold: f64,
}

impl AssessmentConfig {
    pub fn validate(&self) -> Result<(), AssessmentError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AssessmentError::WeightsDoNotSumToOne { sum });
        }
        for dimension in Dimension::ALL {
            let weight = self.weights.get(dimension);
            if !(0.0..=1.0).contains(&weight) {
                return Err(AssessmentError::WeightOutOfRange { dimension, weight });
            }
        }
        if !(0.0..=1.0).contains(&self.approval_threshold)
            || !(0.0..=1.0).contains(&self.rejection_threshold)
            || self.rejection_threshold > self.approval_threshold
        {
            return Err(AssessmentError::InvalidThresholds {
                approval: self.approval_threshold,
                rejection: self.rejection_threshold,
            });
        }
        Ok(())
    }
}

/// Per-dimension input from the scoring collaborator: a score in [0, 1] plus
/// pass-through recommendation and risk-factor strings and per-factor detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: f64,
    #[serde(default)]
    pub details: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

/// Advisory decision derived from the comprehensive score. Committing it to
/// the lifecycle requires a separate, explicit status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentDecision {
    Approved,
    ConditionallyApproved,
    Rejected,
}

impl AssessmentDecision {
    pub const fn label(self) -> &'static str {
        match self {
            AssessmentDecision::Approved => "approved",
            AssessmentDecision::ConditionallyApproved => "conditionally_approved",
            AssessmentDecision::Rejected => "rejected",
        }
    }

    /// Only the middle band routes to a human reviewer.
    pub const fn human_review_required(self) -> bool {
        matches!(self, AssessmentDecision::ConditionallyApproved)
    }
}

/// Distinguishes a single-dimension result from the derived comprehensive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "dimension")]
pub enum AssessmentKind {
    Dimension(Dimension),
    Comprehensive,
}

/// One scoring pass of one dimension (or the comprehensive aggregate) for an
/// application. Results accumulate; the comprehensive row is derived, never
/// edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub application_id: ApplicationId,
    pub kind: AssessmentKind,
    pub score: f64,
    pub details: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub risk_factors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// What one aggregation pass produced: the decision, the review flag, and the
/// result rows to persist (one per dimension plus the comprehensive row last).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub application_id: ApplicationId,
    pub comprehensive_score: f64,
    pub decision: AssessmentDecision,
    pub human_review_required: bool,
    pub results: Vec<AssessmentResult>,
}

/// Combines per-dimension scores into a decision. Stateless apart from its
/// validated configuration; it never touches application status.
#[derive(Debug, Clone)]
pub struct AssessmentAggregator {
    config: AssessmentConfig,
}

impl AssessmentAggregator {
    pub fn new(config: AssessmentConfig) -> Result<Self, AssessmentError> {
        config.validate()?;
        Ok(AssessmentAggregator { config })
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Aggregate one full set of dimension scores. All-or-nothing: any
    /// missing dimension or out-of-range score rejects the whole pass and no
    /// result rows are produced.
    pub fn aggregate(
        &self,
        application_id: &ApplicationId,
        scores: &BTreeMap<Dimension, DimensionScore>,
        now: DateTime<Utc>,
    ) -> Result<AssessmentOutcome, AssessmentError> {
        let missing: Vec<Dimension> = Dimension::ALL
            .iter()
            .copied()
            .filter(|dimension| !scores.contains_key(dimension))
            .collect();
        if !missing.is_empty() {
            return Err(AssessmentError::IncompleteAssessment { missing });
        }

        for (dimension, input) in scores {
            if !(0.0..=1.0).contains(&input.score) || !input.score.is_finite() {
                return Err(AssessmentError::ScoreOutOfRange {
                    dimension: *dimension,
                    score: input.score,
                });
            }
        }

        let comprehensive_score: f64 = Dimension::ALL
            .iter()
            .map(|dimension| self.config.weights.get(*dimension) * scores[dimension].score)
            .sum();

        let decision = if comprehensive_score >= self.config.approval_threshold {
            AssessmentDecision::Approved
        } else if comprehensive_score >= self.config.rejection_threshold {
            AssessmentDecision::ConditionallyApproved
        } else {
            AssessmentDecision::Rejected
        };

        let mut results = Vec::with_capacity(Dimension::ALL.len() + 1);
        let mut recommendations = Vec::new();
        let mut risk_factors = Vec::new();
        for dimension in Dimension::ALL {
            let input = &scores[&dimension];
            recommendations.extend(input.recommendations.iter().cloned());
            risk_factors.extend(input.risk_factors.iter().cloned());
            results.push(AssessmentResult {
                application_id: application_id.clone(),
                kind: AssessmentKind::Dimension(dimension),
                score: input.score,
                details: input.details.clone(),
                recommendations: input.recommendations.clone(),
                risk_factors: input.risk_factors.clone(),
                created_at: now,
            });
        }

        let comprehensive_details: BTreeMap<String, f64> = Dimension::ALL
            .iter()
            .map(|dimension| (dimension.label().to_string(), scores[dimension].score))
            .collect();
        results.push(AssessmentResult {
            application_id: application_id.clone(),
            kind: AssessmentKind::Comprehensive,
            score: comprehensive_score,
            details: comprehensive_details,
            recommendations,
            risk_factors,
            created_at: now,
        });

        Ok(AssessmentOutcome {
            application_id: application_id.clone(),
            comprehensive_score,
            decision,
            human_review_required: decision.human_review_required(),
            results,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssessmentError {
    #[error("dimension weights sum to {sum}, expected 1.0")]
    WeightsDoNotSumToOne { sum: f64 },
    #[error("weight {weight} for dimension {dimension:?} is outside [0, 1]")]
    WeightOutOfRange { dimension: Dimension, weight: f64 },
    #[error("decision thresholds (approval {approval}, rejection {rejection}) are invalid")]
    InvalidThresholds { approval: f64, rejection: f64 },
    #[error("score {score} for dimension {dimension:?} is outside [0, 1]")]
    ScoreOutOfRange { dimension: Dimension, score: f64 },
    #[error("assessment is missing dimensions: {missing:?}")]
    IncompleteAssessment { missing: Vec<Dimension> },
}
