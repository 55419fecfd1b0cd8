//! Similarity scoring between practitioner and reference metrics
//!
//! Two independent families per phase: a tolerance-based rule model and a
//! pattern-shape (cosine) model over jointly standardized feature vectors.
//! Both aggregate to an overall score with the same phase weights so they
//! stay comparable side by side; neither supersedes the other.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use skc_common::config::{AnalysisConfig, MetricSpec, PhaseSpec};
use skc_common::types::PhaseMetrics;
use tracing::debug;

/// One metric's rule-model comparison within a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSimilarity {
    /// Metric name
    pub metric: String,
    /// Signed deviation, practitioner − reference
    pub deviation: f64,
    /// Rule-model similarity (0-100)
    pub score: f64,
}

/// Rule-model score for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRuleScore {
    /// Phase key
    pub phase: String,
    /// Weighted average of per-metric similarities (0-100)
    pub score: f64,
    /// Per-metric breakdown
    pub per_metric: Vec<MetricSimilarity>,
}

/// Complete rule-model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleScores {
    /// Per-phase scores in configured phase order
    pub per_phase: Vec<PhaseRuleScore>,
    /// Phase-weighted overall score (0-100)
    pub overall: f64,
}

impl RuleScores {
    /// Score for one phase, if it was comparable
    pub fn phase_score(&self, phase: &str) -> Option<f64> {
        self.per_phase
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| p.score)
    }
}

/// Pattern-model score for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePatternScore {
    /// Phase key
    pub phase: String,
    /// Cosine similarity mapped to 0-100
    pub score: f64,
}

/// Complete pattern-model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternScores {
    /// Per-phase scores in configured phase order
    pub per_phase: Vec<PhasePatternScore>,
    /// Phase-weighted overall score (0-100)
    pub overall: f64,
}

/// Similarity scoring engine
pub struct SimilarityScorer {
    phases: Vec<PhaseSpec>,
    metrics: Vec<MetricSpec>,
}

impl SimilarityScorer {
    /// Create a scorer from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            phases: config.phases.clone(),
            metrics: config.metrics.clone(),
        }
    }

    /// Rule-model similarity for one metric.
    ///
    /// 100 at zero deviation, 50 at the tolerance, clamped to 0 at twice the
    /// tolerance and beyond.
    pub fn metric_similarity(deviation: f64, tolerance: f64) -> f64 {
        (100.0 * (1.0 - deviation.abs() / (2.0 * tolerance))).max(0.0)
    }

    /// Rule-model scores over paired phase metrics.
    ///
    /// Phases missing from either subject are skipped; the overall score
    /// renormalizes by the weights of the phases actually compared. With no
    /// comparable phase at all the overall lands on the neutral 50.
    pub fn rule_scores(
        &self,
        practitioner: &[PhaseMetrics],
        reference: &[PhaseMetrics],
    ) -> RuleScores {
        let mut per_phase = Vec::new();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for phase in &self.phases {
            let (Some(user), Some(reference)) = (
                practitioner.iter().find(|m| m.phase == phase.key),
                reference.iter().find(|m| m.phase == phase.key),
            ) else {
                continue;
            };

            if let Some(score) = self.rule_phase_score(&phase.key, &user.metrics, &reference.metrics)
            {
                weighted_sum += score.score * phase.weight;
                total_weight += phase.weight;
                per_phase.push(score);
            }
        }

        let overall = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            50.0
        };

        debug!(
            phases_compared = per_phase.len(),
            overall, "Computed rule-model similarity"
        );

        RuleScores { per_phase, overall }
    }

    /// Rule-model score over a flat metric map (used for the impact-window
    /// technique score). Neutral 50 when no metric is comparable.
    pub fn rule_score_flat(
        &self,
        practitioner: &HashMap<String, f64>,
        reference: &HashMap<String, f64>,
    ) -> f64 {
        self.rule_phase_score("", practitioner, reference)
            .map(|s| s.score)
            .unwrap_or(50.0)
    }

    fn rule_phase_score(
        &self,
        phase: &str,
        practitioner: &HashMap<String, f64>,
        reference: &HashMap<String, f64>,
    ) -> Option<PhaseRuleScore> {
        let mut per_metric = Vec::new();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for spec in &self.metrics {
            let (Some(user), Some(reference)) = (
                defined(practitioner, &spec.name),
                defined(reference, &spec.name),
            ) else {
                continue;
            };

            let deviation = user - reference;
            let score = Self::metric_similarity(deviation, spec.tolerance);

            weighted_sum += score * spec.similarity_weight;
            total_weight += spec.similarity_weight;
            per_metric.push(MetricSimilarity {
                metric: spec.name.clone(),
                deviation,
                score,
            });
        }

        if per_metric.is_empty() {
            return None;
        }

        Some(PhaseRuleScore {
            phase: phase.to_string(),
            score: weighted_sum / total_weight,
            per_metric,
        })
    }

    /// Pattern-model scores over paired phase metrics.
    ///
    /// Builds one fixed-order feature vector per subject per phase,
    /// standardizes both jointly (mean and deviation pooled over both
    /// subjects' defined values), treats missing entries as 0 after
    /// standardization, and maps cosine similarity from [-1,1] to [0,100].
    pub fn pattern_scores(
        &self,
        practitioner: &[PhaseMetrics],
        reference: &[PhaseMetrics],
    ) -> PatternScores {
        let mut per_phase = Vec::new();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for phase in &self.phases {
            let (Some(user), Some(reference)) = (
                practitioner.iter().find(|m| m.phase == phase.key),
                reference.iter().find(|m| m.phase == phase.key),
            ) else {
                continue;
            };

            let score = self.pattern_phase_score(user, reference);
            weighted_sum += score * phase.weight;
            total_weight += phase.weight;
            per_phase.push(PhasePatternScore {
                phase: phase.key.clone(),
                score,
            });
        }

        let overall = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            50.0
        };

        PatternScores { per_phase, overall }
    }

    /// Pattern score for a single phase pair
    pub fn pattern_phase_score(
        &self,
        practitioner: &PhaseMetrics,
        reference: &PhaseMetrics,
    ) -> f64 {
        let user_vec: Vec<Option<f64>> = self
            .metrics
            .iter()
            .map(|m| practitioner.value(&m.name))
            .collect();
        let ref_vec: Vec<Option<f64>> = self
            .metrics
            .iter()
            .map(|m| reference.value(&m.name))
            .collect();

        let defined: Vec<f64> = user_vec
            .iter()
            .chain(ref_vec.iter())
            .filter_map(|v| *v)
            .collect();

        if defined.is_empty() {
            return 50.0;
        }

        let mean = defined.iter().sum::<f64>() / defined.len() as f64;
        let variance =
            defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / defined.len() as f64;
        let std = variance.sqrt();
        let scale = if std > f64::EPSILON { std } else { 1.0 };

        let standardize = |values: &[Option<f64>]| -> Vec<f64> {
            values
                .iter()
                .map(|v| v.map(|v| (v - mean) / scale).unwrap_or(0.0))
                .collect()
        };

        let user_std = standardize(&user_vec);
        let ref_std = standardize(&ref_vec);

        let cosine = cosine_similarity(&user_std, &ref_std);
        (cosine + 1.0) * 50.0
    }

    /// Human-readable interpretation of a pattern score
    pub fn interpret_pattern_score(score: f64) -> &'static str {
        if score >= 85.0 {
            "Excellent match - movement pattern closely resembles the reference technique"
        } else if score >= 70.0 {
            "Good similarity - technique is on the right track with room for refinement"
        } else if score >= 55.0 {
            "Moderate similarity - several aspects match but key differences remain"
        } else {
            "Significant differences - technique diverges from the reference pattern"
        }
    }
}

fn defined(metrics: &HashMap<String, f64>, name: &str) -> Option<f64> {
    metrics.get(name).copied().filter(|v| v.is_finite())
}

/// Cosine similarity with degenerate vectors resolved deterministically:
/// two zero vectors are identical (1.0), one zero vector is neutral (0.0).
fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a <= f64::EPSILON && norm_b <= f64::EPSILON {
        return 1.0;
    }
    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
