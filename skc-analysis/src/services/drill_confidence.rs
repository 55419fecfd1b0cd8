//! Historical drill-effectiveness confidence scoring
//!
//! Read-only analytics over the full outcome ledger. Groups records by
//! drill, measures improvement magnitude, measurement reliability,
//! consistency, and sample size, and fuses them into a confidence score in
//! [0,1]. A separate analytical view: it never writes back to the ledger and
//! has no effect on prioritization or recommendations.

use serde::{Deserialize, Serialize};
use skc_common::types::{DrillOutcomeRecord, ReliabilityLevel};
use tracing::debug;

/// Confidence weighting: improvement 40%, reliability 25%, consistency 25%,
/// sample size 10%
const IMPROVEMENT_WEIGHT: f64 = 0.40;
const RELIABILITY_WEIGHT: f64 = 0.25;
const CONSISTENCY_WEIGHT: f64 = 0.25;
const SAMPLE_WEIGHT: f64 = 0.10;

/// Usage count at which the sample-size component saturates
const SAMPLE_SATURATION: f64 = 5.0;

/// Confidence classification bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// Score >= 0.75
    High,
    /// Score in [0.50, 0.75)
    Medium,
    /// Score < 0.50
    Low,
}

impl ConfidenceLevel {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

/// Aggregated confidence assessment for one drill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillConfidence {
    /// Drill name
    pub drill_name: String,
    /// Number of outcome records for the drill
    pub usage_count: usize,
    /// Mean outcome delta (negative = metric moved down)
    pub avg_delta: f64,
    /// Population deviation of the deltas (0 for a single record)
    pub std_delta: f64,
    /// Fraction of outcomes measured at High reliability
    pub high_reliability_ratio: f64,
    /// 1 − min(1, std/|avg|), clamped to [0,1]
    pub consistency: f64,
    /// Fused confidence score in [0,1]
    pub confidence_score: f64,
    /// Confidence classification
    pub confidence_level: ConfidenceLevel,
}

/// Drill confidence scorer
pub struct DrillConfidenceScorer;

impl DrillConfidenceScorer {
    /// Create a scorer
    pub fn new() -> Self {
        Self
    }

    /// Score every drill present in the ledger, sorted by name for
    /// deterministic output
    pub fn score(&self, outcomes: &[DrillOutcomeRecord]) -> Vec<DrillConfidence> {
        let mut names: Vec<&str> = outcomes.iter().map(|o| o.drill_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();

        let scores: Vec<DrillConfidence> = names
            .into_iter()
            .map(|name| {
                let records: Vec<&DrillOutcomeRecord> = outcomes
                    .iter()
                    .filter(|o| o.drill_name == name)
                    .collect();
                score_drill(name, &records)
            })
            .collect();

        debug!(drill_count = scores.len(), "Scored drill confidence table");
        scores
    }

    /// The `n` highest-confidence drills, score descending with a name
    /// tiebreak
    pub fn top_drills(&self, outcomes: &[DrillOutcomeRecord], n: usize) -> Vec<DrillConfidence> {
        let mut scores = self.score(outcomes);
        scores.sort_by(|a, b| {
            b.confidence_score
                .total_cmp(&a.confidence_score)
                .then_with(|| a.drill_name.cmp(&b.drill_name))
        });
        scores.truncate(n);
        scores
    }
}

impl Default for DrillConfidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn score_drill(name: &str, records: &[&DrillOutcomeRecord]) -> DrillConfidence {
    let usage_count = records.len();
    let n = usage_count as f64;

    let avg_delta = records.iter().map(|r| r.delta).sum::<f64>() / n;
    let std_delta = if usage_count > 1 {
        let variance = records
            .iter()
            .map(|r| (r.delta - avg_delta).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt()
    } else {
        0.0
    };

    let high_count = records
        .iter()
        .filter(|r| r.reliability == Some(ReliabilityLevel::High))
        .count();
    let high_reliability_ratio = high_count as f64 / n;

    // A zero mean delta gives no scale to judge spread against
    let consistency = if avg_delta.abs() > f64::EPSILON {
        (1.0 - (std_delta / avg_delta.abs()).min(1.0)).max(0.0)
    } else {
        0.0
    };

    // Map avg_delta linearly onto [0,1]: -20 -> 1.0, 0 -> 0.5, +20 -> 0.0.
    // More negative delta = larger improvement = higher score.
    let improvement_score = (0.5 - avg_delta / 40.0).clamp(0.0, 1.0);

    let sample_score = (n / SAMPLE_SATURATION).min(1.0);

    let confidence_score = IMPROVEMENT_WEIGHT * improvement_score
        + RELIABILITY_WEIGHT * high_reliability_ratio
        + CONSISTENCY_WEIGHT * consistency
        + SAMPLE_WEIGHT * sample_score;

    let confidence_level = if confidence_score >= 0.75 {
        ConfidenceLevel::High
    } else if confidence_score >= 0.50 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    DrillConfidence {
        drill_name: name.to_string(),
        usage_count,
        avg_delta,
        std_delta,
        high_reliability_ratio,
        consistency,
        confidence_score,
        confidence_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skc_common::types::DrillIntensity;

    fn outcome(drill: &str, delta: f64, reliability: Option<ReliabilityLevel>) -> DrillOutcomeRecord {
        DrillOutcomeRecord {
            prior_session_id: "2026-08-01_09-00-00".to_string(),
            session_id: "2026-08-07_10-00-00".to_string(),
            metric: "hip_rotation".to_string(),
            phase: "load".to_string(),
            drill_name: drill.to_string(),
            intensity: DrillIntensity::Moderate,
            classification_at_time: "PRIORITY".to_string(),
            pre_value: 30.0,
            post_value: 30.0 + delta,
            delta,
            reliability,
            timestamp: Utc.with_ymd_and_hms(2026, 8, 7, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_ledger_yields_empty_table() {
        let scorer = DrillConfidenceScorer::new();
        assert!(scorer.score(&[]).is_empty());
        assert!(scorer.top_drills(&[], 5).is_empty());
    }

    #[test]
    fn single_strong_improvement_scores_high_improvement_component() {
        let scorer = DrillConfidenceScorer::new();
        let ledger = vec![outcome("Drill A", -20.0, Some(ReliabilityLevel::High))];

        let scores = scorer.score(&ledger);
        assert_eq!(scores.len(), 1);
        let score = &scores[0];

        assert_eq!(score.usage_count, 1);
        assert!((score.avg_delta + 20.0).abs() < 1e-9);
        assert_eq!(score.std_delta, 0.0);
        assert!((score.high_reliability_ratio - 1.0).abs() < 1e-9);
        // std 0 over |avg| 20 -> perfectly consistent
        assert!((score.consistency - 1.0).abs() < 1e-9);
        // 0.4*1.0 + 0.25*1.0 + 0.25*1.0 + 0.1*0.2 = 0.92
        assert!((score.confidence_score - 0.92).abs() < 1e-9);
        assert_eq!(score.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn confidence_stays_in_unit_range() {
        let scorer = DrillConfidenceScorer::new();
        let ledger = vec![
            outcome("Worst", 50.0, None),
            outcome("Worst", -50.0, None),
            outcome("Best", -40.0, Some(ReliabilityLevel::High)),
            outcome("Best", -40.0, Some(ReliabilityLevel::High)),
            outcome("Best", -40.0, Some(ReliabilityLevel::High)),
            outcome("Best", -40.0, Some(ReliabilityLevel::High)),
            outcome("Best", -40.0, Some(ReliabilityLevel::High)),
        ];

        for score in scorer.score(&ledger) {
            assert!(score.confidence_score >= 0.0 && score.confidence_score <= 1.0);
        }
    }

    #[test]
    fn zero_mean_delta_has_zero_consistency() {
        let scorer = DrillConfidenceScorer::new();
        let ledger = vec![
            outcome("Drill A", 5.0, None),
            outcome("Drill A", -5.0, None),
        ];

        let scores = scorer.score(&ledger);
        assert_eq!(scores[0].consistency, 0.0);
    }

    #[test]
    fn appending_records_never_decreases_usage_count_or_drops_drills() {
        let scorer = DrillConfidenceScorer::new();
        let mut ledger = vec![
            outcome("Drill A", -3.0, Some(ReliabilityLevel::High)),
            outcome("Drill B", 2.0, None),
        ];

        let before = scorer.score(&ledger);
        ledger.push(outcome("Drill A", -1.0, None));
        ledger.push(outcome("Drill C", 0.0, None));
        let after = scorer.score(&ledger);

        for prior in &before {
            let now = after
                .iter()
                .find(|s| s.drill_name == prior.drill_name)
                .expect("drill disappeared from the score table");
            assert!(now.usage_count >= prior.usage_count);
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = DrillConfidenceScorer::new();
        let ledger = vec![
            outcome("Drill B", -3.0, Some(ReliabilityLevel::High)),
            outcome("Drill A", -1.0, None),
            outcome("Drill B", -5.0, Some(ReliabilityLevel::High)),
        ];

        assert_eq!(scorer.score(&ledger), scorer.score(&ledger));
        // Name-sorted output
        let scores = scorer.score(&ledger);
        assert_eq!(scores[0].drill_name, "Drill A");
        assert_eq!(scores[1].drill_name, "Drill B");
    }

    #[test]
    fn top_drills_rank_by_confidence() {
        let scorer = DrillConfidenceScorer::new();
        let ledger = vec![
            outcome("Mediocre", 0.0, None),
            outcome("Strong", -15.0, Some(ReliabilityLevel::High)),
            outcome("Strong", -17.0, Some(ReliabilityLevel::High)),
        ];

        let top = scorer.top_drills(&ledger, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].drill_name, "Strong");
    }

    #[test]
    fn confidence_level_bands() {
        let scorer = DrillConfidenceScorer::new();

        // Five highly reliable, consistent, strong improvements -> High
        let strong: Vec<DrillOutcomeRecord> = (0..5)
            .map(|_| outcome("Strong", -20.0, Some(ReliabilityLevel::High)))
            .collect();
        assert_eq!(
            scorer.score(&strong)[0].confidence_level,
            ConfidenceLevel::High
        );

        // A lone regression with no reliability -> Low
        let weak = vec![outcome("Weak", 15.0, None)];
        assert_eq!(scorer.score(&weak)[0].confidence_level, ConfidenceLevel::Low);
    }
}
