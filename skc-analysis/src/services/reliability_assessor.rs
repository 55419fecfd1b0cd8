//! Measurement variability statistics and reliability classification
//!
//! Observational only: computes per-metric variability over the whole
//! session, classifies each metric's trustworthiness, and scores intra-phase
//! stability. Tolerates any subset of metrics being absent.

use serde::{Deserialize, Serialize};
use skc_common::config::{AnalysisConfig, MetricSpec};
use skc_common::types::{FrameRecord, MetricKind, PhaseBoundary, ReliabilityLevel};

/// Variability statistics for one metric over one frame set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    /// Arithmetic mean of defined values
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    /// Smallest defined value
    pub min: f64,
    /// Largest defined value
    pub max: f64,
    /// max − min
    pub range: f64,
    /// Coefficient of variation, std / |mean| (0 when the mean is 0)
    pub cv: f64,
}

/// Whole-session reliability assessment for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityRecord {
    /// Metric name
    pub metric: String,
    /// Variability statistics over the whole session
    pub stats: MetricStats,
    /// Reliability classification
    pub level: ReliabilityLevel,
}

/// Within-phase variability of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetricStability {
    /// Metric name
    pub metric: String,
    /// Standard deviation within the phase
    pub std: f64,
    /// Coefficient of variation within the phase
    pub cv: f64,
}

/// Stability summary for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStability {
    /// Phase key
    pub phase: String,
    /// Average of the per-metric stability scores (0-100)
    pub score: f64,
    /// Per-metric variability within the phase
    pub metrics: Vec<PhaseMetricStability>,
}

/// Reliability assessor for one subject
pub struct ReliabilityAssessor {
    metrics: Vec<MetricSpec>,
}

impl ReliabilityAssessor {
    /// Create an assessor from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            metrics: config.metrics.clone(),
        }
    }

    /// Whole-session variability and reliability per metric.
    ///
    /// Metrics with no defined value anywhere are skipped.
    pub fn assess(&self, frames: &[FrameRecord]) -> Vec<ReliabilityRecord> {
        self.metrics
            .iter()
            .filter_map(|spec| {
                let values: Vec<f64> =
                    frames.iter().filter_map(|f| f.value(&spec.name)).collect();
                let stats = compute_stats(&values)?;
                let level = classify(spec.kind, &stats);

                Some(ReliabilityRecord {
                    metric: spec.name.clone(),
                    stats,
                    level,
                })
            })
            .collect()
    }

    /// Intra-phase stability scores.
    ///
    /// Each metric's within-phase CV maps to a step-function score which is
    /// averaged across metrics; metrics with fewer than two defined values in
    /// a phase are skipped, and a phase with no usable metric is omitted.
    pub fn phase_stability(
        &self,
        frames: &[FrameRecord],
        boundaries: &[PhaseBoundary],
    ) -> Vec<PhaseStability> {
        boundaries
            .iter()
            .filter_map(|boundary| {
                let mut metric_stats = Vec::new();
                let mut scores = Vec::new();

                for spec in &self.metrics {
                    let values: Vec<f64> = frames
                        .iter()
                        .filter(|f| boundary.contains(f.frame_index))
                        .filter_map(|f| f.value(&spec.name))
                        .collect();

                    if values.len() < 2 {
                        continue;
                    }

                    let Some(stats) = compute_stats(&values) else {
                        continue;
                    };

                    scores.push(stability_score(stats.cv));
                    metric_stats.push(PhaseMetricStability {
                        metric: spec.name.clone(),
                        std: stats.std,
                        cv: stats.cv,
                    });
                }

                if scores.is_empty() {
                    return None;
                }

                Some(PhaseStability {
                    phase: boundary.phase.clone(),
                    score: scores.iter().sum::<f64>() / scores.len() as f64,
                    metrics: metric_stats,
                })
            })
            .collect()
    }
}

fn compute_stats(values: &[f64]) -> Option<MetricStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let cv = if mean != 0.0 { std / mean.abs() } else { 0.0 };

    Some(MetricStats {
        mean,
        std,
        min,
        max,
        range: max - min,
        cv,
    })
}

/// Reliability classification.
///
/// Angular metrics classify on absolute standard deviation, normalized
/// metrics on the coefficient of variation. Boundary values resolve to the
/// Medium side.
fn classify(kind: MetricKind, stats: &MetricStats) -> ReliabilityLevel {
    match kind {
        MetricKind::Angular => {
            if stats.std < 10.0 {
                ReliabilityLevel::High
            } else if stats.std <= 20.0 {
                ReliabilityLevel::Medium
            } else {
                ReliabilityLevel::Low
            }
        }
        MetricKind::Normalized => {
            if stats.cv < 0.15 {
                ReliabilityLevel::High
            } else if stats.cv <= 0.30 {
                ReliabilityLevel::Medium
            } else {
                ReliabilityLevel::Low
            }
        }
    }
}

/// Map a within-phase CV onto the 0-100 stability scale
fn stability_score(cv: f64) -> f64 {
    if cv < 0.1 {
        100.0
    } else if cv < 0.2 {
        90.0
    } else if cv < 0.3 {
        75.0
    } else if cv < 0.5 {
        60.0
    } else {
        50.0
    }
}
