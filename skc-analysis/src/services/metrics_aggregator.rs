//! Per-phase metric aggregation
//!
//! Reduces a frame series to per-metric arithmetic means for each phase, and
//! to a single impact-window aggregate used by the session-level technique
//! score. Pure and deterministic; missing per-frame values are excluded from
//! the mean, never imputed.

use std::collections::HashMap;

use skc_common::config::AnalysisConfig;
use skc_common::types::{FrameRecord, PhaseBoundary, PhaseMetrics};

/// Phase metrics aggregator for one subject
pub struct MetricsAggregator {
    metric_names: Vec<String>,
    impact_window: i64,
}

impl MetricsAggregator {
    /// Create an aggregator from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            metric_names: config.metric_names(),
            impact_window: config.impact_window,
        }
    }

    /// Mean of every tracked metric over each phase's frames.
    ///
    /// A metric with no defined value anywhere in a phase is absent from that
    /// phase's map rather than reported as zero.
    pub fn aggregate(
        &self,
        frames: &[FrameRecord],
        boundaries: &[PhaseBoundary],
    ) -> Vec<PhaseMetrics> {
        boundaries
            .iter()
            .map(|boundary| {
                let phase_frames: Vec<&FrameRecord> = frames
                    .iter()
                    .filter(|f| boundary.contains(f.frame_index))
                    .collect();

                PhaseMetrics {
                    phase: boundary.phase.clone(),
                    duration_frames: boundary.duration_frames(),
                    metrics: self.mean_per_metric(&phase_frames),
                }
            })
            .collect()
    }

    /// Mean of every tracked metric over `impact ± impact_window` frames.
    ///
    /// Falls back to the whole series when the window holds no frames.
    pub fn impact_metrics(
        &self,
        frames: &[FrameRecord],
        impact_frame: i64,
    ) -> HashMap<String, f64> {
        let window: Vec<&FrameRecord> = frames
            .iter()
            .filter(|f| {
                f.frame_index >= impact_frame - self.impact_window
                    && f.frame_index <= impact_frame + self.impact_window
            })
            .collect();

        if window.is_empty() {
            let all: Vec<&FrameRecord> = frames.iter().collect();
            return self.mean_per_metric(&all);
        }

        self.mean_per_metric(&window)
    }

    fn mean_per_metric(&self, frames: &[&FrameRecord]) -> HashMap<String, f64> {
        let mut means = HashMap::new();

        for name in &self.metric_names {
            let values: Vec<f64> = frames.iter().filter_map(|f| f.value(name)).collect();
            if !values.is_empty() {
                means.insert(
                    name.clone(),
                    values.iter().sum::<f64>() / values.len() as f64,
                );
            }
        }

        means
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skc_common::config::AnalysisConfig;

    fn frames_with_elbow(values: &[f64]) -> Vec<FrameRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| FrameRecord::new(i as i64).with_value("left_elbow_angle", *v))
            .collect()
    }

    #[test]
    fn aggregates_means_per_phase() {
        let aggregator = MetricsAggregator::new(&AnalysisConfig::default());
        let frames = frames_with_elbow(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        let boundaries = vec![
            PhaseBoundary::new("preparation", 0, 2),
            PhaseBoundary::new("load", 3, 5),
        ];

        let metrics = aggregator.aggregate(&frames, &boundaries);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].duration_frames, 3);
        assert!((metrics[0].value("left_elbow_angle").unwrap() - 20.0).abs() < 1e-9);
        assert!((metrics[1].value("left_elbow_angle").unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_values_are_excluded_not_imputed() {
        let aggregator = MetricsAggregator::new(&AnalysisConfig::default());
        let mut frames = frames_with_elbow(&[10.0, 20.0, 30.0]);
        frames[1].values.remove("left_elbow_angle");
        let boundaries = vec![PhaseBoundary::new("contact", 0, 2)];

        let metrics = aggregator.aggregate(&frames, &boundaries);

        // Mean of 10 and 30, the missing frame does not drag it toward zero
        assert!((metrics[0].value("left_elbow_angle").unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn fully_missing_metric_is_absent() {
        let aggregator = MetricsAggregator::new(&AnalysisConfig::default());
        let frames = frames_with_elbow(&[10.0, 20.0]);
        let boundaries = vec![PhaseBoundary::new("contact", 0, 1)];

        let metrics = aggregator.aggregate(&frames, &boundaries);

        assert!(metrics[0].value("hip_rotation").is_none());
    }

    #[test]
    fn impact_metrics_average_the_window() {
        let aggregator = MetricsAggregator::new(&AnalysisConfig::default());
        let frames = frames_with_elbow(&[0.0, 0.0, 0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 0.0, 0.0]);

        // Window 5 ± 3 covers values at frames 2..=8
        let metrics = aggregator.impact_metrics(&frames, 5);
        let expected = (0.0 + 10.0 + 20.0 + 30.0 + 40.0 + 50.0 + 0.0) / 7.0;
        assert!((metrics["left_elbow_angle"] - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_impact_window_falls_back_to_whole_series() {
        let aggregator = MetricsAggregator::new(&AnalysisConfig::default());
        let frames = frames_with_elbow(&[10.0, 20.0]);

        let metrics = aggregator.impact_metrics(&frames, 100);
        assert!((metrics["left_elbow_angle"] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let aggregator = MetricsAggregator::new(&AnalysisConfig::default());
        let frames = frames_with_elbow(&[10.0, 20.0, 30.0, 40.0]);
        let boundaries = vec![PhaseBoundary::new("load", 0, 3)];

        let a = aggregator.aggregate(&frames, &boundaries);
        let b = aggregator.aggregate(&frames, &boundaries);
        assert_eq!(a, b);
    }
}
