//! Analysis configuration with built-in reference-motion defaults
//!
//! Phase names/weights, the tracked metric catalog (tolerances, model
//! weights), and the tuning constants of segmentation, prioritization, and
//! progress tracking are all externally configurable via a TOML document.
//! Missing fields fall back individually to the built-in defaults for the
//! reference motion (tennis two-handed backhand); a missing or unreadable
//! file never halts the pipeline.
//!
//! The config value is threaded explicitly through every component
//! constructor; there is no ambient/global configuration state.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::types::MetricKind;
use crate::{Error, Result};

/// Named phase with relative importance weight
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseSpec {
    /// Stable key used across the pipeline (e.g. `follow_through`)
    pub key: String,
    /// Display name used in cue text (e.g. `Follow-through`)
    pub name: String,
    /// Relative importance in [0,1]; weights across phases sum to ~1.0
    pub weight: f64,
}

/// Tracked metric with tolerance and per-model weights
#[derive(Debug, Clone, Deserialize)]
pub struct MetricSpec {
    /// Metric name as produced by the pose/feature pipeline
    pub name: String,
    /// Angular vs. normalized; decides reliability thresholds and severity scaling
    pub kind: MetricKind,
    /// Deviation at which rule-based similarity reaches 50 (2x reaches 0)
    pub tolerance: f64,
    /// Weight in the rule-based similarity average
    #[serde(default = "default_weight")]
    pub similarity_weight: f64,
    /// Weight in cue priority scoring
    #[serde(default = "default_weight")]
    pub cue_weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Phase-specific cue-weight override.
///
/// Reflects domain knowledge that the same deviation matters more in certain
/// phases (e.g. hip rotation while loading).
#[derive(Debug, Clone, Deserialize)]
pub struct CueWeightOverride {
    /// Phase key the override applies to
    pub phase: String,
    /// Metric name the override applies to
    pub metric: String,
    /// Replacement for the metric's generic cue weight
    pub weight: f64,
}

/// Phase segmentation tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Metric carrying the rotation signal
    pub rotation_signal: String,
    /// Metric carrying the speed signal
    pub speed_signal: String,
    /// Centered moving-average width in frames
    pub smoothing_window: usize,
    /// Percentile of frame-to-frame rotation deltas marking the preparation end
    pub rotation_delta_percentile: f64,
    /// Fraction of peak speed marking the load end
    pub speed_onset_fraction: f64,
    /// Half-width of the contact window around the impact frame
    pub contact_half_width: i64,
    /// Preparation boundary is searched before this fraction of the clip
    pub preparation_search_fraction: f64,
    /// Per-phase fractions of the clip used by the proportional fallback split
    pub fallback_split: Vec<f64>,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            rotation_signal: "hip_rotation".to_string(),
            speed_signal: "combined_wrist_speed".to_string(),
            smoothing_window: 5,
            rotation_delta_percentile: 0.60,
            speed_onset_fraction: 0.20,
            contact_half_width: 5,
            preparation_search_fraction: 0.70,
            fallback_split: vec![0.30, 0.30, 0.10, 0.30],
        }
    }
}

/// Adaptive prioritization thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityParams {
    /// Severe deviation threshold for angular metrics (degrees)
    pub severe_angular: f64,
    /// Severe deviation threshold for normalized metrics
    pub severe_normalized: f64,
    /// Significant deviation threshold for angular metrics (degrees)
    pub significant_angular: f64,
    /// Significant deviation threshold for normalized metrics
    pub significant_normalized: f64,
    /// Score-delta magnitude that counts as actively improving/worsening
    pub progress_threshold: f64,
}

impl Default for PriorityParams {
    fn default() -> Self {
        Self {
            severe_angular: 50.0,
            severe_normalized: 3.0,
            significant_angular: 20.0,
            significant_normalized: 1.5,
            progress_threshold: 5.0,
        }
    }
}

/// Progress classification tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressParams {
    /// Dead zone in score points: |delta| below this is Stable
    pub dead_zone: f64,
}

impl Default for ProgressParams {
    fn default() -> Self {
        Self { dead_zone: 3.0 }
    }
}

/// Display-oriented cutoffs (the full candidate lists are always retained)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayParams {
    /// Number of top cues surfaced as today's focus
    pub primary_cues: usize,
    /// Length of the ranked cue list
    pub ranked_cues: usize,
    /// Length of the top adaptive-issue view
    pub top_issues: usize,
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            primary_cues: 2,
            ranked_cues: 5,
            top_issues: 3,
        }
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Ordered phase definitions
    pub phases: Vec<PhaseSpec>,
    /// Tracked metric catalog
    pub metrics: Vec<MetricSpec>,
    /// Phase-specific cue-weight overrides
    pub cue_overrides: Vec<CueWeightOverride>,
    /// Segmentation tuning
    pub segmentation: SegmentationParams,
    /// Half-width of the impact aggregation window in frames
    pub impact_window: i64,
    /// Prioritization thresholds
    pub priority: PriorityParams,
    /// Progress classification tuning
    pub progress: ProgressParams,
    /// Display cutoffs
    pub display: DisplayParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            phases: vec![
                phase("preparation", "Preparation", 0.15),
                phase("load", "Load", 0.25),
                phase("contact", "Contact", 0.35),
                phase("follow_through", "Follow-through", 0.25),
            ],
            metrics: vec![
                metric("left_shoulder_angle", MetricKind::Angular, 35.0, 0.8, 1.5),
                metric("right_shoulder_angle", MetricKind::Angular, 35.0, 0.8, 1.5),
                metric("left_elbow_angle", MetricKind::Angular, 30.0, 1.0, 2.0),
                metric("right_elbow_angle", MetricKind::Angular, 30.0, 1.0, 2.0),
                metric("left_knee_angle", MetricKind::Angular, 25.0, 1.0, 1.8),
                metric("right_knee_angle", MetricKind::Angular, 25.0, 1.0, 1.8),
                metric("hip_rotation", MetricKind::Angular, 20.0, 1.5, 2.5),
                metric("spine_lean", MetricKind::Angular, 15.0, 1.0, 1.5),
                metric(
                    "stance_width_normalized",
                    MetricKind::Normalized,
                    2.0,
                    1.2,
                    2.2,
                ),
            ],
            cue_overrides: vec![
                CueWeightOverride {
                    phase: "load".to_string(),
                    metric: "hip_rotation".to_string(),
                    weight: 3.0,
                },
                CueWeightOverride {
                    phase: "preparation".to_string(),
                    metric: "stance_width_normalized".to_string(),
                    weight: 2.5,
                },
            ],
            segmentation: SegmentationParams::default(),
            impact_window: 3,
            priority: PriorityParams::default(),
            progress: ProgressParams::default(),
            display: DisplayParams::default(),
        }
    }
}

fn phase(key: &str, name: &str, weight: f64) -> PhaseSpec {
    PhaseSpec {
        key: key.to_string(),
        name: name.to_string(),
        weight,
    }
}

fn metric(
    name: &str,
    kind: MetricKind,
    tolerance: f64,
    similarity_weight: f64,
    cue_weight: f64,
) -> MetricSpec {
    MetricSpec {
        name: name.to_string(),
        kind,
        tolerance,
        similarity_weight,
        cue_weight,
    }
}

impl AnalysisConfig {
    /// Parse a TOML document; missing fields fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid analysis config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional TOML file.
    ///
    /// A `None` path, missing file, or malformed document falls back to the
    /// built-in defaults with a warning; configuration problems never halt
    /// the pipeline.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Analysis config not readable, using built-in defaults"
                );
                return Self::default();
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Analysis config invalid, using built-in defaults"
                );
                Self::default()
            }
        }
    }

    /// Validate structural invariants.
    ///
    /// Phase weights summing away from 1.0 only warns; an empty phase or
    /// metric list is a hard configuration error.
    pub fn validate(&self) -> Result<()> {
        if self.phases.is_empty() {
            return Err(Error::Config("No phases configured".to_string()));
        }
        if self.metrics.is_empty() {
            return Err(Error::Config("No metrics configured".to_string()));
        }

        let weight_sum: f64 = self.phases.iter().map(|p| p.weight).sum();
        if (weight_sum - 1.0).abs() > 0.05 {
            warn!(
                weight_sum,
                "Phase weights do not sum to 1.0; scores remain comparable but check configuration"
            );
        }

        Ok(())
    }

    /// Phase definition by key
    pub fn phase(&self, key: &str) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.key == key)
    }

    /// Position of a phase in the configured ordering (for deterministic ties)
    pub fn phase_index(&self, key: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.key == key)
    }

    /// Importance weight of a phase, 0.0 when unknown
    pub fn phase_weight(&self, key: &str) -> f64 {
        self.phase(key).map(|p| p.weight).unwrap_or(0.0)
    }

    /// Metric definition by name
    pub fn metric(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Cue weight for a metric in a phase, honoring phase-specific overrides
    pub fn cue_weight(&self, phase: &str, metric: &str) -> f64 {
        self.cue_overrides
            .iter()
            .find(|o| o.phase == phase && o.metric == metric)
            .map(|o| o.weight)
            .or_else(|| self.metric(metric).map(|m| m.cue_weight))
            .unwrap_or(1.0)
    }

    /// Metric names in catalog order
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.phases.len(), 4);
        assert_eq!(config.metrics.len(), 9);

        let weight_sum: f64 = config.phases.iter().map(|p| p.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cue_weight_honors_overrides() {
        let config = AnalysisConfig::default();

        // Generic weight everywhere except the overridden phase
        assert_eq!(config.cue_weight("contact", "hip_rotation"), 2.5);
        assert_eq!(config.cue_weight("load", "hip_rotation"), 3.0);
        assert_eq!(config.cue_weight("preparation", "stance_width_normalized"), 2.5);
        assert_eq!(config.cue_weight("load", "unknown_metric"), 1.0);
    }

    #[test]
    fn partial_toml_falls_back_per_field() {
        let toml = r#"
            impact_window = 5

            [segmentation]
            contact_half_width = 3
        "#;

        let config = AnalysisConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.impact_window, 5);
        assert_eq!(config.segmentation.contact_half_width, 3);
        // Untouched fields keep defaults
        assert_eq!(config.segmentation.smoothing_window, 5);
        assert_eq!(config.phases.len(), 4);
        assert_eq!(config.priority.severe_angular, 50.0);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let result = AnalysisConfig::from_toml_str("phases = 3");
        assert!(result.is_err());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = AnalysisConfig::load(Some(Path::new("/nonexistent/config.toml")));
        assert_eq!(config.phases.len(), 4);
    }

    #[test]
    fn load_reads_a_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(&path, "impact_window = 7\n").unwrap();

        let config = AnalysisConfig::load(Some(&path));
        assert_eq!(config.impact_window, 7);
        assert_eq!(config.phases.len(), 4);
    }

    #[test]
    fn load_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(&path, "phases = \"broken\"\n").unwrap();

        let config = AnalysisConfig::load(Some(&path));
        assert_eq!(config.impact_window, 3);
    }

    #[test]
    fn custom_phase_set_parses() {
        let toml = r#"
            [[phases]]
            key = "windup"
            name = "Wind-up"
            weight = 0.4

            [[phases]]
            key = "release"
            name = "Release"
            weight = 0.6

            [[metrics]]
            name = "elbow_angle"
            kind = "angular"
            tolerance = 25.0
        "#;

        let config = AnalysisConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.phases.len(), 2);
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.metrics[0].similarity_weight, 1.0);
        assert_eq!(config.phase_weight("release"), 0.6);
    }
}
