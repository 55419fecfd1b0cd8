//! Core data model records shared between the analysis pipeline and its
//! collaborators (persistence, reporting, dashboards).
//!
//! Everything here is a plain structured record: serialization format is the
//! presentation/persistence layer's concern.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One video frame's derived measurements, keyed by metric name.
///
/// Produced by the external pose/feature pipeline; immutable once produced.
/// A metric absent from `values` (or stored as a non-finite number) counts as
/// undefined for that frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Zero-based frame index within the analyzed clip
    pub frame_index: i64,
    /// Metric name → measured value for this frame
    pub values: HashMap<String, f64>,
}

impl FrameRecord {
    /// Create an empty frame record
    pub fn new(frame_index: i64) -> Self {
        Self {
            frame_index,
            values: HashMap::new(),
        }
    }

    /// Builder-style helper used heavily by tests and fixtures
    pub fn with_value(mut self, metric: &str, value: f64) -> Self {
        self.values.insert(metric.to_string(), value);
        self
    }

    /// Defined value for a metric: present and finite
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().filter(|v| v.is_finite())
    }
}

/// Kind of a tracked metric; decides which variability thresholds apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Joint/rotation angles in degrees
    Angular,
    /// Unitless or normalized quantities (ratios, normalized distances)
    Normalized,
}

/// Named phase span for one subject, inclusive on both ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseBoundary {
    /// Phase key (e.g. `preparation`)
    pub phase: String,
    /// First frame of the phase
    pub start_frame: i64,
    /// Last frame of the phase (inclusive)
    pub end_frame: i64,
}

impl PhaseBoundary {
    /// Create a new phase boundary
    pub fn new(phase: &str, start_frame: i64, end_frame: i64) -> Self {
        Self {
            phase: phase.to_string(),
            start_frame,
            end_frame,
        }
    }

    /// Number of frames covered by the phase
    pub fn duration_frames(&self) -> i64 {
        self.end_frame - self.start_frame + 1
    }

    /// Whether a frame index falls inside the phase
    pub fn contains(&self, frame_index: i64) -> bool {
        frame_index >= self.start_frame && frame_index <= self.end_frame
    }
}

/// Aggregated per-metric means for one subject and one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    /// Phase key these aggregates belong to
    pub phase: String,
    /// Number of frames in the phase
    pub duration_frames: i64,
    /// Metric name → arithmetic mean over the phase's defined values
    pub metrics: HashMap<String, f64>,
}

impl PhaseMetrics {
    /// Aggregated value for a metric, if it was defined in this phase
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().filter(|v| v.is_finite())
    }
}

/// Reliability classification of a measured metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityLevel {
    /// Consistent, trustworthy measurement
    High,
    /// Moderate variation, acceptable for analysis
    Medium,
    /// High variation; may be noise rather than technique
    Low,
}

impl ReliabilityLevel {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReliabilityLevel::High => "High",
            ReliabilityLevel::Medium => "Medium",
            ReliabilityLevel::Low => "Low",
        }
    }
}

/// Prescription intensity for a recommended drill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillIntensity {
    /// Maintenance volume
    Light,
    /// Focused work
    Moderate,
    /// Highest volume/frequency
    Intensive,
}

impl DrillIntensity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DrillIntensity::Light => "light",
            DrillIntensity::Moderate => "moderate",
            DrillIntensity::Intensive => "intensive",
        }
    }
}

/// Minimal persisted record a later session's progress tracker recovers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier (`YYYY-MM-DD_HH-MM-SS`; lexicographic == chronological)
    pub session_id: String,
    /// Rule-based technique score over the impact window (0-100)
    pub overall_score: f64,
    /// Phase-weighted rule-based score (0-100)
    pub phase_weighted_score: f64,
    /// Phase key → rule-based phase score (0-100)
    pub phase_scores: BTreeMap<String, f64>,
    /// When the session was analyzed
    pub recorded_at: DateTime<Utc>,
}

/// Direction of a session-over-session change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    /// Score moved up by at least the dead-zone threshold
    Improved,
    /// Within the dead zone
    Stable,
    /// Score moved down by at least the dead-zone threshold
    Regressed,
}

impl ProgressStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Improved => "Improved",
            ProgressStatus::Stable => "Stable",
            ProgressStatus::Regressed => "Regressed",
        }
    }
}

/// One comparable scalar's change between two sessions.
///
/// Derived each session from two `SessionSummary` records; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressDelta {
    /// `overall_score`, `phase_weighted_score`, or `phase:<key>`
    pub metric_key: String,
    /// Current session's value
    pub current_value: f64,
    /// Previous session's value
    pub previous_value: f64,
    /// current − previous
    pub delta: f64,
    /// Classification of the change
    pub status: ProgressStatus,
}

/// Append-only record of one prescribed intervention and its measured effect.
///
/// The unit of the historical ledger; never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillOutcomeRecord {
    /// Session in which the drill was prescribed
    pub prior_session_id: String,
    /// Session in which the effect was measured
    pub session_id: String,
    /// Metric the drill targeted
    pub metric: String,
    /// Phase the drill targeted
    pub phase: String,
    /// Name of the prescribed drill
    pub drill_name: String,
    /// Intensity it was prescribed at
    pub intensity: DrillIntensity,
    /// Issue tier at prescription time (e.g. `CRITICAL`)
    pub classification_at_time: String,
    /// Metric value in the prescribing session
    pub pre_value: f64,
    /// Metric value in the measuring session
    pub post_value: f64,
    /// post − pre
    pub delta: f64,
    /// Current-session reliability of the metric, when assessed
    pub reliability: Option<ReliabilityLevel>,
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
}
