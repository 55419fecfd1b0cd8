//! Composite issue prioritization and tier classification
//!
//! Fuses cue severity, measurement reliability, phase importance,
//! intra-phase consistency, and session-over-session progress into one
//! composite priority score per issue, then assigns an action tier through
//! an ordered predicate list (first match wins, provable default SUPPRESS).
//!
//! Stateless: every session reclassifies from scratch; only the progress
//! delta carries history forward.

use serde::{Deserialize, Serialize};
use skc_common::config::{AnalysisConfig, PriorityParams};
use skc_common::types::{MetricKind, ProgressDelta, ProgressStatus, ReliabilityLevel};

use super::cue_ranker::CoachingCue;
use super::reliability_assessor::{PhaseStability, ReliabilityRecord};

/// Points awarded per reliability level
pub const RELIABILITY_POINTS_HIGH: f64 = 25.0;
pub const RELIABILITY_POINTS_MEDIUM: f64 = 15.0;
pub const RELIABILITY_POINTS_LOW: f64 = 5.0;

/// Points awarded for phase importance when the phase is not configured
pub const PHASE_POINTS_DEFAULT: f64 = 10.0;

/// Maximum points contributed by intra-phase consistency
pub const CONSISTENCY_POINTS_MAX: f64 = 15.0;

/// Flat progress modifier applied beyond the progress threshold
pub const PROGRESS_MODIFIER_POINTS: f64 = 10.0;

/// Defaults applied when a cue's metric or phase was not assessed
const DEFAULT_RELIABILITY: ReliabilityLevel = ReliabilityLevel::Medium;
const DEFAULT_STABILITY: f64 = 75.0;

/// Action tier of an adaptive issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueClassification {
    /// Severe, trusted, and consistent: address immediately
    Critical,
    /// Significant and reliably measured: focused work
    Priority,
    /// Improving, noisy-but-notable, or minor: keep watching
    Monitor,
    /// Not trustworthy enough to act on
    Suppress,
}

impl IssueClassification {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueClassification::Critical => "CRITICAL",
            IssueClassification::Priority => "PRIORITY",
            IssueClassification::Monitor => "MONITOR",
            IssueClassification::Suppress => "SUPPRESS",
        }
    }
}

/// Component breakdown of a composite priority score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    /// 0-40 points from deviation magnitude
    pub severity: f64,
    /// 5-25 points from measurement reliability
    pub reliability: f64,
    /// Fixed points from phase importance
    pub phase_importance: f64,
    /// 0-15 points from intra-phase stability
    pub consistency: f64,
    /// -10/0/+10 from session-over-session progress
    pub progress_modifier: f64,
}

/// A coaching cue enriched with trust and history context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveIssue {
    /// The underlying cue
    pub cue: CoachingCue,
    /// Reliability of the cue's metric this session
    pub reliability: ReliabilityLevel,
    /// Stability score of the cue's phase (0-100)
    pub phase_stability: f64,
    /// Linked score delta from the previous session, when one exists
    pub progress_delta: Option<f64>,
    /// Composite priority score
    pub composite_score: f64,
    /// Score components
    pub breakdown: PriorityBreakdown,
    /// Assigned action tier
    pub classification: IssueClassification,
}

/// Classified issue set for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptivePriorities {
    /// All issues, sorted by composite score descending
    pub issues: Vec<AdaptiveIssue>,
    /// The top issues by composite score (display view)
    pub top: Vec<AdaptiveIssue>,
}

impl AdaptivePriorities {
    /// Issues in a given tier, preserving the composite ordering
    pub fn in_tier(&self, tier: IssueClassification) -> Vec<&AdaptiveIssue> {
        self.issues
            .iter()
            .filter(|i| i.classification == tier)
            .collect()
    }
}

/// Adaptive priority engine
pub struct AdaptivePrioritizer {
    params: PriorityParams,
    config: AnalysisConfig,
    /// (phase key, points) pairs; domain-tuned for the reference motion
    phase_points: Vec<(String, f64)>,
}

impl AdaptivePrioritizer {
    /// Create a prioritizer from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            params: config.priority.clone(),
            config: config.clone(),
            phase_points: vec![
                ("contact".to_string(), 20.0),
                ("load".to_string(), 15.0),
                ("follow_through".to_string(), 12.0),
                ("preparation".to_string(), 8.0),
            ],
        }
    }

    /// Replace the phase importance point table (for other motions)
    pub fn with_phase_points(mut self, phase_points: Vec<(String, f64)>) -> Self {
        self.phase_points = phase_points;
        self
    }

    /// Score and classify every candidate cue.
    ///
    /// Missing reliability defaults to Medium and missing stability to 75;
    /// a missing progress delta contributes nothing.
    pub fn prioritize(
        &self,
        cues: &[CoachingCue],
        reliability: &[ReliabilityRecord],
        stability: &[PhaseStability],
        progress: &[ProgressDelta],
    ) -> AdaptivePriorities {
        let mut issues: Vec<AdaptiveIssue> = cues
            .iter()
            .map(|cue| self.score_issue(cue, reliability, stability, progress))
            .collect();

        issues.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| {
                    self.config
                        .phase_index(&a.cue.phase)
                        .cmp(&self.config.phase_index(&b.cue.phase))
                })
                .then_with(|| a.cue.metric.cmp(&b.cue.metric))
        });

        let top = issues
            .iter()
            .take(self.config.display.top_issues)
            .cloned()
            .collect();

        AdaptivePriorities { issues, top }
    }

    fn score_issue(
        &self,
        cue: &CoachingCue,
        reliability: &[ReliabilityRecord],
        stability: &[PhaseStability],
        progress: &[ProgressDelta],
    ) -> AdaptiveIssue {
        let level = reliability
            .iter()
            .find(|r| r.metric == cue.metric)
            .map(|r| r.level)
            .unwrap_or(DEFAULT_RELIABILITY);

        let phase_stability = stability
            .iter()
            .find(|s| s.phase == cue.phase)
            .map(|s| s.score)
            .unwrap_or(DEFAULT_STABILITY);

        let delta_key = format!("phase:{}", cue.phase);
        let delta = progress.iter().find(|d| d.metric_key == delta_key);

        let kind = self
            .config
            .metric(&cue.metric)
            .map(|m| m.kind)
            .unwrap_or(MetricKind::Angular);
        let abs_dev = cue.deviation.abs();

        let breakdown = PriorityBreakdown {
            severity: severity_points(kind, abs_dev),
            reliability: reliability_points(level),
            phase_importance: self.phase_importance(&cue.phase),
            consistency: phase_stability / 100.0 * CONSISTENCY_POINTS_MAX,
            progress_modifier: self.progress_modifier(delta),
        };

        let composite_score = breakdown.severity
            + breakdown.reliability
            + breakdown.phase_importance
            + breakdown.consistency
            + breakdown.progress_modifier;

        let classification = self.classify(kind, abs_dev, level, phase_stability, delta);

        AdaptiveIssue {
            cue: cue.clone(),
            reliability: level,
            phase_stability,
            progress_delta: delta.map(|d| d.delta),
            composite_score,
            breakdown,
            classification,
        }
    }

    fn phase_importance(&self, phase: &str) -> f64 {
        self.phase_points
            .iter()
            .find(|(key, _)| key == phase)
            .map(|(_, points)| *points)
            .unwrap_or(PHASE_POINTS_DEFAULT)
    }

    fn progress_modifier(&self, delta: Option<&ProgressDelta>) -> f64 {
        match delta {
            Some(d) if d.delta <= -self.params.progress_threshold => PROGRESS_MODIFIER_POINTS,
            Some(d) if d.delta >= self.params.progress_threshold => -PROGRESS_MODIFIER_POINTS,
            _ => 0.0,
        }
    }

    /// Ordered predicate dispatch; first match wins, default SUPPRESS
    fn classify(
        &self,
        kind: MetricKind,
        abs_dev: f64,
        level: ReliabilityLevel,
        phase_stability: f64,
        delta: Option<&ProgressDelta>,
    ) -> IssueClassification {
        let severe = abs_dev >= self.severe_threshold(kind);
        let significant = abs_dev >= self.significant_threshold(kind);
        let improving = delta.is_some_and(|d| d.delta >= self.params.progress_threshold);
        let stable = delta.is_some_and(|d| d.status == ProgressStatus::Stable);
        let reliable = level != ReliabilityLevel::Low;

        let rules = [
            (
                severe && level == ReliabilityLevel::High && phase_stability >= 70.0,
                IssueClassification::Critical,
            ),
            (
                significant && reliable && !improving,
                IssueClassification::Priority,
            ),
            (
                improving
                    || (significant && level == ReliabilityLevel::Low)
                    || (stable && !significant && reliable),
                IssueClassification::Monitor,
            ),
            (
                level == ReliabilityLevel::Low && !significant,
                IssueClassification::Suppress,
            ),
        ];

        rules
            .iter()
            .find(|(matched, _)| *matched)
            .map(|(_, tier)| *tier)
            .unwrap_or(IssueClassification::Suppress)
    }

    fn severe_threshold(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Angular => self.params.severe_angular,
            MetricKind::Normalized => self.params.severe_normalized,
        }
    }

    fn significant_threshold(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Angular => self.params.significant_angular,
            MetricKind::Normalized => self.params.significant_normalized,
        }
    }
}

/// Severity points from deviation magnitude, scaled per metric kind
fn severity_points(kind: MetricKind, abs_dev: f64) -> f64 {
    match kind {
        MetricKind::Angular => {
            if abs_dev >= 80.0 {
                40.0
            } else if abs_dev >= 50.0 {
                35.0
            } else if abs_dev >= 30.0 {
                30.0
            } else if abs_dev >= 20.0 {
                20.0
            } else if abs_dev >= 10.0 {
                10.0
            } else {
                5.0
            }
        }
        MetricKind::Normalized => {
            if abs_dev >= 4.0 {
                40.0
            } else if abs_dev >= 3.0 {
                30.0
            } else if abs_dev >= 2.0 {
                20.0
            } else if abs_dev >= 1.0 {
                10.0
            } else {
                5.0
            }
        }
    }
}

fn reliability_points(level: ReliabilityLevel) -> f64 {
    match level {
        ReliabilityLevel::High => RELIABILITY_POINTS_HIGH,
        ReliabilityLevel::Medium => RELIABILITY_POINTS_MEDIUM,
        ReliabilityLevel::Low => RELIABILITY_POINTS_LOW,
    }
}
