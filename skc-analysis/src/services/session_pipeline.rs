//! Synchronous end-to-end session analysis
//!
//! Runs the components in strict dependency order for one session: segment
//! both subjects, aggregate phase and impact metrics, score both similarity
//! families, assess practitioner reliability and stability, rank cues, fetch
//! progress against the prior session, classify adaptive issues, and build
//! the drill plan. Each session is analyzed by exactly one invocation; a
//! failed run is re-run from scratch, never resumed.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skc_common::config::AnalysisConfig;
use skc_common::types::{
    DrillOutcomeRecord, FrameRecord, PhaseBoundary, PhaseMetrics, ProgressDelta, SessionSummary,
};
use skc_common::Result;
use tracing::{debug, info};

use crate::repository::SessionRepository;

use super::adaptive_prioritizer::{AdaptivePrioritizer, AdaptivePriorities};
use super::cue_ranker::{CueRanker, RankedCues};
use super::drill_confidence::{DrillConfidence, DrillConfidenceScorer};
use super::drill_recommender::{DrillPlan, DrillRecommender};
use super::metrics_aggregator::MetricsAggregator;
use super::outcome_tracker::OutcomeTracker;
use super::phase_segmenter::PhaseSegmenter;
use super::progress_tracker::ProgressTracker;
use super::reliability_assessor::{PhaseStability, ReliabilityAssessor, ReliabilityRecord};
use super::similarity_scorer::{PatternScores, RuleScores, SimilarityScorer};

/// One subject's inputs to a session analysis
#[derive(Debug, Clone)]
pub struct SubjectFrames {
    /// Ordered frame series from the pose/feature pipeline
    pub frames: Vec<FrameRecord>,
    /// Externally detected impact frame
    pub impact_frame: i64,
}

/// Everything a session analysis exposes to collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalysis {
    /// Session identifier
    pub session_id: String,
    /// Practitioner phase boundaries
    pub practitioner_boundaries: Vec<PhaseBoundary>,
    /// Reference phase boundaries
    pub reference_boundaries: Vec<PhaseBoundary>,
    /// Practitioner per-phase aggregates
    pub practitioner_phase_metrics: Vec<PhaseMetrics>,
    /// Reference per-phase aggregates
    pub reference_phase_metrics: Vec<PhaseMetrics>,
    /// Practitioner impact-window aggregates
    pub practitioner_impact_metrics: HashMap<String, f64>,
    /// Reference impact-window aggregates
    pub reference_impact_metrics: HashMap<String, f64>,
    /// Rule-model similarity scores
    pub rule_scores: RuleScores,
    /// Pattern-model similarity scores
    pub pattern_scores: PatternScores,
    /// Practitioner per-metric reliability
    pub reliability: Vec<ReliabilityRecord>,
    /// Practitioner per-phase stability
    pub phase_stability: Vec<PhaseStability>,
    /// Ranked coaching cues
    pub cues: RankedCues,
    /// Progress deltas against the prior session (empty on first session)
    pub progress: Vec<ProgressDelta>,
    /// Classified adaptive issues
    pub priorities: AdaptivePriorities,
    /// Drill recommendations per tier
    pub drill_plan: DrillPlan,
    /// The summary to persist for future sessions
    pub summary: SessionSummary,
}

/// Session analysis pipeline
pub struct SessionPipeline {
    segmenter: PhaseSegmenter,
    aggregator: MetricsAggregator,
    scorer: SimilarityScorer,
    assessor: ReliabilityAssessor,
    ranker: CueRanker,
    prioritizer: AdaptivePrioritizer,
    tracker: ProgressTracker,
    recommender: DrillRecommender,
    outcome_tracker: OutcomeTracker,
    confidence_scorer: DrillConfidenceScorer,
}

impl SessionPipeline {
    /// Build a pipeline; the configuration is threaded into every component
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            segmenter: PhaseSegmenter::new(config),
            aggregator: MetricsAggregator::new(config),
            scorer: SimilarityScorer::new(config),
            assessor: ReliabilityAssessor::new(config),
            ranker: CueRanker::new(config),
            prioritizer: AdaptivePrioritizer::new(config),
            tracker: ProgressTracker::new(config),
            recommender: DrillRecommender::new(config),
            outcome_tracker: OutcomeTracker::new(),
            confidence_scorer: DrillConfidenceScorer::new(),
        }
    }

    /// Analyze one session.
    ///
    /// # Errors
    /// Only caller contract violations (malformed frame series, impact frame
    /// out of range) propagate; missing metrics, unusable signals, and
    /// absent history all degrade to partial-but-valid output.
    pub fn analyze(
        &self,
        session_id: &str,
        practitioner: &SubjectFrames,
        reference: &SubjectFrames,
        repository: &dyn SessionRepository,
    ) -> Result<SessionAnalysis> {
        info!(session_id, "Starting session analysis");

        let practitioner_boundaries = self
            .segmenter
            .segment(&practitioner.frames, practitioner.impact_frame)
            .map_err(|e| tag_subject("practitioner", e))?;
        let reference_boundaries = self
            .segmenter
            .segment(&reference.frames, reference.impact_frame)
            .map_err(|e| tag_subject("reference", e))?;

        let practitioner_phase_metrics = self
            .aggregator
            .aggregate(&practitioner.frames, &practitioner_boundaries);
        let reference_phase_metrics = self
            .aggregator
            .aggregate(&reference.frames, &reference_boundaries);

        let practitioner_impact_metrics = self
            .aggregator
            .impact_metrics(&practitioner.frames, practitioner.impact_frame);
        let reference_impact_metrics = self
            .aggregator
            .impact_metrics(&reference.frames, reference.impact_frame);

        let rule_scores = self
            .scorer
            .rule_scores(&practitioner_phase_metrics, &reference_phase_metrics);
        let pattern_scores = self
            .scorer
            .pattern_scores(&practitioner_phase_metrics, &reference_phase_metrics);
        let overall_score = self
            .scorer
            .rule_score_flat(&practitioner_impact_metrics, &reference_impact_metrics);

        let reliability = self.assessor.assess(&practitioner.frames);
        let phase_stability = self
            .assessor
            .phase_stability(&practitioner.frames, &practitioner_boundaries);

        let cues = self
            .ranker
            .rank(&practitioner_phase_metrics, &reference_phase_metrics);

        let summary = SessionSummary {
            session_id: session_id.to_string(),
            overall_score,
            phase_weighted_score: rule_scores.overall,
            phase_scores: rule_scores
                .per_phase
                .iter()
                .map(|p| (p.phase.clone(), p.score))
                .collect(),
            recorded_at: Utc::now(),
        };

        let progress = self.tracker.track(&summary, repository)?;

        let priorities =
            self.prioritizer
                .prioritize(&cues.all, &reliability, &phase_stability, &progress);

        let drill_plan = self.recommender.recommend(&priorities);

        debug!(
            session_id,
            overall_score,
            phase_weighted_score = summary.phase_weighted_score,
            cue_count = cues.all.len(),
            issue_count = priorities.issues.len(),
            "Session analysis complete"
        );

        Ok(SessionAnalysis {
            session_id: session_id.to_string(),
            practitioner_boundaries,
            reference_boundaries,
            practitioner_phase_metrics,
            reference_phase_metrics,
            practitioner_impact_metrics,
            reference_impact_metrics,
            rule_scores,
            pattern_scores,
            reliability,
            phase_stability,
            cues,
            progress,
            priorities,
            drill_plan,
            summary,
        })
    }

    /// Build outcome records for a completed session against the prior
    /// session's plan and metrics, and append them to the ledger.
    ///
    /// Pure learning layer: no effect on this or future analyses beyond the
    /// ledger contents read by the confidence scorer.
    pub fn record_outcomes(
        &self,
        prior_session_id: &str,
        prior_plan: &DrillPlan,
        prior_phase_metrics: &[PhaseMetrics],
        analysis: &SessionAnalysis,
        repository: &dyn SessionRepository,
    ) -> Result<Vec<DrillOutcomeRecord>> {
        let outcomes = self.outcome_tracker.track(
            prior_session_id,
            &analysis.session_id,
            prior_plan,
            prior_phase_metrics,
            &analysis.practitioner_phase_metrics,
            &analysis.reliability,
            Utc::now(),
        );

        repository.append_outcomes(&outcomes)?;
        Ok(outcomes)
    }

    /// The on-demand drill confidence table over the full ledger
    pub fn drill_confidence_table(
        &self,
        repository: &dyn SessionRepository,
    ) -> Result<Vec<DrillConfidence>> {
        let outcomes = repository.load_outcomes()?;
        Ok(self.confidence_scorer.score(&outcomes))
    }
}

/// Name the subject whose input violated the caller contract
fn tag_subject(subject: &str, error: skc_common::Error) -> skc_common::Error {
    match error {
        skc_common::Error::InvalidInput(message) => {
            skc_common::Error::InvalidInput(format!("{}: {}", subject, message))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemorySessionRepository;

    fn subject(n: usize, impact: usize, hip_offset: f64) -> SubjectFrames {
        let frames = (0..n)
            .map(|i| {
                let rotation = if i < n / 4 {
                    5.0 + hip_offset
                } else {
                    5.0 + hip_offset + (i - n / 4) as f64 * 6.0
                };
                let speed = if i <= impact {
                    (i as f64 / impact as f64) * 80.0
                } else {
                    (80.0 - (i - impact) as f64 * 8.0).max(2.0)
                };
                FrameRecord::new(i as i64)
                    .with_value("hip_rotation", rotation)
                    .with_value("combined_wrist_speed", speed)
                    .with_value("left_elbow_angle", 120.0 + hip_offset)
                    .with_value("spine_lean", 10.0)
            })
            .collect();

        SubjectFrames {
            frames,
            impact_frame: impact as i64,
        }
    }

    #[test]
    fn analyze_produces_a_complete_result() {
        let pipeline = SessionPipeline::new(&AnalysisConfig::default());
        let repo = MemorySessionRepository::new();

        let analysis = pipeline
            .analyze(
                "2026-08-07_10-00-00",
                &subject(60, 40, 10.0),
                &subject(60, 40, 0.0),
                &repo,
            )
            .unwrap();

        assert_eq!(analysis.practitioner_boundaries.len(), 4);
        assert_eq!(analysis.reference_boundaries.len(), 4);
        assert_eq!(analysis.practitioner_phase_metrics.len(), 4);
        assert!(!analysis.rule_scores.per_phase.is_empty());
        assert!(!analysis.pattern_scores.per_phase.is_empty());
        assert!(!analysis.reliability.is_empty());
        assert!(!analysis.cues.all.is_empty());
        // First session: no progress data
        assert!(analysis.progress.is_empty());
        // At least the fallback recommendation exists
        assert!(!analysis.drill_plan.all().is_empty());
        assert_eq!(analysis.summary.session_id, "2026-08-07_10-00-00");
    }

    #[test]
    fn malformed_input_propagates() {
        let pipeline = SessionPipeline::new(&AnalysisConfig::default());
        let repo = MemorySessionRepository::new();
        let mut bad = subject(60, 40, 0.0);
        bad.impact_frame = 500;

        assert!(pipeline
            .analyze("2026-08-07_10-00-00", &bad, &subject(60, 40, 0.0), &repo)
            .is_err());
    }

    #[test]
    fn second_session_sees_progress() {
        use crate::repository::SessionRepository as _;

        let pipeline = SessionPipeline::new(&AnalysisConfig::default());
        let repo = MemorySessionRepository::new();

        let first = pipeline
            .analyze(
                "2026-08-01_10-00-00",
                &subject(60, 40, 10.0),
                &subject(60, 40, 0.0),
                &repo,
            )
            .unwrap();
        repo.save_summary(&first.summary).unwrap();

        let second = pipeline
            .analyze(
                "2026-08-07_10-00-00",
                &subject(60, 40, 10.0),
                &subject(60, 40, 0.0),
                &repo,
            )
            .unwrap();

        assert!(!second.progress.is_empty());
    }

    #[test]
    fn record_outcomes_appends_to_the_ledger() {
        let pipeline = SessionPipeline::new(&AnalysisConfig::default());
        let repo = MemorySessionRepository::new();

        let first = pipeline
            .analyze(
                "2026-08-01_10-00-00",
                &subject(60, 40, 40.0),
                &subject(60, 40, 0.0),
                &repo,
            )
            .unwrap();

        let second = pipeline
            .analyze(
                "2026-08-07_10-00-00",
                &subject(60, 40, 20.0),
                &subject(60, 40, 0.0),
                &repo,
            )
            .unwrap();

        let outcomes = pipeline
            .record_outcomes(
                &first.session_id,
                &first.drill_plan,
                &first.practitioner_phase_metrics,
                &second,
                &repo,
            )
            .unwrap();

        assert!(!outcomes.is_empty());
        let table = pipeline.drill_confidence_table(&repo).unwrap();
        assert!(!table.is_empty());
        for entry in &table {
            assert!(entry.confidence_score >= 0.0 && entry.confidence_score <= 1.0);
        }
    }
}
