//! Session-over-session progress deltas
//!
//! Compares the current session's scores against the most recent prior
//! session and classifies each change with a symmetric dead zone. A missing
//! or unreadable prior session is the expected first-session state and
//! yields an empty result, never an error.

use skc_common::config::AnalysisConfig;
use skc_common::types::{ProgressDelta, ProgressStatus, SessionSummary};
use skc_common::Result;
use tracing::{debug, info};

use crate::repository::SessionRepository;

/// Progress tracker
pub struct ProgressTracker {
    dead_zone: f64,
}

impl ProgressTracker {
    /// Create a tracker from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            dead_zone: config.progress.dead_zone,
        }
    }

    /// Classify a score change (positive delta is improvement)
    pub fn classify(&self, delta: f64) -> ProgressStatus {
        if delta >= self.dead_zone {
            ProgressStatus::Improved
        } else if delta <= -self.dead_zone {
            ProgressStatus::Regressed
        } else {
            ProgressStatus::Stable
        }
    }

    /// Deltas for every scalar comparable between two summaries.
    ///
    /// Keys: `overall_score`, `phase_weighted_score`, and `phase:<key>` for
    /// each phase score present in both sessions.
    pub fn deltas(
        &self,
        current: &SessionSummary,
        previous: &SessionSummary,
    ) -> Vec<ProgressDelta> {
        let mut deltas = vec![
            self.delta("overall_score", current.overall_score, previous.overall_score),
            self.delta(
                "phase_weighted_score",
                current.phase_weighted_score,
                previous.phase_weighted_score,
            ),
        ];

        for (phase, current_score) in &current.phase_scores {
            if let Some(previous_score) = previous.phase_scores.get(phase) {
                deltas.push(self.delta(
                    &format!("phase:{}", phase),
                    *current_score,
                    *previous_score,
                ));
            }
        }

        deltas
    }

    /// Deltas against the repository's most recent prior session.
    ///
    /// The empty result is the normal first-session state.
    pub fn track(
        &self,
        current: &SessionSummary,
        repository: &dyn SessionRepository,
    ) -> Result<Vec<ProgressDelta>> {
        match repository.latest_session_before(&current.session_id)? {
            Some(previous) => {
                debug!(
                    previous_session = %previous.session_id,
                    "Computing progress against prior session"
                );
                Ok(self.deltas(current, &previous))
            }
            None => {
                info!(
                    session_id = %current.session_id,
                    "No prior session, skipping progress tracking"
                );
                Ok(Vec::new())
            }
        }
    }

    fn delta(&self, key: &str, current: f64, previous: f64) -> ProgressDelta {
        let delta = current - previous;
        ProgressDelta {
            metric_key: key.to_string(),
            current_value: current,
            previous_value: previous,
            delta,
            status: self.classify(delta),
        }
    }
}
