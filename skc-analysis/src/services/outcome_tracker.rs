//! Outcome ledger records for prescribed drills
//!
//! The learning layer: after a session completes, pairs the prior session's
//! prescriptions with the metric values measured before and after, producing
//! append-only `DrillOutcomeRecord` entries. Pure observation; nothing here
//! feeds back into prioritization or recommendations.

use chrono::{DateTime, Utc};
use skc_common::types::{DrillOutcomeRecord, PhaseMetrics, ReliabilityLevel};
use tracing::debug;

use super::drill_recommender::DrillPlan;
use super::reliability_assessor::ReliabilityRecord;

/// Drill outcome tracker
pub struct OutcomeTracker;

impl OutcomeTracker {
    /// Create a tracker
    pub fn new() -> Self {
        Self
    }

    /// Build outcome records for every drill in the prior session's plan
    /// whose target metric has a value in both sessions' phase metrics.
    ///
    /// General/all-phase prescriptions are skipped (no specific metric to
    /// measure). Reliability comes from the current session's assessment.
    pub fn track(
        &self,
        prior_session_id: &str,
        session_id: &str,
        prior_plan: &DrillPlan,
        prior_metrics: &[PhaseMetrics],
        current_metrics: &[PhaseMetrics],
        reliability: &[ReliabilityRecord],
        recorded_at: DateTime<Utc>,
    ) -> Vec<DrillOutcomeRecord> {
        let mut outcomes = Vec::new();

        for (prescription, tier) in prior_plan
            .critical
            .iter()
            .map(|p| (p, "CRITICAL"))
            .chain(prior_plan.priority.iter().map(|p| (p, "PRIORITY")))
            .chain(prior_plan.maintenance.iter().map(|p| (p, "MONITOR")))
        {
            if prescription.metric == "general" || prescription.phase == "all" {
                continue;
            }

            let pre = phase_metric_value(prior_metrics, &prescription.phase, &prescription.metric);
            let post =
                phase_metric_value(current_metrics, &prescription.phase, &prescription.metric);

            let (Some(pre_value), Some(post_value)) = (pre, post) else {
                continue;
            };

            let metric_reliability: Option<ReliabilityLevel> = reliability
                .iter()
                .find(|r| r.metric == prescription.metric)
                .map(|r| r.level);

            outcomes.push(DrillOutcomeRecord {
                prior_session_id: prior_session_id.to_string(),
                session_id: session_id.to_string(),
                metric: prescription.metric.clone(),
                phase: prescription.phase.clone(),
                drill_name: prescription.drill_name.clone(),
                intensity: prescription.intensity,
                classification_at_time: tier.to_string(),
                pre_value,
                post_value,
                delta: post_value - pre_value,
                reliability: metric_reliability,
                timestamp: recorded_at,
            });
        }

        debug!(
            prior_session_id,
            session_id,
            outcome_count = outcomes.len(),
            "Tracked drill outcomes"
        );

        outcomes
    }
}

impl Default for OutcomeTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn phase_metric_value(metrics: &[PhaseMetrics], phase: &str, metric: &str) -> Option<f64> {
    metrics
        .iter()
        .find(|m| m.phase == phase)
        .and_then(|m| m.value(metric))
}
