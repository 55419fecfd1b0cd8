//! Drill selection from the static knowledge base
//!
//! Maps each classified issue to a concrete intervention, scaling intensity
//! by action tier: CRITICAL issues get the category's primary drill at
//! intensive volume, PRIORITY issues a moderate prescription, and MONITOR
//! issues that reflect genuine improvement a light maintenance dose.
//! SUPPRESS issues receive no drill, only a count for transparency.

use serde::{Deserialize, Serialize};
use skc_common::config::AnalysisConfig;
use skc_common::types::DrillIntensity;
use tracing::debug;

use super::adaptive_prioritizer::{AdaptivePriorities, AdaptiveIssue, IssueClassification};

/// Intensity-level prescriptions for one drill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityPrescriptions {
    /// Maintenance volume
    pub light: String,
    /// Focused volume
    pub moderate: String,
    /// Highest volume/frequency
    pub intensive: String,
}

impl IntensityPrescriptions {
    /// Prescription text for an intensity level
    pub fn for_level(&self, level: DrillIntensity) -> &str {
        match level {
            DrillIntensity::Light => &self.light,
            DrillIntensity::Moderate => &self.moderate,
            DrillIntensity::Intensive => &self.intensive,
        }
    }
}

/// One drill in the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillRecord {
    /// Drill name
    pub name: String,
    /// What the drill does
    pub description: String,
    /// Metrics the drill addresses
    pub target_metrics: Vec<String>,
    /// Phases the drill helps with
    pub target_phases: Vec<String>,
    /// Prescriptions per intensity level
    pub intensity: IntensityPrescriptions,
    /// Why the drill works
    pub rationale: String,
}

/// Static drill knowledge base, keyed by issue category
#[derive(Debug, Clone)]
pub struct DrillKnowledgeBase {
    categories: Vec<(String, Vec<DrillRecord>)>,
}

impl DrillKnowledgeBase {
    /// Built-in knowledge base for the reference motion
    pub fn builtin() -> Self {
        Self {
            categories: vec![
                (
                    "hip_rotation".to_string(),
                    vec![
                        drill(
                            "Medicine Ball Rotational Throws",
                            "Stand sideways to a wall, rotate hips explosively to throw a medicine ball",
                            &["hip_rotation"],
                            &["load", "contact"],
                            "2 sets x 8 reps, 4-6 lbs ball",
                            "3 sets x 10 reps, 6-8 lbs ball",
                            "4 sets x 12 reps, 8-10 lbs ball, daily",
                            "Builds rotational power and hip coiling mechanics",
                        ),
                        drill(
                            "Hip Rotation Shadow Swings",
                            "Practice the stroke focusing solely on hip rotation, exaggerating the movement",
                            &["hip_rotation"],
                            &["load", "contact"],
                            "50 reps, slow tempo",
                            "100 reps, match tempo",
                            "200 reps daily, with resistance band",
                            "Isolates hip rotation to build muscle memory",
                        ),
                    ],
                ),
                (
                    "elbow_angles".to_string(),
                    vec![
                        drill(
                            "Wall Contact Drill",
                            "Stand close to a wall, practice the stroke keeping elbows compact and close to the body",
                            &["left_elbow_angle", "right_elbow_angle"],
                            &["contact", "load"],
                            "3 sets x 10 reps",
                            "5 sets x 15 reps",
                            "10 sets x 20 reps, add resistance bands",
                            "Enforces proper elbow position and compact arm structure",
                        ),
                        drill(
                            "Elbow-to-Body Connection",
                            "Hold a small towel between elbow and torso during shadow strokes",
                            &["left_elbow_angle", "right_elbow_angle"],
                            &["preparation", "load", "contact"],
                            "50 reps",
                            "100 reps",
                            "200 reps, progress to live balls",
                            "Creates kinesthetic awareness of proper elbow position",
                        ),
                    ],
                ),
                (
                    "knee_stability".to_string(),
                    vec![drill(
                        "Split-Step to Stance Drill",
                        "Practice a split-step followed by a balanced stance, holding for 3 seconds",
                        &["left_knee_angle", "right_knee_angle"],
                        &["preparation", "load"],
                        "2 sets x 10 reps",
                        "3 sets x 15 reps",
                        "5 sets x 20 reps with weights",
                        "Builds lower body stability and balance",
                    )],
                ),
                (
                    "stance_width".to_string(),
                    vec![
                        drill(
                            "Ladder Footwork Drill",
                            "Use an agility ladder, practice split-stepping into a consistent stance width",
                            &["stance_width_normalized"],
                            &["preparation"],
                            "3 minutes",
                            "5 minutes",
                            "10 minutes with shadow strokes",
                            "Develops consistent footwork and stance positioning",
                        ),
                        drill(
                            "Cone Placement Training",
                            "Place cones at optimal foot positions, practice hitting from the marked stance",
                            &["stance_width_normalized"],
                            &["preparation", "load"],
                            "20 balls",
                            "50 balls",
                            "100 balls across multiple sessions",
                            "Provides visual feedback for proper stance width",
                        ),
                    ],
                ),
                (
                    "spine_lean".to_string(),
                    vec![drill(
                        "Mirror Posture Check",
                        "Practice the stroke in front of a mirror, focusing on maintaining the spine angle",
                        &["spine_lean"],
                        &["preparation", "load", "contact"],
                        "5 minutes daily",
                        "10 minutes daily",
                        "15 minutes twice daily with video recording",
                        "Visual feedback for posture correction",
                    )],
                ),
                (
                    "shoulder_stability".to_string(),
                    vec![drill(
                        "Resistance Band Shoulder Rotations",
                        "Use resistance bands to strengthen shoulder stability through the stroke motion",
                        &["left_shoulder_angle", "right_shoulder_angle"],
                        &["preparation", "load"],
                        "2 sets x 10 reps, light band",
                        "3 sets x 15 reps, medium band",
                        "4 sets x 20 reps, heavy band",
                        "Builds shoulder strength and stability",
                    )],
                ),
                (
                    "general_technique".to_string(),
                    vec![
                        drill(
                            "Slow-Motion Shadow Strokes",
                            "Execute the full stroke in slow motion, feeling each phase",
                            &["all"],
                            &["all"],
                            "25 reps",
                            "50 reps",
                            "100 reps with video analysis",
                            "Builds muscle memory and movement awareness",
                        ),
                        drill(
                            "Video Review Sessions",
                            "Record yourself and compare side-by-side with the reference",
                            &["all"],
                            &["all"],
                            "1x per week",
                            "2x per week",
                            "3x per week with detailed notes",
                            "Provides objective feedback on progress",
                        ),
                    ],
                ),
            ],
        }
    }

    /// Drills for an issue category; empty for unknown categories
    pub fn drills(&self, category: &str) -> &[DrillRecord] {
        self.categories
            .iter()
            .find(|(key, _)| key == category)
            .map(|(_, drills)| drills.as_slice())
            .unwrap_or(&[])
    }

    /// Map a metric name to its drill category via keyword rules
    pub fn category_for_metric(metric: &str) -> &'static str {
        let metric = metric.to_lowercase();

        if metric.contains("hip") && metric.contains("rotation") {
            "hip_rotation"
        } else if metric.contains("elbow") {
            "elbow_angles"
        } else if metric.contains("knee") {
            "knee_stability"
        } else if metric.contains("stance") || metric.contains("width") {
            "stance_width"
        } else if metric.contains("spine") || metric.contains("lean") {
            "spine_lean"
        } else if metric.contains("shoulder") {
            "shoulder_stability"
        } else {
            "general_technique"
        }
    }
}

/// One prescribed intervention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillPrescription {
    /// Metric the underlying issue targets
    pub metric: String,
    /// Phase the underlying issue targets
    pub phase: String,
    /// Prescribed drill
    pub drill_name: String,
    /// Drill description
    pub description: String,
    /// Prescribed intensity
    pub intensity: DrillIntensity,
    /// Concrete volume/frequency prescription
    pub prescription: String,
    /// Why this drill
    pub rationale: String,
    /// Composite priority of the driving issue
    pub priority_score: f64,
    /// Short justification tying the drill to the issue
    pub reason: String,
}

/// Recommendations grouped by tier
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DrillPlan {
    /// Intensive prescriptions for CRITICAL issues
    pub critical: Vec<DrillPrescription>,
    /// Moderate prescriptions for PRIORITY issues
    pub priority: Vec<DrillPrescription>,
    /// Light maintenance prescriptions for improving MONITOR issues
    pub maintenance: Vec<DrillPrescription>,
    /// Number of SUPPRESS issues left without a drill
    pub suppressed_count: usize,
}

impl DrillPlan {
    /// Every prescription across tiers
    pub fn all(&self) -> Vec<&DrillPrescription> {
        self.critical
            .iter()
            .chain(self.priority.iter())
            .chain(self.maintenance.iter())
            .collect()
    }
}

/// Drill recommendation engine
pub struct DrillRecommender {
    kb: DrillKnowledgeBase,
    progress_threshold: f64,
    critical_cap: usize,
    priority_cap: usize,
    maintenance_cap: usize,
}

impl DrillRecommender {
    /// Create a recommender with the built-in knowledge base
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_knowledge_base(config, DrillKnowledgeBase::builtin())
    }

    /// Create a recommender with an externally supplied knowledge base
    pub fn with_knowledge_base(config: &AnalysisConfig, kb: DrillKnowledgeBase) -> Self {
        Self {
            kb,
            progress_threshold: config.priority.progress_threshold,
            critical_cap: 3,
            priority_cap: 3,
            maintenance_cap: 2,
        }
    }

    /// Build the drill plan from classified issues.
    ///
    /// A general-technique drill backstops the plan so the practitioner
    /// always receives at least one recommendation.
    pub fn recommend(&self, priorities: &AdaptivePriorities) -> DrillPlan {
        let mut plan = DrillPlan {
            suppressed_count: priorities
                .in_tier(IssueClassification::Suppress)
                .len(),
            ..DrillPlan::default()
        };

        for issue in priorities
            .in_tier(IssueClassification::Critical)
            .into_iter()
            .take(self.critical_cap)
        {
            let category = DrillKnowledgeBase::category_for_metric(&issue.cue.metric);
            let drills = self.kb.drills(category);
            if let Some(drill) = drills.first() {
                plan.critical.push(self.prescribe(
                    issue,
                    drill,
                    DrillIntensity::Intensive,
                    format!(
                        "Critical issue: {:.1} deviation, {} reliability",
                        issue.cue.deviation.abs(),
                        issue.reliability.as_str()
                    ),
                ));
            }
        }

        for issue in priorities
            .in_tier(IssueClassification::Priority)
            .into_iter()
            .take(self.priority_cap)
        {
            let category = DrillKnowledgeBase::category_for_metric(&issue.cue.metric);
            let drills = self.kb.drills(category);
            // Prefer a different drill than the critical tier used
            if let Some(drill) = drills.get(1).or_else(|| drills.first()) {
                plan.priority.push(self.prescribe(
                    issue,
                    drill,
                    DrillIntensity::Moderate,
                    format!(
                        "Priority issue: {:.1} deviation, needs focused work",
                        issue.cue.deviation.abs()
                    ),
                ));
            }
        }

        // Maintenance only for issues that are demonstrably improving, not
        // for low-reliability deferrals
        for issue in priorities
            .in_tier(IssueClassification::Monitor)
            .into_iter()
            .filter(|i| {
                i.progress_delta
                    .is_some_and(|d| d >= self.progress_threshold)
            })
            .take(self.maintenance_cap)
        {
            let category = DrillKnowledgeBase::category_for_metric(&issue.cue.metric);
            if let Some(drill) = self.kb.drills(category).first() {
                plan.maintenance.push(self.prescribe(
                    issue,
                    drill,
                    DrillIntensity::Light,
                    "Currently improving - maintain progress with light practice".to_string(),
                ));
            }
        }

        if plan.critical.is_empty() && plan.priority.is_empty() {
            if let Some(drill) = self.kb.drills("general_technique").first() {
                debug!("No critical or priority issues, falling back to general technique");
                plan.priority.push(DrillPrescription {
                    metric: "general".to_string(),
                    phase: "all".to_string(),
                    drill_name: drill.name.clone(),
                    description: drill.description.clone(),
                    intensity: DrillIntensity::Moderate,
                    prescription: drill.intensity.moderate.clone(),
                    rationale: drill.rationale.clone(),
                    priority_score: 50.0,
                    reason: "General technique refinement".to_string(),
                });
            }
        }

        plan
    }

    fn prescribe(
        &self,
        issue: &AdaptiveIssue,
        drill: &DrillRecord,
        intensity: DrillIntensity,
        reason: String,
    ) -> DrillPrescription {
        DrillPrescription {
            metric: issue.cue.metric.clone(),
            phase: issue.cue.phase.clone(),
            drill_name: drill.name.clone(),
            description: drill.description.clone(),
            intensity,
            prescription: drill.intensity.for_level(intensity).to_string(),
            rationale: drill.rationale.clone(),
            priority_score: issue.composite_score,
            reason,
        }
    }
}

fn drill(
    name: &str,
    description: &str,
    target_metrics: &[&str],
    target_phases: &[&str],
    light: &str,
    moderate: &str,
    intensive: &str,
    rationale: &str,
) -> DrillRecord {
    DrillRecord {
        name: name.to_string(),
        description: description.to_string(),
        target_metrics: target_metrics.iter().map(|s| s.to_string()).collect(),
        target_phases: target_phases.iter().map(|s| s.to_string()).collect(),
        intensity: IntensityPrescriptions {
            light: light.to_string(),
            moderate: moderate.to_string(),
            intensive: intensive.to_string(),
        },
        rationale: rationale.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skc_common::config::AnalysisConfig;
    use skc_common::types::ReliabilityLevel;

    use crate::services::adaptive_prioritizer::{AdaptivePrioritizer, IssueClassification};
    use crate::services::cue_ranker::CoachingCue;
    use crate::services::reliability_assessor::{MetricStats, ReliabilityRecord};

    fn cue(metric: &str, phase: &str, deviation: f64) -> CoachingCue {
        CoachingCue {
            metric: metric.to_string(),
            phase: phase.to_string(),
            deviation,
            priority_score: deviation.abs(),
            text: String::new(),
        }
    }

    fn reliability(metric: &str, level: ReliabilityLevel) -> ReliabilityRecord {
        ReliabilityRecord {
            metric: metric.to_string(),
            stats: MetricStats {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                range: 0.0,
                cv: 0.0,
            },
            level,
        }
    }

    fn priorities_for(
        cues: &[CoachingCue],
        reliability_records: &[ReliabilityRecord],
    ) -> AdaptivePriorities {
        AdaptivePrioritizer::new(&AnalysisConfig::default()).prioritize(
            cues,
            reliability_records,
            &[],
            &[],
        )
    }

    #[test]
    fn metric_category_mapping() {
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("hip_rotation"),
            "hip_rotation"
        );
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("left_elbow_angle"),
            "elbow_angles"
        );
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("right_knee_angle"),
            "knee_stability"
        );
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("stance_width_normalized"),
            "stance_width"
        );
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("spine_lean"),
            "spine_lean"
        );
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("left_shoulder_angle"),
            "shoulder_stability"
        );
        assert_eq!(
            DrillKnowledgeBase::category_for_metric("wrist_snap"),
            "general_technique"
        );
    }

    #[test]
    fn critical_issues_get_intensive_primary_drills() {
        let cues = vec![cue("hip_rotation", "contact", 60.0)];
        let rel = vec![reliability("hip_rotation", ReliabilityLevel::High)];
        let priorities = priorities_for(&cues, &rel);
        assert_eq!(
            priorities.issues[0].classification,
            IssueClassification::Critical
        );

        let plan = DrillRecommender::new(&AnalysisConfig::default()).recommend(&priorities);
        assert_eq!(plan.critical.len(), 1);
        assert_eq!(plan.critical[0].drill_name, "Medicine Ball Rotational Throws");
        assert_eq!(plan.critical[0].intensity, DrillIntensity::Intensive);
        assert!(plan.critical[0].prescription.contains("daily"));
    }

    #[test]
    fn priority_issues_get_the_second_drill_when_available() {
        let cues = vec![cue("hip_rotation", "contact", 25.0)];
        let rel = vec![reliability("hip_rotation", ReliabilityLevel::Medium)];
        let priorities = priorities_for(&cues, &rel);

        let plan = DrillRecommender::new(&AnalysisConfig::default()).recommend(&priorities);
        assert_eq!(plan.priority.len(), 1);
        assert_eq!(plan.priority[0].drill_name, "Hip Rotation Shadow Swings");
        assert_eq!(plan.priority[0].intensity, DrillIntensity::Moderate);
    }

    #[test]
    fn suppressed_issues_are_only_counted() {
        let cues = vec![cue("hip_rotation", "contact", 5.0)];
        let rel = vec![reliability("hip_rotation", ReliabilityLevel::Low)];
        let priorities = priorities_for(&cues, &rel);
        assert_eq!(
            priorities.issues[0].classification,
            IssueClassification::Suppress
        );

        let plan = DrillRecommender::new(&AnalysisConfig::default()).recommend(&priorities);
        assert_eq!(plan.suppressed_count, 1);
        // The fallback still guarantees one recommendation
        assert_eq!(plan.priority.len(), 1);
        assert_eq!(plan.priority[0].metric, "general");
    }

    #[test]
    fn empty_issue_set_falls_back_to_general_technique() {
        let priorities = priorities_for(&[], &[]);
        let plan = DrillRecommender::new(&AnalysisConfig::default()).recommend(&priorities);

        assert!(plan.critical.is_empty());
        assert_eq!(plan.priority.len(), 1);
        assert_eq!(plan.priority[0].drill_name, "Slow-Motion Shadow Strokes");
    }

    #[test]
    fn tier_caps_are_enforced() {
        // Five severe, highly reliable issues across metrics
        let cues: Vec<CoachingCue> = [
            "hip_rotation",
            "left_elbow_angle",
            "right_elbow_angle",
            "spine_lean",
            "left_shoulder_angle",
        ]
        .iter()
        .map(|m| cue(m, "contact", 85.0))
        .collect();
        let rel: Vec<ReliabilityRecord> = cues
            .iter()
            .map(|c| reliability(&c.metric, ReliabilityLevel::High))
            .collect();
        let priorities = priorities_for(&cues, &rel);

        let plan = DrillRecommender::new(&AnalysisConfig::default()).recommend(&priorities);
        assert_eq!(plan.critical.len(), 3);
    }

    #[test]
    fn maintenance_only_for_actively_improving_monitor_issues() {
        use skc_common::types::{ProgressDelta, ProgressStatus};

        let cues = vec![
            cue("hip_rotation", "contact", 25.0),
            cue("spine_lean", "load", 25.0),
        ];
        let rel = vec![
            reliability("hip_rotation", ReliabilityLevel::High),
            // Low reliability deferral: MONITOR but not improving
            reliability("spine_lean", ReliabilityLevel::Low),
        ];
        let deltas = vec![ProgressDelta {
            metric_key: "phase:contact".to_string(),
            current_value: 70.0,
            previous_value: 62.0,
            delta: 8.0,
            status: ProgressStatus::Improved,
        }];

        let priorities = AdaptivePrioritizer::new(&AnalysisConfig::default()).prioritize(
            &cues, &rel, &[], &deltas,
        );
        let monitor = priorities.in_tier(IssueClassification::Monitor);
        assert_eq!(monitor.len(), 2);

        let plan = DrillRecommender::new(&AnalysisConfig::default()).recommend(&priorities);
        assert_eq!(plan.maintenance.len(), 1);
        assert_eq!(plan.maintenance[0].metric, "hip_rotation");
        assert_eq!(plan.maintenance[0].intensity, DrillIntensity::Light);
    }
}
