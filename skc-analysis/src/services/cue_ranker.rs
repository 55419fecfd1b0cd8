//! Deviation-ranked coaching cues
//!
//! Emits one candidate cue per (metric, phase) pair with a defined
//! deviation, scored by |deviation| x metric cue weight x phase weight.
//! Phase-specific overrides capture domain knowledge such as hip coiling
//! mattering most while loading. The top of the ranking feeds the displayed
//! focus lists; the full candidate set feeds the adaptive engine.

use serde::{Deserialize, Serialize};
use skc_common::config::AnalysisConfig;
use skc_common::types::PhaseMetrics;

/// One candidate coaching cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingCue {
    /// Metric the cue addresses
    pub metric: String,
    /// Phase key the cue applies to
    pub phase: String,
    /// Signed deviation, practitioner − reference
    pub deviation: f64,
    /// |deviation| x metric cue weight x phase weight
    pub priority_score: f64,
    /// Human-readable coaching text
    pub text: String,
}

/// Ranked cue lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCues {
    /// Top-K cues for today's focus
    pub primary: Vec<CoachingCue>,
    /// Top-N ranked list for display
    pub ranked: Vec<CoachingCue>,
    /// Every candidate, sorted; consumed by the adaptive engine
    pub all: Vec<CoachingCue>,
}

/// Cue ranking engine
pub struct CueRanker {
    config: AnalysisConfig,
}

impl CueRanker {
    /// Create a ranker from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Rank cues over paired phase metrics.
    ///
    /// Sorted by priority descending; ties break by phase order then metric
    /// name so repeated runs are identical.
    pub fn rank(
        &self,
        practitioner: &[PhaseMetrics],
        reference: &[PhaseMetrics],
    ) -> RankedCues {
        let mut all = Vec::new();

        for phase in &self.config.phases {
            let (Some(user), Some(reference)) = (
                practitioner.iter().find(|m| m.phase == phase.key),
                reference.iter().find(|m| m.phase == phase.key),
            ) else {
                continue;
            };

            for spec in &self.config.metrics {
                let (Some(user_val), Some(ref_val)) =
                    (user.value(&spec.name), reference.value(&spec.name))
                else {
                    continue;
                };

                let deviation = user_val - ref_val;
                let weight = self.config.cue_weight(&phase.key, &spec.name);
                let priority_score = deviation.abs() * weight * phase.weight;

                all.push(CoachingCue {
                    metric: spec.name.clone(),
                    phase: phase.key.clone(),
                    deviation,
                    priority_score,
                    text: cue_text(&spec.name, &phase.name, deviation),
                });
            }
        }

        all.sort_by(|a, b| {
            b.priority_score
                .total_cmp(&a.priority_score)
                .then_with(|| {
                    self.config
                        .phase_index(&a.phase)
                        .cmp(&self.config.phase_index(&b.phase))
                })
                .then_with(|| a.metric.cmp(&b.metric))
        });

        RankedCues {
            primary: all
                .iter()
                .take(self.config.display.primary_cues)
                .cloned()
                .collect(),
            ranked: all
                .iter()
                .take(self.config.display.ranked_cues)
                .cloned()
                .collect(),
            all,
        }
    }
}

/// Directional coaching text for a metric deviation.
///
/// `deviation > 0` means the practitioner's value is above the reference.
fn cue_text(metric: &str, phase_name: &str, deviation: f64) -> String {
    let above = deviation > 0.0;

    let body = if metric.contains("elbow") {
        if above {
            "Bend your elbow more; the arm is straighter than the reference"
        } else {
            "Allow your elbow to extend more for added reach and racquet speed"
        }
    } else if metric.contains("shoulder") {
        if above {
            "Relax the shoulder turn; it opens wider than the reference"
        } else {
            "Turn your shoulders earlier and more completely"
        }
    } else if metric.contains("knee") {
        if above {
            "Bend your knees more; a lower base adds power from the ground up"
        } else {
            "Avoid over-crouching; rise slightly for quicker recovery"
        }
    } else if metric.contains("hip") && metric.contains("rotation") {
        if above {
            "Control your hip rotation; over-rotation costs timing and balance"
        } else {
            "Rotate your hips more; engage the lower body instead of the arms"
        }
    } else if metric.contains("spine") || metric.contains("lean") {
        if above {
            "Stay more upright; excessive lean affects balance"
        } else {
            "Lean into the motion slightly more for better weight transfer"
        }
    } else if metric.contains("stance") || metric.contains("width") {
        if above {
            "Narrow your stance slightly; too wide limits rotation and recovery"
        } else {
            "Widen your stance for a more stable base"
        }
    } else if above {
        return format!("[{}] Reduce {} toward the reference value", phase_name, metric);
    } else {
        return format!("[{}] Increase {} toward the reference value", phase_name, metric);
    };

    format!("[{}] {}", phase_name, body)
}
