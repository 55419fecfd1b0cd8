//! Phase boundary detection from rotation and speed signals
//!
//! Splits one subject's frame series into the configured ordered phases.
//! The Preparation→Load boundary comes from a percentile threshold on the
//! smoothed rotation signal's frame-to-frame change, Load→Contact from the
//! smoothed speed signal crossing a fraction of its session peak, and the
//! Contact window is a fixed width around the externally detected impact
//! frame. Unusable signals or degenerate boundaries fall back to a
//! proportional split; segmentation never fails for missing data, only for
//! a malformed frame series.

use skc_common::config::{AnalysisConfig, PhaseSpec, SegmentationParams};
use skc_common::types::{FrameRecord, PhaseBoundary};
use skc_common::{Error, Result};
use tracing::{debug, info};

/// Phase segmentation engine for one subject
pub struct PhaseSegmenter {
    phases: Vec<PhaseSpec>,
    params: SegmentationParams,
}

impl PhaseSegmenter {
    /// Create a segmenter from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            phases: config.phases.clone(),
            params: config.segmentation.clone(),
        }
    }

    /// Segment a frame series into ordered, contiguous phase boundaries.
    ///
    /// # Errors
    /// Returns `Error::InvalidInput` for caller contract violations: an
    /// empty or too-short series, frame indices that are not 0-based and
    /// consecutive, or an impact frame outside the frame range. Missing or
    /// NaN signal data is not an error and yields the proportional fallback
    /// split instead.
    pub fn segment(
        &self,
        frames: &[FrameRecord],
        impact_frame: i64,
    ) -> Result<Vec<PhaseBoundary>> {
        self.validate(frames, impact_frame)?;

        let n = frames.len();
        let last = (n - 1) as i64;

        // The signal-driven algorithm is specific to the four-phase motion
        // model; custom phase sets are segmented proportionally.
        if self.phases.len() != 4 {
            info!(
                phase_count = self.phases.len(),
                "Non-standard phase count, using proportional split"
            );
            return Ok(self.proportional_split(n));
        }

        let rotation = collect_signal(frames, &self.params.rotation_signal);
        let speed = collect_signal(frames, &self.params.speed_signal);

        if rotation.iter().all(Option::is_none) || speed.iter().all(Option::is_none) {
            info!(
                rotation_signal = %self.params.rotation_signal,
                speed_signal = %self.params.speed_signal,
                "Segmentation signals missing for the whole sequence, using proportional split"
            );
            return Ok(self.proportional_split(n));
        }

        // Missing rotation values take the series mean, missing speed is
        // treated as no movement.
        let rotation_mean = mean_of_defined(&rotation);
        let rotation: Vec<f64> = rotation
            .iter()
            .map(|v| v.unwrap_or(rotation_mean))
            .collect();
        let speed: Vec<f64> = speed.iter().map(|v| v.unwrap_or(0.0)).collect();

        let rotation_smooth = moving_average(&rotation, self.params.smoothing_window);
        let speed_smooth = moving_average(&speed, self.params.smoothing_window);

        let speed_max = speed_smooth.iter().cloned().fold(f64::MIN, f64::max);
        if speed_max <= 0.0 {
            info!("Speed signal carries no activity, using proportional split");
            return Ok(self.proportional_split(n));
        }

        // Preparation ends at the first significant rotation change.
        let deltas: Vec<f64> = rotation_smooth
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .collect();
        let delta_threshold = percentile(&deltas, self.params.rotation_delta_percentile);

        let prep_search_end = impact_frame.min(
            (n as f64 * self.params.preparation_search_fraction) as i64,
        );
        let prep_end = (1..n as i64)
            .filter(|&i| i < prep_search_end)
            .find(|&i| deltas[(i - 1) as usize] > delta_threshold)
            .unwrap_or_else(|| ((impact_frame as f64 * 0.3) as i64).max(1));

        // Load ends when the speed signal starts accelerating.
        let speed_threshold = speed_max * self.params.speed_onset_fraction;
        let load_end = ((prep_end + 1)..impact_frame)
            .find(|&i| speed_smooth[i as usize] > speed_threshold)
            .unwrap_or_else(|| ((impact_frame as f64 * 0.6) as i64).max(prep_end + 1));

        // Contact is a fixed window centered on the impact frame; Load
        // stretches to meet it so boundaries stay contiguous.
        let contact_end = (impact_frame + self.params.contact_half_width).min(last);
        let contact_start = (impact_frame - self.params.contact_half_width).max(load_end + 1);

        let boundaries = vec![
            PhaseBoundary::new(&self.phases[0].key, 0, prep_end),
            PhaseBoundary::new(&self.phases[1].key, prep_end + 1, contact_start - 1),
            PhaseBoundary::new(&self.phases[2].key, contact_start, contact_end),
            PhaseBoundary::new(&self.phases[3].key, contact_end + 1, last),
        ];

        if !boundaries_are_well_formed(&boundaries, last) {
            info!(
                impact_frame,
                prep_end, contact_start, contact_end, "Degenerate boundaries, using proportional split"
            );
            return Ok(self.proportional_split(n));
        }

        debug!(
            prep_end,
            load_end = contact_start - 1,
            contact_start,
            contact_end,
            "Segmented frame series"
        );

        Ok(boundaries)
    }

    /// Detect an approximate impact frame as the speed signal's peak.
    ///
    /// For callers without an externally detected impact frame. Falls back
    /// to the middle frame when the speed signal is entirely missing.
    pub fn detect_impact_frame(&self, frames: &[FrameRecord]) -> i64 {
        let speed = collect_signal(frames, &self.params.speed_signal);

        speed
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i as i64)
            .unwrap_or((frames.len() / 2) as i64)
    }

    /// Proportional fallback split over `n` frames.
    ///
    /// Uses the configured per-phase fractions (uniform when the fraction
    /// list does not match the phase count), guaranteeing at least one frame
    /// per phase for any series with `n >= phase count`.
    fn proportional_split(&self, n: usize) -> Vec<PhaseBoundary> {
        let phase_count = self.phases.len();
        let fractions: Vec<f64> = if self.params.fallback_split.len() == phase_count {
            self.params.fallback_split.clone()
        } else {
            vec![1.0 / phase_count as f64; phase_count]
        };
        let total: f64 = fractions.iter().sum();

        let mut boundaries = Vec::with_capacity(phase_count);
        let mut start = 0i64;
        let mut cumulative = 0.0;

        for (idx, fraction) in fractions.iter().enumerate() {
            cumulative += fraction / total;
            let remaining_phases = (phase_count - idx - 1) as i64;

            let end = if idx == phase_count - 1 {
                (n - 1) as i64
            } else {
                let raw = (cumulative * n as f64).round() as i64 - 1;
                raw.clamp(start, (n as i64 - 1) - remaining_phases)
            };

            boundaries.push(PhaseBoundary::new(&self.phases[idx].key, start, end));
            start = end + 1;
        }

        boundaries
    }

    /// Fail-fast validation of the caller contract
    fn validate(&self, frames: &[FrameRecord], impact_frame: i64) -> Result<()> {
        if frames.len() < self.phases.len() {
            return Err(Error::InvalidInput(format!(
                "Frame series has {} frames but {} phases are configured",
                frames.len(),
                self.phases.len()
            )));
        }

        for (position, frame) in frames.iter().enumerate() {
            if frame.frame_index != position as i64 {
                return Err(Error::InvalidInput(format!(
                    "Frame indices must be 0-based and consecutive: expected {} at position {}, got {}",
                    position, position, frame.frame_index
                )));
            }
        }

        let last = (frames.len() - 1) as i64;
        if impact_frame < 0 || impact_frame > last {
            return Err(Error::InvalidInput(format!(
                "Impact frame {} outside frame range 0..={}",
                impact_frame, last
            )));
        }

        Ok(())
    }
}

/// Per-frame signal values, `None` where missing or non-finite
fn collect_signal(frames: &[FrameRecord], metric: &str) -> Vec<Option<f64>> {
    frames.iter().map(|f| f.value(metric)).collect()
}

fn mean_of_defined(values: &[Option<f64>]) -> f64 {
    let defined: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    if defined.is_empty() {
        return 0.0;
    }
    defined.iter().sum::<f64>() / defined.len() as f64
}

/// Centered moving average, shrinking the window at the edges
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.is_empty() || window <= 1 {
        return values.to_vec();
    }

    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(values.len() - 1);
            let slice = &values[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Linearly interpolated percentile, `p` in [0,1]
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

/// Contiguous, non-overlapping, positive-length, covering [0, last]
fn boundaries_are_well_formed(boundaries: &[PhaseBoundary], last: i64) -> bool {
    if boundaries.is_empty() || boundaries[0].start_frame != 0 {
        return false;
    }

    for pair in boundaries.windows(2) {
        if pair[1].start_frame != pair[0].end_frame + 1 {
            return false;
        }
    }

    boundaries.iter().all(|b| b.start_frame <= b.end_frame)
        && boundaries.last().map(|b| b.end_frame) == Some(last)
}
