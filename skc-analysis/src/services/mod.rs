//! Analysis services
//!
//! One module per pipeline component, composed by `session_pipeline` in
//! strict dependency order.

pub mod adaptive_prioritizer;
pub mod cue_ranker;
pub mod drill_confidence;
pub mod drill_recommender;
pub mod metrics_aggregator;
pub mod outcome_tracker;
pub mod phase_segmenter;
pub mod progress_tracker;
pub mod reliability_assessor;
pub mod session_pipeline;
pub mod similarity_scorer;
