//! StrokeCoach analysis pipeline
//!
//! Turns two subjects' per-frame biomechanical time series (practitioner and
//! reference performer) into phase boundaries, similarity scores under two
//! models, reliability assessments, ranked coaching cues, adaptive
//! priorities, drill recommendations, and a historical drill-effectiveness
//! view.
//!
//! All components are synchronous, single-threaded transformations over
//! in-memory data; session history flows through the [`repository`]
//! abstraction rather than direct filesystem traversal.

pub mod repository;
pub mod services;

pub use repository::{FsSessionRepository, MemorySessionRepository, SessionRepository};
pub use services::session_pipeline::{SessionAnalysis, SessionPipeline};
