//! Shared types, configuration, and error handling for StrokeCoach
//!
//! This crate carries everything the analysis pipeline and its collaborators
//! (persistence, reporting, dashboards) exchange: the frame-level data model,
//! the externally supplied analysis configuration, and the common error type.

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
