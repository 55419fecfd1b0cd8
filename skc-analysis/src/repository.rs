//! Session history and outcome ledger access
//!
//! The analysis core never traverses the filesystem directly: prior-session
//! summaries and the append-only drill outcome ledger flow through the
//! `SessionRepository` trait. `FsSessionRepository` is the production
//! JSON-on-disk implementation; `MemorySessionRepository` backs tests and
//! embedded use.
//!
//! Readers must tolerate a missing, partially written, or corrupted store:
//! any parse failure reads as "no historical data", never as an error.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use skc_common::types::{DrillOutcomeRecord, SessionSummary};
use skc_common::{Error, Result};
use tracing::{debug, warn};

/// Session id timestamp layout (`2026-08-07_10-30-00`)
const SESSION_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Ledger file name under the repository base directory
const OUTCOME_LEDGER_FILE: &str = "drill_outcomes.json";

/// Summary file name inside each session directory
const SUMMARY_FILE: &str = "summary.json";

/// Generate a session id from a timestamp.
///
/// The format sorts lexicographically in chronological order, which is what
/// `latest_session_before` relies on.
pub fn generate_session_id(at: DateTime<Utc>) -> String {
    at.format(SESSION_ID_FORMAT).to_string()
}

/// Whether a string is a well-formed session id
pub fn is_session_id(candidate: &str) -> bool {
    NaiveDateTime::parse_from_str(candidate, SESSION_ID_FORMAT).is_ok()
}

/// Read access to prior sessions and append access to the outcome ledger
pub trait SessionRepository {
    /// Most recent persisted session strictly preceding `session_id`.
    ///
    /// `Ok(None)` is the expected first-session state; an unparsable summary
    /// for the located session also reads as `Ok(None)`.
    fn latest_session_before(&self, session_id: &str) -> Result<Option<SessionSummary>>;

    /// Persist a session summary
    fn save_summary(&self, summary: &SessionSummary) -> Result<()>;

    /// Append new outcome records to the ledger (existing records are never
    /// rewritten or deleted)
    fn append_outcomes(&self, outcomes: &[DrillOutcomeRecord]) -> Result<()>;

    /// Full outcome ledger; empty when missing or unreadable
    fn load_outcomes(&self) -> Result<Vec<DrillOutcomeRecord>>;
}

/// In-memory repository for tests and embedded use
#[derive(Default)]
pub struct MemorySessionRepository {
    summaries: Mutex<Vec<SessionSummary>>,
    outcomes: Mutex<Vec<DrillOutcomeRecord>>,
}

impl MemorySessionRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRepository for MemorySessionRepository {
    fn latest_session_before(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let summaries = self
            .summaries
            .lock()
            .map_err(|_| Error::Internal("Session store lock poisoned".to_string()))?;

        Ok(summaries
            .iter()
            .filter(|s| s.session_id.as_str() < session_id)
            .max_by(|a, b| a.session_id.cmp(&b.session_id))
            .cloned())
    }

    fn save_summary(&self, summary: &SessionSummary) -> Result<()> {
        let mut summaries = self
            .summaries
            .lock()
            .map_err(|_| Error::Internal("Session store lock poisoned".to_string()))?;
        summaries.retain(|s| s.session_id != summary.session_id);
        summaries.push(summary.clone());
        Ok(())
    }

    fn append_outcomes(&self, outcomes: &[DrillOutcomeRecord]) -> Result<()> {
        let mut ledger = self
            .outcomes
            .lock()
            .map_err(|_| Error::Internal("Outcome ledger lock poisoned".to_string()))?;
        ledger.extend_from_slice(outcomes);
        Ok(())
    }

    fn load_outcomes(&self) -> Result<Vec<DrillOutcomeRecord>> {
        let ledger = self
            .outcomes
            .lock()
            .map_err(|_| Error::Internal("Outcome ledger lock poisoned".to_string()))?;
        Ok(ledger.clone())
    }
}

/// JSON-on-disk repository: one directory per session under a base
/// directory, plus the outcome ledger file at the base
pub struct FsSessionRepository {
    base_dir: PathBuf,
}

impl FsSessionRepository {
    /// Create a repository rooted at `base_dir` (created lazily on write)
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn summary_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(session_id).join(SUMMARY_FILE)
    }

    fn ledger_path(&self) -> PathBuf {
        self.base_dir.join(OUTCOME_LEDGER_FILE)
    }

    /// Session ids persisted under the base directory, unsorted
    fn session_ids(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_session_id(name))
            .collect()
    }

    fn read_summary(&self, session_id: &str) -> Option<SessionSummary> {
        let path = self.summary_path(session_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Prior session summary not readable, treating as no history"
                );
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Prior session summary not parsable, treating as no history"
                );
                None
            }
        }
    }
}

impl SessionRepository for FsSessionRepository {
    fn latest_session_before(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let latest = self
            .session_ids()
            .into_iter()
            .filter(|id| id.as_str() < session_id)
            .max();

        let Some(latest) = latest else {
            debug!(session_id, "No prior session found");
            return Ok(None);
        };

        Ok(self.read_summary(&latest))
    }

    fn save_summary(&self, summary: &SessionSummary) -> Result<()> {
        let dir = self.base_dir.join(&summary.session_id);
        fs::create_dir_all(&dir)?;

        let content = serde_json::to_string_pretty(summary)
            .map_err(|e| Error::Internal(format!("Summary serialization failed: {}", e)))?;
        fs::write(self.summary_path(&summary.session_id), content)?;
        Ok(())
    }

    fn append_outcomes(&self, outcomes: &[DrillOutcomeRecord]) -> Result<()> {
        if outcomes.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.base_dir)?;

        // Read-extend-write of new records only; a corrupt ledger starts
        // fresh rather than failing the append.
        let mut ledger = self.load_outcomes()?;
        ledger.extend_from_slice(outcomes);

        let content = serde_json::to_string_pretty(&ledger)
            .map_err(|e| Error::Internal(format!("Ledger serialization failed: {}", e)))?;
        fs::write(self.ledger_path(), content)?;
        Ok(())
    }

    fn load_outcomes(&self) -> Result<Vec<DrillOutcomeRecord>> {
        let path = self.ledger_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Ok(Vec::new()),
        };

        match serde_json::from_str(&content) {
            Ok(outcomes) => Ok(outcomes),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Outcome ledger not parsable, treating as empty"
                );
                Ok(Vec::new())
            }
        }
    }
}
