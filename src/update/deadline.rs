//! The persisted next-check deadline.
//!
//! A single RFC 3339 timestamp in `<root>/next-check`. It is rewritten at
//! the start of every refresh attempt, never at the end, so invocations
//! racing within one interval see the new deadline and stay off the network.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::Result;
use crate::utils::fs::atomic_write;

#[derive(Debug, Clone)]
pub struct NextCheckDeadline {
    path: PathBuf,
}

impl NextCheckDeadline {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored deadline; `None` when the file is missing or unparsable.
    pub fn read(&self) -> Option<DateTime<Utc>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(deadline) => Some(deadline.with_timezone(&Utc)),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Ignoring unparsable deadline");
                None
            }
        }
    }

    /// Whether a refresh is due at `now`. A missing deadline is due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.read().is_none_or(|deadline| now >= deadline)
    }

    /// Persist `at` as the next deadline.
    pub fn schedule(&self, at: DateTime<Utc>) -> Result<()> {
        atomic_write(&self.path, at.to_rfc3339().as_bytes())?;
        debug!(path = %self.path.display(), next_check = %at, "Scheduled next check");
        Ok(())
    }
}
