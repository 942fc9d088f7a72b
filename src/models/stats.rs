//! Run statistics.

use chrono::{DateTime, Utc};

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub entries_parsed: usize,
    pub entries_unique: usize,
    pub entries_valid: usize,
    pub entries_invalid: usize,
    /// Whether the run fell back to the backup playlist
    pub used_backup: bool,
}

impl RunStats {
    pub fn begin(sources_total: usize) -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            sources_total,
            sources_failed: 0,
            entries_parsed: 0,
            entries_unique: 0,
            entries_valid: 0,
            entries_invalid: 0,
            used_backup: false,
        }
    }

    pub fn elapsed_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}
