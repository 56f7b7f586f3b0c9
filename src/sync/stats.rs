//! Counters for one harvest run

use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct SyncStats {
    /// Items stored for the first time
    pub inserted: u64,

    /// Items that replaced an existing record
    pub replaced: u64,

    /// Items without an identity key, inserted as-is
    pub degraded: u64,

    /// Passes aborted by an error and restarted
    pub failed_passes: u64,

    pub started_at: DateTime<Utc>,
}

impl Default for SyncStats {
    fn default() -> Self {
        Self {
            inserted: 0,
            replaced: 0,
            degraded: 0,
            failed_passes: 0,
            started_at: Utc::now(),
        }
    }
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total items written to storage
    pub fn processed(&self) -> u64 {
        self.inserted + self.replaced + self.degraded
    }

    /// Renders the summary used in logs and notification mails
    pub fn summary(&self) -> String {
        let elapsed = Utc::now() - self.started_at;
        let minutes = elapsed.num_seconds() as f64 / 60.0;
        let rate = if minutes > 0.0 {
            self.processed() as f64 / minutes
        } else {
            0.0
        };

        let mut out = String::new();
        let _ = writeln!(out, "Started: {}", self.started_at.to_rfc3339());
        let _ = writeln!(out, "Items processed: {}", self.processed());
        let _ = writeln!(out, "  inserted: {}", self.inserted);
        let _ = writeln!(out, "  replaced: {}", self.replaced);
        if self.degraded > 0 {
            let _ = writeln!(out, "  without identity key: {}", self.degraded);
        }
        if self.failed_passes > 0 {
            let _ = writeln!(out, "Restarts after errors: {}", self.failed_passes);
        }
        let _ = write!(out, "Duration: {:.1} min ({:.1} items/min)", minutes, rate);
        out
    }
}
