use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::job::JobRow;

/// Orchestration phases, in the only order they can occur. `Failed` can
/// follow any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Collecting,
    Aggregated,
    Deduplicated,
    Persisted,
    Reported,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Init => "init",
            RunPhase::Collecting => "collecting",
            RunPhase::Aggregated => "aggregated",
            RunPhase::Deduplicated => "deduplicated",
            RunPhase::Persisted => "persisted",
            RunPhase::Reported => "reported",
            RunPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Returned at least one record.
    Collected,
    /// Returned nothing: unreachable, blocked, or genuinely empty.
    Empty,
    /// Panicked; treated like an empty result.
    Failed,
    /// Never started because the run was interrupted.
    Skipped,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Collected => "ok",
            SourceStatus::Empty => "empty",
            SourceStatus::Failed => "failed",
            SourceStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub collected: usize,
    /// Records from this source left after deduplication. Rows the store
    /// refuses later are not taken off here; see [`RunReport::store_rejected`].
    pub kept: usize,
    pub status: SourceStatus,
}

/// Counts for one orchestration run.
///
/// `total_collected == new_jobs + duplicates_removed` holds for every
/// report the orchestrator produces. Rows the store itself refused are
/// counted in both `duplicates_removed` and `store_rejected`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scraped_date: NaiveDate,
    pub phase: RunPhase,
    pub total_collected: usize,
    pub new_jobs: usize,
    pub duplicates_removed: usize,
    pub store_rejected: usize,
    /// Size of the known-links snapshot the batch was checked against.
    pub existing_count: usize,
    pub sources: Vec<SourceSummary>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>, scraped_date: NaiveDate) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            scraped_date,
            phase: RunPhase::Init,
            total_collected: 0,
            new_jobs: 0,
            duplicates_removed: 0,
            store_rejected: 0,
            existing_count: 0,
            sources: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn counts_balance(&self) -> bool {
        self.total_collected == self.new_jobs + self.duplicates_removed
    }
}

/// How a run ended, as seen by the caller.
#[derive(Debug)]
pub enum RunOutcome {
    /// No store connection at startup; nothing was collected.
    StoreUnavailable(StoreError),
    /// The batch reached the store. Zero new jobs and failed sources both
    /// end up here, the latter with warnings.
    Completed(RunReport),
    /// Collection and deduplication finished but the write did not. The
    /// batch that should have been written is handed back.
    PersistFailed {
        report: RunReport,
        pending: Vec<JobRow>,
        error: StoreError,
    },
    /// Stopped between collectors. Nothing was written.
    Interrupted {
        report: RunReport,
        pending: Vec<JobRow>,
    },
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::StoreUnavailable(_) => None,
            RunOutcome::Completed(report)
            | RunOutcome::PersistFailed { report, .. }
            | RunOutcome::Interrupted { report, .. } => Some(report),
        }
    }

    /// Rows computed but not stored, if any.
    pub fn pending(&self) -> &[JobRow] {
        match self {
            RunOutcome::PersistFailed { pending, .. } | RunOutcome::Interrupted { pending, .. } => {
                pending
            }
            _ => &[],
        }
    }
}
