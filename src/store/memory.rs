//! In-process store used by the orchestrator tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::job::JobRow;
use crate::models::run::RunReport;
use crate::store::{JobStore, StoreStats};

#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<JobRow>>,
    pub runs: Mutex<Vec<RunReport>>,
    pub appends: Mutex<usize>,
    unreachable: bool,
    fail_known_links: bool,
    fail_append: bool,
}

fn down() -> StoreError {
    StoreError::Connection("connection refused".to_string())
}

impl MemoryStore {
    pub fn with_rows(rows: Vec<JobRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn failing_append() -> Self {
        Self {
            fail_append: true,
            ..Self::default()
        }
    }

    pub fn failing_known_links() -> Self {
        Self {
            fail_known_links: true,
            ..Self::default()
        }
    }

    pub fn links(&self) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.job.link.clone())
            .collect()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        if self.unreachable { Err(down()) } else { Ok(()) }
    }

    async fn known_links(&self) -> Result<HashSet<String>, StoreError> {
        if self.unreachable || self.fail_known_links {
            return Err(down());
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.job.has_link())
            .map(|r| r.job.link.clone())
            .collect())
    }

    async fn append(&self, rows: &[JobRow]) -> Result<usize, StoreError> {
        *self.appends.lock().unwrap() += 1;
        if self.unreachable || self.fail_append {
            return Err(down());
        }
        let mut stored = self.rows.lock().unwrap();
        let mut added = 0;
        for row in rows {
            let taken = row.job.has_link() && stored.iter().any(|r| r.job.link == row.job.link);
            if !taken {
                stored.push(row.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut by_source = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        for row in rows.iter() {
            *by_source.entry(row.job.source.clone()).or_insert(0) += 1;
            *by_status.entry(row.status.clone()).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total: rows.len() as i64,
            by_source: by_source.into_iter().collect(),
            by_status: by_status.into_iter().collect(),
        })
    }

    async fn update_status(&self, link: &str, status: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.job.has_link() && r.job.link == link) {
            Some(row) => {
                row.status = status.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_run(&self, report: &RunReport) -> Result<(), StoreError> {
        self.runs.lock().unwrap().push(report.clone());
        Ok(())
    }
}
