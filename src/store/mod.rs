// Persistence for collected jobs and run history.

pub mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::job::JobRow;
use crate::models::run::RunReport;

pub use self::postgres::PgJobStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub by_source: Vec<(String, i64)>,
    pub by_status: Vec<(String, i64)>,
}

/// The durable side of the pipeline. The store is the only writer of the
/// `status` column after a row's first insert.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Cheap round-trip proving the store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Every non-empty link already stored.
    async fn known_links(&self) -> Result<HashSet<String>, StoreError>;

    /// Write `rows` and return how many were actually added. Rows whose
    /// link is already present are skipped, not errors.
    async fn append(&self, rows: &[JobRow]) -> Result<usize, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Returns false when no stored job has `link`.
    async fn update_status(&self, link: &str, status: &str) -> Result<bool, StoreError>;

    async fn record_run(&self, report: &RunReport) -> Result<(), StoreError>;
}
