use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use crate::error::StoreError;
use crate::models::job::JobRow;
use crate::models::run::RunReport;
use crate::store::{JobStore, StoreStats};

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn as_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        let _: (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn known_links(&self) -> Result<HashSet<String>, StoreError> {
        let links: Vec<String> = sqlx::query_scalar("SELECT link FROM jobs WHERE link <> ''")
            .fetch_all(&self.pool)
            .await?;
        Ok(links.into_iter().collect())
    }

    /// Inserts in one transaction. The partial unique index on `link` is the
    /// last-mile duplicate check; conflicting rows are silently skipped.
    async fn append(&self, rows: &[JobRow]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;

        for row in rows {
            let job = &row.job;
            let result = sqlx::query(
                "INSERT INTO jobs (title, company, location, link, source, posted_date, salary,
                     scraped_date, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (link) WHERE link <> '' DO NOTHING",
            )
            .bind(&job.title)
            .bind(&job.company)
            .bind(&job.location)
            .bind(&job.link)
            .bind(&job.source)
            .bind(job.posted_date)
            .bind(&job.salary)
            .bind(row.scraped_date)
            .bind(&row.status)
            .execute(&mut *tx)
            .await?;
            added += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(added)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        let by_source = sqlx::query_as::<_, (String, i64)>(
            "SELECT source, COUNT(*) FROM jobs GROUP BY source ORDER BY COUNT(*) DESC, source",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_status = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY COUNT(*) DESC, status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(StoreStats {
            total,
            by_source,
            by_status,
        })
    }

    async fn update_status(&self, link: &str, status: &str) -> Result<bool, StoreError> {
        if link.trim().is_empty() {
            return Ok(false);
        }
        let result = sqlx::query("UPDATE jobs SET status = $2 WHERE link = $1")
            .bind(link.trim())
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_run(&self, report: &RunReport) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scrape_runs (id, started_at, finished_at, scraped_date, phase,
                 total_collected, new_jobs, duplicates_removed, store_rejected, existing_count,
                 sources, warnings)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(report.run_id)
        .bind(report.started_at)
        .bind(report.finished_at)
        .bind(report.scraped_date)
        .bind(report.phase.as_str())
        .bind(as_count(report.total_collected))
        .bind(as_count(report.new_jobs))
        .bind(as_count(report.duplicates_removed))
        .bind(as_count(report.store_rejected))
        .bind(as_count(report.existing_count))
        .bind(Json(&report.sources))
        .bind(&report.warnings)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
