use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::collectors::SourceCollector;
use crate::dedup::{Deduplication, DuplicateKind, deduplicate};
use crate::models::job::{JobRecord, JobRow};
use crate::models::run::{RunOutcome, RunPhase, RunReport, SourceStatus, SourceSummary};
use crate::store::JobStore;

/// Process-wide stop request. Checked between collectors only; a collector
/// that is already running finishes (and releases its resources) first.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Records collected in one run, with the index into `RunReport::sources`
/// each record came from.
#[derive(Default)]
struct Aggregate {
    records: Vec<JobRecord>,
    origins: Vec<usize>,
}

impl Aggregate {
    fn extend(&mut self, origin: usize, jobs: Vec<JobRecord>) {
        self.origins.extend(std::iter::repeat_n(origin, jobs.len()));
        self.records.extend(jobs);
    }
}

/// Runs collectors one after another, deduplicates their combined output
/// against the store and writes what is new.
pub struct Orchestrator {
    collectors: Vec<Arc<dyn SourceCollector>>,
    store: Arc<dyn JobStore>,
    max_jobs: usize,
    interrupt: Interrupt,
}

impl Orchestrator {
    pub fn new(
        collectors: Vec<Arc<dyn SourceCollector>>,
        store: Arc<dyn JobStore>,
        max_jobs: usize,
    ) -> Self {
        Self {
            collectors,
            store,
            max_jobs,
            interrupt: Interrupt::new(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub async fn run(&self, today: NaiveDate) -> RunOutcome {
        let mut report = RunReport::new(Uuid::new_v4(), Utc::now(), today);
        tracing::info!(run_id = %report.run_id, sources = self.collectors.len(), "Run started");

        if let Err(e) = self.store.health_check().await {
            tracing::error!(run_id = %report.run_id, "Store unavailable, nothing collected: {e}");
            return RunOutcome::StoreUnavailable(e);
        }

        enter(&mut report, RunPhase::Collecting);
        let (aggregate, interrupted) = self.collect_all(&mut report).await;
        report.total_collected = aggregate.records.len();
        enter(&mut report, RunPhase::Aggregated);

        if interrupted {
            let dedup = deduplicate(&aggregate.records, &HashSet::new());
            apply_dedup(&mut report, &aggregate, &dedup);
            let pending = stamp(dedup.unique, today);
            report.new_jobs = pending.len();
            report
                .warnings
                .push("Run interrupted; collected jobs were not stored".to_string());
            self.finish(&mut report, RunPhase::Failed).await;
            return RunOutcome::Interrupted { report, pending };
        }

        let known_links = match self.store.known_links().await {
            Ok(links) => links,
            Err(error) => {
                tracing::error!("Cannot read known links, batch kept for retry: {error}");
                let dedup = deduplicate(&aggregate.records, &HashSet::new());
                apply_dedup(&mut report, &aggregate, &dedup);
                let pending = stamp(dedup.unique, today);
                report.new_jobs = pending.len();
                report.warnings.push(format!("Store read failed: {error}"));
                self.finish(&mut report, RunPhase::Failed).await;
                return RunOutcome::PersistFailed {
                    report,
                    pending,
                    error,
                };
            }
        };
        report.existing_count = known_links.len();

        let dedup = deduplicate(&aggregate.records, &known_links);
        apply_dedup(&mut report, &aggregate, &dedup);
        tracing::info!(
            unique = dedup.unique.len(),
            known = dedup.count(DuplicateKind::KnownLink),
            repeated_link = dedup.count(DuplicateKind::RepeatedLink),
            same_title_company = dedup.count(DuplicateKind::SameTitleCompany),
            "Deduplicated against {} stored links",
            known_links.len()
        );
        enter(&mut report, RunPhase::Deduplicated);

        let rows = stamp(dedup.unique, today);
        if rows.is_empty() {
            tracing::info!("No new jobs to store");
        } else {
            match self.store.append(&rows).await {
                Ok(added) => {
                    let added = added.min(rows.len());
                    report.new_jobs = added;
                    report.store_rejected = rows.len() - added;
                    report.duplicates_removed += report.store_rejected;
                    if report.store_rejected > 0 {
                        tracing::warn!(
                            rejected = report.store_rejected,
                            "Store skipped rows it already had"
                        );
                    }
                    tracing::info!(added, "Stored new jobs");
                }
                Err(error) => {
                    tracing::error!(pending = rows.len(), "Failed to store new jobs: {error}");
                    report.new_jobs = rows.len();
                    report.warnings.push(format!("Store write failed: {error}"));
                    self.finish(&mut report, RunPhase::Failed).await;
                    return RunOutcome::PersistFailed {
                        report,
                        pending: rows,
                        error,
                    };
                }
            }
        }
        enter(&mut report, RunPhase::Persisted);

        self.finish(&mut report, RunPhase::Reported).await;
        RunOutcome::Completed(report)
    }

    /// COLLECTING. Each collector runs in its own task so that a panic
    /// costs only that source. Returns true when stopped by an interrupt.
    async fn collect_all(&self, report: &mut RunReport) -> (Aggregate, bool) {
        let mut aggregate = Aggregate::default();

        for (position, collector) in self.collectors.iter().enumerate() {
            if self.interrupt.is_triggered() {
                tracing::warn!("Interrupted, skipping remaining sources");
                for rest in &self.collectors[position..] {
                    report.sources.push(SourceSummary {
                        name: rest.name().to_string(),
                        collected: 0,
                        kept: 0,
                        status: SourceStatus::Skipped,
                    });
                }
                return (aggregate, true);
            }

            let name = collector.name().to_string();
            tracing::info!(source = %name, "Running collector");

            let task = {
                let collector = Arc::clone(collector);
                let max_jobs = self.max_jobs;
                tokio::spawn(async move { collector.collect(max_jobs).await })
            };
            let (jobs, status) = match task.await {
                Ok(jobs) => {
                    let jobs = self.screen(&name, jobs, report);
                    let status = if jobs.is_empty() {
                        tracing::warn!(source = %name, "Collector returned no jobs");
                        report.warnings.push(format!("{name}: no jobs collected"));
                        SourceStatus::Empty
                    } else {
                        SourceStatus::Collected
                    };
                    (jobs, status)
                }
                Err(e) => {
                    tracing::error!(source = %name, "Collector failed: {e}");
                    report.warnings.push(format!("{name}: collector failed: {e}"));
                    (Vec::new(), SourceStatus::Failed)
                }
            };

            tracing::info!(source = %name, collected = jobs.len(), "Collector finished");
            let origin = report.sources.len();
            report.sources.push(SourceSummary {
                name,
                collected: jobs.len(),
                kept: jobs.len(),
                status,
            });
            aggregate.extend(origin, jobs);
        }

        (aggregate, self.interrupt.is_triggered())
    }

    /// Enforce the collector contract on what came back: the cap and
    /// record validity.
    fn screen(
        &self,
        name: &str,
        mut jobs: Vec<JobRecord>,
        report: &mut RunReport,
    ) -> Vec<JobRecord> {
        if jobs.len() > self.max_jobs {
            tracing::warn!(
                source = name,
                returned = jobs.len(),
                cap = self.max_jobs,
                "Collector exceeded cap, truncating"
            );
            report.warnings.push(format!(
                "{name}: returned {} jobs, truncated to {}",
                jobs.len(),
                self.max_jobs
            ));
            jobs.truncate(self.max_jobs);
        }
        jobs.retain(|job| match job.validate() {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(
                    source = name,
                    title = %job.title,
                    %reason,
                    "Dropping invalid record"
                );
                false
            }
        });
        jobs
    }

    /// REPORTED (or FAILED): stamp the end of the run and record it.
    async fn finish(&self, report: &mut RunReport, phase: RunPhase) {
        report.finished_at = Utc::now();
        enter(report, phase);
        debug_assert!(report.counts_balance());
        tracing::info!(
            run_id = %report.run_id,
            total = report.total_collected,
            new = report.new_jobs,
            duplicates = report.duplicates_removed,
            existing = report.existing_count,
            "Run finished"
        );
        if let Err(e) = self.store.record_run(report).await {
            tracing::warn!(run_id = %report.run_id, "Failed to record run: {e}");
        }
    }
}

fn enter(report: &mut RunReport, phase: RunPhase) {
    tracing::debug!(run_id = %report.run_id, from = %report.phase, to = %phase, "Phase change");
    report.phase = phase;
}

fn apply_dedup(report: &mut RunReport, aggregate: &Aggregate, dedup: &Deduplication) {
    report.duplicates_removed = dedup.duplicates_removed();
    for (index, _) in &dedup.dropped {
        let summary = &mut report.sources[aggregate.origins[*index]];
        summary.kept = summary.kept.saturating_sub(1);
    }
}

fn stamp(jobs: Vec<JobRecord>, scraped_date: NaiveDate) -> Vec<JobRow> {
    jobs.into_iter()
        .map(|job| JobRow::new(job, scraped_date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::{
        FailingCollector, InterruptingCollector, PanickingCollector, StaticCollector, search_config,
        test_today,
    };
    use crate::models::job::STATUS_NOT_APPLIED;
    use crate::models::job::fixtures::record;
    use crate::store::memory::MemoryStore;

    fn orchestrator(
        collectors: Vec<Arc<dyn SourceCollector>>,
        store: &Arc<MemoryStore>,
    ) -> Orchestrator {
        Orchestrator::new(collectors, Arc::clone(store) as Arc<dyn JobStore>, 50)
    }

    fn completed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("expected a completed run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_posting_from_two_sources_keeps_first() {
        let store = Arc::new(MemoryStore::default());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![
            Arc::new(StaticCollector::new(
                "first",
                vec![record("Data Analyst", "Acme", "http://a/1", "first")],
            )),
            Arc::new(StaticCollector::new(
                "second",
                vec![record("Data Analyst", "Acme", "http://a/2", "second")],
            )),
        ];

        let report = completed(orchestrator(collectors, &store).run(test_today()).await);

        assert_eq!(report.total_collected, 2);
        assert_eq!(report.new_jobs, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert!(report.counts_balance());
        assert_eq!(store.links(), vec!["http://a/1"]);
        assert_eq!(report.sources[0].kept, 1);
        assert_eq!(report.sources[1].kept, 0);
    }

    #[tokio::test]
    async fn known_links_are_not_stored_again() {
        let existing = JobRow::new(record("Old", "Acme", "http://a/1", "first"), test_today());
        let store = Arc::new(MemoryStore::with_rows(vec![existing]));
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(StaticCollector::new(
            "first",
            vec![
                record("Data Analyst", "Acme", "http://a/1", "first"),
                record("Data Engineer", "Acme", "http://a/2", "first"),
            ],
        ))];

        let report = completed(orchestrator(collectors, &store).run(test_today()).await);

        assert_eq!(report.existing_count, 1);
        assert_eq!(report.new_jobs, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(store.links(), vec!["http://a/1", "http://a/2"]);
    }

    #[tokio::test]
    async fn rows_are_stamped_by_the_run() {
        let store = Arc::new(MemoryStore::default());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(StaticCollector::new(
            "first",
            vec![record("Data Analyst", "Acme", "http://a/1", "first")],
        ))];
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        completed(orchestrator(collectors, &store).run(today).await);

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows[0].scraped_date, today);
        assert_eq!(rows[0].status, STATUS_NOT_APPLIED);
    }

    #[tokio::test]
    async fn failing_and_panicking_sources_do_not_stop_the_run() {
        let store = Arc::new(MemoryStore::default());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![
            Arc::new(PanickingCollector("broken")),
            Arc::new(FailingCollector("offline")),
            Arc::new(StaticCollector::new(
                "healthy",
                vec![record("Data Analyst", "Acme", "http://a/1", "healthy")],
            )),
        ];

        let report = completed(orchestrator(collectors, &store).run(test_today()).await);

        assert_eq!(report.new_jobs, 1);
        let statuses: Vec<SourceStatus> = report.sources.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![SourceStatus::Failed, SourceStatus::Empty, SourceStatus::Collected]
        );
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.phase, RunPhase::Reported);
    }

    #[tokio::test]
    async fn zero_new_jobs_is_a_normal_run() {
        let store = Arc::new(MemoryStore::default());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(FailingCollector("offline"))];

        let report = completed(orchestrator(collectors, &store).run(test_today()).await);

        assert_eq!(report.total_collected, 0);
        assert_eq!(report.new_jobs, 0);
        assert_eq!(*store.appends.lock().unwrap(), 0);
        assert_eq!(store.runs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_stops_before_collecting() {
        let store = Arc::new(MemoryStore::unreachable());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(PanickingCollector("never"))];

        let outcome = orchestrator(collectors, &store).run(test_today()).await;

        assert!(matches!(outcome, RunOutcome::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_write_hands_back_the_batch() {
        let store = Arc::new(MemoryStore::failing_append());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(StaticCollector::new(
            "first",
            vec![
                record("Data Analyst", "Acme", "http://a/1", "first"),
                record("Data Analyst", "Acme", "http://a/9", "first"),
            ],
        ))];

        let outcome = orchestrator(collectors, &store).run(test_today()).await;

        match outcome {
            RunOutcome::PersistFailed { report, pending, .. } => {
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].job.link, "http://a/1");
                assert_eq!(report.phase, RunPhase::Failed);
                assert!(report.counts_balance());
            }
            other => panic!("expected a persist failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_known_links_keeps_the_batch() {
        let store = Arc::new(MemoryStore::failing_known_links());
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(StaticCollector::new(
            "first",
            vec![record("Data Analyst", "Acme", "http://a/1", "first")],
        ))];

        let outcome = orchestrator(collectors, &store).run(test_today()).await;

        assert!(matches!(
            outcome,
            RunOutcome::PersistFailed { ref pending, .. } if pending.len() == 1
        ));
        assert_eq!(*store.appends.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn store_side_rejections_count_as_duplicates() {
        // The store holds a/1 but reports an empty snapshot, as a concurrent
        // writer would cause.
        struct Racing(MemoryStore);

        #[async_trait::async_trait]
        impl JobStore for Racing {
            async fn health_check(&self) -> Result<(), crate::error::StoreError> {
                Ok(())
            }
            async fn known_links(&self) -> Result<HashSet<String>, crate::error::StoreError> {
                Ok(HashSet::new())
            }
            async fn append(&self, rows: &[JobRow]) -> Result<usize, crate::error::StoreError> {
                self.0.append(rows).await
            }
            async fn stats(&self) -> Result<crate::store::StoreStats, crate::error::StoreError> {
                self.0.stats().await
            }
            async fn update_status(
                &self,
                link: &str,
                status: &str,
            ) -> Result<bool, crate::error::StoreError> {
                self.0.update_status(link, status).await
            }
            async fn record_run(&self, report: &RunReport) -> Result<(), crate::error::StoreError> {
                self.0.record_run(report).await
            }
        }

        let existing = JobRow::new(record("Old", "Acme", "http://a/1", "first"), test_today());
        let store = Arc::new(Racing(MemoryStore::with_rows(vec![existing])));
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(StaticCollector::new(
            "first",
            vec![
                record("Data Analyst", "Acme", "http://a/1", "first"),
                record("Data Engineer", "Acme", "http://a/2", "first"),
            ],
        ))];

        let outcome = Orchestrator::new(collectors, store, 50).run(test_today()).await;
        let report = completed(outcome);

        assert_eq!(report.new_jobs, 1);
        assert_eq!(report.store_rejected, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert!(report.counts_balance());
        // Per-source counts stop at deduplication; the store's refusal shows
        // up only in `store_rejected`.
        assert_eq!(report.sources[0].kept, 2);

        let summary = crate::report::render_summary(&report, &search_config(), None);
        assert!(summary.contains("first      ok       collected   2, after dedup   2"));
        assert!(summary.contains("(rejected by store: 1)"));
    }

    #[tokio::test]
    async fn oversized_batches_are_truncated() {
        let store = Arc::new(MemoryStore::default());
        let jobs = (0..5)
            .map(|i| record(&format!("Analyst {i}"), "Acme", &format!("http://a/{i}"), "first"))
            .collect();
        let collectors: Vec<Arc<dyn SourceCollector>> =
            vec![Arc::new(StaticCollector::new("first", jobs))];

        let outcome = Orchestrator::new(collectors, Arc::clone(&store) as Arc<dyn JobStore>, 3)
            .run(test_today())
            .await;
        let report = completed(outcome);

        assert_eq!(report.total_collected, 3);
        assert_eq!(store.links(), vec!["http://a/0", "http://a/1", "http://a/2"]);
    }

    #[tokio::test]
    async fn invalid_records_never_reach_the_store() {
        let store = Arc::new(MemoryStore::default());
        let mut blank = record("Data Analyst", "Acme", "http://a/1", "first");
        blank.company = "  ".to_string();
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![Arc::new(StaticCollector::new(
            "first",
            vec![blank, record("Data Engineer", "Acme", "http://a/2", "first")],
        ))];

        let report = completed(orchestrator(collectors, &store).run(test_today()).await);

        assert_eq!(report.total_collected, 1);
        assert_eq!(store.links(), vec!["http://a/2"]);
    }

    #[tokio::test]
    async fn interrupt_stops_before_next_collector() {
        let store = Arc::new(MemoryStore::default());
        let interrupt = Interrupt::new();
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![
            Arc::new(InterruptingCollector {
                name: "first",
                jobs: vec![record("Data Analyst", "Acme", "http://a/1", "first")],
                interrupt: interrupt.clone(),
            }),
            Arc::new(PanickingCollector("second")),
        ];

        let outcome = orchestrator(collectors, &store)
            .with_interrupt(interrupt)
            .run(test_today())
            .await;

        match outcome {
            RunOutcome::Interrupted { report, pending } => {
                assert_eq!(pending.len(), 1);
                assert_eq!(report.sources[1].status, SourceStatus::Skipped);
            }
            other => panic!("expected an interrupted run, got {other:?}"),
        }
        assert!(store.links().is_empty());
    }
}
