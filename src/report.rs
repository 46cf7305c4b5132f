use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::config::SearchConfig;
use crate::models::job::JobRow;
use crate::models::run::RunReport;
use crate::store::StoreStats;

fn file_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y%m%d_%H%M%S").to_string()
}

/// Plain-text run summary. `stats` is whatever the store reported after
/// the run, if it could be read.
pub fn render_summary(
    report: &RunReport,
    config: &SearchConfig,
    stats: Option<&StoreStats>,
) -> String {
    let mut out = String::new();
    let generated = report.finished_at.with_timezone(&Local);

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Job Scraping Summary Report");
    let _ = writeln!(out, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Run: {} ({})", report.run_id, report.phase);
    let _ = writeln!(out);

    let _ = writeln!(out, "Results:");
    let _ = writeln!(out, "  Total jobs found:   {}", report.total_collected);
    let _ = writeln!(out, "  New jobs added:     {}", report.new_jobs);
    let _ = writeln!(out, "  Duplicates removed: {}", report.duplicates_removed);
    if report.store_rejected > 0 {
        let _ = writeln!(out, "    (rejected by store: {})", report.store_rejected);
    }
    let _ = writeln!(out, "  Existing jobs:      {}", report.existing_count);
    let _ = writeln!(out);

    let _ = writeln!(out, "Search Criteria:");
    let _ = writeln!(out, "  Keywords: {}", config.keywords.join(", "));
    if !config.exclude_keywords.is_empty() {
        let _ = writeln!(out, "  Excluding: {}", config.exclude_keywords.join(", "));
    }
    let _ = writeln!(out, "  Location: {}", config.location);
    let _ = writeln!(out, "  Max jobs per site: {}", config.max_jobs_per_site);
    let _ = writeln!(out);

    let _ = writeln!(out, "Sources:");
    for source in &report.sources {
        let _ = writeln!(
            out,
            "  {:<10} {:<8} collected {:>3}, after dedup {:>3}",
            source.name,
            source.status.as_str(),
            source.collected,
            source.kept
        );
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Warnings:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    if let Some(stats) = stats {
        let _ = writeln!(out);
        let _ = writeln!(out, "Store Statistics:");
        let _ = write!(out, "{}", render_stats(stats));
    }

    out
}

pub fn render_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Total jobs stored: {}", stats.total);
    if !stats.by_source.is_empty() {
        let _ = writeln!(out, "  By source:");
        for (source, count) in &stats.by_source {
            let _ = writeln!(out, "    {source}: {count}");
        }
    }
    if !stats.by_status.is_empty() {
        let _ = writeln!(out, "  By status:");
        for (status, count) in &stats.by_status {
            let _ = writeln!(out, "    {status}: {count}");
        }
    }
    out
}

/// Write `summary` to `<dir>/scraping_summary_<stamp>.txt`.
pub fn write_summary(dir: &Path, report: &RunReport, summary: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("scraping_summary_{}.txt", file_stamp(report.finished_at)));
    std::fs::write(&path, summary)?;
    Ok(path)
}

/// Save rows that were computed but not stored so they can be imported by
/// hand or retried.
pub fn export_pending(
    dir: &Path,
    report: &RunReport,
    pending: &[JobRow],
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("pending_jobs_{}.json", file_stamp(report.finished_at)));
    let json = serde_json::to_string_pretty(pending)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
