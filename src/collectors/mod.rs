// Collector layer: one declarative listing spec per job board behind a
// common trait, plus the orchestrator that runs them.

pub mod backend;
pub mod extract;
pub mod listing;
pub mod runner;
pub mod sites;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::SearchConfig;
use crate::error::{ExtractError, FetchError};
use crate::fetch::ResilientFetcher;
use crate::models::job::JobRecord;
use crate::relevance::RelevanceFilter;

use self::backend::{HttpBackend, PageBackend, WebDriverBackend};
use self::listing::ListingCollector;
use self::sites::{BackendKind, Site};

/// Trait that all job sources implement.
///
/// `collect` never fails past its own boundary: per-listing problems skip
/// that listing, and an unreachable source yields an empty list. It returns
/// at most `max_jobs` records, all filtered and validated.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    /// Short name used on the command line and in reports.
    fn name(&self) -> &str;

    async fn collect(&self, max_jobs: usize) -> Vec<JobRecord>;
}

/// Every known source, in the order they run by default.
pub const SOURCE_NAMES: &[&str] = &["timesjobs", "indeed", "linkedin", "naukri", "glassdoor"];

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Unknown source '{0}'")]
    Unknown(String),
}

/// Instantiate the named collectors, preserving the given order.
pub fn build_collectors(
    names: &[String],
    config: &SearchConfig,
    today: NaiveDate,
) -> Result<Vec<Arc<dyn SourceCollector>>, BuildError> {
    let search = Arc::new(config.clone());
    let filter = Arc::new(RelevanceFilter::new(
        &config.keywords,
        &config.exclude_keywords,
    ));
    let fetcher = ResilientFetcher::from_config(config)?;

    names
        .iter()
        .map(|name| {
            let site = sites::site(name).ok_or_else(|| BuildError::Unknown(name.clone()))?;
            let backend = backend_for(site, &fetcher, config);
            let collector = ListingCollector::new(
                site,
                backend,
                Arc::clone(&filter),
                Arc::clone(&search),
                today,
            )?;
            Ok(Arc::new(collector) as Arc<dyn SourceCollector>)
        })
        .collect()
}

fn backend_for(
    site: &'static Site,
    fetcher: &ResilientFetcher,
    config: &SearchConfig,
) -> Arc<dyn PageBackend> {
    match site.backend {
        BackendKind::Http { referer } => Arc::new(HttpBackend::new(fetcher.clone(), referer)),
        BackendKind::WebDriver => Arc::new(WebDriverBackend::new(
            config.webdriver_url.clone(),
            config.user_agents.clone(),
            fetcher.pacing().clone(),
            std::time::Duration::from_secs(config.request_timeout),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SearchConfig {
        SearchConfig::from_json(
            r#"{"keywords": ["sap"], "exclude_keywords": [], "location": "Pune"}"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_every_known_source_in_order() {
        let names: Vec<String> = SOURCE_NAMES.iter().map(|s| s.to_string()).collect();
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let collectors = build_collectors(&names, &config(), today).unwrap();
        let built: Vec<&str> = collectors.iter().map(|c| c.name()).collect();
        assert_eq!(built, SOURCE_NAMES);
    }

    #[test]
    fn unknown_source_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let result = build_collectors(&["monster".to_string()], &config(), today);
        assert!(matches!(result, Err(BuildError::Unknown(name)) if name == "monster"));
    }
}
