use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::FutureExt;

use crate::collectors::SourceCollector;
use crate::collectors::backend::{PageBackend, PageSession};
use crate::collectors::extract::{CompiledSpec, ExtractContext, extract_listings};
use crate::collectors::sites::Site;
use crate::config::SearchConfig;
use crate::error::ExtractError;
use crate::models::job::JobRecord;
use crate::relevance::RelevanceFilter;

/// Collector for a paginated search results board described by a [`Site`].
pub struct ListingCollector {
    site: &'static Site,
    spec: CompiledSpec,
    backend: Arc<dyn PageBackend>,
    filter: Arc<RelevanceFilter>,
    search: Arc<SearchConfig>,
    today: NaiveDate,
}

impl ListingCollector {
    pub fn new(
        site: &'static Site,
        backend: Arc<dyn PageBackend>,
        filter: Arc<RelevanceFilter>,
        search: Arc<SearchConfig>,
        today: NaiveDate,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            site,
            spec: CompiledSpec::compile(site.spec)?,
            backend,
            filter,
            search,
            today,
        })
    }

    /// Walk the result pages until the cap, the page ceiling, a failed load
    /// or a page with nothing worth keeping. Records land in `jobs` as they
    /// are extracted, so a walk cut short still leaves them there.
    async fn collect_pages(
        &self,
        session: &mut dyn PageSession,
        max_jobs: usize,
        jobs: &mut Vec<JobRecord>,
    ) {
        let source = self.site.name;

        for page in 1..=self.site.max_pages {
            let url = (self.site.page_url)(&self.search, page);
            let html = match session.load(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(source, page, "Giving up on source: {e}");
                    break;
                }
            };

            let ctx = ExtractContext {
                filter: &self.filter,
                default_location: &self.search.location,
                today: self.today,
            };
            let mut kept = 0;
            let mut skipped = 0;
            for outcome in extract_listings(&html, &self.spec, &ctx) {
                match outcome {
                    Ok(job) => {
                        kept += 1;
                        if jobs.len() < max_jobs {
                            jobs.push(job);
                        }
                    }
                    Err(reason) => {
                        skipped += 1;
                        tracing::debug!(source, page, %reason, "Skipped listing");
                    }
                }
            }
            tracing::info!(source, page, kept, skipped, total = jobs.len(), "Page processed");

            if kept == 0 {
                tracing::info!(source, page, "No relevant listings on page, stopping");
                break;
            }
            if jobs.len() >= max_jobs {
                break;
            }
        }
    }
}

#[async_trait]
impl SourceCollector for ListingCollector {
    fn name(&self) -> &str {
        self.site.name
    }

    async fn collect(&self, max_jobs: usize) -> Vec<JobRecord> {
        if max_jobs == 0 {
            return Vec::new();
        }
        let mut session = match self.backend.open().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(source = self.site.name, "Cannot open source: {e}");
                return Vec::new();
            }
        };

        let mut jobs = Vec::new();
        let walk = AssertUnwindSafe(self.collect_pages(session.as_mut(), max_jobs, &mut jobs))
            .catch_unwind()
            .await;
        if walk.is_err() {
            tracing::error!(
                source = self.site.name,
                kept = jobs.len(),
                "Page walk panicked, keeping what was already collected"
            );
        }
        session.close().await;
        jobs
    }
}
