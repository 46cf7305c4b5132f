//! Collector and backend doubles shared by the collector and runner tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::collectors::SourceCollector;
use crate::collectors::backend::{PageBackend, PageSession};
use crate::collectors::runner::Interrupt;
use crate::config::SearchConfig;
use crate::error::FetchError;
use crate::models::job::JobRecord;

pub fn test_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

pub fn search_config() -> SearchConfig {
    SearchConfig::from_json(
        r#"{"keywords": ["SAP FICO", "abap", "sap mm", "basis"], "exclude_keywords": ["intern", "fresher"], "location": "Pune"}"#,
    )
    .unwrap()
}

/// Returns a fixed batch.
pub struct StaticCollector {
    name: &'static str,
    jobs: Vec<JobRecord>,
}

impl StaticCollector {
    pub fn new(name: &'static str, jobs: Vec<JobRecord>) -> Self {
        Self { name, jobs }
    }
}

#[async_trait]
impl SourceCollector for StaticCollector {
    fn name(&self) -> &str {
        self.name
    }

    async fn collect(&self, _max_jobs: usize) -> Vec<JobRecord> {
        self.jobs.clone()
    }
}

/// A source that could not be reached.
pub struct FailingCollector(pub &'static str);

#[async_trait]
impl SourceCollector for FailingCollector {
    fn name(&self) -> &str {
        self.0
    }

    async fn collect(&self, _max_jobs: usize) -> Vec<JobRecord> {
        Vec::new()
    }
}

pub struct PanickingCollector(pub &'static str);

#[async_trait]
impl SourceCollector for PanickingCollector {
    fn name(&self) -> &str {
        self.0
    }

    async fn collect(&self, _max_jobs: usize) -> Vec<JobRecord> {
        panic!("extraction blew up");
    }
}

/// Returns its batch and raises the interrupt flag on the way out, as if
/// Ctrl-C arrived while it was running.
pub struct InterruptingCollector {
    pub name: &'static str,
    pub jobs: Vec<JobRecord>,
    pub interrupt: Interrupt,
}

#[async_trait]
impl SourceCollector for InterruptingCollector {
    fn name(&self) -> &str {
        self.name
    }

    async fn collect(&self, _max_jobs: usize) -> Vec<JobRecord> {
        self.interrupt.trigger();
        self.jobs.clone()
    }
}

/// Serves pages from a script; `None` entries (and running off the end)
/// fail the load.
pub struct ScriptedBackend {
    pages: Arc<Mutex<VecDeque<Option<String>>>>,
    reachable: bool,
    panic_on_load: Option<usize>,
    pub loads: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub fn pages<const N: usize>(pages: [Option<&str>; N]) -> Self {
        Self {
            pages: Arc::new(Mutex::new(
                pages.iter().map(|p| p.map(str::to_string)).collect(),
            )),
            reachable: true,
            panic_on_load: None,
            loads: Arc::default(),
            closed: Arc::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::pages([])
        }
    }

    /// Panic inside the `n`th load (1-based) instead of serving a page.
    pub fn panicking_on_load(self, n: usize) -> Self {
        Self {
            panic_on_load: Some(n),
            ..self
        }
    }
}

#[async_trait]
impl PageBackend for ScriptedBackend {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        if !self.reachable {
            return Err(FetchError::Browser("connection refused".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            pages: Arc::clone(&self.pages),
            panic_on_load: self.panic_on_load,
            loads: Arc::clone(&self.loads),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedSession {
    pages: Arc<Mutex<VecDeque<Option<String>>>>,
    panic_on_load: Option<usize>,
    loads: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn load(&mut self, url: &str) -> Result<String, FetchError> {
        let count = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_load == Some(count) {
            panic!("page parser blew up on load {count}");
        }
        let next = self.pages.lock().unwrap().pop_front().flatten();
        next.ok_or_else(|| FetchError::Exhausted {
            url: url.to_string(),
            attempts: 3,
            last_error: "503 Service Unavailable".to_string(),
        })
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
