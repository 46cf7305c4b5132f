use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::collectors::SOURCE_NAMES;
use crate::error::ConfigError;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobscout", about = "Collect, filter and deduplicate job postings")]
pub struct Cli {
    /// Search configuration file (JSON)
    #[arg(long, env = "JOBSCOUT_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Database connection URL (required by every command except `sources`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect from every configured source and store the new jobs (default)
    Run {
        /// Only run these sources, in this order
        #[arg(long, num_args = 1..)]
        sources: Vec<String>,

        /// Test mode: at most 5 jobs per source
        #[arg(long)]
        test: bool,

        /// Directory for the summary report and any unsaved batch
        #[arg(long, env = "SUMMARY_DIR", default_value = ".")]
        summary_dir: PathBuf,
    },
    /// Show stored job counts by source and status
    Stats,
    /// Update the application status of a stored job
    SetStatus {
        /// Application link of the job
        link: String,

        /// New status, e.g. "Applied"
        status: String,
    },
    /// List the available sources
    Sources,
}

impl Cli {
    /// Resolve the command, defaulting to Run if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            sources: Vec::new(),
            test: false,
            summary_dir: std::env::var_os("SUMMARY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

pub const TEST_MODE_MAX_JOBS: usize = 5;

/// Upper bound on `delay_between_requests`, in seconds.
pub const MAX_DELAY_SECS: f64 = 300.0;

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// What to search for and how politely. Loaded from JSON before anything
/// touches the network.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub location: String,
    #[serde(default = "default_max_jobs")]
    pub max_jobs_per_site: usize,
    /// Seconds.
    #[serde(default = "default_delay")]
    pub delay_between_requests: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds, per attempt.
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    /// Source names in run order. Empty means every known source.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
}

fn default_max_jobs() -> usize {
    50
}

fn default_delay() -> f64 {
    2.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agents() -> Vec<String> {
    DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

impl SearchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Empty("keywords"));
        }
        if self.location.trim().is_empty() {
            return Err(ConfigError::Empty("location"));
        }
        if self.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(ConfigError::Empty("user_agents"));
        }
        if self.max_jobs_per_site == 0 {
            return Err(ConfigError::NotPositive("max_jobs_per_site"));
        }
        if !self.delay_between_requests.is_finite() || self.delay_between_requests < 0.0 {
            return Err(ConfigError::NotPositive("delay_between_requests"));
        }
        if self.delay_between_requests > MAX_DELAY_SECS
            || Duration::try_from_secs_f64(self.delay_between_requests).is_err()
        {
            return Err(ConfigError::TooLarge {
                field: "delay_between_requests",
                max: MAX_DELAY_SECS,
            });
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::NotPositive("request_timeout"));
        }
        if let Some(unknown) = self
            .sources
            .iter()
            .find(|s| !SOURCE_NAMES.contains(&s.as_str()))
        {
            return Err(ConfigError::UnknownSource(unknown.clone()));
        }
        Ok(())
    }

    /// Sources to run, in order: the CLI selection if given, otherwise the
    /// configured list, otherwise every known source.
    pub fn selected_sources(&self, cli_sources: &[String]) -> Result<Vec<String>, ConfigError> {
        let chosen: Vec<String> = if !cli_sources.is_empty() {
            cli_sources.to_vec()
        } else if !self.sources.is_empty() {
            self.sources.clone()
        } else {
            SOURCE_NAMES.iter().map(|s| s.to_string()).collect()
        };
        if let Some(unknown) = chosen.iter().find(|s| !SOURCE_NAMES.contains(&s.as_str())) {
            return Err(ConfigError::UnknownSource(unknown.clone()));
        }
        Ok(chosen)
    }
}
