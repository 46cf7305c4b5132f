use std::path::PathBuf;

/// Problems with the search configuration. Fatal at startup, before any
/// collector runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Config field '{0}' must not be empty")]
    Empty(&'static str),

    #[error("Config field '{0}' must be greater than zero")]
    NotPositive(&'static str),

    #[error("Config field '{field}' must be at most {max}")]
    TooLarge { field: &'static str, max: f64 },

    #[error("Unknown source '{0}'")]
    UnknownSource(String),
}

/// A fetch that produced no usable response. Callers treat this as "this
/// attempt failed", never as "the source has zero jobs".
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("No response from {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Browser session failed: {0}")]
    Browser(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Why a single listing was not turned into a record. The batch always
/// carries on past these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("listing has no title node")]
    NoTitleNode,

    #[error("required field '{0}' is empty")]
    MissingField(&'static str),

    #[error("not relevant to the configured keywords")]
    Irrelevant,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid selector for {site}.{field}: {selector}")]
    Selector {
        site: &'static str,
        field: &'static str,
        selector: &'static str,
    },
}
