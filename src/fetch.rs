use std::future::Future;
use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, USER_AGENT};

use crate::config::SearchConfig;
use crate::error::FetchError;

/// Request pacing shared by every remote page load.
///
/// A wait of `delay` plus up to `jitter` precedes every attempt, the first
/// one included. After a failed attempt `n` there is an additional linear
/// backoff of `delay * n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    pub delay: Duration,
    pub jitter: Duration,
    pub max_retries: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            jitter: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

impl Pacing {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            delay: Duration::try_from_secs_f64(config.delay_between_requests)
                .unwrap_or(Self::default().delay),
            max_retries: config.max_retries,
            ..Self::default()
        }
    }

    /// Attempts made before giving up; never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    fn pre_attempt_wait(&self) -> Duration {
        self.delay
            .saturating_add(self.jitter.mul_f64(rand::random::<f64>()))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }
}

/// Run `op` under `pacing` until it succeeds or the attempts run out.
///
/// `op` receives the 1-based attempt number. Exhaustion is reported as
/// [`FetchError::Exhausted`], which callers treat as "no data this time".
pub async fn retry_paced<T, F, Fut>(pacing: &Pacing, url: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let attempts = pacing.attempts();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        tokio::time::sleep(pacing.pre_attempt_wait()).await;

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                tracing::warn!(url, attempt, max_attempts = attempts, %error, "Request failed");
                last_error = error;
                if attempt < attempts {
                    tokio::time::sleep(pacing.backoff(attempt)).await;
                }
            }
        }
    }

    Err(FetchError::Exhausted {
        url: url.to_string(),
        attempts,
        last_error,
    })
}

/// HTTP GET with pacing, bounded retries and a rotating user agent.
#[derive(Clone)]
pub struct ResilientFetcher {
    client: reqwest::Client,
    user_agents: Vec<String>,
    pacing: Pacing,
}

impl ResilientFetcher {
    pub fn new(
        user_agents: Vec<String>,
        pacing: Pacing,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agents,
            pacing,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, FetchError> {
        Self::new(
            config.user_agents.clone(),
            Pacing::from_config(config),
            Duration::from_secs(config.request_timeout),
        )
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    pub fn random_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
    }

    /// Fetch `url` and return the body. Non-2xx statuses, connection errors
    /// and timeouts all count as failed attempts.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<String, FetchError> {
        retry_paced(&self.pacing, url, |attempt| async move {
            let mut request = self.client.get(url).headers(headers.clone());
            if let Some(agent) = self.random_user_agent() {
                request = request.header(USER_AGENT, agent);
            }
            tracing::debug!(url, attempt, "Fetching page");

            let response = request.send().await.map_err(|e| e.to_string())?;
            let response = response.error_for_status().map_err(|e| e.to_string())?;
            response.text().await.map_err(|e| e.to_string())
        })
        .await
    }
}
