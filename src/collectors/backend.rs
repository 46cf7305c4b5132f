use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use thirtyfour::prelude::*;

use crate::error::FetchError;
use crate::fetch::{Pacing, ResilientFetcher, retry_paced};

/// Grace period for client-side rendering after navigation.
const RENDER_SETTLE: Duration = Duration::from_secs(2);

/// Something that can hand out page-loading sessions.
#[async_trait]
pub trait PageBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError>;
}

/// A page-loading session. Opened once per collection and closed on every
/// exit path; `close` must be safe to call more than once.
#[async_trait]
pub trait PageSession: Send {
    async fn load(&mut self, url: &str) -> Result<String, FetchError>;

    async fn close(&mut self);
}

pub struct HttpBackend {
    fetcher: ResilientFetcher,
    headers: HeaderMap,
}

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

impl HttpBackend {
    pub fn new(fetcher: ResilientFetcher, referer: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(REFERER, HeaderValue::from_static(referer));
        Self { fetcher, headers }
    }
}

#[async_trait]
impl PageBackend for HttpBackend {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        Ok(Box::new(HttpSession {
            fetcher: self.fetcher.clone(),
            headers: self.headers.clone(),
        }))
    }
}

struct HttpSession {
    fetcher: ResilientFetcher,
    headers: HeaderMap,
}

#[async_trait]
impl PageSession for HttpSession {
    async fn load(&mut self, url: &str) -> Result<String, FetchError> {
        self.fetcher.fetch(url, &self.headers).await
    }

    async fn close(&mut self) {}
}

/// Headless Chrome driven over WebDriver (chromedriver on `server_url`).
pub struct WebDriverBackend {
    server_url: String,
    user_agents: Vec<String>,
    pacing: Pacing,
    page_timeout: Duration,
}

impl WebDriverBackend {
    pub fn new(
        server_url: String,
        user_agents: Vec<String>,
        pacing: Pacing,
        page_timeout: Duration,
    ) -> Self {
        Self {
            server_url,
            user_agents,
            pacing,
            page_timeout,
        }
    }
}

#[async_trait]
impl PageBackend for WebDriverBackend {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        let mut caps = DesiredCapabilities::chrome();
        let agent = self.user_agents.choose(&mut rand::rng()).cloned();
        let mut args = vec![
            "--headless=new".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--window-size=1920,1080".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
        ];
        if let Some(agent) = agent {
            args.push(format!("--user-agent={agent}"));
        }
        for arg in &args {
            caps.add_arg(arg)
                .map_err(|e| FetchError::Browser(format!("Invalid browser option {arg}: {e}")))?;
        }
        let driver = WebDriver::new(self.server_url.as_str(), caps)
            .await
            .map_err(|e| {
                FetchError::Browser(format!("Cannot start browser via {}: {e}", self.server_url))
            })?;
        tracing::debug!(server = %self.server_url, "Browser session started");

        Ok(Box::new(WebDriverSession {
            driver: Some(driver),
            pacing: self.pacing.clone(),
            page_timeout: self.page_timeout,
        }))
    }
}

struct WebDriverSession {
    driver: Option<WebDriver>,
    pacing: Pacing,
    page_timeout: Duration,
}

async fn render(driver: &WebDriver, url: &str, page_timeout: Duration) -> Result<String, String> {
    let navigate = async {
        driver.goto(url).await?;
        driver.query(By::Tag("body")).first().await?;
        tokio::time::sleep(RENDER_SETTLE).await;
        driver.source().await
    };
    match tokio::time::timeout(page_timeout, navigate).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("page load timed out after {}s", page_timeout.as_secs())),
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn load(&mut self, url: &str) -> Result<String, FetchError> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| FetchError::Browser("session already closed".to_string()))?;
        let page_timeout = self.page_timeout;
        retry_paced(&self.pacing, url, |_| render(driver, url, page_timeout)).await
    }

    async fn close(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.quit().await {
                Ok(()) => tracing::debug!("Browser session closed"),
                Err(e) => tracing::warn!("Failed to quit browser: {e}"),
            }
        }
    }
}
