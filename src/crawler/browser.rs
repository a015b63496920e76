//! Browser-driven resource acquisition
//!
//! A [`BrowserDriver`] navigates a single page at a time and exposes the
//! rendered HTML of the current page. [`BrowserFetcher`] turns any driver into
//! a [`ResourceFetcher`] so the spider can use it in place of plain HTTP.

use crate::config::BrowserConfig;
use crate::crawler::fetcher::{FetchError, FetchedResource, ResourceFetcher};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

/// Errors raised by browser drivers
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("browser driver is not started")]
    NotStarted,

    #[error("browser has no current page")]
    NoPage,
}

impl From<reqwest::Error> for BrowserError {
    fn from(err: reqwest::Error) -> Self {
        BrowserError::Network(err.to_string())
    }
}

/// The page currently loaded in a browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserPage {
    pub url: Url,
    pub html: String,
}

/// A remote-controlled browser
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Prepares the driver; called once when the run starts
    async fn start(&self) -> Result<(), BrowserError>;

    /// Loads `url` and returns the time it took
    async fn navigate(&self, url: &Url) -> Result<Duration, BrowserError>;

    /// The page loaded by the last successful `navigate`
    async fn current_page(&self) -> Option<BrowserPage>;

    /// Releases the driver; called once when the run ends
    async fn quit(&self) -> Result<(), BrowserError>;
}

/// Driver backed by a Browserless-style `/content` endpoint
pub struct BrowserlessDriver {
    client: Client,
    base_url: String,
    token: Option<String>,
    started: AtomicBool,
    page: Mutex<Option<BrowserPage>>,
}

impl BrowserlessDriver {
    /// Creates a driver for the configured endpoint
    ///
    /// `find_timeout` bounds each rendering request.
    pub fn new(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.find_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            started: AtomicBool::new(false),
            page: Mutex::new(None),
        })
    }

    fn content_endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }
}

#[async_trait]
impl BrowserDriver for BrowserlessDriver {
    async fn start(&self) -> Result<(), BrowserError> {
        self.started.store(true, Ordering::SeqCst);
        tracing::debug!("browserless driver started on {}", self.base_url);
        Ok(())
    }

    async fn navigate(&self, url: &Url) -> Result<Duration, BrowserError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(BrowserError::NotStarted);
        }

        let start = Instant::now();
        let body = serde_json::json!({ "url": url.as_str() });
        let resp = self
            .client
            .post(self.content_endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let html = resp.text().await?;
        let elapsed = start.elapsed();
        *self.page.lock().await = Some(BrowserPage {
            url: url.clone(),
            html,
        });
        Ok(elapsed)
    }

    async fn current_page(&self) -> Option<BrowserPage> {
        self.page.lock().await.clone()
    }

    async fn quit(&self) -> Result<(), BrowserError> {
        self.started.store(false, Ordering::SeqCst);
        *self.page.lock().await = None;
        tracing::debug!("browserless driver stopped");
        Ok(())
    }
}

/// Adapts a [`BrowserDriver`] to the spider's fetcher interface
///
/// The driver holds one current page, so navigation and reading the page are
/// done under a single lock.
pub struct BrowserFetcher<D> {
    driver: D,
    lock: Mutex<()>,
}

impl<D: BrowserDriver> BrowserFetcher<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            lock: Mutex::new(()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

#[async_trait]
impl<D: BrowserDriver> ResourceFetcher for BrowserFetcher<D> {
    async fn start(&self) -> Result<(), FetchError> {
        Ok(self.driver.start().await?)
    }

    async fn acquire(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let _guard = self.lock.lock().await;

        let elapsed = self.driver.navigate(url).await?;
        let page = self
            .driver
            .current_page()
            .await
            .ok_or(BrowserError::NoPage)?;

        Ok(FetchedResource {
            url: page.url,
            status: None,
            headers: HeaderMap::new(),
            body: page.html.into_bytes(),
            elapsed,
        })
    }

    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(self.driver.quit().await?)
    }
}
