//! Resource fetching
//!
//! This module handles acquiring resources for the spider:
//! - Building the HTTP client with the configured user agent and timeout
//! - Fetching `http`/`https` URLs and classifying error statuses
//! - Reading `file://` URLs from disk
//! - Composing response middlewares around the raw fetch function

use crate::config::Config;
use crate::crawler::browser::BrowserError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Errors raised while acquiring a resource
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// A resource as returned by a fetcher
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL of the resource (after redirects)
    pub url: Url,

    /// HTTP status code, `None` for files and browser pages
    pub status: Option<u16>,

    pub headers: HeaderMap,

    pub body: Vec<u8>,

    /// Time spent acquiring the resource
    pub elapsed: Duration,
}

/// Acquires resources for the spider
///
/// `start` and `shutdown` are called once per run, around all `acquire` calls.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn start(&self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn acquire(&self, url: &Url) -> Result<FetchedResource, FetchError>;

    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// The fetch function middlewares wrap
pub type FetchFn =
    Arc<dyn Fn(Url) -> BoxFuture<'static, Result<FetchedResource, FetchError>> + Send + Sync>;

/// Wraps a fetch function into another one
///
/// Middlewares are applied in registration order, so the last one registered
/// is the outermost.
pub type ResponseMiddleware = Arc<dyn Fn(FetchFn) -> FetchFn + Send + Sync>;

/// Builds the fetch function for a fetcher, wrapped by `middlewares`
pub fn compose_fetch(
    fetcher: Arc<dyn ResourceFetcher>,
    middlewares: &[ResponseMiddleware],
) -> FetchFn {
    let base: FetchFn = Arc::new(move |url: Url| {
        let fetcher = fetcher.clone();
        async move { fetcher.acquire(&url).await }.boxed()
    });

    middlewares
        .iter()
        .fold(base, |fetch, middleware| middleware(fetch))
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The spider configuration (user agent and fetch timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.user_agent_string())
        .timeout(config.fetch_timeout())
        .connect_timeout(config.fetch_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher for `http`, `https` and `file` URLs
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn fetch_http(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let start = Instant::now();
        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(http_error)?;

        Ok(FetchedResource {
            url: final_url,
            status: Some(status.as_u16()),
            headers,
            body: body.to_vec(),
            elapsed: start.elapsed(),
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn acquire(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        if url.scheme() == "file" {
            read_file(url).await
        } else {
            self.fetch_http(url).await
        }
    }
}

/// Reads a `file://` resource from disk
pub async fn read_file(url: &Url) -> Result<FetchedResource, FetchError> {
    let start = Instant::now();
    let path = url.to_file_path().map_err(|_| FetchError::File {
        path: url.path().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a local file path"),
    })?;

    let body = tokio::fs::read(&path)
        .await
        .map_err(|source| FetchError::File {
            path: path.display().to_string(),
            source,
        })?;

    Ok(FetchedResource {
        url: url.clone(),
        status: None,
        headers: HeaderMap::new(),
        body,
        elapsed: start.elapsed(),
    })
}
