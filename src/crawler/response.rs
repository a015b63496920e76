//! Responses handed to handlers
//!
//! A [`Response`] carries the fetched resource together with the `follow`
//! capability of the run that produced it.

use crate::crawler::fetcher::FetchedResource;
use crate::crawler::frontier::{Frontier, FrontierError};
use crate::crawler::parser::{self, SelectorError};
use crate::state::{TerminalState, UrlStateTracker};
use crate::url::{absolute_url, ALLOWED_SCHEMES};
use crate::UrlError;
use reqwest::header::HeaderMap;
use scraper::Html;
use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// URL state shared between the run loop and its tasks
pub type SharedUrlState = Arc<Mutex<UrlStateTracker>>;

/// Locks the shared URL state
///
/// The tracker is only touched in short synchronous sections, so a poisoned
/// lock still holds consistent sets.
pub(crate) fn lock_state(state: &SharedUrlState) -> MutexGuard<'_, UrlStateTracker> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Enqueues URLs discovered by handlers into the current run
#[derive(Clone)]
pub struct Follower {
    frontier: Arc<Frontier<String>>,
    state: SharedUrlState,
}

impl Follower {
    pub fn new(frontier: Arc<Frontier<String>>, state: SharedUrlState) -> Self {
        Self { frontier, state }
    }

    /// Resolves `href` against `base` and enqueues it unless already known
    ///
    /// Absolute links are kept as written. The URL is marked followed only
    /// once it is actually queued.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was enqueued
    /// * `Ok(false)` - The URL was already followed or is reachable
    /// * `Err(SpiderError)` - The URL is invalid or the frontier is closed
    pub async fn follow(&self, base: &Url, href: &str) -> crate::Result<bool> {
        let absolute = absolute_url(base, href)?;
        let scheme = absolute
            .split(':')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
            return Err(UrlError::InvalidScheme(absolute).into());
        }

        // Check and enqueue under the state lock when the frontier has room
        {
            let mut state = lock_state(&self.state);
            if state.is_followed(&absolute)
                || state.state_of(&absolute) == Some(TerminalState::Reachable)
            {
                tracing::debug!("url {} already followed or reachable, skipping", absolute);
                return Ok(false);
            }
            match self.frontier.put_nowait(absolute.clone()) {
                Ok(()) => {
                    tracing::debug!("following url {}", absolute);
                    state.record_followed(&absolute);
                    return Ok(true);
                }
                Err(FrontierError::Full) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("frontier is full, waiting to follow url {}", absolute);
        self.frontier.put(absolute.clone()).await?;
        lock_state(&self.state).record_followed(&absolute);
        Ok(true)
    }
}

/// A fetched resource as seen by a handler
pub struct Response {
    url: Url,
    status: Option<u16>,
    headers: HeaderMap,
    content: Vec<u8>,
    elapsed: Duration,
    follower: Follower,
}

impl Response {
    pub(crate) fn new(resource: FetchedResource, follower: Follower) -> Self {
        Self {
            url: resource.url,
            status: resource.status,
            headers: resource.headers,
            content: resource.body,
            elapsed: resource.elapsed,
            follower,
        }
    }

    /// URL of the resource (after redirects)
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP status, `None` for files and browser pages
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Time spent fetching the resource
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Parses the body into a queryable document
    ///
    /// The document is built on every call and cannot be held across an
    /// `.await` in a spawned task.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.text())
    }

    /// Trimmed text of the elements matching a CSS selector
    pub fn css_text(&self, query: &str) -> Result<Vec<String>, SelectorError> {
        parser::select_text(&self.html(), query)
    }

    /// Values of `attr` on the elements matching a CSS selector
    pub fn css_attr(&self, query: &str, attr: &str) -> Result<Vec<String>, SelectorError> {
        parser::select_attr(&self.html(), query, attr)
    }

    pub fn title(&self) -> Option<String> {
        parser::page_title(&self.html())
    }

    /// Absolute http(s) links found in the document
    pub fn links(&self) -> Vec<String> {
        parser::extract_links(&self.html(), &self.url)
    }

    /// Enqueues a URL found on this page
    ///
    /// Relative URLs are resolved against the response URL. URLs already
    /// followed or already reachable are skipped.
    pub async fn follow(&self, href: &str) -> crate::Result<bool> {
        self.follower.follow(&self.url, href).await
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("content_length", &self.content.len())
            .field("elapsed", &self.elapsed)
            .finish()
    }
}
