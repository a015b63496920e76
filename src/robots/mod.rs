//! Robots.txt handling module
//!
//! This module provides the politeness limiter: it fetches each host's
//! robots.txt once, stores it in the cache folder and turns it into the delay
//! that must elapse between two dispatches to that host.

mod cache;
mod parser;

pub use cache::{Delay, PolicySource, PolitenessCache};
pub use parser::{RequestRate, RobotsPolicy};

use crate::url::host_key;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Outcome of fetching a host's robots.txt
#[derive(Debug, Clone)]
pub enum RobotsFetch {
    /// The document was retrieved and stored
    Policy(RobotsPolicy),

    /// The host answered with a non-auth error status; nothing is restricted
    Unrestricted,

    /// The host cannot be crawled (connection failure, 401 or 403)
    Forbidden,
}

/// Computes per-host delays from cached robots.txt documents
///
/// The limiter can be shared between tasks; first contact with a host is
/// serialized per host so its robots.txt is requested at most once per run.
pub struct PolitenessLimiter {
    client: Client,
    user_agent: String,
    cache_folder: PathBuf,
    cache: Mutex<PolitenessCache>,
    host_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PolitenessLimiter {
    /// Creates a new limiter
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client used to fetch robots.txt
    /// * `user_agent` - The user agent whose rules apply
    /// * `cache_folder` - Folder where robots.txt documents are written
    pub fn new(client: Client, user_agent: &str, cache_folder: impl Into<PathBuf>) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
            cache_folder: cache_folder.into(),
            cache: Mutex::new(PolitenessCache::new()),
            host_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the delay to observe after dispatching `url`
    ///
    /// # Resolution order
    ///
    /// 1. A delay already cached for the host is returned as-is
    /// 2. robots.txt is fetched (once per host); connection failures, 401 and
    ///    403 exclude the host, other error statuses leave it unrestricted
    /// 3. A URL disallowed by the policy excludes the host
    /// 4. An explicit `Crawl-delay` for our agent
    /// 5. An explicit `Request-rate` N/M, giving M/N seconds
    /// 6. `default_delay`
    ///
    /// Every branch caches its result for the host before returning.
    pub async fn delay_for(&self, url: &Url, default_delay: Duration) -> Delay {
        let Some(host) = host_key(url) else {
            // Local resources have no robots.txt
            return Delay::Wait(default_delay);
        };

        if let Some(delay) = self.cached_delay(&host) {
            tracing::debug!("returning cached delay {:?} for host {}", delay, host);
            return delay;
        }

        let host_lock = self.host_lock(&host);
        let _guard = host_lock.lock().await;

        // Another task may have resolved the host while we waited
        if let Some(delay) = self.cached_delay(&host) {
            return delay;
        }

        let delay = match self.policy_for(url, &host).await {
            RobotsFetch::Forbidden => {
                tracing::debug!("url {} is not fetchable, excluding host {}", url, host);
                Delay::Excluded
            }
            RobotsFetch::Unrestricted => Delay::Wait(default_delay),
            RobotsFetch::Policy(policy) => {
                if !policy.is_allowed(url.as_str(), self.agent_token()) {
                    tracing::info!("robots.txt of {} disallows {}, excluding host", host, url);
                    Delay::Excluded
                } else {
                    self.policy_delay(&policy, url, default_delay)
                }
            }
        };

        self.cache_delay(&host, delay)
    }

    /// Checks whether robots.txt allows fetching `url`
    ///
    /// Reuses what earlier contact with the host produced; robots.txt is
    /// requested at most once per host.
    pub async fn can_fetch(&self, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return true;
        };

        let fetch = match self.known_policy(&host).await {
            Some(fetch) => fetch,
            None => {
                let host_lock = self.host_lock(&host);
                let _guard = host_lock.lock().await;
                self.policy_for(url, &host).await
            }
        };

        let is_fetchable = match fetch {
            RobotsFetch::Policy(policy) => policy.is_allowed(url.as_str(), self.agent_token()),
            RobotsFetch::Unrestricted => true,
            RobotsFetch::Forbidden => false,
        };
        tracing::info!("after analyzing robots.txt for {}, fetchable is {}", url, is_fetchable);
        is_fetchable
    }

    /// Path of the stored robots.txt for a host, if it was fetched
    pub fn policy_path(&self, host: &str) -> Option<PathBuf> {
        self.lock_cache().policy_path(host).map(Path::to_path_buf)
    }

    /// Delay already resolved for a host
    pub fn cached_delay(&self, host: &str) -> Option<Delay> {
        self.lock_cache().delay(host)
    }

    /// Snapshot of the cache
    pub fn cache(&self) -> PolitenessCache {
        self.lock_cache().clone()
    }

    fn policy_delay(&self, policy: &RobotsPolicy, url: &Url, default_delay: Duration) -> Delay {
        let agent = self.agent_token();

        if let Some(crawl_delay) = policy.crawl_delay(agent) {
            tracing::debug!(
                "returning crawl delay value \"{}\" from robots.txt for url {}",
                crawl_delay,
                url
            );
            return Delay::from_secs_f64(crawl_delay);
        }

        if let Some(rate) = policy.request_rate(agent) {
            tracing::debug!(
                "computing delay from request rate ({}/{}) from robots.txt for url {}",
                rate.requests,
                rate.seconds,
                url
            );
            return Delay::from_secs_f64(rate.delay_seconds());
        }

        tracing::debug!("returning default delay {:?} for url {}", default_delay, url);
        Delay::Wait(default_delay)
    }

    /// Policy already known for a host, without network contact
    async fn known_policy(&self, host: &str) -> Option<RobotsFetch> {
        let source = self.lock_cache().policy_source(host).cloned()?;
        match source {
            PolicySource::Unrestricted => Some(RobotsFetch::Unrestricted),
            PolicySource::Forbidden => Some(RobotsFetch::Forbidden),
            PolicySource::Stored(path) => match tokio::fs::read_to_string(&path).await {
                Ok(content) => Some(RobotsFetch::Policy(RobotsPolicy::from_content(&content))),
                Err(e) => {
                    tracing::warn!("cannot read cached robots file {}: {}", path.display(), e);
                    None
                }
            },
        }
    }

    /// Known policy for the host, fetching it when unknown
    ///
    /// Callers hold the host lock.
    async fn policy_for(&self, url: &Url, host: &str) -> RobotsFetch {
        match self.known_policy(host).await {
            Some(fetch) => fetch,
            None => self.load_policy(url, host).await,
        }
    }

    /// Fetches, stores and parses the host's robots.txt
    async fn load_policy(&self, url: &Url, host: &str) -> RobotsFetch {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("cannot build robots.txt url for {}: {}", url, e);
                return RobotsFetch::Forbidden;
            }
        };

        let fetch = fetch_robots(&self.client, &robots_url).await;
        let source = match &fetch {
            RobotsFetch::Policy(policy) => {
                let path = self.cache_folder.join(cache_file_name(host));
                match tokio::fs::write(&path, policy.content()).await {
                    Ok(()) => {
                        tracing::debug!("stored robots file for {} at {}", host, path.display());
                        Some(PolicySource::Stored(path))
                    }
                    Err(e) => {
                        tracing::warn!("cannot store robots file at {}: {}", path.display(), e);
                        None
                    }
                }
            }
            RobotsFetch::Unrestricted => Some(PolicySource::Unrestricted),
            RobotsFetch::Forbidden => Some(PolicySource::Forbidden),
        };
        if let Some(source) = source {
            self.lock_cache().set_policy_source(host, source);
        }
        fetch
    }

    fn cache_delay(&self, host: &str, delay: Delay) -> Delay {
        self.lock_cache().set_delay(host, delay)
    }

    fn host_lock(&self, host: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .host_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(host.to_string()).or_default().clone()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, PolitenessCache> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Product token of the user agent (`Name` out of `Name/1.0 (...)`)
    fn agent_token(&self) -> &str {
        self.user_agent
            .split(['/', ' '])
            .next()
            .unwrap_or(&self.user_agent)
    }
}

/// Fetches robots.txt and classifies the answer
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `robots_url` - Absolute URL of the robots.txt document
pub async fn fetch_robots(client: &Client, robots_url: &Url) -> RobotsFetch {
    let response = match client.get(robots_url.as_str()).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::info!("cannot connect to {} to get robots.txt: {}", robots_url, e);
            return RobotsFetch::Forbidden;
        }
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::info!("access to {} is {}, host is forbidden", robots_url, status);
        return RobotsFetch::Forbidden;
    }
    if status.is_client_error() || status.is_server_error() {
        tracing::info!(
            "trying to access {} returns a {} error status code, host is unrestricted",
            robots_url,
            status
        );
        return RobotsFetch::Unrestricted;
    }

    match response.text().await {
        Ok(body) => RobotsFetch::Policy(RobotsPolicy::from_content(&body)),
        Err(e) => {
            tracing::info!("cannot read robots.txt body from {}: {}", robots_url, e);
            RobotsFetch::Forbidden
        }
    }
}

/// File name of a host's stored robots.txt
fn cache_file_name(host: &str) -> String {
    host.replace([':', '/', '\\'], "_")
}
