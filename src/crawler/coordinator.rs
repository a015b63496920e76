//! Spider coordinator - main run loop
//!
//! This module contains the loop that drives a spider run:
//! - Seeding the frontier and validating seed URLs
//! - Pacing dispatch with the politeness limiter or the configured delay
//! - Spawning one fetch-and-handle task per URL
//! - Detecting completion through the frontier and building statistics

use crate::config::Config;
use crate::crawler::fetcher::{
    build_http_client, compose_fetch, FetchFn, HttpFetcher, ResourceFetcher, ResponseMiddleware,
};
use crate::crawler::frontier::{Capacity, Frontier};
use crate::crawler::handler::Handler;
use crate::crawler::response::{lock_state, Follower, Response, SharedUrlState};
use crate::output::{ItemProcessor, ItemSaver, RunStatistics};
use crate::robots::{Delay, PolitenessLimiter};
use crate::url::validate_seed_url;
use crate::SpiderError;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;
use url::Url;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Draining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate of successful fetches
#[derive(Debug, Default)]
struct FetchMetrics {
    request_counter: u64,
    total_fetch_time: Duration,
}

/// Everything a per-URL task needs, shared by all tasks of a run
struct TaskContext {
    fetch: FetchFn,
    handler: Arc<dyn Handler>,
    frontier: Arc<Frontier<String>>,
    state: SharedUrlState,
    saver: ItemSaver,
    metrics: Mutex<FetchMetrics>,
    ignore_errors: bool,
    fatal: mpsc::UnboundedSender<SpiderError>,
}

/// Acknowledges one dispatched URL to the frontier when dropped
///
/// Dropping happens on every exit path of a task, panics included, so each
/// dispatched URL is acknowledged exactly once.
struct CompletionGuard {
    frontier: Arc<Frontier<String>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.frontier.task_done() {
            tracing::error!("frontier completion bookkeeping is broken: {}", e);
        }
    }
}

/// A crawl over a growing set of URLs
///
/// # Example
///
/// ```no_run
/// use sumi_spider::{Config, ItemSaver, Response, Spider};
///
/// # async fn run() -> sumi_spider::Result<()> {
/// let handler = |response: Response, _items: ItemSaver| async move {
///     println!("{:?}", response.title());
///     anyhow::Ok(())
/// };
/// let stats = Spider::new(["https://example.com"], handler, Config::default())?
///     .name("example")
///     .run()
///     .await?;
/// println!("{} reachable urls", stats.reachable_urls.len());
/// # Ok(())
/// # }
/// ```
pub struct Spider {
    name: String,
    urls: Vec<String>,
    handler: Arc<dyn Handler>,
    config: Config,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    limiter: Option<Arc<PolitenessLimiter>>,
    middlewares: Vec<ResponseMiddleware>,
    processors: Vec<Arc<dyn ItemProcessor>>,
}

impl Spider {
    /// Creates a new spider
    ///
    /// # Arguments
    ///
    /// * `urls` - Seed URLs (`http`, `https` or `file`)
    /// * `handler` - Called with every fetched resource
    /// * `config` - The spider configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Spider)` - Seeds and configuration are valid
    /// * `Err(SpiderError)` - A seed URL or the configuration is invalid
    pub fn new<I, S, H>(urls: I, handler: H, config: Config) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        H: Handler + 'static,
    {
        crate::config::validate(&config)?;

        let mut seeds = Vec::new();
        for url in urls {
            let url = url.as_ref();
            validate_seed_url(url)?;
            if !seeds.iter().any(|seed| seed == url) {
                seeds.push(url.to_string());
            }
        }

        Ok(Self {
            name: format!("spider-{}", Utc::now().format("%Y%m%d%H%M%S%3f")),
            urls: seeds,
            handler: Arc::new(handler),
            config,
            fetcher: None,
            limiter: None,
            middlewares: Vec::new(),
            processors: Vec::new(),
        })
    }

    /// Sets the spider name used in logs and statistics
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the default HTTP fetcher (e.g. with a browser fetcher)
    pub fn with_fetcher(mut self, fetcher: impl ResourceFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Uses a shared politeness limiter instead of a per-run one
    ///
    /// Only consulted when `follow-robots-txt` is enabled.
    pub fn with_politeness_limiter(mut self, limiter: Arc<PolitenessLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Adds a middleware around the fetch function
    pub fn response_middleware(mut self, middleware: ResponseMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Adds a processor to the item chain
    pub fn item_processor(mut self, processor: impl ItemProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Seed URLs as supplied, without duplicates
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the spider until no work remains
    ///
    /// # Returns
    ///
    /// * `Ok(RunStatistics)` - The run drained its frontier
    /// * `Err(SpiderError)` - A handler failed and errors are not ignored,
    ///   or the run could not start
    pub async fn run(self) -> crate::Result<RunStatistics> {
        let span = tracing::info_span!("spider", name = %self.name);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> crate::Result<RunStatistics> {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(phase = %Phase::Idle, "seeding frontier with {} urls", self.urls.len());

        let client = build_http_client(&self.config)?;
        let fetcher: Arc<dyn ResourceFetcher> = match &self.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => Arc::new(HttpFetcher::new(client.clone())),
        };

        // Held until the end of the run so a default cache folder is removed with it
        let mut robots_tmp = None;
        let limiter = if self.config.crawler.follow_robots_txt {
            let limiter = match &self.limiter {
                Some(limiter) => limiter.clone(),
                None => {
                    let folder = match &self.config.crawler.robots_cache_folder {
                        Some(folder) => folder.clone(),
                        None => {
                            let tmp = tempfile::Builder::new().prefix("robots_").tempdir()?;
                            let folder = tmp.path().to_path_buf();
                            robots_tmp = Some(tmp);
                            folder
                        }
                    };
                    tracing::debug!("storing robots.txt files in {}", folder.display());
                    Arc::new(PolitenessLimiter::new(
                        client.clone(),
                        &self.config.user_agent.user_agent_string(),
                        folder,
                    ))
                }
            };
            Some(limiter)
        } else {
            None
        };

        let frontier = Arc::new(Frontier::with_items(
            Capacity::Unbounded,
            self.urls.iter().cloned(),
        )?);
        let state = SharedUrlState::default();
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();

        let ctx = Arc::new(TaskContext {
            fetch: compose_fetch(fetcher.clone(), &self.middlewares),
            handler: self.handler.clone(),
            frontier: frontier.clone(),
            state: state.clone(),
            saver: ItemSaver::new(
                self.processors.clone(),
                self.config.crawler.backup_filename.clone(),
            ),
            metrics: Mutex::new(FetchMetrics::default()),
            ignore_errors: self.config.crawler.ignore_errors,
            fatal: fatal_tx,
        });

        fetcher.start().await?;
        tracing::info!(phase = %Phase::Running, "spider started");

        let mut tasks = JoinSet::new();
        let outcome = {
            let drive = drive(&ctx, &mut tasks, limiter.as_deref(), &self.config);
            tokio::select! {
                biased;
                Some(err) = fatal_rx.recv() => Err(err),
                _ = frontier.join() => Ok(()),
                res = drive => res,
            }
        };

        tracing::info!(phase = %Phase::Draining, "no more work to dispatch");
        if outcome.is_err() {
            tasks.shutdown().await;
        } else {
            while let Some(done) = tasks.join_next().await {
                log_task_result(done);
            }
        }

        if let Err(e) = fetcher.shutdown().await {
            tracing::warn!("fetcher shutdown failed: {}", e);
        }
        frontier.close();
        drop(robots_tmp);

        let total_time = start.elapsed();
        outcome?;

        let (request_counter, total_fetch_time) = {
            let metrics = ctx
                .metrics
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (metrics.request_counter, metrics.total_fetch_time)
        };
        let stats = RunStatistics::new(
            &self.name,
            &lock_state(&state),
            request_counter,
            total_fetch_time,
            started_at,
            total_time,
        );

        tracing::info!(
            phase = %Phase::Done,
            "spider finished in {:.3}s: {} reachable, {} unreachable, {} excluded",
            total_time.as_secs_f64(),
            stats.reachable_urls.len(),
            stats.unreachable_urls.len(),
            stats.robots_excluded_urls.len()
        );
        Ok(stats)
    }
}

/// Pops URLs and dispatches them, paced by the computed delay
///
/// Only returns on error; a normal run ends when the frontier drains and the
/// caller drops this future.
async fn drive(
    ctx: &Arc<TaskContext>,
    tasks: &mut JoinSet<()>,
    limiter: Option<&PolitenessLimiter>,
    config: &Config,
) -> crate::Result<()> {
    let mut dispatched: HashSet<String> = HashSet::new();

    loop {
        let url = ctx.frontier.get().await?;

        while let Some(done) = tasks.try_join_next() {
            log_task_result(done);
        }

        if dispatched.contains(&url) || lock_state(&ctx.state).is_processed(&url) {
            tracing::debug!("url {} already processed, skipping", url);
            ctx.frontier.task_done()?;
            continue;
        }

        let delay = request_delay(&url, limiter, config).await;
        let Some(wait) = delay.duration() else {
            tracing::info!("url {} is excluded by robots.txt", url);
            lock_state(&ctx.state).record_excluded(&url);
            ctx.frontier.task_done()?;
            continue;
        };

        dispatched.insert(url.clone());
        let guard = CompletionGuard {
            frontier: ctx.frontier.clone(),
        };
        tasks.spawn(handle_url(ctx.clone(), url, guard));

        tracing::debug!("sleeping {:?} before next dispatch", wait);
        tokio::time::sleep(wait).await;
    }
}

/// Delay to observe after dispatching `url`
async fn request_delay(url: &str, limiter: Option<&PolitenessLimiter>, config: &Config) -> Delay {
    let default_delay = config.request_delay();
    match (limiter, Url::parse(url)) {
        (Some(limiter), Ok(parsed)) => limiter.delay_for(&parsed, default_delay).await,
        _ => Delay::Wait(default_delay),
    }
}

/// Fetches one URL and hands it to the handler
async fn handle_url(ctx: Arc<TaskContext>, url: String, guard: CompletionGuard) {
    let parsed = match Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("cannot parse queued url {}: {}", url, e);
            lock_state(&ctx.state).record_unreachable(&url);
            drop(guard);
            return;
        }
    };

    let resource = match (ctx.fetch)(parsed).await {
        Ok(resource) => resource,
        Err(e) => {
            tracing::info!("url {} is unreachable: {}", url, e);
            lock_state(&ctx.state).record_unreachable(&url);
            drop(guard);
            return;
        }
    };

    let elapsed = resource.elapsed;
    lock_state(&ctx.state).record_reachable(&url);
    {
        let mut metrics = ctx
            .metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics.request_counter += 1;
        metrics.total_fetch_time += elapsed;
    }
    tracing::info!("fetched {} in {:.3}s", url, elapsed.as_secs_f64());

    let follower = Follower::new(ctx.frontier.clone(), ctx.state.clone());
    let response = Response::new(resource, follower);
    if let Err(e) = ctx.handler.parse(response, ctx.saver.clone()).await {
        tracing::error!("handler failed while parsing {}: {:#}", url, e);
        if !ctx.ignore_errors {
            // Sent before the guard drops so the run sees the error before join()
            let _ = ctx.fatal.send(SpiderError::Handler { url, source: e });
        }
    }

    drop(guard);
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!("a fetch task panicked: {}", e);
        }
    }
}
