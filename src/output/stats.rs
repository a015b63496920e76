//! Statistics of a finished spider run
//!
//! This module provides the snapshot returned by a run and a helper to
//! display it.

use crate::state::{TerminalState, UrlStateTracker};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Snapshot of a spider run, built once when the run finishes
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    /// Name of the spider that produced the run
    pub name: String,

    /// URLs fetched and handed to the handler
    pub reachable_urls: HashSet<String>,

    /// URLs whose fetch failed
    pub unreachable_urls: HashSet<String>,

    /// URLs skipped because robots.txt excludes their host
    pub robots_excluded_urls: HashSet<String>,

    /// URLs discovered by the handler through `follow`
    pub followed_urls: HashSet<String>,

    /// Number of successful fetches
    pub request_counter: u64,

    /// Mean duration of a successful fetch
    pub average_fetch_time: Duration,

    /// Wall-clock duration of the run
    pub total_time: Duration,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl RunStatistics {
    /// Builds the snapshot from the run's URL state and counters
    ///
    /// # Arguments
    ///
    /// * `name` - The spider name
    /// * `tracker` - URL states at the end of the run
    /// * `request_counter` - Number of successful fetches
    /// * `total_fetch_time` - Sum of the successful fetch durations
    /// * `started_at` - When the run started
    /// * `total_time` - Wall-clock duration of the run
    pub fn new(
        name: &str,
        tracker: &UrlStateTracker,
        request_counter: u64,
        total_fetch_time: Duration,
        started_at: DateTime<Utc>,
        total_time: Duration,
    ) -> Self {
        let average_fetch_time = u32::try_from(request_counter)
            .ok()
            .filter(|count| *count > 0)
            .map(|count| total_fetch_time / count)
            .unwrap_or(Duration::ZERO);

        let finished_at = chrono::Duration::from_std(total_time)
            .map(|elapsed| started_at + elapsed)
            .unwrap_or_else(|_| Utc::now());

        Self {
            name: name.to_string(),
            reachable_urls: tracker.urls_in(TerminalState::Reachable),
            unreachable_urls: tracker.urls_in(TerminalState::Unreachable),
            robots_excluded_urls: tracker.urls_in(TerminalState::RobotsExcluded),
            followed_urls: tracker.followed_urls(),
            request_counter,
            average_fetch_time,
            total_time,
            started_at,
            finished_at,
        }
    }

    /// Number of URLs that reached a terminal state
    pub fn processed_count(&self) -> usize {
        self.reachable_urls.len() + self.unreachable_urls.len() + self.robots_excluded_urls.len()
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Spider Statistics: {} ===\n", stats.name);

    println!("Overview:");
    println!("  Started at: {}", stats.started_at.to_rfc3339());
    println!("  Total time: {:.3}s", stats.total_time.as_secs_f64());
    println!("  Requests: {}", stats.request_counter);
    println!(
        "  Average fetch time: {:.3}s",
        stats.average_fetch_time.as_secs_f64()
    );
    println!();

    print_urls("Reachable URLs", &stats.reachable_urls);
    print_urls("Unreachable URLs", &stats.unreachable_urls);
    print_urls("Robots Excluded URLs", &stats.robots_excluded_urls);
    print_urls("Followed URLs", &stats.followed_urls);

    let processed = stats.processed_count();
    let success_rate = if processed > 0 {
        (stats.reachable_urls.len() as f64 / processed as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} urls reachable)",
        success_rate,
        stats.reachable_urls.len(),
        processed
    );
}

fn print_urls(title: &str, urls: &HashSet<String>) {
    if urls.is_empty() {
        return;
    }

    println!("{} ({}):", title, urls.len());
    let mut sorted: Vec<_> = urls.iter().collect();
    sorted.sort();
    for url in sorted {
        println!("  - {}", url);
    }
    println!();
}
