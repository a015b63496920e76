//! URL state definitions for tracking crawl progress
//!
//! A URL is either not yet processed, or it sits in exactly one terminal
//! state. Independently, a URL may carry the "followed" mark when a handler
//! discovered it.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// The outcome recorded for a processed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    /// The resource was fetched and handed to the handler
    Reachable,

    /// The fetch failed (network error, error status, unreadable file)
    Unreachable,

    /// robots.txt forbids crawling the URL's host
    RobotsExcluded,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reachable => "reachable",
            Self::Unreachable => "unreachable",
            Self::RobotsExcluded => "robots_excluded",
        };
        write!(f, "{}", s)
    }
}

/// Tracks every URL seen by one run
///
/// Terminal classification is stored in a single map, so the reachable,
/// unreachable and robots-excluded sets are disjoint by construction. Records
/// are monotonic: once a URL has a terminal state, later records for it are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct UrlStateTracker {
    terminal: HashMap<String, TerminalState>,
    followed: HashSet<String>,
}

impl UrlStateTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the URL already reached a terminal state
    pub fn is_processed(&self, url: &str) -> bool {
        self.terminal.contains_key(url)
    }

    /// Returns the terminal state of a URL, if any
    pub fn state_of(&self, url: &str) -> Option<TerminalState> {
        self.terminal.get(url).copied()
    }

    /// Returns true if the URL was discovered through a handler
    pub fn is_followed(&self, url: &str) -> bool {
        self.followed.contains(url)
    }

    /// Marks a URL as discovered through a handler
    ///
    /// Returns `false` if it was already marked.
    pub fn record_followed(&mut self, url: &str) -> bool {
        self.followed.insert(url.to_string())
    }

    /// Records a successful fetch
    pub fn record_reachable(&mut self, url: &str) -> bool {
        self.record(url, TerminalState::Reachable)
    }

    /// Records a failed fetch
    pub fn record_unreachable(&mut self, url: &str) -> bool {
        self.record(url, TerminalState::Unreachable)
    }

    /// Records a URL excluded by robots.txt
    pub fn record_excluded(&mut self, url: &str) -> bool {
        self.record(url, TerminalState::RobotsExcluded)
    }

    /// Assigns a terminal state unless the URL already has one
    ///
    /// Returns `true` if the state was recorded.
    pub fn record(&mut self, url: &str, state: TerminalState) -> bool {
        if let Some(existing) = self.terminal.get(url) {
            if *existing != state {
                tracing::warn!(
                    "URL {} is already {}, ignoring transition to {}",
                    url,
                    existing,
                    state
                );
            }
            return false;
        }
        self.terminal.insert(url.to_string(), state);
        true
    }

    /// Collects the URLs in a given terminal state
    pub fn urls_in(&self, state: TerminalState) -> HashSet<String> {
        self.terminal
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn reachable_urls(&self) -> HashSet<String> {
        self.urls_in(TerminalState::Reachable)
    }

    pub fn unreachable_urls(&self) -> HashSet<String> {
        self.urls_in(TerminalState::Unreachable)
    }

    pub fn robots_excluded_urls(&self) -> HashSet<String> {
        self.urls_in(TerminalState::RobotsExcluded)
    }

    pub fn followed_urls(&self) -> HashSet<String> {
        self.followed.clone()
    }

    /// Number of URLs with a terminal state
    pub fn processed_count(&self) -> usize {
        self.terminal.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_empty() {
        let tracker = UrlStateTracker::new();
        assert!(!tracker.is_processed("http://a.com/"));
        assert_eq!(tracker.processed_count(), 0);
        assert!(tracker.followed_urls().is_empty());
    }

    #[test]
    fn test_record_each_terminal_state() {
        let mut tracker = UrlStateTracker::new();
        assert!(tracker.record_reachable("http://a.com/"));
        assert!(tracker.record_unreachable("http://b.com/"));
        assert!(tracker.record_excluded("http://c.com/"));

        assert!(tracker.is_processed("http://a.com/"));
        assert!(tracker.is_processed("http://b.com/"));
        assert!(tracker.is_processed("http://c.com/"));
        assert_eq!(
            tracker.state_of("http://b.com/"),
            Some(TerminalState::Unreachable)
        );
    }

    #[test]
    fn test_followed_is_not_processed() {
        let mut tracker = UrlStateTracker::new();
        assert!(tracker.record_followed("http://a.com/"));
        assert!(!tracker.record_followed("http://a.com/"));
        assert!(tracker.is_followed("http://a.com/"));
        assert!(!tracker.is_processed("http://a.com/"));
    }

    #[test]
    fn test_terminal_state_is_monotonic() {
        let mut tracker = UrlStateTracker::new();
        assert!(tracker.record_reachable("http://a.com/"));
        assert!(!tracker.record_unreachable("http://a.com/"));
        assert!(!tracker.record_excluded("http://a.com/"));
        assert!(!tracker.record_reachable("http://a.com/"));

        assert_eq!(
            tracker.state_of("http://a.com/"),
            Some(TerminalState::Reachable)
        );
        assert_eq!(tracker.reachable_urls().len(), 1);
        assert!(tracker.unreachable_urls().is_empty());
    }

    #[test]
    fn test_terminal_sets_stay_disjoint() {
        let mut tracker = UrlStateTracker::new();
        let urls = ["a", "b", "c", "d", "e"];
        for (i, url) in urls.iter().cycle().take(30).enumerate() {
            match i % 3 {
                0 => tracker.record_reachable(url),
                1 => tracker.record_unreachable(url),
                _ => tracker.record_excluded(url),
            };
            tracker.record_followed(url);
        }

        let reachable = tracker.reachable_urls();
        let unreachable = tracker.unreachable_urls();
        let excluded = tracker.robots_excluded_urls();

        assert!(reachable.is_disjoint(&unreachable));
        assert!(reachable.is_disjoint(&excluded));
        assert!(unreachable.is_disjoint(&excluded));
        assert_eq!(reachable.len() + unreachable.len() + excluded.len(), urls.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(TerminalState::Reachable.to_string(), "reachable");
        assert_eq!(TerminalState::RobotsExcluded.to_string(), "robots_excluded");
    }
}
