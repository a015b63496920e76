//! State module for tracking crawl progress
//!
//! This module records what happened to every URL seen during a run.
//!
//! # Components
//!
//! - `TerminalState`: The single outcome a processed URL ends in
//! - `UrlStateTracker`: Membership sets used to deduplicate and classify URLs

mod url_state;

// Re-export main types
pub use url_state::{TerminalState, UrlStateTracker};
