//! Crawler module for fetching and processing resources
//!
//! This module contains the core crawling logic, including:
//! - The frontier work queue with completion tracking
//! - HTTP, file and browser-driven resource fetching
//! - Responses, link extraction and the handler interface
//! - The spider run loop

mod browser;
mod coordinator;
mod fetcher;
mod frontier;
mod handler;
mod parser;
mod response;

pub use browser::{BrowserDriver, BrowserError, BrowserFetcher, BrowserPage, BrowserlessDriver};
pub use coordinator::Spider;
pub use fetcher::{
    build_http_client, compose_fetch, read_file, FetchError, FetchFn, FetchedResource,
    HttpFetcher, ResourceFetcher, ResponseMiddleware,
};
pub use frontier::{Capacity, Frontier, FrontierError};
pub use handler::Handler;
pub use parser::{extract_links, page_title, select_attr, select_text, SelectorError};
pub use response::{Follower, Response, SharedUrlState};
