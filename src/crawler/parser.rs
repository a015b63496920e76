//! HTML queries used by responses
//!
//! This module handles querying a parsed document for:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title
//! - Text and attribute values matched by CSS selectors

use crate::url::resolve_url;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// A CSS selector that failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector '{query}': {message}")]
pub struct SelectorError {
    pub query: String,
    pub message: String,
}

/// Parses a CSS selector
pub fn parse_selector(query: &str) -> Result<Selector, SelectorError> {
    Selector::parse(query).map_err(|e| SelectorError {
        query: query.to_string(),
        message: e.to_string(),
    })
}

/// Returns the trimmed text of every element matching `query`
pub fn select_text(document: &Html, query: &str) -> Result<Vec<String>, SelectorError> {
    let selector = parse_selector(query)?;
    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect())
}

/// Returns the `attr` value of every element matching `query` that has it
pub fn select_attr(document: &Html, query: &str, attr: &str) -> Result<Vec<String>, SelectorError> {
    let selector = parse_selector(query)?;
    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::to_string)
        .collect())
}

/// Extracts the page title from the HTML document
pub fn page_title(document: &Html) -> Option<String> {
    select_text(document, "title")
        .ok()?
        .into_iter()
        .next()
        .filter(|s| !s.is_empty())
}

/// Extracts all followable links from the HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Anything that is not `http`/`https` after resolution
///
/// Links are absolute, without fragment, deduplicated in document order.
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut push = |href: &str| {
        if let Some(absolute) = resolve_link(href, base_url) {
            if !links.contains(&absolute) {
                links.push(absolute);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| href.starts_with(scheme))
    {
        return None;
    }

    let absolute = resolve_url(base_url, href).ok()?;
    if absolute.starts_with("http://") || absolute.starts_with("https://") {
        Some(absolute)
    } else {
        None
    }
}
