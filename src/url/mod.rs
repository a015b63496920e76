//! URL handling module for Sumi-Spider
//!
//! This module provides seed validation, host keys for per-host caches and
//! resolution of discovered links to absolute URLs.

mod domain;
mod normalize;

pub use domain::host_key;
pub use normalize::{absolute_url, resolve_url};

use crate::{UrlError, UrlResult};
use url::Url;

/// Schemes a spider accepts for its URLs
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "file"];

/// Validates a seed URL
///
/// # Rules
///
/// - The scheme must be one of `http`, `https` or `file`
/// - `http`/`https` URLs must carry a host
/// - `file` URLs must carry a path to a local file
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The URL cannot be crawled
///
/// # Examples
///
/// ```
/// use sumi_spider::url::validate_seed_url;
///
/// assert!(validate_seed_url("https://example.com/").is_ok());
/// assert!(validate_seed_url("file:///tmp/page.html").is_ok());
/// assert!(validate_seed_url("ftp://example.com/").is_err());
/// ```
pub fn validate_seed_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(UrlError::InvalidScheme(format!(
            "{} does not have a scheme in {:?}",
            url_str, ALLOWED_SCHEMES
        )));
    }

    match url.scheme() {
        "file" if url.path().is_empty() || url.path() == "/" => {
            Err(UrlError::MissingPath(url_str.to_string()))
        }
        "http" | "https" if url.host_str().map_or(true, str::is_empty) => {
            Err(UrlError::MissingHost(url_str.to_string()))
        }
        _ => Ok(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_seed_url("http://example.com").is_ok());
        assert!(validate_seed_url("https://example.com/path?q=1").is_ok());
    }

    #[test]
    fn test_accepts_file_with_path() {
        let url = validate_seed_url("file:///var/data/page.html").unwrap();
        assert_eq!(url.path(), "/var/data/page.html");
    }

    #[test]
    fn test_rejects_file_without_path() {
        assert!(matches!(
            validate_seed_url("file:///"),
            Err(UrlError::MissingPath(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(matches!(
            validate_seed_url("ftp://example.com/file"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            validate_seed_url("mailto:someone@example.com"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            validate_seed_url("not a url"),
            Err(UrlError::Parse(_))
        ));
    }
}
