use url::Url;

/// Builds the key used by per-host caches
///
/// The key is the lowercase host, followed by `:port` when the URL carries a
/// non-default port, so two services on the same machine keep separate
/// robots.txt entries.
///
/// # Returns
///
/// * `Some(String)` - The host key
/// * `None` - If the URL has no host (e.g. `file://` URLs)
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_spider::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.com/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
