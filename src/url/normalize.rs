use crate::{UrlError, UrlResult};
use url::Url;

/// Absolute form of a link, keeping absolute links as written
///
/// An `href` that already parses as an absolute URL is returned verbatim,
/// only trimmed and stripped of its fragment. Relative links are joined to
/// `base` with [`resolve_url`].
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_spider::url::absolute_url;
///
/// let base = Url::parse("https://example.com/docs/index.html").unwrap();
/// assert_eq!(absolute_url(&base, "http://b.com").unwrap(), "http://b.com");
/// assert_eq!(absolute_url(&base, "http://b.com/x#top").unwrap(), "http://b.com/x");
/// assert_eq!(absolute_url(&base, "page.html").unwrap(), "https://example.com/docs/page.html");
/// ```
pub fn absolute_url(base: &Url, href: &str) -> UrlResult<String> {
    let trimmed = href.trim();
    if Url::parse(trimmed).is_ok() {
        let without_fragment = trimmed.split_once('#').map_or(trimmed, |(url, _)| url);
        return Ok(without_fragment.to_string());
    }
    resolve_url(base, trimmed)
}

/// Resolves a possibly relative link against the page it was found on
///
/// Absolute links are normalized as-is; relative links are joined to `base`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_spider::url::resolve_url;
///
/// let base = Url::parse("https://example.com/docs/index.html").unwrap();
/// assert_eq!(resolve_url(&base, "page.html").unwrap(), "https://example.com/docs/page.html");
/// assert_eq!(resolve_url(&base, "/about#team").unwrap(), "https://example.com/about");
/// assert_eq!(resolve_url(&base, "http://other.com").unwrap(), "http://other.com/");
/// ```
pub fn resolve_url(base: &Url, href: &str) -> UrlResult<String> {
    let mut url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
    url.set_fragment(None);
    Ok(url.to_string())
}
