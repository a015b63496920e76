use rand::Rng;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Spider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub browser: Option<BrowserConfig>,
}

impl Config {
    /// Draws the default delay for one dispatch
    ///
    /// The value is picked uniformly in `[min_request_delay, max_request_delay]`
    /// on every call, so consecutive requests are not evenly spaced.
    pub fn request_delay(&self) -> Duration {
        let min = self.crawler.min_request_delay;
        let max = self.crawler.max_request_delay.max(min);
        let millis = rand::thread_rng().gen_range(min..=max);
        tracing::debug!("returning computed request delay: {}ms", millis);
        Duration::from_millis(millis)
    }

    /// Timeout applied by the HTTP client to every fetch
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.crawler.fetch_timeout)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Lower bound of the delay between two dispatches (milliseconds)
    #[serde(rename = "min-request-delay", default)]
    pub min_request_delay: u64,

    /// Upper bound of the delay between two dispatches (milliseconds)
    #[serde(rename = "max-request-delay", default)]
    pub max_request_delay: u64,

    /// Timeout for a single fetch (milliseconds)
    #[serde(rename = "fetch-timeout", default = "default_fetch_timeout")]
    pub fetch_timeout: u64,

    /// Whether robots.txt drives the delay between dispatches
    #[serde(rename = "follow-robots-txt", default)]
    pub follow_robots_txt: bool,

    /// Whether handler failures are logged and swallowed instead of aborting the run
    #[serde(rename = "ignore-errors", default)]
    pub ignore_errors: bool,

    /// Folder where fetched robots.txt documents are stored, one file per host
    #[serde(rename = "robots-cache-folder", default)]
    pub robots_cache_folder: Option<PathBuf>,

    /// File receiving saved items as MessagePack records
    #[serde(rename = "backup-filename", default)]
    pub backup_filename: Option<PathBuf>,
}

fn default_fetch_timeout() -> u64 {
    5000
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_request_delay: 0,
            max_request_delay: 0,
            fetch_timeout: default_fetch_timeout(),
            follow_robots_txt: false,
            ignore_errors: false,
            robots_cache_folder: None,
            backup_filename: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email", default)]
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`, the
    /// parenthesised part only appearing when contact details are set.
    pub fn user_agent_string(&self) -> String {
        let contact: Vec<String> = [
            self.contact_url.as_ref().map(|u| format!("+{}", u)),
            self.contact_email.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiSpider".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

/// Browser automation endpoint, enabling the browser-driven fetch variant
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Base URL of the rendering service
    pub endpoint: String,

    /// Optional API token appended to each call
    #[serde(default)]
    pub token: Option<String>,

    /// How long the service may wait for a page to settle (milliseconds)
    #[serde(rename = "find-timeout", default = "default_find_timeout")]
    pub find_timeout: u64,
}

fn default_find_timeout() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.crawler.fetch_timeout, 5000);
        assert!(!config.crawler.follow_robots_txt);
        assert!(!config.crawler.ignore_errors);
        assert!(config.browser.is_none());
    }

    #[test]
    fn test_request_delay_within_bounds() {
        let mut config = Config::default();
        config.crawler.min_request_delay = 10;
        config.crawler.max_request_delay = 20;

        for _ in 0..50 {
            let delay = config.request_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_request_delay_fixed() {
        let mut config = Config::default();
        config.crawler.min_request_delay = 7;
        config.crawler.max_request_delay = 7;
        assert_eq!(config.request_delay(), Duration::from_millis(7));
    }

    #[test]
    fn test_user_agent_string_without_contact() {
        let ua = UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: None,
            contact_email: None,
        };
        assert_eq!(ua.user_agent_string(), "TestBot/1.0");
    }

    #[test]
    fn test_user_agent_string_with_contact() {
        let ua = UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: Some("https://example.com/bot".to_string()),
            contact_email: Some("bot@example.com".to_string()),
        };
        assert_eq!(
            ua.user_agent_string(),
            "TestBot/1.0 (+https://example.com/bot; bot@example.com)"
        );
    }
}
