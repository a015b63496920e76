//! Robots.txt parser implementation
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the pacing
//! directives (`Crawl-delay`, `Request-rate`) are parsed here per agent group.

use robotstxt::DefaultMatcher;

/// A `Request-rate: N/M` directive: at most `requests` per `seconds`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestRate {
    pub requests: u32,
    pub seconds: f64,
}

impl RequestRate {
    /// Seconds to wait between two requests to honour the rate
    pub fn delay_seconds(&self) -> f64 {
        self.seconds / self.requests as f64
    }
}

/// Pacing directives of one `User-agent` group
#[derive(Debug, Clone, Default)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
    request_rate: Option<RequestRate>,
}

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    groups: Vec<AgentGroup>,
}

impl RobotsPolicy {
    /// Creates a new RobotsPolicy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            groups: parse_groups(content),
        }
    }

    /// Creates a permissive policy that allows everything
    ///
    /// This stands in for hosts whose robots.txt answered with a non-auth error.
    pub fn allow_all() -> Self {
        Self::from_content("")
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay (in seconds) for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.lookup(user_agent, |group| group.crawl_delay)
    }

    /// Gets the request rate for a specific user agent
    pub fn request_rate(&self, user_agent: &str) -> Option<RequestRate> {
        self.lookup(user_agent, |group| group.request_rate)
    }

    fn lookup<T>(&self, user_agent: &str, field: impl Fn(&AgentGroup) -> Option<T>) -> Option<T> {
        let normalized_agent = user_agent.to_lowercase();

        let specific = self
            .groups
            .iter()
            .filter(|group| {
                group
                    .agents
                    .iter()
                    .any(|ua| ua != "*" && normalized_agent.contains(ua.as_str()))
            })
            .find_map(&field);

        specific.or_else(|| {
            self.groups
                .iter()
                .filter(|group| group.agents.iter().any(|ua| ua == "*"))
                .find_map(&field)
        })
    }
}

/// Splits robots.txt into agent groups
///
/// Consecutive `User-agent` lines share a group; the first `User-agent` line
/// after any other directive opens a new one.
fn parse_groups(content: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut current: Option<AgentGroup> = None;
    let mut in_agent_lines = false;

    for line in content.lines() {
        // Strip comments
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !in_agent_lines {
                    if let Some(group) = current.take() {
                        groups.push(group);
                    }
                    current = Some(AgentGroup::default());
                }
                if let Some(group) = current.as_mut() {
                    group.agents.push(value.to_lowercase());
                }
                in_agent_lines = true;
            }
            "crawl-delay" => {
                in_agent_lines = false;
                if let (Some(group), Ok(delay)) = (current.as_mut(), value.parse::<f64>()) {
                    if delay >= 0.0 {
                        group.crawl_delay = Some(delay);
                    }
                }
            }
            "request-rate" => {
                in_agent_lines = false;
                if let (Some(group), Some(rate)) = (current.as_mut(), parse_request_rate(value)) {
                    group.request_rate = Some(rate);
                }
            }
            _ => {
                // Other directives (Allow, Disallow, Sitemap, etc.)
                in_agent_lines = false;
            }
        }
    }

    if let Some(group) = current {
        groups.push(group);
    }

    groups
}

/// Parses `N/M`, where M may carry an `s`, `m` or `h` unit suffix
fn parse_request_rate(value: &str) -> Option<RequestRate> {
    let (requests, period) = value.split_once('/')?;
    let requests: u32 = requests.trim().parse().ok()?;
    if requests == 0 {
        return None;
    }

    let period = period.trim();
    let (number, multiplier) = match period.chars().last()? {
        's' => (&period[..period.len() - 1], 1.0),
        'm' => (&period[..period.len() - 1], 60.0),
        'h' => (&period[..period.len() - 1], 3600.0),
        _ => (period, 1.0),
    };
    let seconds: f64 = number.trim().parse().ok()?;

    Some(RequestRate {
        requests,
        seconds: seconds * multiplier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = RobotsPolicy::allow_all();
        assert!(robots.is_allowed("https://example.com/any/path", "TestBot"));
        assert_eq!(robots.crawl_delay("TestBot"), None);
        assert_eq!(robots.request_rate("TestBot"), None);
    }

    #[test]
    fn test_parse_disallow_all() {
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("https://example.com/", "TestBot"));
        assert!(!robots.is_allowed("https://example.com/page", "TestBot"));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed("https://example.com/page", "TestBot"));
        assert!(!robots.is_allowed("https://example.com/admin/users", "TestBot"));
    }

    #[test]
    fn test_parse_specific_user_agent() {
        let content = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = RobotsPolicy::from_content(content);
        assert!(robots.is_allowed("https://example.com/page", "GoodBot"));
        assert!(!robots.is_allowed("https://example.com/page", "BadBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: 2");
        assert_eq!(robots.crawl_delay("TestBot"), Some(2.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent_wins() {
        let content = "User-agent: *\nCrawl-delay: 10\n\nUser-agent: TestBot\nCrawl-delay: 5";
        let robots = RobotsPolicy::from_content(content);
        assert_eq!(robots.crawl_delay("TestBot/1.0"), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_after_disallow_in_same_group() {
        let content = "User-agent: *\nDisallow: /admin\nCrawl-delay: 3";
        let robots = RobotsPolicy::from_content(content);
        assert_eq!(robots.crawl_delay("TestBot"), Some(3.0));
    }

    #[test]
    fn test_crawl_delay_decimal() {
        let robots = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: 2.5");
        assert_eq!(robots.crawl_delay("TestBot"), Some(2.5));
    }

    #[test]
    fn test_crawl_delay_invalid_value_ignored() {
        let robots = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: soon");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_crawl_delay_multiple_user_agents() {
        let content = "User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3";
        let robots = RobotsPolicy::from_content(content);
        assert_eq!(robots.crawl_delay("BotA"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotB"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_case_insensitive() {
        let robots = RobotsPolicy::from_content("USER-AGENT: TestBot\ncrawl-delay: 7");
        assert_eq!(robots.crawl_delay("testbot"), Some(7.0));
    }

    #[test]
    fn test_comments_are_ignored() {
        let content = "# robots\nUser-agent: * # everyone\nCrawl-delay: 4 # seconds";
        let robots = RobotsPolicy::from_content(content);
        assert_eq!(robots.crawl_delay("TestBot"), Some(4.0));
    }

    #[test]
    fn test_request_rate() {
        let robots = RobotsPolicy::from_content("User-agent: *\nRequest-rate: 3/6");
        let rate = robots.request_rate("TestBot").unwrap();
        assert_eq!(rate.requests, 3);
        assert_eq!(rate.seconds, 6.0);
        assert_eq!(rate.delay_seconds(), 2.0);
    }

    #[test]
    fn test_request_rate_units() {
        assert_eq!(parse_request_rate("1/10s").unwrap().seconds, 10.0);
        assert_eq!(parse_request_rate("2/1m").unwrap().seconds, 60.0);
        assert_eq!(parse_request_rate("1/1h").unwrap().seconds, 3600.0);
        assert!(parse_request_rate("0/5").is_none());
        assert!(parse_request_rate("abc").is_none());
    }
}
