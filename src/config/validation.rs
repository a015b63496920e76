use crate::config::types::{BrowserConfig, Config, CrawlerConfig, UserAgentConfig};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    if let Some(browser) = &config.browser {
        validate_browser_config(browser)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_request_delay < config.min_request_delay {
        return Err(ConfigError::Validation(format!(
            "max_request_delay must be greater or equal than min_request_delay, got {}ms < {}ms",
            config.max_request_delay, config.min_request_delay
        )));
    }

    if config.fetch_timeout == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout must be greater than 0ms".to_string(),
        ));
    }

    if let Some(folder) = &config.robots_cache_folder {
        validate_robots_folder(folder)?;
    }

    if let Some(backup) = &config.backup_filename {
        validate_backup_file(backup)?;
    }

    Ok(())
}

/// Checks that the robots cache folder exists and accepts a write/read cycle
fn validate_robots_folder(path: &Path) -> Result<(), ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::Validation(format!(
            "robots_cache_folder '{}' does not exist",
            path.display()
        )));
    }

    let probe = path.join("dummy_file");
    std::fs::write(&probe, "hello").map_err(|e| {
        ConfigError::Validation(format!("Cannot write file in {}: {}", path.display(), e))
    })?;
    std::fs::read_to_string(&probe).map_err(|e| {
        ConfigError::Validation(format!("Cannot read file in {}: {}", path.display(), e))
    })?;
    std::fs::remove_file(&probe)?;

    Ok(())
}

/// Checks that the backup file can be created, without leaving it behind
fn validate_backup_file(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ConfigError::Validation(format!(
                "backup_filename '{}' cannot be created: {}",
                path.display(),
                e
            ))
        })?;
    std::fs::remove_file(path)?;

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Validates the browser endpoint
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid browser endpoint: {}", e)))?;

    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Browser endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
