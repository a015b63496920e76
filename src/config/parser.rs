use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses and validates a configuration from TOML text
///
/// An empty document yields `Config::default()`; every section and key is
/// optional.
///
/// # Example
///
/// ```
/// use sumi_spider::config::parse_config;
///
/// let config = parse_config("[crawler]\nfollow-robots-txt = true\n").unwrap();
/// assert!(config.crawler.follow_robots_txt);
/// ```
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads a spider configuration file
///
/// # Returns
///
/// * `Ok(Config)` - The parsed and validated configuration
/// * `Err(ConfigError)` - The file cannot be read, is not valid TOML, or
///   fails validation
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Hex-encoded SHA-256 digest of a configuration file
///
/// Logged at startup so two runs can be told apart by the exact
/// configuration they used.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read(path)?;
    Ok(digest(&content))
}

/// Loads a configuration together with the digest of the bytes it came from
///
/// The file is read once, so the digest always matches the parsed content.
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, digest(content.as_bytes())))
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
