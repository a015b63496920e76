//! Sumi-Spider main entry point
//!
//! This is the command-line interface for the Sumi-Spider crawler runtime.

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_spider::config::{load_config_with_hash, Config};
use sumi_spider::crawler::{BrowserFetcher, BrowserlessDriver};
use sumi_spider::output::{print_statistics, read_items};
use sumi_spider::url::{host_key, validate_seed_url};
use sumi_spider::{ItemSaver, Response, Spider};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Sumi-Spider: a polite crawler runtime
///
/// Sumi-Spider crawls the given URLs, records the title of every page it
/// reaches and follows the links it finds, while honouring robots.txt
/// delays when configured to.
#[derive(Parser, Debug)]
#[command(name = "sumi-spider")]
#[command(version)]
#[command(about = "A polite crawler runtime", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed URLs (http, https or file)
    #[arg(value_name = "URL", required_unless_present = "read_items")]
    urls: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Name of the spider in logs and statistics
    #[arg(long)]
    name: Option<String>,

    /// Validate config and seeds without crawling
    #[arg(long, conflicts_with = "read_items")]
    dry_run: bool,

    /// Render pages through the configured browser endpoint
    #[arg(long)]
    browser: bool,

    /// Only follow links whose host is one of the seed hosts
    #[arg(long)]
    same_host: bool,

    /// Print the items stored in a backup file and exit
    #[arg(long, value_name = "FILE")]
    read_items: Option<PathBuf>,
}

/// Item saved for every page reached by the built-in handler
#[derive(Debug, Serialize)]
struct PageItem {
    url: String,
    title: Option<String>,
    fetched_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Some(path) = &cli.read_items {
        return handle_read_items(path);
    }

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli.urls)?;
    } else {
        handle_crawl(config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_spider=info,warn"),
            1 => EnvFilter::new("sumi_spider=debug,info"),
            2 => EnvFilter::new("sumi_spider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --read-items mode: prints every stored item as JSON
fn handle_read_items(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let items = read_items(path)?;
    for item in &items {
        println!("{}", serde_json::to_string(item)?);
    }
    tracing::info!("{} items read from {}", items.len(), path.display());
    Ok(())
}

/// Handles the --dry-run mode: validates config and seeds
fn handle_dry_run(config: &Config, urls: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sumi-Spider Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Request delay: {}ms - {}ms",
        config.crawler.min_request_delay, config.crawler.max_request_delay
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout);
    println!("  Follow robots.txt: {}", config.crawler.follow_robots_txt);
    println!("  Ignore errors: {}", config.crawler.ignore_errors);
    if let Some(folder) = &config.crawler.robots_cache_folder {
        println!("  Robots cache folder: {}", folder.display());
    }
    if let Some(backup) = &config.crawler.backup_filename {
        println!("  Backup file: {}", backup.display());
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent_string());

    if let Some(browser) = &config.browser {
        println!("\nBrowser:");
        println!("  Endpoint: {}", browser.endpoint);
        println!("  Find timeout: {}ms", browser.find_timeout);
    }

    println!("\nSeed URLs ({}):", urls.len());
    for url in urls {
        validate_seed_url(url)?;
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", urls.len());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let allowed_hosts: Option<Arc<HashSet<String>>> = if cli.same_host {
        let hosts = cli
            .urls
            .iter()
            .filter_map(|u| Url::parse(u).ok())
            .filter_map(|u| host_key(&u))
            .collect();
        Some(Arc::new(hosts))
    } else {
        None
    };
    let save_items = config.crawler.backup_filename.is_some();
    let browser_config = config.browser.clone();

    let handler = move |response: Response, items: ItemSaver| {
        let allowed_hosts = allowed_hosts.clone();
        async move {
            if save_items {
                let item = PageItem {
                    url: response.url().to_string(),
                    title: response.title(),
                    fetched_at: Utc::now(),
                };
                items.save_item(&item).await?;
            }

            for link in response.links() {
                let keep = match &allowed_hosts {
                    Some(hosts) => Url::parse(&link)
                        .ok()
                        .and_then(|u| host_key(&u))
                        .map_or(false, |host| hosts.contains(&host)),
                    None => true,
                };
                if keep {
                    response.follow(&link).await?;
                }
            }
            anyhow::Ok(())
        }
    };

    let mut spider = Spider::new(&cli.urls, handler, config)?;
    if let Some(name) = &cli.name {
        spider = spider.name(name);
    }
    if cli.browser {
        let browser = browser_config.ok_or("--browser requires a [browser] section in the config")?;
        spider = spider.with_fetcher(BrowserFetcher::new(BrowserlessDriver::new(&browser)?));
    }

    tracing::info!("Total seed URLs: {}", spider.urls().len());

    match spider.run().await {
        Ok(stats) => {
            tracing::info!("Crawl completed successfully");
            if !cli.quiet {
                print_statistics(&stats);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
