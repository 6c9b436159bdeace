//! dweb-crawler main entry point
//!
//! This is the command-line interface for the dweb-crawler indexer.

use clap::Parser;
use dweb_crawler::config::{load_config_with_hash, Config};
use dweb_crawler::index::SqliteDatabase;
use dweb_crawler::service::Service;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// dweb-crawler: an indexing crawler for IPFS
///
/// dweb-crawler resolves content identifiers, extracts metadata from files,
/// lists directories and queues everything it finds for further crawling.
/// Results are stored in a local SQLite index.
#[derive(Parser, Debug)]
#[command(name = "dweb-crawler")]
#[command(version)]
#[command(about = "An indexing crawler for IPFS", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Additional identifier to crawl, on top of the configured seeds
    #[arg(long = "seed", value_name = "CID")]
    seeds: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show document counts from the index database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Stop once every queue has drained instead of waiting for more work
    #[arg(long)]
    until_idle: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    config.seeds.extend(cli.seeds);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.until_idle).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dweb_crawler=info,warn"),
            1 => EnvFilter::new("dweb_crawler=debug,info"),
            2 => EnvFilter::new("dweb_crawler=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== dweb-crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Directory entry buffer: {}",
        config.crawler.dir_entry_buffer_size
    );
    println!("  Min update age: {}s", config.crawler.min_update_age);
    println!("  Stat timeout: {}s", config.crawler.stat_timeout);
    println!("  Directory entry timeout: {}s", config.crawler.dir_entry_timeout);
    println!("  Max directory size: {}", config.crawler.max_dir_size);

    println!("\nIPFS:");
    println!("  API: {}", config.ipfs.api_url);
    println!("  Gateway: {}", config.ipfs.gateway_url);
    println!("  Partial size: {}", config.ipfs.partial_size);

    println!("\nExtractors:");
    println!(
        "  tika: {} (max {} bytes)",
        config.tika.url, config.tika.max_file_size
    );
    match &config.nsfw {
        Some(nsfw) => println!("  nsfw: {} (max {} bytes)", nsfw.url, nsfw.max_file_size),
        None => println!("  nsfw: disabled"),
    }

    println!("\nIndex:");
    println!("  Database: {}", config.index.database_path);
    println!(
        "  Indexes: {}, {}, {}, {}",
        config.index.files, config.index.directories, config.index.invalids, config.index.partials
    );

    println!("\nWorkers:");
    println!("  Files: {}", config.workers.file_workers);
    println!("  Directories: {}", config.workers.directory_workers);
    println!("  Hashes: {}", config.workers.hash_workers);
    println!("  Requeue on error: {}", config.workers.requeue_on_error);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows document counts per index
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.index.database_path);

    let database = SqliteDatabase::open(Path::new(&config.index.database_path))?;
    let counts = database.counts()?;

    for name in [
        &config.index.files,
        &config.index.directories,
        &config.index.invalids,
        &config.index.partials,
    ] {
        let count = counts
            .iter()
            .find(|(index, _)| index == name)
            .map(|(_, count)| *count)
            .unwrap_or(0);
        println!("  {:<24} {}", name, count);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, until_idle: bool) -> Result<(), Box<dyn std::error::Error>> {
    let service = Service::from_config(&config)?;
    service.seed(&config.seeds).await?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping workers");
            shutdown.cancel();
        }
    });

    match service.run(token, until_idle).await {
        Ok(()) => {
            tracing::info!("Crawl stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
