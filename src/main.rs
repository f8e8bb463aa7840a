//! Parcel-Scout main entry point
//!
//! This is the command-line interface for the Parcel-Scout property-records crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use parcel_scout::config::{load_config_with_hash, Config};
use parcel_scout::crawler::{run_crawl, CrawlMode, CrawlReport};
use parcel_scout::output::{load_statistics, print_statistics};
use parcel_scout::storage::{open_storage, parse_municipality_codes, Storage};
use parcel_scout::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Parcel-Scout: a public property-records crawler
///
/// Discovers road names per town from county street indexes, then scrapes
/// per-road property listings into a local SQLite database.
#[derive(Parser, Debug)]
#[command(name = "parcel-scout")]
#[command(version = "1.0.0")]
#[command(about = "A public property-records crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk county street indexes and store road names per town
    Discover {
        /// Two-letter state code (defaults to the configured state)
        #[arg(long)]
        state: Option<String>,

        /// Single county identifier, e.g. morris or cape_may
        #[arg(long)]
        county: Option<String>,
    },

    /// Scrape property records for stored roads
    Detail {
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        county: Option<String>,

        #[arg(long)]
        town: Option<String>,

        #[arg(long)]
        road: Option<String>,
    },

    /// Query the statewide parcel layer for seeded municipalities
    Parcels {
        /// Two-digit county code or four-digit muni_fips, e.g. 14 or 1417
        #[arg(long)]
        municipality: Option<String>,
    },

    /// Load municipality codes into the database and exit
    SeedMunicipalities {
        /// Lines of county_code,municip_code,county_name,municipality_name
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show statistics from the database and exit
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context("invalid configuration");
        }
    };

    let mode = match crawl_mode(&config, &cli.command) {
        Ok(Some(mode)) => mode,
        Ok(None) => {
            return match &cli.command {
                Command::SeedMunicipalities { file } => handle_seed(&config, file, cli.dry_run),
                _ => handle_stats(&config),
            }
        }
        Err(e) => {
            tracing::error!("Invalid crawl scope: {}", e);
            return Err(e).context("invalid crawl scope");
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &mode);
        return Ok(());
    }

    handle_crawl(config, &config_hash, mode).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("parcel_scout=info,warn"),
            1 => EnvFilter::new("parcel_scout=debug,info"),
            2 => EnvFilter::new("parcel_scout=trace,debug"),
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

/// Turns a crawl subcommand into a crawl mode, filling in configured defaults
///
/// Returns None for `stats` and `seed-municipalities`, which do not crawl.
/// Scope overrides go through the same identifier checks as the config file.
fn crawl_mode(config: &Config, command: &Command) -> Result<Option<CrawlMode>, ConfigError> {
    let mode = match command {
        Command::Discover { state, county } => CrawlMode::discovery(
            state.as_deref().unwrap_or(&config.scope.state),
            county.as_deref(),
        )?,
        Command::Detail {
            state,
            county,
            town,
            road,
        } => CrawlMode::detail(
            state.as_deref(),
            county.as_deref(),
            town.as_deref(),
            road.as_deref(),
        )?,
        Command::Parcels { municipality } => CrawlMode::parcels(municipality.as_deref())?,
        Command::SeedMunicipalities { .. } | Command::Stats => return Ok(None),
    };

    Ok(Some(mode))
}

/// Handles --dry-run: shows the effective settings and the crawl scope
fn handle_dry_run(config: &Config, mode: &CrawlMode) {
    println!("=== Parcel-Scout Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Initial backoff: {}ms", config.crawler.initial_backoff_ms);
    println!(
        "  Navigation timeout: {}ms",
        config.crawler.navigation_timeout_ms
    );
    println!("  Batch size: {}", config.crawler.batch_size);
    println!(
        "  Delays: town {}ms, road {}ms, county {}ms",
        config.crawler.town_delay_ms, config.crawler.road_delay_ms, config.crawler.county_delay_ms
    );
    println!(
        "  Municipality delay: {}ms, parcels per query: {}",
        config.crawler.municipality_delay_ms, config.crawler.parcel_page_size
    );
    println!(
        "  Max concurrent sessions: {}",
        config.crawler.max_concurrent_sessions
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.value);

    println!("\nSources:");
    println!("  Property records: {}", config.sources.property_records_base);
    println!("  Street index: {}", config.sources.street_index_base);
    println!("  Parcel layer: {}", config.sources.parcel_query_url);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nScope:");
    println!("  Mode: {}", mode.name());
    println!("  {}", mode.scope());
    if let CrawlMode::Discovery { county: None, .. } = mode {
        println!("  Counties ({}):", config.scope.counties.len());
        for county in &config.scope.counties {
            println!("    - {}", county);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("cannot open database {}", config.output.database_path))?;

    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles seed-municipalities: loads reference codes into the database
fn handle_seed(config: &Config, file: &Path, dry_run: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read seed file {}", file.display()))?;
    let codes = parse_municipality_codes(&text)
        .with_context(|| format!("invalid seed file {}", file.display()))?;

    if dry_run {
        println!("{} municipality codes parsed from {}", codes.len(), file.display());
        return Ok(());
    }

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("cannot open database {}", config.output.database_path))?;
    let inserted = storage.insert_municipality_codes(&codes)?;

    tracing::info!(
        "Seeded {} municipality codes from {} ({} already present)",
        inserted,
        file.display(),
        codes.len() - inserted
    );

    Ok(())
}

/// Handles the discover, detail and parcels commands
async fn handle_crawl(config: Config, config_hash: &str, mode: CrawlMode) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("cannot open database {}", config.output.database_path))?;
    let storage = Arc::new(Mutex::new(storage));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received; stopping the crawl (press Ctrl-C again to quit now)");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received; exiting without recording the run");
            std::process::exit(130);
        }
    });

    match run_crawl(config, config_hash, storage, mode, cancel).await {
        Ok(report) => {
            log_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

fn log_report(report: &CrawlReport) {
    let outcome = if report.cancelled {
        "interrupted"
    } else {
        "completed"
    };

    tracing::info!(
        "Crawl {}: {} targets ok, {} abandoned, {} records extracted, {} rows written, {} batches dropped",
        outcome,
        report.targets_succeeded,
        report.targets_abandoned,
        report.records_extracted,
        report.rows_affected,
        report.batches_dropped
    );
}
