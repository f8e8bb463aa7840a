//! Statistics generation from the crawl database
//!
//! Backs the `stats` command: row counts per table and a summary of the most
//! recent crawl run.

use crate::storage::{RunRecord, Storage};
use crate::ScoutError;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Distinct roads discovered
    pub roads: u64,

    /// Property records scraped
    pub properties: u64,

    /// Municipality reference codes loaded
    pub municipality_codes: u64,

    /// Parcels fetched from the parcel layer
    pub parcels: u64,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Wall-clock duration of the latest run, once it has finished
    pub fn latest_run_seconds(&self) -> Option<i64> {
        let run = self.latest_run.as_ref()?;
        let started = run
            .started_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .ok()?;
        let finished = run
            .finished_at
            .as_deref()?
            .parse::<chrono::DateTime<chrono::Utc>>()
            .ok()?;
        Some((finished - started).num_seconds())
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, ScoutError> {
    Ok(CrawlStatistics {
        roads: storage.count_roads()?,
        properties: storage.count_properties()?,
        municipality_codes: storage.list_municipality_codes()?.len() as u64,
        parcels: storage.count_parcels()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Roads discovered: {}", stats.roads);
    println!("  Property records: {}", stats.properties);
    println!("  Municipality codes: {}", stats.municipality_codes);
    println!("  Parcels: {}", stats.parcels);
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No crawl runs recorded yet.");
        return;
    };

    println!("Latest Run:");
    println!("  Id: {}", run.id);
    println!("  Mode: {} ({})", run.mode, run.scope);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(seconds) = stats.latest_run_seconds() {
        println!("  Duration: {}s", seconds);
    }
    println!(
        "  Targets: {} succeeded, {} abandoned",
        run.targets_succeeded, run.targets_abandoned
    );
    println!("  Rows written: {}", run.rows_written);
    println!("  Config hash: {}", run.config_hash);
}
