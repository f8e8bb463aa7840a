//! Crawler module for property-records collection
//!
//! This module contains the core crawling logic, including:
//! - Page fetching with retry and exponential backoff
//! - Extraction of towns, roads and property rows from loaded pages
//! - Parcel-layer queries per municipality
//! - Batch accumulation in front of storage
//! - Overall crawl coordination

mod batch;
mod coordinator;
mod extractor;
mod fetcher;
mod parcels;
mod retry;

pub use batch::{
    BatchAccumulator, BatchSink, BatchStats, FlushOutcome, ParcelSink, PropertySink, RoadSink,
};
pub use coordinator::{run_discovery_sessions, Coordinator, CrawlMode, CrawlReport};
pub use extractor::{
    extract_property_rows, extract_road_names, extract_town_links, street_of, zip_code_of,
    PropertyRow, TownLink,
};
pub use fetcher::{fetch_with_retry, FetchOutcome};
pub use parcels::{
    address_road, extract_parcels, parcel_query_url, property_class_description, ParcelPage,
    ParcelQueryError, PARCEL_OUT_FIELDS,
};
pub use retry::{RetryDecision, RetryPolicy, RetryState, Sleeper, TokioSleeper};

use crate::config::Config;
use crate::session::{build_http_client, HttpPageSession};
use crate::storage::{SharedStorage, Storage};
use crate::ScoutError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl against the live sites
///
/// Storage is opened by the caller and shared with every session. A
/// discovery run over all configured counties uses one HTTP session per
/// county when `max-concurrent-sessions` is above one; everything else runs
/// on a single session.
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `config_hash` - Hash of the config file, recorded on the run
/// * `storage` - Open storage shared by all sessions
/// * `mode` - Discovery, detail or parcel scope
/// * `cancel` - Cancelled on Ctrl-C; in-flight fetches and delays stop at once
pub async fn run_crawl<S>(
    config: Config,
    config_hash: &str,
    storage: SharedStorage<S>,
    mode: CrawlMode,
    cancel: CancellationToken,
) -> Result<CrawlReport, ScoutError>
where
    S: Storage + Send + 'static,
{
    let client = build_http_client(&config.user_agent)?;
    let config = Arc::new(config);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    match &mode {
        CrawlMode::Discovery {
            state,
            county: None,
        } if config.crawler.max_concurrent_sessions > 1 => {
            run_discovery_sessions(
                Arc::clone(&config),
                storage,
                sleeper,
                cancel,
                config_hash,
                state,
                || HttpPageSession::new(client.clone()),
            )
            .await
        }
        _ => {
            Coordinator::new(config, storage, HttpPageSession::new(client), sleeper)
                .with_cancellation(cancel)
                .with_config_hash(config_hash)
                .run(&mode)
                .await
        }
    }
}
