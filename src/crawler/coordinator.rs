//! Crawl coordinator - drives one page session through a crawl scope
//!
//! Discovery walks counties, then the towns on each county's street index,
//! and stores the road names found per town. Detail crawls read stored roads
//! and scrape each road's property-records page. Parcel crawls read seeded
//! municipality codes and query the parcel layer once per municipality. All
//! three run through the same phase machine: fetch, extract, accumulate, delay.

use crate::config::{validate_county_identifier, validate_state_code, Config};
use crate::crawler::batch::{
    BatchAccumulator, BatchSink, BatchStats, ParcelSink, PropertySink, RoadSink,
};
use crate::crawler::extractor::{extract_property_rows, extract_road_names, extract_town_links};
use crate::crawler::fetcher::{fetch_with_retry, FetchOutcome};
use crate::crawler::parcels::{extract_parcels, parcel_query_url};
use crate::crawler::retry::{RetryPolicy, Sleeper};
use crate::session::{NavigateOptions, NavigationError, PageSession};
use crate::state::{CrawlPhase, PhaseTracker};
use crate::storage::{
    ConflictPolicy, Road, RoadFilter, RunCounters, RunStatus, SharedStorage, Storage,
    StorageError,
};
use crate::url::{format_county_url, format_road_url, resolve_link, validate_road_target};
use crate::{ConfigError, ConfigResult, ScoutError};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a crawl run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlMode {
    /// Walk county street indexes and store road names per town
    Discovery {
        state: String,
        /// A single county, or every configured county when None
        county: Option<String>,
    },
    /// Scrape property records for stored roads
    Detail { filter: RoadFilter },
    /// Query the parcel layer for seeded municipalities
    Parcels {
        /// Two-digit county code or four-digit `muni_fips`; every code when None
        fips_prefix: Option<String>,
    },
}

impl CrawlMode {
    /// Discovery over `state`, optionally narrowed to one county
    ///
    /// Rejects identifiers that would not form a street-index URL.
    pub fn discovery(state: &str, county: Option<&str>) -> ConfigResult<Self> {
        validate_state_code(state)?;
        let county = county
            .map(|county| {
                let county = county.trim().to_lowercase();
                validate_county_identifier(&county).map(|_| county)
            })
            .transpose()?;

        Ok(Self::Discovery {
            state: state.to_lowercase(),
            county,
        })
    }

    /// Detail over the stored roads matching every given field
    pub fn detail(
        state: Option<&str>,
        county: Option<&str>,
        town: Option<&str>,
        road: Option<&str>,
    ) -> ConfigResult<Self> {
        let mut filter = RoadFilter::all();

        if let Some(state) = state {
            validate_state_code(state)?;
            filter = filter.state(state);
        }
        if let Some(county) = county {
            let county = county.trim().to_lowercase();
            validate_county_identifier(&county)?;
            filter = filter.county(&county);
        }
        if let Some(town) = town {
            filter = filter.town(non_blank("town", town)?);
        }
        if let Some(road) = road {
            filter = filter.road_name(non_blank("road", road)?);
        }

        Ok(Self::Detail { filter })
    }

    /// Parcel crawl over seeded municipalities whose `muni_fips` starts with `fips_prefix`
    pub fn parcels(fips_prefix: Option<&str>) -> ConfigResult<Self> {
        let fips_prefix = fips_prefix.map(str::trim);
        if let Some(prefix) = fips_prefix {
            if !matches!(prefix.len(), 2 | 4) || !prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Validation(format!(
                    "municipality filter must be a 2-digit county code or 4-digit muni_fips, got '{}'",
                    prefix
                )));
            }
        }

        Ok(Self::Parcels {
            fips_prefix: fips_prefix.map(str::to_string),
        })
    }

    /// Short name recorded on the run
    pub fn name(&self) -> &'static str {
        match self {
            Self::Discovery { .. } => "discovery",
            Self::Detail { .. } => "detail",
            Self::Parcels { .. } => "parcels",
        }
    }

    /// Human-readable scope recorded on the run
    pub fn scope(&self) -> String {
        match self {
            Self::Discovery { state, county } => match county {
                Some(county) => format!("state={},county={}", state, county),
                None => format!("state={},all counties", state),
            },
            Self::Detail { filter } => filter.describe(),
            Self::Parcels { fips_prefix } => match fips_prefix {
                Some(prefix) => format!("muni_fips={}*", prefix),
                None => "all municipalities".to_string(),
            },
        }
    }
}

fn non_blank<'a>(field: &str, value: &'a str) -> ConfigResult<&'a str> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be blank", field)));
    }
    Ok(value)
}

/// Totals for a finished (or cancelled) crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub targets_succeeded: u64,
    pub targets_abandoned: u64,
    /// Rows extracted from pages, before validation and batching
    pub records_extracted: u64,
    /// Rows handed to storage in successful flushes
    pub rows_written: u64,
    /// Rows storage actually inserted or updated
    pub rows_affected: u64,
    pub batches_dropped: u64,
    pub cancelled: bool,
}

impl CrawlReport {
    /// Folds another session's totals into this one
    pub fn merge(&mut self, other: &CrawlReport) {
        self.targets_succeeded += other.targets_succeeded;
        self.targets_abandoned += other.targets_abandoned;
        self.records_extracted += other.records_extracted;
        self.rows_written += other.rows_written;
        self.rows_affected += other.rows_affected;
        self.batches_dropped += other.batches_dropped;
        self.cancelled |= other.cancelled;
    }

    fn absorb(&mut self, stats: BatchStats) {
        self.rows_written += stats.rows_written;
        self.rows_affected += stats.rows_affected;
        self.batches_dropped += stats.batches_dropped;
    }

    fn counters(&self) -> RunCounters {
        RunCounters {
            targets_succeeded: self.targets_succeeded,
            targets_abandoned: self.targets_abandoned,
            rows_written: self.rows_affected,
        }
    }
}

/// Drives a single page session, strictly one target at a time
pub struct Coordinator<P, S> {
    config: Arc<Config>,
    storage: SharedStorage<S>,
    session: P,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    navigate: NavigateOptions,
    cancel: CancellationToken,
    config_hash: String,
    phase: PhaseTracker,
    report: CrawlReport,
}

impl<P, S> Coordinator<P, S>
where
    P: PageSession,
    S: Storage + Send,
{
    pub fn new(
        config: Arc<Config>,
        storage: SharedStorage<S>,
        session: P,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.crawler);
        let navigate =
            NavigateOptions::dom_ready(Duration::from_millis(config.crawler.navigation_timeout_ms));

        Self {
            config,
            storage,
            session,
            sleeper,
            retry,
            navigate,
            cancel: CancellationToken::new(),
            config_hash: String::new(),
            phase: PhaseTracker::new(),
            report: CrawlReport::default(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_config_hash(mut self, config_hash: &str) -> Self {
        self.config_hash = config_hash.to_string();
        self
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase.current()
    }

    /// Runs the crawl, records it in `crawl_runs` and closes the session
    ///
    /// Per-target failures are logged and counted; only storage reads and
    /// phase violations end the run with an error.
    pub async fn run(mut self, mode: &CrawlMode) -> Result<CrawlReport, ScoutError> {
        let run_id = {
            let mut storage = self.storage()?;
            storage.create_run(mode.name(), &mode.scope(), &self.config_hash)?
        };
        tracing::info!("Starting {} run {} ({})", mode.name(), run_id, mode.scope());

        let result = match mode {
            CrawlMode::Discovery { state, county } => {
                self.run_discovery(state, county.as_deref()).await
            }
            CrawlMode::Detail { filter } => self.run_detail(filter).await,
            CrawlMode::Parcels { fips_prefix } => self.run_parcels(fips_prefix.as_deref()).await,
        };

        self.session.close().await;

        if self.cancel.is_cancelled() {
            self.report.cancelled = true;
        }

        let status = match &result {
            Ok(()) if self.report.cancelled => RunStatus::Interrupted,
            Ok(()) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };

        let counters = self.report.counters();
        let finished = self.storage().and_then(|mut storage| {
            storage
                .finish_run(run_id, status, counters)
                .map_err(ScoutError::from)
        });
        if let Err(e) = finished {
            tracing::error!("Failed to record end of run {}: {}", run_id, e);
        }

        result?;

        tracing::info!(
            "Run {} {}: {} targets ok, {} abandoned, {} records extracted, {} rows written",
            run_id,
            status.to_db_string(),
            self.report.targets_succeeded,
            self.report.targets_abandoned,
            self.report.records_extracted,
            self.report.rows_affected
        );

        Ok(self.report)
    }

    fn storage(&self) -> Result<MutexGuard<'_, S>, ScoutError> {
        self.storage
            .lock()
            .map_err(|_| ScoutError::from(StorageError::LockPoisoned))
    }

    async fn run_discovery(&mut self, state: &str, county: Option<&str>) -> Result<(), ScoutError> {
        let counties = match county {
            Some(county) => vec![county.to_lowercase()],
            None => self.config.scope.counties.clone(),
        };

        let total = counties.len();
        for (i, county) in counties.iter().enumerate() {
            if self.stop_requested() {
                break;
            }

            self.discover_county(state, county).await?;

            if i + 1 < total {
                self.pause(Duration::from_millis(self.config.crawler.county_delay_ms))
                    .await;
            }
        }

        Ok(())
    }

    async fn discover_county(&mut self, state: &str, county: &str) -> Result<(), ScoutError> {
        self.begin_scope()?;

        let county_url = format_county_url(&self.config.sources.street_index_base, state, county);
        tracing::info!("County: {} | URL: {}", county, county_url);

        let sink = RoadSink::new(Arc::clone(&self.storage), ConflictPolicy::Ignore);
        let mut batch = BatchAccumulator::new(sink, self.config.crawler.batch_size);

        let towns = match self.fetch(&county_url).await {
            Ok(_) => self.session.evaluate_in_page(extract_town_links),
            Err(NavigationError::Cancelled { .. }) => {
                self.interrupted(&county_url);
                return self.finish_scope(&mut batch);
            }
            Err(e) => {
                tracing::error!("Abandoning county {} ({}): {}", county, county_url, e);
                self.report.targets_abandoned += 1;
                return self.finish_scope(&mut batch);
            }
        };

        if towns.is_empty() {
            tracing::info!("No towns found for county {} ({})", county, county_url);
        } else {
            tracing::info!("Found {} towns in {}", towns.len(), county);
        }

        let base = Url::parse(&county_url)?;
        let total = towns.len();

        for (i, town) in towns.into_iter().enumerate() {
            if self.stop_requested() {
                break;
            }

            let Some(town_url) = resolve_link(&town.href, &base) else {
                tracing::warn!("Skipping town {}: unusable link {:?}", town.name, town.href);
                self.report.targets_abandoned += 1;
                continue;
            };

            self.phase.advance(CrawlPhase::Fetching)?;
            tracing::info!(" -> Town: {} | URL: {}", town.name, town_url);

            match self.fetch(&town_url).await {
                Ok(outcome) => {
                    self.phase.advance(CrawlPhase::Extracting)?;
                    let road_names = self.session.evaluate_in_page(extract_road_names);

                    if road_names.is_empty() {
                        tracing::info!("No roads found for {} ({})", town.name, town_url);
                    } else {
                        tracing::info!(
                            "    Roads found: {} (after {} attempt(s))",
                            road_names.len(),
                            outcome.attempts
                        );
                    }

                    self.phase.advance(CrawlPhase::Accumulating)?;
                    self.report.records_extracted += road_names.len() as u64;
                    for name in &road_names {
                        match Road::new(state, county, &town.name, name) {
                            Some(road) => {
                                batch.add(road);
                            }
                            None => tracing::debug!("Skipping blank road in {}", town.name),
                        }
                    }
                    self.report.targets_succeeded += 1;
                }
                Err(NavigationError::Cancelled { .. }) => {
                    self.interrupted(&town_url);
                    self.phase.advance(CrawlPhase::Delaying)?;
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Abandoning town {} in {} ({}): {}",
                        town.name,
                        county,
                        town_url,
                        e
                    );
                    self.report.targets_abandoned += 1;
                }
            }

            self.phase.advance(CrawlPhase::Delaying)?;
            if i + 1 < total {
                self.pause(Duration::from_millis(self.config.crawler.town_delay_ms))
                    .await;
            }
        }

        self.finish_scope(&mut batch)
    }

    async fn run_detail(&mut self, filter: &RoadFilter) -> Result<(), ScoutError> {
        self.begin_scope()?;

        let roads = {
            let storage = self.storage()?;
            storage.select_roads(filter)?
        };

        if roads.is_empty() {
            tracing::info!("No stored roads match {}", filter.describe());
        } else {
            tracing::info!("Crawling {} roads ({})", roads.len(), filter.describe());
        }

        let sink = PropertySink::new(Arc::clone(&self.storage));
        let mut batch = BatchAccumulator::new(sink, self.config.crawler.batch_size);
        let total = roads.len();

        for (i, road) in roads.iter().enumerate() {
            if self.stop_requested() {
                break;
            }

            if let Err(e) = validate_road_target(&road.state, &road.town, &road.road_name) {
                tracing::warn!("Skipping road: {}", e);
                self.report.targets_abandoned += 1;
                continue;
            }

            let url = format_road_url(
                &self.config.sources.property_records_base,
                &road.state,
                &road.town,
                &road.road_name,
            );

            self.phase.advance(CrawlPhase::Fetching)?;
            tracing::info!("Opening page: {}", url);

            match self.fetch(&url).await {
                Ok(outcome) => {
                    self.phase.advance(CrawlPhase::Extracting)?;
                    let rows = self.session.evaluate_in_page(extract_property_rows);

                    if rows.is_empty() {
                        tracing::info!(
                            "No property records for {}, {} ({})",
                            road.road_name,
                            road.town,
                            url
                        );
                    } else {
                        tracing::info!(
                            "Found {} addresses for {}, {} (after {} attempt(s))",
                            rows.len(),
                            road.road_name,
                            road.town,
                            outcome.attempts
                        );
                    }

                    self.phase.advance(CrawlPhase::Accumulating)?;
                    self.report.records_extracted += rows.len() as u64;
                    for row in rows {
                        match row.into_record(road) {
                            Some(record) => {
                                batch.add(record);
                            }
                            None => tracing::debug!("Skipping row without address on {}", url),
                        }
                    }
                    self.report.targets_succeeded += 1;
                }
                Err(NavigationError::Cancelled { .. }) => {
                    self.interrupted(&url);
                    self.phase.advance(CrawlPhase::Delaying)?;
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Abandoning road {} in {}, {} ({}): {}",
                        road.road_name,
                        road.town,
                        road.county,
                        url,
                        e
                    );
                    self.report.targets_abandoned += 1;
                }
            }

            self.phase.advance(CrawlPhase::Delaying)?;
            if i + 1 < total {
                self.pause(Duration::from_millis(self.config.crawler.road_delay_ms))
                    .await;
            }
        }

        self.finish_scope(&mut batch)
    }

    async fn run_parcels(&mut self, fips_prefix: Option<&str>) -> Result<(), ScoutError> {
        self.begin_scope()?;

        let municipalities: Vec<_> = {
            let storage = self.storage()?;
            storage.list_municipality_codes()?
        }
        .into_iter()
        .filter(|code| fips_prefix.map_or(true, |prefix| code.muni_fips.starts_with(prefix)))
        .collect();

        if municipalities.is_empty() {
            tracing::warn!("No seeded municipality codes match; run seed-municipalities first");
        } else {
            tracing::info!("Querying parcels for {} municipalities", municipalities.len());
        }

        let sink = ParcelSink::new(Arc::clone(&self.storage));
        let mut batch = BatchAccumulator::new(sink, self.config.crawler.batch_size);
        let total = municipalities.len();

        for (i, municipality) in municipalities.iter().enumerate() {
            if self.stop_requested() {
                break;
            }

            let url = parcel_query_url(
                &self.config.sources.parcel_query_url,
                &municipality.muni_fips,
                self.config.crawler.parcel_page_size,
            )?
            .to_string();

            self.phase.advance(CrawlPhase::Fetching)?;
            tracing::info!(
                "Municipality: {} ({}, {})",
                municipality.muni_fips,
                municipality.municipality_name,
                municipality.county_name
            );

            match self.fetch(&url).await {
                Ok(_) => {
                    self.phase.advance(CrawlPhase::Extracting)?;
                    let parsed = extract_parcels(
                        self.session.content().unwrap_or_default(),
                        &municipality.muni_fips,
                    );
                    self.phase.advance(CrawlPhase::Accumulating)?;

                    match parsed {
                        Ok(page) => {
                            if page.truncated {
                                tracing::warn!(
                                    "Parcel layer capped {} at {} parcels",
                                    municipality.muni_fips,
                                    self.config.crawler.parcel_page_size
                                );
                            }
                            tracing::info!("    Parcels found: {}", page.parcels.len());
                            self.report.records_extracted += page.parcels.len() as u64;
                            for parcel in page.parcels {
                                batch.add(parcel);
                            }
                            self.report.targets_succeeded += 1;
                        }
                        Err(e) => {
                            tracing::error!(
                                "Abandoning municipality {}: {}",
                                municipality.muni_fips,
                                e
                            );
                            self.report.targets_abandoned += 1;
                        }
                    }
                }
                Err(NavigationError::Cancelled { .. }) => {
                    self.interrupted(&url);
                    self.phase.advance(CrawlPhase::Delaying)?;
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Abandoning municipality {} ({}): {}",
                        municipality.muni_fips,
                        municipality.municipality_name,
                        e
                    );
                    self.report.targets_abandoned += 1;
                }
            }

            self.phase.advance(CrawlPhase::Delaying)?;
            if i + 1 < total {
                self.pause(Duration::from_millis(
                    self.config.crawler.municipality_delay_ms,
                ))
                .await;
            }
        }

        self.finish_scope(&mut batch)
    }

    async fn fetch(&mut self, url: &str) -> Result<FetchOutcome, NavigationError> {
        fetch_with_retry(
            &mut self.session,
            url,
            &self.navigate,
            &self.retry,
            self.sleeper.as_ref(),
            &self.cancel,
        )
        .await
    }

    /// Records a fetch cut short by cancellation; the target counts as neither outcome
    fn interrupted(&mut self, url: &str) {
        tracing::info!("Cancellation requested; dropped in-flight fetch of {}", url);
        self.report.cancelled = true;
    }

    fn begin_scope(&mut self) -> Result<(), ScoutError> {
        if self.phase.current().is_terminal() {
            self.phase.advance(CrawlPhase::Idle)?;
        }
        self.phase.advance(CrawlPhase::ListingTargets)
    }

    fn finish_scope<T, K: BatchSink<T>>(
        &mut self,
        batch: &mut BatchAccumulator<T, K>,
    ) -> Result<(), ScoutError> {
        self.phase.advance(CrawlPhase::Done)?;
        batch.flush();
        self.report.absorb(batch.stats());
        Ok(())
    }

    fn stop_requested(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            if !self.report.cancelled {
                tracing::info!("Cancellation requested; stopping before the next target");
            }
            self.report.cancelled = true;
        }
        self.report.cancelled
    }

    /// Sleeps between targets; returns early on cancellation
    async fn pause(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let sleeper = Arc::clone(&self.sleeper);
        let cancel = self.cancel.clone();

        let cancelled = tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = sleeper.sleep(duration) => false,
        };

        if cancelled {
            self.report.cancelled = true;
        }
    }
}

/// Runs discovery with one session per county, at most `max-concurrent-sessions` at once
///
/// Each county gets its own session, accumulator and run record; only
/// storage is shared.
pub async fn run_discovery_sessions<P, S, F>(
    config: Arc<Config>,
    storage: SharedStorage<S>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    config_hash: &str,
    state: &str,
    mut new_session: F,
) -> Result<CrawlReport, ScoutError>
where
    P: PageSession + 'static,
    S: Storage + Send + 'static,
    F: FnMut() -> P,
{
    let limit = config.crawler.max_concurrent_sessions.max(1) as usize;
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut tasks = JoinSet::new();

    tracing::info!(
        "Discovering {} counties with up to {} concurrent sessions",
        config.scope.counties.len(),
        limit
    );

    for county in &config.scope.counties {
        let coordinator = Coordinator::new(
            Arc::clone(&config),
            Arc::clone(&storage),
            new_session(),
            Arc::clone(&sleeper),
        )
        .with_cancellation(cancel.clone())
        .with_config_hash(config_hash);

        let mode = CrawlMode::Discovery {
            state: state.to_string(),
            county: Some(county.clone()),
        };
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            coordinator.run(&mode).await
        });
    }

    let mut report = CrawlReport::default();
    let mut failure = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(session_report)) => report.merge(&session_report),
            Ok(Err(e)) => {
                tracing::error!("Discovery session failed: {}", e);
                failure.get_or_insert(e);
            }
            Err(e) => tracing::error!("Discovery session panicked: {}", e),
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(report),
    }
}
