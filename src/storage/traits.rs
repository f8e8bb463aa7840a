//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    ConflictPolicy, MunicipalityCode, ParcelRecord, PropertyRecord, Road, RoadFilter, RunCounters,
    RunRecord, RunStatus,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Batch writes are atomic: either every row of a call is applied or none is.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, mode: &str, scope: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records a run's final status, finish timestamp and counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: RunCounters,
    ) -> StorageResult<()>;

    // ===== Roads =====

    /// Upserts roads on the (state, county, town, road_name) key
    ///
    /// Returns the number of rows inserted or, under
    /// [`ConflictPolicy::Replace`], inserted or updated.
    fn upsert_roads(&mut self, rows: &[Road], policy: ConflictPolicy) -> StorageResult<usize>;

    /// Selects stored roads ordered by their natural key
    fn select_roads(&self, filter: &RoadFilter) -> StorageResult<Vec<Road>>;

    /// Counts stored roads
    fn count_roads(&self) -> StorageResult<u64>;

    // ===== Properties =====

    /// Inserts property records without any conflict handling
    fn insert_properties(&mut self, rows: &[PropertyRecord]) -> StorageResult<usize>;

    /// Selects the property records stored for one road, in insertion order
    fn select_properties(&self, road: &Road) -> StorageResult<Vec<PropertyRecord>>;

    /// Counts stored property records
    fn count_properties(&self) -> StorageResult<u64>;

    // ===== Municipality Codes =====

    /// Inserts reference codes, skipping any `muni_fips` already present
    fn insert_municipality_codes(&mut self, codes: &[MunicipalityCode]) -> StorageResult<usize>;

    /// Lists reference codes ordered by `muni_fips`
    fn list_municipality_codes(&self) -> StorageResult<Vec<MunicipalityCode>>;

    // ===== Parcels =====

    /// Inserts parcel rows without any conflict handling
    fn insert_parcels(&mut self, rows: &[ParcelRecord]) -> StorageResult<usize>;

    /// Selects the parcels stored for one municipality, in insertion order
    fn select_parcels(&self, muni_fips: &str) -> StorageResult<Vec<ParcelRecord>>;

    /// Counts stored parcels
    fn count_parcels(&self) -> StorageResult<u64>;
}
