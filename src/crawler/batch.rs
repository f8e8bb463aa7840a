//! Batch accumulation and flushing
//!
//! Extracted rows are buffered in order and written to storage in batches.
//! A failed batch is logged and dropped; it is never retried.

use crate::storage::{
    ConflictPolicy, ParcelRecord, PropertyRecord, Road, SharedStorage, Storage, StorageError,
    StorageResult,
};
use std::sync::MutexGuard;

/// Destination for flushed batches
pub trait BatchSink<T> {
    /// Table name used in logs
    fn table(&self) -> &'static str;

    /// Writes one batch atomically, returning the number of rows affected
    fn write_batch(&mut self, rows: &[T]) -> StorageResult<usize>;
}

fn lock<S>(storage: &SharedStorage<S>) -> StorageResult<MutexGuard<'_, S>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Upserts roads on their natural key
pub struct RoadSink<S> {
    storage: SharedStorage<S>,
    policy: ConflictPolicy,
}

impl<S> RoadSink<S> {
    pub fn new(storage: SharedStorage<S>, policy: ConflictPolicy) -> Self {
        Self { storage, policy }
    }
}

impl<S: Storage> BatchSink<Road> for RoadSink<S> {
    fn table(&self) -> &'static str {
        "roads"
    }

    fn write_batch(&mut self, rows: &[Road]) -> StorageResult<usize> {
        lock(&self.storage)?.upsert_roads(rows, self.policy)
    }
}

/// Inserts property records
pub struct PropertySink<S> {
    storage: SharedStorage<S>,
}

impl<S> PropertySink<S> {
    pub fn new(storage: SharedStorage<S>) -> Self {
        Self { storage }
    }
}

impl<S: Storage> BatchSink<PropertyRecord> for PropertySink<S> {
    fn table(&self) -> &'static str {
        "properties"
    }

    fn write_batch(&mut self, rows: &[PropertyRecord]) -> StorageResult<usize> {
        lock(&self.storage)?.insert_properties(rows)
    }
}

/// Inserts parcels from the parcel layer
pub struct ParcelSink<S> {
    storage: SharedStorage<S>,
}

impl<S> ParcelSink<S> {
    pub fn new(storage: SharedStorage<S>) -> Self {
        Self { storage }
    }
}

impl<S: Storage> BatchSink<ParcelRecord> for ParcelSink<S> {
    fn table(&self) -> &'static str {
        "parcels"
    }

    fn write_batch(&mut self, rows: &[ParcelRecord]) -> StorageResult<usize> {
        lock(&self.storage)?.insert_parcels(rows)
    }
}

/// Result of one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; the sink was not called
    Empty,
    /// The sink accepted the batch
    Written { rows: usize, affected: usize },
    /// The sink failed; the batch is gone
    Dropped { rows: usize, error: String },
}

/// Running totals across flushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub flushes: u64,
    pub rows_written: u64,
    pub rows_affected: u64,
    pub batches_dropped: u64,
    pub rows_dropped: u64,
}

/// Buffers rows until `threshold`, then hands them to the sink
pub struct BatchAccumulator<T, K> {
    buffer: Vec<T>,
    threshold: usize,
    sink: K,
    stats: BatchStats,
}

impl<T, K: BatchSink<T>> BatchAccumulator<T, K> {
    pub fn new(sink: K, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            buffer: Vec::with_capacity(threshold),
            threshold,
            sink,
            stats: BatchStats::default(),
        }
    }

    /// Buffers a row, flushing when the buffer reaches the threshold
    pub fn add(&mut self, row: T) -> Option<FlushOutcome> {
        self.buffer.push(row);

        if self.buffer.len() >= self.threshold {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Writes everything buffered so far
    pub fn flush(&mut self) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::Empty;
        }

        let batch = std::mem::take(&mut self.buffer);
        let rows = batch.len();
        self.stats.flushes += 1;

        match self.sink.write_batch(&batch) {
            Ok(affected) => {
                tracing::info!(
                    "Flushed {} rows to {} ({} affected)",
                    rows,
                    self.sink.table(),
                    affected
                );
                self.stats.rows_written += rows as u64;
                self.stats.rows_affected += affected as u64;
                FlushOutcome::Written { rows, affected }
            }
            Err(e) => {
                tracing::error!(
                    "Dropping batch of {} rows for {}: {}",
                    rows,
                    self.sink.table(),
                    e
                );
                self.stats.batches_dropped += 1;
                self.stats.rows_dropped += rows as u64;
                FlushOutcome::Dropped {
                    rows,
                    error: e.to_string(),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingSink {
        batches: Vec<usize>,
    }

    impl BatchSink<u32> for CountingSink {
        fn table(&self) -> &'static str {
            "numbers"
        }

        fn write_batch(&mut self, rows: &[u32]) -> StorageResult<usize> {
            self.batches.push(rows.len());
            Ok(rows.len())
        }
    }

    struct FailingSink;

    impl BatchSink<u32> for FailingSink {
        fn table(&self) -> &'static str {
            "numbers"
        }

        fn write_batch(&mut self, _rows: &[u32]) -> StorageResult<usize> {
            Err(StorageError::Database("constraint violation".to_string()))
        }
    }

    #[test]
    fn test_threshold_triggers_one_flush() {
        let mut acc = BatchAccumulator::new(CountingSink::default(), 500);

        let flushes: Vec<FlushOutcome> = (0..500).filter_map(|i| acc.add(i)).collect();

        assert_eq!(
            flushes,
            vec![FlushOutcome::Written {
                rows: 500,
                affected: 500
            }]
        );
        assert_eq!(acc.sink.batches, vec![500]);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_partial_batch_flushed_at_end() {
        let mut acc = BatchAccumulator::new(CountingSink::default(), 500);

        for i in 0..499 {
            assert!(acc.add(i).is_none());
        }
        assert_eq!(acc.len(), 499);
        assert!(acc.sink.batches.is_empty());

        acc.flush();
        assert_eq!(acc.sink.batches, vec![499]);
    }

    #[test]
    fn test_empty_flush_skips_sink() {
        let mut acc = BatchAccumulator::new(CountingSink::default(), 10);
        assert_eq!(acc.flush(), FlushOutcome::Empty);
        assert!(acc.sink.batches.is_empty());
        assert_eq!(acc.stats().flushes, 0);
    }

    #[test]
    fn test_failed_batch_is_dropped() {
        let mut acc = BatchAccumulator::new(FailingSink, 2);

        assert!(acc.add(1).is_none());
        let outcome = acc.add(2).unwrap();
        assert!(matches!(outcome, FlushOutcome::Dropped { rows: 2, .. }));
        assert!(acc.is_empty());

        let stats = acc.stats();
        assert_eq!(stats.batches_dropped, 1);
        assert_eq!(stats.rows_dropped, 2);
        assert_eq!(stats.rows_written, 0);
    }

    #[test]
    fn test_road_sink_ignores_duplicates() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let sink = RoadSink::new(Arc::clone(&storage), ConflictPolicy::Ignore);
        let mut acc = BatchAccumulator::new(sink, 10);

        let road = Road::new("nj", "morris", "Madison", "Kings Rd").unwrap();
        acc.add(road.clone());
        acc.flush();
        acc.add(road);
        let outcome = acc.flush();

        assert_eq!(
            outcome,
            FlushOutcome::Written {
                rows: 1,
                affected: 0
            }
        );
        assert_eq!(storage.lock().unwrap().count_roads().unwrap(), 1);
    }

    #[test]
    fn test_property_sink_inserts() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let mut acc = BatchAccumulator::new(PropertySink::new(Arc::clone(&storage)), 2);

        let record = PropertyRecord {
            full_address: "305 Kings Rd, Madison, NJ 07940".to_string(),
            street_name: "Kings Rd".to_string(),
            zip_code: Some("07940".to_string()),
            market_value: None,
            year_built: None,
            last_sale: None,
            town: "Madison".to_string(),
            county: "morris".to_string(),
            state: "NJ".to_string(),
        };
        acc.add(record.clone());
        acc.add(record);

        assert_eq!(acc.stats().rows_written, 2);
        assert_eq!(storage.lock().unwrap().count_properties().unwrap(), 2);
    }

    #[test]
    fn test_parcel_sink_inserts() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let mut acc = BatchAccumulator::new(ParcelSink::new(Arc::clone(&storage)), 500);

        acc.add(ParcelRecord {
            muni_fips: "1417".to_string(),
            property_description: "Vacant Land".to_string(),
            ..ParcelRecord::default()
        });
        assert_eq!(acc.len(), 1);
        assert_eq!(storage.lock().unwrap().count_parcels().unwrap(), 0);

        assert_eq!(
            acc.flush(),
            FlushOutcome::Written {
                rows: 1,
                affected: 1
            }
        );
        assert_eq!(storage.lock().unwrap().count_parcels().unwrap(), 1);
    }
}
