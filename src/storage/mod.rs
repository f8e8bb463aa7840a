//! Storage module for persisting crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Conflict-ignoring road upserts keyed on the natural key
//! - Property record inserts
//! - The municipality code reference table and its seed file
//! - Parcel rows fetched per municipality
//! - Crawl run bookkeeping

mod schema;
mod seed;
mod sqlite;
mod traits;

pub use seed::parse_municipality_codes;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ScoutError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage handle shared by concurrent crawl sessions
pub type SharedStorage<S> = Arc<Mutex<S>>;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScoutError> {
    SqliteStorage::new(path)
}

/// A road discovered for a town
///
/// The natural key is all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Road {
    pub state: String,
    pub county: String,
    pub town: String,
    pub road_name: String,
}

impl Road {
    /// Builds a road row, normalizing the state to upper case and county
    /// identifiers like `cape_may` to `cape may`
    ///
    /// Returns None when any field is blank after trimming.
    pub fn new(state: &str, county: &str, town: &str, road_name: &str) -> Option<Self> {
        let road = Self {
            state: state.trim().to_uppercase(),
            county: county.replace('_', " ").trim().to_string(),
            town: town.trim().to_string(),
            road_name: road_name.trim().to_string(),
        };

        if road.state.is_empty()
            || road.county.is_empty()
            || road.town.is_empty()
            || road.road_name.is_empty()
        {
            return None;
        }

        Some(road)
    }
}

/// A property listing scraped from one road's page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub full_address: String,
    /// Always the road being crawled, never the parsed street
    pub street_name: String,
    pub zip_code: Option<String>,
    pub market_value: Option<String>,
    pub year_built: Option<String>,
    pub last_sale: Option<String>,
    pub town: String,
    pub county: String,
    pub state: String,
}

/// A row of the municipality code reference table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityCode {
    pub county_code: String,
    pub municip_code: String,
    pub muni_fips: String,
    pub county_name: String,
    pub municipality_name: String,
}

impl MunicipalityCode {
    /// Builds a code row; `muni_fips` is the county code followed by the municipality code
    pub fn new(
        county_code: &str,
        municip_code: &str,
        county_name: &str,
        municipality_name: &str,
    ) -> Self {
        Self {
            county_code: county_code.to_string(),
            municip_code: municip_code.to_string(),
            muni_fips: format!("{}{}", county_code, municip_code),
            county_name: county_name.to_string(),
            municipality_name: municipality_name.to_string(),
        }
    }
}

/// A tax parcel returned by the statewide parcel layer
///
/// Fields the layer leaves null stay `None`. No natural key; plain insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParcelRecord {
    pub objectid: Option<i64>,
    pub muni_fips: String,
    pub block: Option<String>,
    pub lot: Option<String>,
    pub qualifier: Option<String>,
    pub property_class: Option<String>,
    /// Description of `property_class`, or `Unknown`
    pub property_description: String,
    pub county_name: Option<String>,
    pub municipality_name: Option<String>,
    pub address: Option<String>,
    /// `address` without its leading house number
    pub address_road: Option<String>,
    pub owner_address: Option<String>,
    pub owner_city_state: Option<String>,
    pub land_value: Option<f64>,
    pub improvement_value: Option<f64>,
    pub net_value: Option<f64>,
    pub last_year_taxes: Option<f64>,
    pub sale_price: Option<f64>,
    pub year_constructed: Option<String>,
    pub building_description: Option<String>,
    pub land_description: Option<String>,
    pub calculated_acres: Option<f64>,
    pub building_class: Option<String>,
    pub deed_book: Option<String>,
    pub deed_page: Option<String>,
    pub deed_date: Option<String>,
    pub dwellings: Option<i64>,
    pub commercial_dwellings: Option<i64>,
}

/// Case-insensitive filter over stored roads; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoadFilter {
    pub state: Option<String>,
    pub county: Option<String>,
    pub town: Option<String>,
    pub road_name: Option<String>,
}

impl RoadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = Some(state.trim().to_uppercase());
        self
    }

    pub fn county(mut self, county: &str) -> Self {
        self.county = Some(county.replace('_', " ").trim().to_string());
        self
    }

    pub fn town(mut self, town: &str) -> Self {
        self.town = Some(town.trim().to_string());
        self
    }

    pub fn road_name(mut self, road_name: &str) -> Self {
        self.road_name = Some(road_name.trim().to_string());
        self
    }

    /// Human-readable scope used in logs and run records
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("state", &self.state),
            ("county", &self.county),
            ("town", &self.town),
            ("road", &self.road_name),
        ]
        .iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{}={}", name, v)))
        .collect();

        if parts.is_empty() {
            "all roads".to_string()
        } else {
            parts.join(",")
        }
    }
}

/// What an upsert does with a row whose natural key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the stored row and skip the new one
    Ignore,
    /// Overwrite the stored row's metadata with the new one
    Replace,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub scope: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub targets_succeeded: u64,
    pub targets_abandoned: u64,
    pub rows_written: u64,
}

/// Counters recorded when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub targets_succeeded: u64,
    pub targets_abandoned: u64,
    pub rows_written: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_road_normalization() {
        let road = Road::new("nj", "cape_may", " Wildwood ", "Ocean Ave ").unwrap();
        assert_eq!(road.state, "NJ");
        assert_eq!(road.county, "cape may");
        assert_eq!(road.town, "Wildwood");
        assert_eq!(road.road_name, "Ocean Ave");
    }

    #[test]
    fn test_road_rejects_blank_fields() {
        assert!(Road::new("nj", "morris", "Madison", "").is_none());
        assert!(Road::new("nj", "morris", "  ", "Kings Rd").is_none());
        assert!(Road::new("", "morris", "Madison", "Kings Rd").is_none());
        assert!(Road::new("nj", "_", "Madison", "Kings Rd").is_none());
    }

    #[test]
    fn test_muni_fips_concatenates_codes() {
        let code = MunicipalityCode::new("14", "17", "Morris", "Madison Borough");
        assert_eq!(code.muni_fips, "1417");
    }

    #[test]
    fn test_filter_describe() {
        assert_eq!(RoadFilter::all().describe(), "all roads");
        assert_eq!(
            RoadFilter::all().state("nj").county("cape_may").describe(),
            "state=NJ,county=cape may"
        );
    }
}
