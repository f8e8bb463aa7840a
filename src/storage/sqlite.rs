//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    ConflictPolicy, MunicipalityCode, ParcelRecord, PropertyRecord, Road, RoadFilter, RunCounters,
    RunRecord, RunStatus,
};
use crate::ScoutError;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, mode, scope, config_hash, status, started_at, finished_at,
     targets_succeeded, targets_abandoned, rows_written";

const PARCEL_COLUMNS: &str = "objectid, muni_fips, block, lot, qualifier, property_class,
     property_description, county_name, municipality_name, address, address_road,
     owner_address, owner_city_state, land_value, improvement_value, net_value,
     last_year_taxes, sale_price, year_constructed, building_description, land_description,
     calculated_acres, building_class, deed_book, deed_page, deed_date, dwellings,
     commercial_dwellings";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and initializes the schema
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path)?;

        // WAL plus a busy timeout lets separate processes share the file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parcel_from_row(row: &Row<'_>) -> rusqlite::Result<ParcelRecord> {
    Ok(ParcelRecord {
        objectid: row.get(0)?,
        muni_fips: row.get(1)?,
        block: row.get(2)?,
        lot: row.get(3)?,
        qualifier: row.get(4)?,
        property_class: row.get(5)?,
        property_description: row.get(6)?,
        county_name: row.get(7)?,
        municipality_name: row.get(8)?,
        address: row.get(9)?,
        address_road: row.get(10)?,
        owner_address: row.get(11)?,
        owner_city_state: row.get(12)?,
        land_value: row.get(13)?,
        improvement_value: row.get(14)?,
        net_value: row.get(15)?,
        last_year_taxes: row.get(16)?,
        sale_price: row.get(17)?,
        year_constructed: row.get(18)?,
        building_description: row.get(19)?,
        land_description: row.get(20)?,
        calculated_acres: row.get(21)?,
        building_class: row.get(22)?,
        deed_book: row.get(23)?,
        deed_page: row.get(24)?,
        deed_date: row.get(25)?,
        dwellings: row.get(26)?,
        commercial_dwellings: row.get(27)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: row.get(1)?,
        scope: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        targets_succeeded: row.get::<_, i64>(7)? as u64,
        targets_abandoned: row.get::<_, i64>(8)? as u64,
        rows_written: row.get::<_, i64>(9)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, mode: &str, scope: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_runs (mode, scope, config_hash, status, started_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![mode, scope, config_hash, RunStatus::Running.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: RunCounters,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2, targets_succeeded = ?3,
             targets_abandoned = ?4, rows_written = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                counters.targets_succeeded as i64,
                counters.targets_abandoned as i64,
                counters.rows_written as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }

        Ok(())
    }

    // ===== Roads =====

    fn upsert_roads(&mut self, rows: &[Road], policy: ConflictPolicy) -> StorageResult<usize> {
        let sql = match policy {
            ConflictPolicy::Ignore => {
                "INSERT INTO roads (state, county, town, road_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(state, county, town, road_name) DO NOTHING"
            }
            ConflictPolicy::Replace => {
                "INSERT INTO roads (state, county, town, road_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(state, county, town, road_name)
                 DO UPDATE SET created_at = excluded.created_at"
            }
        };

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut affected = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for road in rows {
                affected += stmt.execute(params![
                    road.state,
                    road.county,
                    road.town,
                    road.road_name,
                    now
                ])?;
            }
        }
        tx.commit()?;

        Ok(affected)
    }

    fn select_roads(&self, filter: &RoadFilter) -> StorageResult<Vec<Road>> {
        let mut clauses = Vec::new();
        let mut values: Vec<&str> = Vec::new();

        for (column, value) in [
            ("state", &filter.state),
            ("county", &filter.county),
            ("town", &filter.town),
            ("road_name", &filter.road_name),
        ] {
            if let Some(value) = value {
                values.push(value.as_str());
                clauses.push(format!("{} = ?{} COLLATE NOCASE", column, values.len()));
            }
        }

        let mut sql = "SELECT state, county, town, road_name FROM roads".to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY state, county, town, road_name");

        let mut stmt = self.conn.prepare(&sql)?;
        let roads = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(Road {
                    state: row.get(0)?,
                    county: row.get(1)?,
                    town: row.get(2)?,
                    road_name: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(roads)
    }

    fn count_roads(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM roads", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Properties =====

    fn insert_properties(&mut self, rows: &[PropertyRecord]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO properties (full_address, street_name, zip_code, market_value,
                 year_built, last_sale, town, county, state, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for record in rows {
                inserted += stmt.execute(params![
                    record.full_address,
                    record.street_name,
                    record.zip_code,
                    record.market_value,
                    record.year_built,
                    record.last_sale,
                    record.town,
                    record.county,
                    record.state,
                    now
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn select_properties(&self, road: &Road) -> StorageResult<Vec<PropertyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT full_address, street_name, zip_code, market_value, year_built, last_sale,
             town, county, state
             FROM properties
             WHERE state = ?1 AND county = ?2 AND town = ?3 AND street_name = ?4
             ORDER BY id",
        )?;

        let records = stmt
            .query_map(
                params![road.state, road.county, road.town, road.road_name],
                |row| {
                    Ok(PropertyRecord {
                        full_address: row.get(0)?,
                        street_name: row.get(1)?,
                        zip_code: row.get(2)?,
                        market_value: row.get(3)?,
                        year_built: row.get(4)?,
                        last_sale: row.get(5)?,
                        town: row.get(6)?,
                        county: row.get(7)?,
                        state: row.get(8)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_properties(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Municipality Codes =====

    fn insert_municipality_codes(&mut self, codes: &[MunicipalityCode]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO municipality_codes
                 (muni_fips, county_code, municip_code, county_name, municipality_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for code in codes {
                inserted += stmt.execute(params![
                    code.muni_fips,
                    code.county_code,
                    code.municip_code,
                    code.county_name,
                    code.municipality_name
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn list_municipality_codes(&self) -> StorageResult<Vec<MunicipalityCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT county_code, municip_code, muni_fips, county_name, municipality_name
             FROM municipality_codes ORDER BY muni_fips ASC",
        )?;

        let codes = stmt
            .query_map([], |row| {
                Ok(MunicipalityCode {
                    county_code: row.get(0)?,
                    municip_code: row.get(1)?,
                    muni_fips: row.get(2)?,
                    county_name: row.get(3)?,
                    municipality_name: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(codes)
    }

    // ===== Parcels =====

    fn insert_parcels(&mut self, rows: &[ParcelRecord]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO parcels ({}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
                PARCEL_COLUMNS
            ))?;
            for parcel in rows {
                inserted += stmt.execute(params![
                    parcel.objectid,
                    parcel.muni_fips,
                    parcel.block,
                    parcel.lot,
                    parcel.qualifier,
                    parcel.property_class,
                    parcel.property_description,
                    parcel.county_name,
                    parcel.municipality_name,
                    parcel.address,
                    parcel.address_road,
                    parcel.owner_address,
                    parcel.owner_city_state,
                    parcel.land_value,
                    parcel.improvement_value,
                    parcel.net_value,
                    parcel.last_year_taxes,
                    parcel.sale_price,
                    parcel.year_constructed,
                    parcel.building_description,
                    parcel.land_description,
                    parcel.calculated_acres,
                    parcel.building_class,
                    parcel.deed_book,
                    parcel.deed_page,
                    parcel.deed_date,
                    parcel.dwellings,
                    parcel.commercial_dwellings,
                    now
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn select_parcels(&self, muni_fips: &str) -> StorageResult<Vec<ParcelRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM parcels WHERE muni_fips = ?1 ORDER BY id",
            PARCEL_COLUMNS
        ))?;

        let parcels = stmt
            .query_map([muni_fips], parcel_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(parcels)
    }

    fn count_parcels(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM parcels", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
