//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Parcel-Scout database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    scope TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    targets_succeeded INTEGER NOT NULL DEFAULT 0,
    targets_abandoned INTEGER NOT NULL DEFAULT 0,
    rows_written INTEGER NOT NULL DEFAULT 0
);

-- Roads discovered per town, keyed by their natural key
CREATE TABLE IF NOT EXISTS roads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    state TEXT NOT NULL CHECK (state <> ''),
    county TEXT NOT NULL CHECK (county <> ''),
    town TEXT NOT NULL CHECK (town <> ''),
    road_name TEXT NOT NULL CHECK (road_name <> ''),
    created_at TEXT NOT NULL,
    UNIQUE(state, county, town, road_name)
);

CREATE INDEX IF NOT EXISTS idx_roads_scope ON roads(state, county, town);

-- Property listings scraped per road; no natural key
CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_address TEXT NOT NULL,
    street_name TEXT NOT NULL,
    zip_code TEXT,
    market_value TEXT,
    year_built TEXT,
    last_sale TEXT,
    town TEXT NOT NULL,
    county TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_properties_road ON properties(state, town, street_name);

-- Municipality code reference table
CREATE TABLE IF NOT EXISTS municipality_codes (
    muni_fips TEXT PRIMARY KEY,
    county_code TEXT NOT NULL,
    municip_code TEXT NOT NULL,
    county_name TEXT NOT NULL,
    municipality_name TEXT NOT NULL
);

-- Parcels from the statewide parcel layer, fetched per municipality
CREATE TABLE IF NOT EXISTS parcels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    objectid INTEGER,
    muni_fips TEXT NOT NULL,
    block TEXT,
    lot TEXT,
    qualifier TEXT,
    property_class TEXT,
    property_description TEXT NOT NULL,
    county_name TEXT,
    municipality_name TEXT,
    address TEXT,
    address_road TEXT,
    owner_address TEXT,
    owner_city_state TEXT,
    land_value REAL,
    improvement_value REAL,
    net_value REAL,
    last_year_taxes REAL,
    sale_price REAL,
    year_constructed TEXT,
    building_description TEXT,
    land_description TEXT,
    calculated_acres REAL,
    building_class TEXT,
    deed_book TEXT,
    deed_page TEXT,
    deed_date TEXT,
    dwellings INTEGER,
    commercial_dwellings INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_parcels_muni ON parcels(muni_fips);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
