use serde::Deserialize;

/// New Jersey county identifiers as they appear in street-index URLs
pub const NJ_COUNTIES: [&str; 21] = [
    "atlantic",
    "bergen",
    "burlington",
    "camden",
    "cape_may",
    "cumberland",
    "essex",
    "gloucester",
    "hudson",
    "hunterdon",
    "mercer",
    "middlesex",
    "monmouth",
    "morris",
    "ocean",
    "passaic",
    "salem",
    "somerset",
    "sussex",
    "union",
    "warren",
];

/// Browser-like user agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Main configuration structure for Parcel-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Which state and counties a full discovery run walks
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Two-letter state code
    #[serde(default = "default_state")]
    pub state: String,

    /// County identifiers, underscores standing in for spaces
    #[serde(default = "default_counties")]
    pub counties: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Navigation attempts per URL before the target is abandoned
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt, doubled after each further failure (milliseconds)
    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Per-navigation timeout (milliseconds)
    #[serde(rename = "navigation-timeout-ms", default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Records buffered before a flush to storage
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between town pages during discovery (milliseconds)
    #[serde(rename = "town-delay-ms", default = "default_town_delay_ms")]
    pub town_delay_ms: u64,

    /// Delay between road pages during detail crawls (milliseconds)
    #[serde(rename = "road-delay-ms", default = "default_road_delay_ms")]
    pub road_delay_ms: u64,

    /// Delay between counties during discovery (milliseconds)
    #[serde(rename = "county-delay-ms", default = "default_county_delay_ms")]
    pub county_delay_ms: u64,

    /// Delay between municipality parcel queries (milliseconds)
    #[serde(
        rename = "municipality-delay-ms",
        default = "default_municipality_delay_ms"
    )]
    pub municipality_delay_ms: u64,

    /// Parcels requested per municipality query
    #[serde(rename = "parcel-page-size", default = "default_parcel_page_size")]
    pub parcel_page_size: u32,

    /// Number of independent discovery sessions run at once
    #[serde(
        rename = "max-concurrent-sessions",
        default = "default_max_concurrent_sessions"
    )]
    pub max_concurrent_sessions: u32,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_user_agent")]
    pub value: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Base URLs of the scraped sites
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Site serving per-road property records
    #[serde(rename = "property-records-base", default = "default_property_base")]
    pub property_records_base: String,

    /// Site serving county/town street indexes
    #[serde(rename = "street-index-base", default = "default_street_index_base")]
    pub street_index_base: String,

    /// ArcGIS feature-layer query endpoint for statewide parcels
    #[serde(rename = "parcel-query-url", default = "default_parcel_query_url")]
    pub parcel_query_url: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            state: default_state(),
            counties: default_counties(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            batch_size: default_batch_size(),
            town_delay_ms: default_town_delay_ms(),
            road_delay_ms: default_road_delay_ms(),
            county_delay_ms: default_county_delay_ms(),
            municipality_delay_ms: default_municipality_delay_ms(),
            parcel_page_size: default_parcel_page_size(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: default_user_agent(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            property_records_base: default_property_base(),
            street_index_base: default_street_index_base(),
            parcel_query_url: default_parcel_query_url(),
        }
    }
}

fn default_state() -> String {
    "nj".to_string()
}

fn default_counties() -> Vec<String> {
    NJ_COUNTIES.iter().map(|c| c.to_string()).collect()
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_batch_size() -> usize {
    500
}

fn default_town_delay_ms() -> u64 {
    500
}

fn default_road_delay_ms() -> u64 {
    3000
}

fn default_county_delay_ms() -> u64 {
    1500
}

fn default_municipality_delay_ms() -> u64 {
    1000
}

fn default_parcel_page_size() -> u32 {
    2000
}

fn default_max_concurrent_sessions() -> u32 {
    1
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_property_base() -> String {
    "https://www.countyoffice.org".to_string()
}

fn default_street_index_base() -> String {
    "https://www.geographic.org".to_string()
}

fn default_parcel_query_url() -> String {
    "https://services2.arcgis.com/XVOqAjTOJ5P6ngMu/arcgis/rest/services/\
     Hosted_Parcels_Test_WebMer_20201016/FeatureServer/0/query"
        .to_string()
}
