//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the street-index and
//! property-records sites and run full crawls into a temporary database.

use parcel_scout::config::{load_config_with_hash, Config};
use parcel_scout::crawler::{run_crawl, CrawlMode};
use parcel_scout::output::load_statistics;
use parcel_scout::storage::{
    open_storage, parse_municipality_codes, ConflictPolicy, Road, RoadFilter, RunStatus, Storage,
};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COUNTY_INDEX: &str = r#"<html><body><div class="listmain"><span class="listspan"><ul>
    <li><a href="madison.html">Madison</a></li>
    <li><a href="chatham.html">Chatham</a></li>
    </ul></span></div></body></html>"#;

const MADISON_ROADS: &str = r#"<html><body><div class="listmain"><span class="listspan">
    <a href="view.php?s=1">Kings Rd</a>
    <a href="view.php?s=2">Green Ave</a>
    </span></div></body></html>"#;

const CHATHAM_ROADS: &str = r#"<html><body><div class="listmain"><span class="listspan">
    <a href="view.php?s=3">Main St</a>
    </span></div></body></html>"#;

const KINGS_RD_RECORDS: &str = r#"<html><body><div id="property-records-by"><table>
    <thead><tr><th>Address</th><th>Value</th><th>Built</th><th>Sale</th></tr></thead>
    <tbody>
    <tr><td>305 Kings Rd, Madison, NJ 07940</td><td>$512,300</td><td>1952</td><td>2019-06-01</td></tr>
    <tr></tr>
    <tr><td>311 Kings Rd, Madison, NJ 07940</td><td>$498,000</td><td>1949</td><td></td></tr>
    </tbody></table></div></body></html>"#;

/// Writes a config pointing both sources at the mock server and loads it
fn load_test_config(base_url: &str, db_path: &Path, extra_crawler: &str) -> (Config, String) {
    let content = format!(
        r#"
[scope]
state = "nj"
counties = ["morris"]

[crawler]
max-retries = 3
initial-backoff-ms = 1
navigation-timeout-ms = 5000
town-delay-ms = 0
road-delay-ms = 0
county-delay-ms = 0
{}

[output]
database-path = "{}"

[sources]
property-records-base = "{}"
street-index-base = "{}"
parcel-query-url = "{}/FeatureServer/0/query"
"#,
        extra_crawler,
        db_path.display(),
        base_url,
        base_url,
        base_url
    );

    let mut file = NamedTempFile::new().expect("Failed to create temp config");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp config");
    load_config_with_hash(file.path()).expect("Failed to load config")
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn crawl(config: Config, hash: &str, mode: CrawlMode) -> parcel_scout::CrawlReport {
    let storage = open_storage(Path::new(&config.output.database_path))
        .expect("Failed to open database");
    run_crawl(
        config,
        hash,
        Arc::new(Mutex::new(storage)),
        mode,
        CancellationToken::new(),
    )
    .await
    .expect("Crawl failed")
}

#[tokio::test]
async fn test_discovery_then_detail_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/streetview/usa/nj/morris/index.html", COUNTY_INDEX).await;
    mount_page(&server, "/streetview/usa/nj/morris/madison.html", MADISON_ROADS).await;
    mount_page(&server, "/streetview/usa/nj/morris/chatham.html", CHATHAM_ROADS).await;
    mount_page(&server, "/kings-rd-madison-nj-property-records/", KINGS_RD_RECORDS).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (config, hash) = load_test_config(&server.uri(), &db_path, "");

    let discovery = crawl(
        config.clone(),
        &hash,
        CrawlMode::Discovery {
            state: "nj".to_string(),
            county: None,
        },
    )
    .await;
    assert_eq!(discovery.targets_succeeded, 2);
    assert_eq!(discovery.rows_affected, 3);

    let detail = crawl(
        config,
        &hash,
        CrawlMode::Detail {
            filter: RoadFilter::all().state("nj").town("Madison").road_name("Kings Rd"),
        },
    )
    .await;
    assert_eq!(detail.targets_succeeded, 1);
    assert_eq!(detail.records_extracted, 2);

    let storage = open_storage(&db_path).expect("Failed to reopen database");
    assert_eq!(storage.count_roads().unwrap(), 3);

    let kings = Road::new("nj", "morris", "Madison", "Kings Rd").unwrap();
    let records = storage.select_properties(&kings).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].full_address, "305 Kings Rd, Madison, NJ 07940");
    assert_eq!(records[0].street_name, "Kings Rd");
    assert_eq!(records[0].zip_code.as_deref(), Some("07940"));
    assert_eq!(records[0].state, "NJ");
    assert_eq!(records[1].last_sale, None);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.mode, "detail");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, hash);
}

#[tokio::test]
async fn test_server_errors_abandon_road_after_max_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/green-ave-madison-nj-property-records/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    mount_page(&server, "/kings-rd-madison-nj-property-records/", KINGS_RD_RECORDS).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (config, hash) = load_test_config(&server.uri(), &db_path, "");

    {
        let mut storage = open_storage(&db_path).unwrap();
        storage
            .upsert_roads(
                &[
                    Road::new("nj", "morris", "Madison", "Green Ave").unwrap(),
                    Road::new("nj", "morris", "Madison", "Kings Rd").unwrap(),
                ],
                ConflictPolicy::Ignore,
            )
            .unwrap();
    }

    let report = crawl(
        config,
        &hash,
        CrawlMode::Detail {
            filter: RoadFilter::all(),
        },
    )
    .await;

    assert_eq!(report.targets_abandoned, 1);
    assert_eq!(report.targets_succeeded, 1);

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_properties().unwrap(), 2);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.targets_abandoned, 1);
    assert_eq!(run.rows_written, 2);
}

#[tokio::test]
async fn test_missing_results_page_is_empty_extraction() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broadway-madison-nj-property-records/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<html><body>Not found</body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (config, hash) = load_test_config(&server.uri(), &db_path, "");

    {
        let mut storage = open_storage(&db_path).unwrap();
        storage
            .upsert_roads(
                &[Road::new("nj", "morris", "Madison", "Broadway").unwrap()],
                ConflictPolicy::Ignore,
            )
            .unwrap();
    }

    let report = crawl(
        config,
        &hash,
        CrawlMode::Detail {
            filter: RoadFilter::all(),
        },
    )
    .await;

    assert_eq!(report.targets_succeeded, 1);
    assert_eq!(report.records_extracted, 0);
    assert_eq!(report.batches_dropped, 0);
}

#[tokio::test]
async fn test_concurrent_discovery_sessions() {
    let server = MockServer::start().await;
    for county in ["morris", "sussex"] {
        mount_page(
            &server,
            &format!("/streetview/usa/nj/{}/index.html", county),
            COUNTY_INDEX,
        )
        .await;
        mount_page(
            &server,
            &format!("/streetview/usa/nj/{}/madison.html", county),
            MADISON_ROADS,
        )
        .await;
        mount_page(
            &server,
            &format!("/streetview/usa/nj/{}/chatham.html", county),
            CHATHAM_ROADS,
        )
        .await;
    }

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (mut config, hash) =
        load_test_config(&server.uri(), &db_path, "max-concurrent-sessions = 2");
    config.scope.counties = vec!["morris".to_string(), "sussex".to_string()];

    let report = crawl(
        config,
        &hash,
        CrawlMode::Discovery {
            state: "nj".to_string(),
            county: None,
        },
    )
    .await;

    assert_eq!(report.targets_succeeded, 4);

    let storage = open_storage(&db_path).unwrap();
    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.roads, 6);
    assert_eq!(
        storage
            .select_roads(&RoadFilter::all().county("sussex"))
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_unreachable_county_index_is_abandoned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/streetview/usa/nj/morris/index.html"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (config, hash) = load_test_config(&server.uri(), &db_path, "");

    let report = crawl(
        config,
        &hash,
        CrawlMode::Discovery {
            state: "nj".to_string(),
            county: Some("morris".to_string()),
        },
    )
    .await;

    assert_eq!(report.targets_abandoned, 1);
    assert_eq!(report.targets_succeeded, 0);

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_roads().unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

const MADISON_PARCELS: &str = r#"{
    "objectIdFieldName": "OBJECTID",
    "features": [
        {"attributes": {"OBJECTID": 88121, "PCL_MUN": "1417", "PCLBLOCK": "1101", "PCLLOT": "12",
            "PROP_CLASS": "2", "MUN_NAME": "MADISON BORO", "PROP_LOC": "305 KINGS RD",
            "NET_VALUE": 512300, "DWELL": 1}},
        {"attributes": {"OBJECTID": 88122, "PCL_MUN": "1417", "PCLBLOCK": "1101", "PCLLOT": "13",
            "PROP_CLASS": "15D", "PROP_LOC": "311 KINGS RD", "NET_VALUE": 0}}
    ]
}"#;

#[tokio::test]
async fn test_seeded_municipalities_drive_parcel_queries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/FeatureServer/0/query"))
        .and(query_param("where", "(PCL_MUN LIKE '14%') AND (PCL_MUN = '1417')"))
        .and(query_param("f", "json"))
        .and(query_param("returnGeometry", "false"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(MADISON_PARCELS)
                .insert_header("content-type", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/FeatureServer/0/query"))
        .and(query_param("where", "(PCL_MUN LIKE '14%') AND (PCL_MUN = '1418')"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (config, hash) =
        load_test_config(&server.uri(), &db_path, "municipality-delay-ms = 0");

    {
        let codes = parse_municipality_codes(
            "county_code,municip_code,county_name,municipality_name\n\
             01,01,Atlantic,Absecon City\n\
             14,17,Morris,Madison Borough\n\
             14,18,Morris,Mendham Borough\n",
        )
        .unwrap();
        let mut storage = open_storage(&db_path).unwrap();
        assert_eq!(storage.insert_municipality_codes(&codes).unwrap(), 3);
    }

    let report = crawl(
        config,
        &hash,
        CrawlMode::parcels(Some("14")).unwrap(),
    )
    .await;

    assert_eq!(report.targets_succeeded, 1);
    assert_eq!(report.targets_abandoned, 1);
    assert_eq!(report.records_extracted, 2);

    let storage = open_storage(&db_path).unwrap();
    let parcels = storage.select_parcels("1417").unwrap();
    assert_eq!(parcels.len(), 2);
    assert_eq!(parcels[0].objectid, Some(88121));
    assert_eq!(parcels[0].property_description, "Residential Property");
    assert_eq!(parcels[0].address_road.as_deref(), Some("KINGS RD"));
    assert_eq!(parcels[0].net_value, Some(512_300.0));
    assert_eq!(parcels[1].property_description, "Church & Charitable (exempt)");
    assert!(storage.select_parcels("1418").unwrap().is_empty());

    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.municipality_codes, 3);
    assert_eq!(stats.parcels, 2);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.mode, "parcels");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.targets_abandoned, 1);
}

#[tokio::test]
async fn test_cancelled_crawl_is_recorded_as_interrupted() {
    let server = MockServer::start().await;
    mount_page(&server, "/kings-rd-madison-nj-property-records/", KINGS_RD_RECORDS).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("parcels.db");
    let (config, hash) = load_test_config(&server.uri(), &db_path, "");

    let storage = open_storage(&db_path).unwrap();
    let storage = Arc::new(Mutex::new(storage));
    storage
        .lock()
        .unwrap()
        .upsert_roads(
            &[Road::new("nj", "morris", "Madison", "Kings Rd").unwrap()],
            ConflictPolicy::Ignore,
        )
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_crawl(
        config,
        &hash,
        Arc::clone(&storage),
        CrawlMode::detail(None, None, Some("madison"), None).unwrap(),
        cancel,
    )
    .await
    .expect("Crawl failed");

    assert!(report.cancelled);
    assert_eq!(report.targets_succeeded, 0);

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_properties().unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}
