//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small paginated catalog and run the
//! full sync loop against real storage files.

use shelf_harvest::config::{
    Config, DatabaseConfig, FetcherConfig, LoggingConfig, ScraperConfig, SelectorConfig,
};
use shelf_harvest::item::{Detail, Item, ItemKey};
use shelf_harvest::notify::NoopNotifier;
use shelf_harvest::state::{Checkpoint, CheckpointStore, FileCheckpointStore};
use shelf_harvest::storage::{open_sink, UpsertSink};
use shelf_harvest::{SyncLoop, SyncOutcome, SyncStats};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a configuration pointing at the mock catalog with no delays
fn create_test_config(base_url: &str, dir: &Path, database: &str) -> Config {
    Config {
        logging: LoggingConfig::default(),
        scraper: ScraperConfig {
            url: format!("{}/lt/products/beds", base_url),
            page_query: "?&product-room=product&page={page}&order=RECOMMENDED".to_string(),
            state_file: dir.join("state.json").display().to_string(),
            restart_delay_secs: 0,
            fetcher: FetcherConfig {
                max_attempts: 2,
                retry_delay_ms: 0,
                request_delay_ms: 0,
                ..FetcherConfig::default()
            },
            selectors: SelectorConfig::default(),
        },
        database: DatabaseConfig {
            file_path: dir.join(database).display().to_string(),
            identity_key: vec!["id".to_string()],
        },
        mail: None,
    }
}

/// A listing page in the catalog's markup
fn listing_page(products: &[&str], counter: &str) -> String {
    let cards: String = products
        .iter()
        .map(|slug| {
            format!(
                r#"<div><div class="card-body">
                    <div class="itemInfo v2-b">
                        <a href="/lt/products/{slug}">{name}</a>
                        <h4>Lova</h4>
                    </div>
                    <div class="itemPrice-wrapper"><p class="itemNormalPrice">
                        <span data-price="199">199 €</span>
                    </p></div>
                </div></div>"#,
                slug = slug,
                name = slug.to_uppercase()
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <div id="productFilterList"><div><div class="container p-0"><div><div>
        {}
        </div></div></div></div></div>
        <span class="showing_current_max">{}</span>
        </body></html>"#,
        cards, counter
    )
}

/// A product detail page with a two-row size table
fn detail_page(code: &str) -> String {
    format!(
        r#"<html><body><div id="modal-product-size">
            <span class="item-code">{}</span>
            <table><tbody>
                <tr><td>Width:</td><td>56,4 cm</td></tr>
                <tr><td>Depth:</td><td>54,2 cm</td></tr>
            </tbody></table>
        </div></body></html>"#,
        code
    )
}

/// Serves two listing pages (2 + 1 products) and their detail pages
async fn mount_catalog(server: &MockServer) {
    for (page, products, counter) in [
        (1, vec!["malm", "hemnes"], "2 of 3"),
        (2, vec!["brimnes"], "3 of 3"),
    ] {
        Mock::given(method("GET"))
            .and(path("/lt/products/beds"))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&products, counter)),
            )
            .mount(server)
            .await;
    }

    for slug in ["malm", "hemnes", "brimnes"] {
        Mock::given(method("GET"))
            .and(path(format!("/lt/products/{}", slug)))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(slug)))
            .mount(server)
            .await;
    }
}

/// A detail page whose size table has no item code
fn uncoded_detail_page(width: &str) -> String {
    format!(
        r#"<html><body><div id="modal-product-size">
            <table><tbody>
                <tr><td>Width:</td><td>{}</td></tr>
            </tbody></table>
        </div></body></html>"#,
        width
    )
}

/// Serves one page where two of the three products lack an item code
async fn mount_uncoded_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/lt/products/beds"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(
            &["kullen", "tarva", "malm"],
            "3 of 3",
        )))
        .mount(server)
        .await;

    for (slug, width) in [("kullen", "70 cm"), ("tarva", "79 cm")] {
        Mock::given(method("GET"))
            .and(path(format!("/lt/products/{}", slug)))
            .respond_with(ResponseTemplate::new(200).set_body_string(uncoded_detail_page(width)))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/lt/products/malm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("malm")))
        .mount(server)
        .await;
}

/// Harvests the uncoded catalog twice keyed by name and price
async fn harvest_with_composite_key(database: &str) {
    let server = MockServer::start().await;
    mount_uncoded_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path(), database);
    config.database.identity_key = vec!["name".to_string(), "price".to_string()];

    let first = run_harvest(&config).await;
    assert_eq!(first.inserted, 3);
    assert_eq!(first.degraded, 0);

    let second = run_harvest(&config).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.replaced, 3);

    let sink = open_sink(Path::new(&config.database.file_path)).unwrap();
    let key = |name: &str| {
        let lookup = Item {
            name: name.to_string(),
            price: "199".to_string(),
            ..Item::default()
        };
        lookup.key(&config.database.identity_key).unwrap()
    };

    for (name, width) in [("KULLEN", "70 cm"), ("TARVA", "79 cm")] {
        let item = sink.find(&key(name)).unwrap().unwrap();
        assert_eq!(item.id, None);
        assert_eq!(item.details, vec![Detail::new("Width", width)]);
    }

    let malm = sink.find(&key("MALM")).unwrap().unwrap();
    assert_eq!(malm.id.as_deref(), Some("malm"));
    assert_eq!(malm.details.len(), 2);
}

#[tokio::test]
async fn test_composite_key_harvest_into_sqlite() {
    harvest_with_composite_key("products.db").await;
}

#[tokio::test]
async fn test_composite_key_harvest_into_xlsx() {
    harvest_with_composite_key("products.xlsx").await;
}

async fn run_harvest(config: &Config) -> SyncStats {
    let sink = open_sink(Path::new(&config.database.file_path)).expect("Failed to open sink");
    let sync = SyncLoop::from_config(config, sink, NoopNotifier, CancellationToken::new())
        .expect("Failed to build sync loop");

    match sync.run().await {
        SyncOutcome::Completed(stats) => stats,
        SyncOutcome::Cancelled(_) => panic!("harvest was cancelled"),
    }
}

#[tokio::test]
async fn test_full_harvest_into_sqlite() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), "products.db");

    let stats = run_harvest(&config).await;
    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.replaced, 0);

    // The checkpoint is removed after a complete pass
    assert!(!dir.path().join("state.json").exists());

    let sink = open_sink(Path::new(&config.database.file_path)).unwrap();
    for code in ["malm", "hemnes", "brimnes"] {
        let item = sink
            .find(&ItemKey::single("id", code))
            .unwrap()
            .unwrap_or_else(|| panic!("{} should be stored", code));
        assert_eq!(item.name, code.to_uppercase());
        assert_eq!(item.price, "199");
        assert_eq!(
            item.details,
            vec![
                Detail::new("Width", "56,4 cm"),
                Detail::new("Depth", "54,2 cm")
            ]
        );
    }
}

#[tokio::test]
async fn test_second_harvest_replaces() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), "products.jsonl");

    run_harvest(&config).await;
    let stats = run_harvest(&config).await;
    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.replaced, 3);

    let lines = std::fs::read_to_string(&config.database.file_path).unwrap();
    assert_eq!(lines.lines().count(), 3);
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), "products.xlsx");

    // A previous run stored "hemnes" (page 1, item 1) and then crashed
    FileCheckpointStore::new(&config.scraper.state_file)
        .save(Checkpoint::new(1, 1))
        .unwrap();

    let stats = run_harvest(&config).await;
    assert_eq!(stats.inserted, 2);

    let requests = server.received_requests().await.unwrap();
    assert!(
        !requests.iter().any(|r| r.url.path() == "/lt/products/malm"),
        "items before the checkpoint must not be fetched again"
    );

    let sink = open_sink(Path::new(&config.database.file_path)).unwrap();
    assert!(sink.find(&ItemKey::single("id", "malm")).unwrap().is_none());
    assert!(sink.find(&ItemKey::single("id", "hemnes")).unwrap().is_some());
    assert!(sink.find(&ItemKey::single("id", "brimnes")).unwrap().is_some());
}

#[tokio::test]
async fn test_recovers_from_unreachable_page() {
    let server = MockServer::start().await;

    // Page 2 fails for both attempts of the first pass
    Mock::given(method("GET"))
        .and(path("/lt/products/beds"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), "products.db");

    let stats = run_harvest(&config).await;
    assert_eq!(stats.failed_passes, 1);
    assert_eq!(stats.inserted, 3);

    let page_one_fetches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.query().is_some_and(|q| q.contains("page=1&")))
        .count();
    assert_eq!(page_one_fetches, 1, "the restart resumes at page 2");
}
