//! Integration tests for ingest runs
//!
//! These tests use wiremock to serve listing and detail pages and run the
//! full crawl, normalize and upsert cycle against a temporary database.

use japanhouse_ingest::config::{Config, SiteEntry, TranslationConfig};
use japanhouse_ingest::ingest::{AdapterStatus, Orchestrator, RunOptions};
use japanhouse_ingest::listing::listing_id;
use japanhouse_ingest::storage::{open_storage, ListingStore, RunStatus};
use japanhouse_ingest::translate::HttpTranslator;
use std::sync::Arc;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/akiyabank/prefecture/13";

/// Creates a test configuration pointing the akiyamart adapter at the mock
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.output.database_path = db_path.to_string_lossy().into_owned();
    config.crawler.min_request_interval_ms = 0; // No spacing in tests
    config.crawler.request_timeout_secs = 5;
    config.retry.max_attempts = 1;
    config.retry.base_delay_ms = 0;
    config.retry.max_delay_ms = 0;
    config.sites.push(SiteEntry {
        name: "akiyamart".to_string(),
        base_url: base_url.to_string(),
    });
    config
}

fn akiyamart_options() -> RunOptions {
    RunOptions {
        scrapers: vec!["akiyamart".to_string()],
        ..RunOptions::default()
    }
}

struct Card<'a> {
    id: &'a str,
    with_image: bool,
}

fn card(id: &str) -> Card<'_> {
    Card {
        id,
        with_image: true,
    }
}

/// Renders a listing page in the akiyamart card layout
fn listing_page(cards: &[Card<'_>], next_page: Option<u32>) -> String {
    let mut html = String::from("<html><body><div class=\"results\">");
    for card in cards {
        html.push_str(&format!(
            r#"<div class="property-card">
                 <a class="property-link" href="/property/{id}">詳細</a>
                 <h3 class="property-title">古民家 {id}</h3>
                 <span class="property-price">¥15,000,000</span>
                 <span class="property-location">東京都青梅市</span>
                 <span class="property-size">60.5m²</span>
                 <span class="property-rooms">3LDK</span>"#,
            id = card.id
        ));
        if card.with_image {
            html.push_str(&format!(
                r#"<div class="property-image"><img src="https://img.example.com/{}.jpg"></div>"#,
                card.id
            ));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    if let Some(next) = next_page {
        html.push_str(&format!(
            r#"<a class="next-page" href="{}?page={}">次へ</a>"#,
            LISTING_PATH, next
        ));
    }
    html.push_str("</body></html>");
    html
}

async fn mount_listing_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn listing_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == LISTING_PATH)
        .count()
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("listings.db")
}

#[tokio::test]
async fn test_max_pages_bounds_crawl() {
    let server = MockServer::start().await;
    for page in 1..=10 {
        let id = format!("p{}", page);
        let next = (page < 10).then_some(page + 1);
        mount_listing_page(&server, page, listing_page(&[card(&id)], next)).await;
    }

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    let options = RunOptions {
        max_pages: 3,
        ..akiyamart_options()
    };

    let summary = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    let report = summary.report("akiyamart").unwrap();
    assert_eq!(report.status, AdapterStatus::Completed);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(listing_requests(&server).await, 3);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 3);
}

#[tokio::test]
async fn test_max_listings_halts_mid_page() {
    let server = MockServer::start().await;
    mount_listing_page(
        &server,
        1,
        listing_page(&[card("a1"), card("a2"), card("a3"), card("a4")], Some(2)),
    )
    .await;
    mount_listing_page(
        &server,
        2,
        listing_page(&[card("b1"), card("b2"), card("b3"), card("b4")], Some(3)),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    let options = RunOptions {
        max_listings: Some(5),
        ..akiyamart_options()
    };

    let summary = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    let report = summary.report("akiyamart").unwrap();
    assert_eq!(report.stubs_retained, 5);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(listing_requests(&server).await, 2);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 5);
    assert_eq!(storage.listing_rows(&listing_id("akiyamart", "b1")).unwrap().len(), 1);
    assert!(storage
        .listing_rows(&listing_id("akiyamart", "b2"))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_duplicate_ids_across_pages_written_once() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("x"), card("y")], Some(2))).await;
    mount_listing_page(&server, 2, listing_page(&[card("y"), card("z")], None)).await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();

    let summary = orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();

    let report = summary.report("akiyamart").unwrap();
    assert_eq!(report.stubs_retained, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.inserted, 3);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.listing_rows(&listing_id("akiyamart", "y")).unwrap().len(), 1);
}

#[tokio::test]
async fn test_numeric_fields_normalized() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("n1")], None)).await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();

    let storage = open_storage(&db_path(&dir)).unwrap();
    let stored = storage
        .latest_listing(&listing_id("akiyamart", "n1"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.listing.price, Some(15_000_000));
    assert_eq!(stored.listing.size, Some(60.5));
    assert_eq!(stored.listing.layout.as_deref(), Some("3LDK"));
    assert_eq!(
        stored.listing.url,
        format!("{}/property/n1", server.uri())
    );
    assert_eq!(stored.listing.images, vec!["https://img.example.com/n1.jpg"]);
}

#[tokio::test]
async fn test_unreachable_adapter_is_isolated() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("ok1"), card("ok2")], None)).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), &db_path(&dir));
    config.sites.push(SiteEntry {
        name: "suumo".to_string(),
        base_url: "http://127.0.0.1:9/".to_string(),
    });
    let orchestrator = Orchestrator::new(config, "test").unwrap();
    let options = RunOptions {
        scrapers: vec!["suumo".to_string(), "akiyamart".to_string()],
        max_pages: 3,
        ..RunOptions::default()
    };

    let summary = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        summary.report("suumo").unwrap().status,
        AdapterStatus::Failed(_)
    ));
    let healthy = summary.report("akiyamart").unwrap();
    assert_eq!(healthy.status, AdapterStatus::Completed);
    assert_eq!(healthy.inserted, 2);
    assert!(summary.is_success());

    let storage = open_storage(&db_path(&dir)).unwrap();
    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_all_adapters_failing_is_not_success() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9/", &db_path(&dir));
    let orchestrator = Orchestrator::new(config, "test").unwrap();
    let options = RunOptions {
        max_pages: 2,
        ..akiyamart_options()
    };

    let summary = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.is_success());
    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test]
async fn test_update_mode_is_idempotent() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("u1"), card("u2")], None)).await;

    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        update_mode: true,
        ..akiyamart_options()
    };
    let id = listing_id("akiyamart", "u1");

    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();
    let before = open_storage(&db_path(&dir))
        .unwrap()
        .latest_listing(&id)
        .unwrap()
        .unwrap();

    let second = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();
    let report = second.report("akiyamart").unwrap();
    assert_eq!(report.refreshed, 2);
    assert_eq!(report.inserted, 0);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 2);
    let rows = storage.listing_rows(&id).unwrap();
    assert_eq!(rows.len(), 1);

    let after = &rows[0].listing;
    assert_eq!(after.content_hash, before.listing.content_hash);
    assert_eq!(after.first_seen_at, before.listing.first_seen_at);
    assert!(after.last_seen_at >= before.listing.last_seen_at);

    let mut without_timestamps = after.clone();
    without_timestamps.last_seen_at = before.listing.last_seen_at;
    assert_eq!(without_timestamps, before.listing);
}

#[tokio::test]
async fn test_append_mode_inserts_row_per_run() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("h1"), card("h2")], None)).await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();

    orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();
    let second = orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.report("akiyamart").unwrap().appended, 2);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 4);
    for external_id in ["h1", "h2"] {
        let rows = storage
            .listing_rows(&listing_id("akiyamart", external_id))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].run_id, rows[1].run_id);
    }
}

#[tokio::test]
async fn test_image_enforcement_skips_listing() {
    let server = MockServer::start().await;
    let bare = Card {
        id: "noimg",
        with_image: false,
    };
    mount_listing_page(&server, 1, listing_page(&[card("img"), bare], None)).await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    let options = RunOptions {
        enforce_image_quality: true,
        ..akiyamart_options()
    };

    let summary = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    let report = summary.report("akiyamart").unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert!(storage
        .latest_listing(&listing_id("akiyamart", "noimg"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_detail_pages_enrich_and_flag_failures() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("d1"), card("d2")], None)).await;

    Mock::given(method("GET"))
        .and(path("/property/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                 <div class="property-gallery">
                   <img src="https://img.example.com/d1-front.jpg">
                   <img src="https://img.example.com/d1-garden.jpg">
                 </div>
                 <div class="property-description">庭付きの古民家です。</div>
                 <ul class="property-features"><li>駐車場</li><li>庭</li></ul>
                 <table class="property-details">
                   <tr><th>築年</th><td>1975年</td></tr>
                 </table>
               </body></html>"#,
        ))
        .mount(&server)
        .await;
    // d2 has no mock and answers 404

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    let options = RunOptions {
        detail_pages: true,
        ..akiyamart_options()
    };

    let summary = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    let report = summary.report("akiyamart").unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.detail_incomplete, 1);

    let storage = open_storage(&db_path(&dir)).unwrap();
    let enriched = storage
        .latest_listing(&listing_id("akiyamart", "d1"))
        .unwrap()
        .unwrap()
        .listing;
    assert!(!enriched.detail_incomplete);
    assert_eq!(enriched.images.len(), 2);
    assert_eq!(enriched.year_built, Some(1975));
    assert_eq!(enriched.description.as_deref(), Some("庭付きの古民家です。"));
    assert!(enriched.features.contains("駐車場"));

    let degraded = storage
        .latest_listing(&listing_id("akiyamart", "d2"))
        .unwrap()
        .unwrap()
        .listing;
    assert!(degraded.detail_incomplete);
    assert_eq!(degraded.images, vec!["https://img.example.com/d2.jpg"]);
}

#[tokio::test]
async fn test_failed_detail_refetch_keeps_stored_detail() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("r1")], None)).await;
    Mock::given(method("GET"))
        .and(path("/property/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                 <div class="property-gallery">
                   <img src="https://img.example.com/r1-front.jpg">
                   <img src="https://img.example.com/r1-garden.jpg">
                 </div>
                 <div class="property-description">駅から徒歩10分。</div>
                 <ul class="property-features"><li>駐車場</li></ul>
               </body></html>"#,
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    let options = RunOptions {
        update_mode: true,
        detail_pages: true,
        ..akiyamart_options()
    };
    orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();

    // Second run: same listing page, detail page down
    server.reset().await;
    mount_listing_page(&server, 1, listing_page(&[card("r1")], None)).await;
    Mock::given(method("GET"))
        .and(path("/property/r1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let second = orchestrator
        .run(&options, CancellationToken::new())
        .await
        .unwrap();
    let report = second.report("akiyamart").unwrap();
    assert_eq!(report.detail_incomplete, 1);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.updated, 0);

    let storage = open_storage(&db_path(&dir)).unwrap();
    let rows = storage
        .listing_rows(&listing_id("akiyamart", "r1"))
        .unwrap();
    assert_eq!(rows.len(), 1);
    let kept = &rows[0].listing;
    assert!(!kept.detail_incomplete);
    assert_eq!(kept.description.as_deref(), Some("駅から徒歩10分。"));
    assert_eq!(kept.images.len(), 2);
    assert!(kept.features.contains("駐車場"));
}

#[tokio::test]
async fn test_empty_search_result_completes_without_writes() {
    let server = MockServer::start().await;
    mount_listing_page(
        &server,
        1,
        r#"<html><body><div class="search-results"></div>
             <p>該当する物件はありません</p></body></html>"#
            .to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();

    let summary = orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.is_success());
    let report = summary.report("akiyamart").unwrap();
    assert_eq!(report.status, AdapterStatus::Completed);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.inserted, 0);
    assert_eq!(listing_requests(&server).await, 1);

    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 0);
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::Completed
    );
}

fn translator(server: &MockServer) -> Arc<HttpTranslator> {
    let config = TranslationConfig {
        endpoint: format!("{}/translate", server.uri()),
        source_language: "ja".to_string(),
        target_language: "en".to_string(),
        api_key: None,
    };
    Arc::new(HttpTranslator::new(reqwest::Client::new(), &config).unwrap())
}

#[tokio::test]
async fn test_translator_annotates_stored_listing() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("t1")], None)).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"translatedText": "Old house t1"})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test")
            .unwrap()
            .with_translator(translator(&server));

    orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();

    let storage = open_storage(&db_path(&dir)).unwrap();
    let stored = storage
        .latest_listing(&listing_id("akiyamart", "t1"))
        .unwrap()
        .unwrap()
        .listing;
    assert_eq!(stored.title, "古民家 t1");
    assert_eq!(stored.title_translated.as_deref(), Some("Old house t1"));
    assert_eq!(stored.description_translated, None);
}

#[tokio::test]
async fn test_translation_failure_still_stores_listing() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("t2")], None)).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test")
            .unwrap()
            .with_translator(translator(&server));

    let summary = orchestrator
        .run(&akiyamart_options(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.report("akiyamart").unwrap().inserted, 1);

    let storage = open_storage(&db_path(&dir)).unwrap();
    let stored = storage
        .latest_listing(&listing_id("akiyamart", "t2"))
        .unwrap()
        .unwrap()
        .listing;
    assert_eq!(stored.title_translated, None);
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let server = MockServer::start().await;
    mount_listing_page(&server, 1, listing_page(&[card("c1")], None)).await;

    let dir = TempDir::new().unwrap();
    let orchestrator =
        Orchestrator::new(create_test_config(&server.uri(), &db_path(&dir)), "test").unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = orchestrator.run(&akiyamart_options(), cancel).await.unwrap();

    assert!(!summary.is_success());
    assert_eq!(listing_requests(&server).await, 0);
    let storage = open_storage(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_listings().unwrap(), 0);
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::Interrupted
    );
}
