//! Behavior-driven tests for the metadata scrape pipeline
//!
//! These tests drive the batch orchestrator against a scripted transport and
//! check what ends up in the outcome list, the warehouse and the CSV export.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coinharvest_core::{
    write_outcomes_csv, Asset, AssetCatalog, BatchOrchestrator, FieldExtractor, HttpClient,
    HttpError, HttpRequest, HttpResponse, NoDelay, PacingFuture, PacingPolicy, PageFetcher,
    ScrapeOutcome, Warehouse, WarehouseConfig, BROWSER_USER_AGENT, SENTINEL,
};
use tempfile::tempdir;

const BASE_URL: &str = "https://cmc.test";

// =============================================================================
// Test doubles
// =============================================================================

type Scripted = Result<HttpResponse, HttpError>;

/// Answers by URL fragment; the last scripted response for a route repeats.
struct ScriptedHttpClient {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn route(self, fragment: &str, response: Scripted) -> Self {
        self.routes
            .lock()
            .expect("routes should not be poisoned")
            .push((fragment.to_owned(), VecDeque::from([response])));
        self
    }

    fn page(self, slug: &str, html: String) -> Self {
        self.route(&format!("/currencies/{slug}/"), Ok(HttpResponse::ok(html)))
    }

    fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = {
            let mut routes = self.routes.lock().expect("routes should not be poisoned");
            routes
                .iter_mut()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .and_then(|(_, queue)| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
                .unwrap_or_else(|| Ok(HttpResponse::new(404, "not found")))
        };
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);
        Box::pin(async move { response })
    }
}

#[derive(Default)]
struct CountingPacing {
    requests: AtomicUsize,
    pauses: Mutex<Vec<usize>>,
}

impl CountingPacing {
    fn pauses(&self) -> Vec<usize> {
        self.pauses.lock().expect("pauses should not be poisoned").clone()
    }
}

impl PacingPolicy for CountingPacing {
    fn before_request(&self) -> PacingFuture<'_> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }

    fn pause_after_batch(&self, batch_index: usize) -> PacingFuture<'_> {
        self.pauses
            .lock()
            .expect("pauses should not be poisoned")
            .push(batch_index);
        Box::pin(async {})
    }
}

fn asset_page(description: &str, category: &str, price: &str) -> String {
    format!(
        r#"<html><body>
            <div class="sc-1 coin-about"><p>{description}</p></div>
            <div class="coin-tags"><a class="cmc-link" href="/tags/x">{category}</a></div>
            <span data-test="text-cdp-price-display">{price}</span>
        </body></html>"#
    )
}

fn assets(keys: &[&str]) -> Vec<Asset> {
    keys.iter()
        .map(|key| Asset::same_slug(key).expect("valid asset"))
        .collect()
}

fn orchestrator(
    client: Arc<ScriptedHttpClient>,
    pacing: Arc<dyn PacingPolicy>,
    batch_size: usize,
) -> BatchOrchestrator {
    let fetcher = PageFetcher::new(client, BASE_URL, 1_000);
    BatchOrchestrator::new(fetcher, FieldExtractor::default(), pacing, batch_size)
        .expect("valid batch size")
}

// =============================================================================
// Orchestration: ordering and pacing
// =============================================================================

#[tokio::test]
async fn when_seven_assets_run_in_batches_of_five_there_is_exactly_one_pause() {
    // Given: Seven assets whose pages all resolve
    let keys = ["a1", "a2", "a3", "a4", "a5", "a6", "a7"];
    let mut client = ScriptedHttpClient::new();
    for key in keys {
        client = client.page(key, asset_page("About", "Layer 1", "$1.00"));
    }
    let client = Arc::new(client);
    let pacing = Arc::new(CountingPacing::default());

    // When: The orchestrator runs with a batch size of five
    let outcomes = orchestrator(client.clone(), pacing.clone(), 5)
        .run(&assets(&keys))
        .await;

    // Then: Outcomes follow input order and the only pause is after batch one
    let coins: Vec<_> = outcomes.iter().map(|outcome| outcome.coin.as_str()).collect();
    assert_eq!(coins, keys);
    assert_eq!(pacing.pauses(), vec![0]);
    assert_eq!(pacing.requests.load(Ordering::SeqCst), 7);
    assert_eq!(client.recorded_requests().len(), 7);
}

#[tokio::test]
async fn when_asset_count_is_a_multiple_of_batch_size_no_trailing_pause_happens() {
    // Given: Four assets and a batch size of two
    let keys = ["b1", "b2", "b3", "b4"];
    let client = Arc::new(ScriptedHttpClient::new());
    let pacing = Arc::new(CountingPacing::default());

    // When: The run completes
    let outcomes = orchestrator(client, pacing.clone(), 2).run(&assets(&keys)).await;

    // Then: Only the gap between the two batches is paced
    assert_eq!(outcomes.len(), 4);
    assert_eq!(pacing.pauses(), vec![0]);
}

#[tokio::test]
async fn when_asset_list_is_empty_the_run_returns_no_outcomes() {
    let client = Arc::new(ScriptedHttpClient::new());
    let pacing = Arc::new(CountingPacing::default());

    let outcomes = orchestrator(client.clone(), pacing.clone(), 5).run(&[]).await;

    assert!(outcomes.is_empty());
    assert!(pacing.pauses().is_empty());
    assert!(client.recorded_requests().is_empty());
}

#[test]
fn when_batch_size_is_zero_the_orchestrator_is_rejected() {
    let fetcher = PageFetcher::new(Arc::new(ScriptedHttpClient::new()), BASE_URL, 1_000);

    let result = BatchOrchestrator::new(fetcher, FieldExtractor::default(), Arc::new(NoDelay), 0);

    assert!(result.is_err());
}

// =============================================================================
// Orchestration: failure isolation
// =============================================================================

#[tokio::test]
async fn when_one_page_is_missing_only_that_asset_gets_a_sentinel_outcome() {
    // Given: Bitcoin and ethereum pages exist, dogecoin returns 404
    let client = Arc::new(
        ScriptedHttpClient::new()
            .page("bitcoin", asset_page("Digital gold", "Layer 1", "$64,321.10"))
            .page("ethereum", asset_page("World computer", "Smart Contracts", "$3,100.00")),
    );

    // When: All three are scraped
    let outcomes = orchestrator(client, Arc::new(NoDelay), 5)
        .run(&assets(&["bitcoin", "dogecoin", "ethereum"]))
        .await;

    // Then: The missing page becomes the all-sentinel outcome in its slot
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].description, "Digital gold");
    assert_eq!(outcomes[0].price(), Some(64_321.10));
    assert_eq!(outcomes[1], ScrapeOutcome::unavailable("dogecoin"));
    assert_eq!(outcomes[2].category, "Smart Contracts");
}

#[tokio::test]
async fn when_a_request_times_out_the_run_continues_with_the_next_asset() {
    // Given: The first page times out
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route("/currencies/solana/", Err(HttpError::timeout("deadline exceeded")))
            .page("tron", asset_page("TRON", "Layer 1", "$0.12")),
    );

    // When: Both are scraped
    let outcomes = orchestrator(client, Arc::new(NoDelay), 1)
        .run(&assets(&["solana", "tron"]))
        .await;

    // Then: The timeout is isolated to its own outcome
    assert!(outcomes[0].is_unavailable());
    assert_eq!(outcomes[1].price_text, "$0.12");
}

#[tokio::test]
async fn when_run_deadline_has_passed_remaining_assets_are_not_fetched() {
    // Given: A zero run deadline
    let client = Arc::new(ScriptedHttpClient::new().page("bitcoin", asset_page("x", "y", "$1")));
    let orchestrator =
        orchestrator(client.clone(), Arc::new(NoDelay), 5).with_run_deadline(Some(Duration::ZERO));

    // When: The run starts
    let outcomes = orchestrator.run(&assets(&["bitcoin", "ethereum", "tether"])).await;

    // Then: Every asset still gets exactly one outcome, none of them fetched
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(ScrapeOutcome::is_unavailable));
    assert!(client.recorded_requests().is_empty());
}

// =============================================================================
// Fetch client
// =============================================================================

#[tokio::test]
async fn when_a_page_is_requested_the_browser_identity_and_slug_are_used() {
    // Given: The default catalog maps ripple to the xrp slug
    let catalog = AssetCatalog::default();
    let ripple = catalog.get("ripple").expect("ripple in catalog").clone();
    let client = Arc::new(ScriptedHttpClient::new().page("xrp", asset_page("XRP", "Payments", "$0.50")));

    // When: The asset is scraped
    let outcomes = orchestrator(client.clone(), Arc::new(NoDelay), 5)
        .run(&[ripple])
        .await;

    // Then: The request targets the slug with the browser user agent, keyed by canonical coin
    let requests = client.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://cmc.test/currencies/xrp/");
    assert_eq!(
        requests[0].headers.get("user-agent").map(String::as_str),
        Some(BROWSER_USER_AGENT)
    );
    assert_eq!(requests[0].timeout_ms, 1_000);
    assert_eq!(outcomes[0].coin, "ripple");
}

// =============================================================================
// End to end: scrape, persist, export
// =============================================================================

#[tokio::test]
async fn when_a_scrape_run_is_persisted_each_outcome_becomes_one_metadata_row() {
    // Given: One resolvable page and one missing page
    let temp = tempdir().expect("tempdir");
    let warehouse =
        Warehouse::open(WarehouseConfig::in_dir(temp.path().join("home"))).expect("warehouse");
    let client = Arc::new(
        ScriptedHttpClient::new().page("bitcoin", asset_page("Digital gold", "Layer 1", "$64,321.10")),
    );
    let outcomes = orchestrator(client, Arc::new(NoDelay), 5)
        .run(&assets(&["bitcoin", "tron"]))
        .await;

    // When: The outcomes are persisted in rebuild mode and exported
    let mut session = warehouse.session().expect("session");
    session.rebuild_metadata_table().expect("rebuild");
    let records: Vec<_> = outcomes.iter().map(ScrapeOutcome::to_record).collect();
    let report = session.persist_metadata(&records);
    drop(session);
    let csv_path = temp.path().join("out").join("crypto_metadata.csv");
    let written = write_outcomes_csv(&csv_path, &outcomes).expect("csv export");

    // Then: Both rows exist, the missing page stored as sentinels with a null price
    assert_eq!(report.committed, 2);
    assert_eq!(written, 2);
    let snapshot = warehouse.metadata_snapshot().expect("metadata");
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].coin, "bitcoin");
    assert_eq!(snapshot[0].price, Some(64_321.10));
    assert_eq!(snapshot[1].coin, "tron");
    assert_eq!(snapshot[1].description.as_deref(), Some(SENTINEL));
    assert_eq!(snapshot[1].price, None);

    let csv = std::fs::read_to_string(&csv_path).expect("read csv");
    assert_eq!(
        csv,
        "coin,description,category,price\n\
         bitcoin,Digital gold,Layer 1,\"$64,321.10\"\n\
         tron,N/A,N/A,N/A\n"
    );
}
