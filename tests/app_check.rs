use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use app_trust_check::{
    AppState,
    analyzer::AppAnalyzer,
    api::routes::create_router,
    cache::FreshnessCache,
    llm::{Provider, ProviderError},
    service::AnalysisService,
    store::LibsqlStore,
};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

const URL: &str = "https://apps.apple.com/fr/app/example/id123456";

struct StubProvider {
    reply: String,
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl Provider for StubProvider {
    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn analysis_json(score: i64) -> String {
    json!({
        "appName": "ExampleApp",
        "score": score,
        "riskLevel": "HIGH",
        "countryOfOrigin": "China",
        "shareholders": ["Parent Holdings", "Venture Fund"],
        "positivePoints": ["Large user base"],
        "negativePoints": ["Broad permissions"],
        "summary": "Popular but collects a lot of data."
    })
    .to_string()
}

struct TestApp {
    router: Router,
    provider: Arc<StubProvider>,
}

async fn test_app(reply: String, delay: Duration, timeout: Duration) -> TestApp {
    let provider = Arc::new(StubProvider {
        reply,
        delay,
        calls: AtomicUsize::new(0),
    });
    let store = LibsqlStore::open_local(":memory:").await.unwrap();
    let service = AnalysisService::new(
        FreshnessCache::new(Arc::new(store)),
        AppAnalyzer::new(provider.clone()),
    );
    let router = create_router(AppState {
        service: Arc::new(service),
        request_timeout: timeout,
    });
    TestApp { router, provider }
}

async fn post_check(router: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/app-check")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn first_check_analyzes_then_serves_from_cache() {
    let reply = format!("Here is the result:\n```json\n{}\n```\nThanks", analysis_json(7));
    let app = test_app(reply, Duration::ZERO, Duration::from_secs(5)).await;

    let (status, body) = post_check(&app.router, json!({ "url": URL })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["status"], "success");
    let first = &body["data"];
    assert_eq!(first["fromCache"], false);
    assert_eq!(first["url"], URL);
    assert_eq!(first["appName"], "ExampleApp");
    assert_eq!(first["score"], 7);
    assert_eq!(first["riskLevel"], "HIGH");
    assert_eq!(first["shareholders"], json!(["Parent Holdings", "Venture Fund"]));
    assert!(first["timestamp"].is_i64());

    let (status, body) = post_check(&app.router, json!({ "url": URL })).await;
    assert_eq!(status, StatusCode::OK);
    let second = &body["data"];
    assert_eq!(second["fromCache"], true);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["timestamp"], first["timestamp"]);
    assert_eq!(second["summary"], first["summary"]);

    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_analysis_is_a_generic_server_error() {
    let app = test_app(analysis_json(25), Duration::ZERO, Duration::from_secs(5)).await;

    let (status, body) = post_check(&app.router, json!({ "url": URL })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["meta"]["message"], "Analysis failed");

    // Nothing was cached, so the next request asks the provider again.
    post_check(&app.router, json!({ "url": URL })).await;
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn blank_url_is_a_bad_request() {
    let app = test_app(analysis_json(7), Duration::ZERO, Duration::from_secs(5)).await;

    let (status, body) = post_check(&app.router, json!({ "url": "  " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["meta"]["status_code"], 400);
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_provider_hits_request_timeout() {
    let app = test_app(
        analysis_json(7),
        Duration::from_secs(30),
        Duration::from_millis(50),
    )
    .await;

    let (status, body) = post_check(&app.router, json!({ "url": URL })).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["meta"]["message"], "Request processing timed out");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app(analysis_json(7), Duration::ZERO, Duration::from_secs(5)).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn malformed_body_uses_error_envelope() {
    let app = test_app(analysis_json(7), Duration::ZERO, Duration::from_secs(5)).await;

    for (content_type, body) in [
        ("application/json", "{\"link\": \"https://example.org\"}"),
        ("application/json", "not json"),
        ("text/plain", "{\"url\": \"https://example.org\"}"),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri("/api/app-check")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["meta"]["status"], "error");
        assert_eq!(json["data"], Value::Null);
        assert!(json["meta"]["message"].as_str().unwrap().starts_with("Invalid request: "));
    }

    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);
}
