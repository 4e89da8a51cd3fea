use axum::http::{HeaderMap, header::USER_AGENT};
use axum::{Router, routing::get};
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use storefront_gateway::agent::AgentClassifier;
use storefront_gateway::build_router;
use storefront_gateway::config::AdmissionConfig;
use storefront_gateway::state::AppState;
use storefront_gateway::upstream::Upstream;

const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn state(max_requests: u32, upstream: Option<Upstream>, admin_token: Option<&str>) -> AppState {
    AppState::new(
        AdmissionConfig {
            max_requests,
            ..AdmissionConfig::default()
        },
        AgentClassifier::default(),
        upstream,
        admin_token.map(str::to_string),
    )
    .unwrap()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

async fn spawn_gateway(state: AppState) -> String {
    let addr = serve(build_router(Arc::new(state))).await;
    format!("http://{addr}")
}

fn browser() -> reqwest::Client {
    reqwest::Client::builder().user_agent(CHROME).build().unwrap()
}

#[tokio::test]
async fn admitted_response_gets_security_headers() {
    let base = spawn_gateway(state(60, None, None)).await;

    let res = browser().get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["x-admission-protection"], "active");
}

#[tokio::test]
async fn missing_or_tool_agents_are_forbidden() {
    let base = spawn_gateway(state(60, None, None)).await;

    // reqwest sends no User-Agent unless asked to
    let res = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = browser()
        .get(format!("{base}/health"))
        .header(USER_AGENT, "curl/8.4.0")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.headers()["x-admission-protection"], "suspicious-identity");
    assert!(res.headers().get("x-frame-options").is_none());
    assert_eq!(res.text().await.unwrap(), "access restricted");
}

#[tokio::test]
async fn forbidden_requests_do_not_spend_the_budget() {
    let base = spawn_gateway(state(2, None, None)).await;
    let client = browser();

    for _ in 0..5 {
        let res = client
            .get(format!("{base}/health"))
            .header(USER_AGENT, "python-requests/2.31")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    for _ in 0..2 {
        let res = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn limit_breach_blocks_client() {
    let base = spawn_gateway(state(3, None, None)).await;
    let client = browser();

    for _ in 0..3 {
        let res = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "300");
    assert_eq!(res.headers()["x-admission-protection"], "rate-limited");
    assert_eq!(res.text().await.unwrap(), "too many requests");

    let res = client.get(format!("{base}/test/ddos-simulation")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-admission-protection"], "blocked");
    let retry: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=300).contains(&retry));
}

#[tokio::test]
async fn static_assets_bypass_the_limiter() {
    let base = spawn_gateway(state(1, None, None)).await;
    let client = browser();

    for _ in 0..5 {
        // no upstream, so the fallback answers 404, but never 429
        let res = client.get(format!("{base}/static/site.css")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["x-admission-protection"], "active");
    }

    let res = client
        .get(format!("{base}/static/site.css"))
        .header(USER_AGENT, "Wget/1.21")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn security_status_requires_admin_token() {
    let base = spawn_gateway(state(60, None, Some("s3cret"))).await;
    let client = browser();

    let res = client.get(format!("{base}/admin/security-status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{base}/admin/security-status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{base}/admin/security-status"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["protection_status"], "ACTIVE");
    assert_eq!(body["rate_limiting"]["max_requests_per_window"], 60);
    assert_eq!(body["rate_limiting"]["block_duration_seconds"], 300);
    assert_eq!(body["rate_limiting"]["active_keys_count"], 1);
    assert_eq!(body["rate_limiting"]["currently_blocked_count"], 0);
    assert_eq!(body["user_agent_filtering"]["suspicious_patterns_count"], 18);
}

#[tokio::test]
async fn status_endpoint_is_behind_admission() {
    let base = spawn_gateway(state(1, None, Some("s3cret"))).await;
    let client = browser();

    client.get(format!("{base}/health")).send().await.unwrap();
    let res = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // the status endpoint sits behind admission too, so this client is
    // locked out of it while blocked
    let res = client
        .get(format!("{base}/admin/security-status"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn metrics_report_live_tracked_key_count() {
    let base = spawn_gateway(state(60, None, None)).await;
    let client = browser();

    client.get(format!("{base}/health")).send().await.unwrap();
    let res = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // no sweep has run, the gauge still counts this client
    let body = res.text().await.unwrap();
    assert!(body.contains("gateway_tracked_keys 1\n"), "{body}");
}

#[tokio::test]
async fn security_status_disabled_without_token() {
    let base = spawn_gateway(state(60, None, None)).await;

    let res = browser()
        .get(format!("{base}/admin/security-status"))
        .bearer_auth("anything")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admitted_requests_are_forwarded_to_storefront() {
    let storefront = Router::new().route(
        "/products",
        get(|headers: HeaderMap| async move {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("missing")
                .to_string();
            format!("catalog for {forwarded}")
        }),
    );
    let storefront_addr = serve(storefront).await;

    let upstream = Upstream::new(reqwest::Client::new(), &storefront_addr.to_string()).unwrap();
    let base = spawn_gateway(state(60, Some(upstream), None)).await;

    let res = browser().get(format!("{base}/products?page=2")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-admission-protection"], "active");
    assert_eq!(res.text().await.unwrap(), "catalog for 127.0.0.1");

    let res = browser().get(format!("{base}/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_burst_admits_exactly_the_limit() {
    let base = spawn_gateway(state(10, None, None)).await;
    let client = browser();

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let client = client.clone();
        let url = format!("{base}/health");
        tasks.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status()
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(limited, 30);
}
