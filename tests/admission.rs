//! Admission control through the full middleware stack.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use catalog_api::config::AppConfig;
use catalog_api::HttpServer;
use serde_json::json;
use tower::ServiceExt;

mod common;

fn limited(rps: f64, burst: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = rps;
    config.rate_limit.burst = burst;
    config
}

#[tokio::test]
async fn burst_then_refill_over_the_wire() {
    let mut server = common::spawn_server(limited(2.0, 4), None).await;
    let client = common::client();
    let url = server.url("/v1/healthcheck");

    for _ in 0..4 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    let denied = client.get(&url).send().await.unwrap();
    assert_eq!(denied.status(), 429);
    assert_eq!(
        denied.json::<serde_json::Value>().await.unwrap(),
        json!({ "error": "rate limit exceeded" })
    );

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 429);

    server.terminate();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn disabled_limiter_admits_everything() {
    let mut config = limited(1.0, 1);
    config.rate_limit.enabled = false;
    let mut server = common::spawn_server(config, None).await;
    let client = common::client();

    for _ in 0..25 {
        let res = client.get(server.url("/v1/healthcheck")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    server.terminate();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn forwarded_headers_do_not_change_the_client_key() {
    let router = HttpServer::new(&limited(1.0, 1)).router();

    let first = router
        .clone()
        .oneshot(common::request_from([192, 0, 2, 1], "GET", "/v1/healthcheck", ""))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let mut spoofed = common::request_from([192, 0, 2, 1], "GET", "/v1/healthcheck", "");
    spoofed
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
    let second = router.oneshot(spoofed).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn clients_are_limited_separately() {
    let router = HttpServer::new(&limited(1.0, 1)).router();

    for peer in [[192, 0, 2, 1], [192, 0, 2, 2], [192, 0, 2, 3]] {
        let res = router
            .clone()
            .oneshot(common::request_from(peer, "GET", "/v1/healthcheck", ""))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn unknown_peer_is_a_server_error() {
    let router = HttpServer::new(&limited(1.0, 1)).router();

    let request = Request::builder()
        .uri("/v1/healthcheck")
        .body(Body::empty())
        .unwrap();
    let res = router.oneshot(request).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        common::body_json(res).await,
        json!({ "error": "the server encountered a problem and could not process your request" })
    );
}

#[tokio::test]
async fn denied_requests_never_reach_handlers() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let routes = axum::Router::new().route(
        "/count",
        axum::routing::get(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "ok"
            }
        }),
    );
    let router = HttpServer::with_routes(&limited(0.001, 2), routes).router();

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let res = router
            .clone()
            .oneshot(common::request_from([198, 51, 100, 7], "GET", "/count", ""))
            .await
            .unwrap();
        statuses.push(res.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 429, 429, 429]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
