//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use catalog_api::config::AppConfig;
use catalog_api::net::Listener;
use catalog_api::{HttpServer, LifecycleError, LifecycleState};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// A server running on an ephemeral port with a test-controlled stop signal.
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<(), LifecycleError>>,
    pub lifecycle: watch::Receiver<LifecycleState>,
    terminate: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Deliver the stand-in for SIGTERM.
    pub fn terminate(&mut self) {
        if let Some(tx) = self.terminate.take() {
            let _ = tx.send(());
        }
    }
}

/// Start a server. `routes` replaces the catalog when given.
pub async fn spawn_server(mut config: AppConfig, routes: Option<Router>) -> TestServer {
    config.server.bind_address = "127.0.0.1:0".into();
    let listener = Listener::bind(&config.server).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = match routes {
        Some(routes) => HttpServer::with_routes(&config, routes),
        None => HttpServer::new(&config),
    };
    let lifecycle = server.lifecycle();

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(listener, async move {
        let _ = rx.await;
        "SIGTERM"
    }));

    TestServer {
        addr,
        handle,
        lifecycle,
        terminate: Some(tx),
    }
}

/// An HTTP client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Config with the limiter switched off.
pub fn unlimited() -> AppConfig {
    let mut config = AppConfig::default();
    config.rate_limit.enabled = false;
    config
}

/// Build a request as if it arrived from `peer`.
pub fn request_from(peer: [u8; 4], method: &str, path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
