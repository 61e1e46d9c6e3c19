//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Wrap the route tree in admission control and the shared middleware stack
//! - Run the accept loop, one task per connection
//! - On a termination signal stop accepting, drain in-flight requests within
//!   the configured deadline, and report exactly one outcome

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::ConnectInfo, middleware, Router};
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tower::ServiceExt;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::catalog::{self, CatalogState, MovieStore};
use crate::config::{AppConfig, ServerConfig};
use crate::http::request::{track_metrics, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response;
use crate::lifecycle::{LifecycleError, LifecycleState, Shutdown, ShutdownListener, Signals};
use crate::net::listener::ConnectionPermit;
use crate::net::{Accept, AcceptRecovery, ConnectionGuard, ConnectionTracker, Listener, ListenerError};
use crate::security::{rate_limit_middleware, RateLimiter, Sweeper};

/// Pause after running out of descriptors before accepting again.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// HTTP server for the catalog API.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    shutdown: Shutdown,
    sweeper: Option<Sweeper>,
}

impl HttpServer {
    /// Create the catalog API server.
    ///
    /// Must be called from within a Tokio runtime: the rate limiter's sweeper
    /// starts immediately.
    pub fn new(config: &AppConfig) -> Self {
        let state = CatalogState {
            store: Arc::new(MovieStore::new()),
            env: config.server.env.clone(),
            max_body_bytes: config.server.max_body_bytes,
        };
        let routes = catalog::routes(state);
        Self::with_routes(config, routes)
    }

    /// Serve an arbitrary route tree behind admission control.
    pub fn with_routes(config: &AppConfig, routes: Router) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let sweeper = limiter.is_enabled().then(|| limiter.spawn_sweeper());

        tracing::info!(
            enabled = limiter.is_enabled(),
            requests_per_second = config.rate_limit.requests_per_second,
            burst = config.rate_limit.burst,
            "Rate limiter configured"
        );

        Self {
            router: Self::build_router(&config.server, routes, limiter),
            config: config.server.clone(),
            shutdown: Shutdown::new(),
            sweeper,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Admission sits directly around the routes, so a rejected request never
    /// reaches a handler; panic recovery sits outside it.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, routes: Router, limiter: Arc<RateLimiter>) -> Router {
        routes
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(middleware::map_response(response::envelope_timeouts))
            .layer(CatchPanicLayer::custom(response::panic_response))
            .layer(middleware::from_fn(track_metrics))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Observe lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.shutdown.watch_state()
    }

    /// Serve until SIGINT or SIGTERM, then drain.
    pub async fn run(self, listener: Listener) -> Result<(), LifecycleError> {
        let signals = Signals::install().map_err(LifecycleError::Signal)?;
        self.run_until(listener, signals.recv()).await
    }

    /// Serve until `signal` resolves with the name of what stopped us, then drain.
    ///
    /// A failure of the listening socket ends serving at once and is returned
    /// in place of any drain outcome.
    pub async fn run_until<A, F>(self, listener: A, signal: F) -> Result<(), LifecycleError>
    where
        A: Accept,
        F: Future<Output = &'static str> + Send + 'static,
    {
        let Self {
            router,
            config,
            shutdown,
            sweeper,
        } = self;

        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let tracker = ConnectionTracker::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        let drain = tokio::spawn(drain_on_signal(
            signal,
            shutdown.clone(),
            tracker.clone(),
            closed_rx,
            config.shutdown_timeout(),
            addr,
            outcome_tx,
        ));

        tracing::info!(address = %addr, env = %config.env, "starting server");
        shutdown.mark_serving();

        let mut stop = shutdown.subscribe();
        let served = loop {
            tokio::select! {
                biased;
                _ = stop.recv() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            shutdown.subscribe(),
                            tracker.track(),
                            permit,
                        ));
                    }
                    Err(e) => match e.recovery() {
                        AcceptRecovery::Skip => {
                            tracing::debug!(error = %e, "Dropped connection during accept");
                        }
                        AcceptRecovery::Backoff => {
                            tracing::warn!(
                                error = %e,
                                backoff_ms = ACCEPT_BACKOFF.as_millis() as u64,
                                "Accept failed, retrying"
                            );
                            tokio::select! {
                                _ = stop.recv() => break Ok(()),
                                _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                            }
                        }
                        AcceptRecovery::Fatal => break Err(e),
                    },
                }
            }
        };

        // Closing the socket makes new connection attempts fail right away.
        drop(listener);

        if let Err(e) = served {
            // Not caused by shutdown, so no drain outcome replaces it.
            drain.abort();
            tracing::error!(address = %addr, error = %e, "accept loop failed");
            if let Some(sweeper) = sweeper {
                sweeper.stop().await;
            }
            shutdown.mark_stopped();
            return Err(e.into());
        }
        let _ = closed_tx.send(());

        let outcome = outcome_rx
            .await
            .unwrap_or(Err(LifecycleError::ShutdownAborted));

        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }
        shutdown.mark_stopped();

        if outcome.is_ok() {
            tracing::info!(address = %addr, "stopped server");
        }
        outcome
    }
}

/// Wait for the stop request, then drain open connections within `timeout`.
///
/// Writes the single lifecycle outcome into `outcome_tx`.
async fn drain_on_signal<F>(
    signal: F,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_closed: oneshot::Receiver<()>,
    timeout: Duration,
    addr: SocketAddr,
    outcome_tx: oneshot::Sender<Result<(), LifecycleError>>,
) where
    F: Future<Output = &'static str>,
{
    let mut stop = shutdown.subscribe();
    let signal = tokio::select! {
        name = signal => name,
        _ = stop.recv() => "internal",
    };

    tracing::info!(address = %addr, signal, "shutting down server");
    shutdown.trigger();

    let drained = tokio::time::timeout(timeout, async {
        // Connections accepted before the loop noticed the stop are tracked
        // by the time it reports the socket closed.
        let _ = accept_closed.await;
        tracker.wait_idle().await;
    })
    .await;

    let outcome = match drained {
        Ok(()) => Ok(()),
        Err(_) => Err(LifecycleError::DrainTimeout {
            timeout,
            in_flight: tracker.active_count(),
        }),
    };
    let _ = outcome_tx.send(outcome);
}

/// Serve HTTP/1 or HTTP/2 on one connection until it closes.
///
/// Once shutdown starts, the connection finishes the request in progress and
/// then closes instead of waiting for another.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    mut stop: ShutdownListener,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder.http1().timer(TokioTimer::new());

    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = stop.recv(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};

    fn config(enabled: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = enabled;
        config.rate_limit.burst = 1;
        config
    }

    fn request(path: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(path)
            .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5000))))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let server = HttpServer::new(&config(false));
        let response = server.router().oneshot(request("/v1/healthcheck")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn panics_become_server_errors() {
        async fn boom() -> &'static str {
            panic!("handler exploded")
        }

        let routes = Router::new().route("/boom", get(boom));
        let server = HttpServer::with_routes(&config(false), routes);

        let response = server.router().oneshot(request("/boom")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["connection"], "close");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out_with_an_envelope() {
        async fn stall() -> &'static str {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "late"
        }

        let mut config = config(false);
        config.server.request_timeout_secs = 1;
        let routes = Router::new().route("/stall", get(stall));
        let server = HttpServer::with_routes(&config, routes);

        let response = server.router().oneshot(request("/stall")).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": response::TIMEOUT_MESSAGE }));
    }

    #[tokio::test]
    async fn admission_wraps_every_route() {
        let server = HttpServer::new(&config(true));
        let router = server.router();

        let first = router.clone().oneshot(request("/v1/healthcheck")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.oneshot(request("/v1/healthcheck")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
