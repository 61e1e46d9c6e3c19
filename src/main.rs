//! Movie catalog API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────────────────────────────────────────────┐
//!     ────────────────────┼─▶ net::listener ─▶ http::server ─▶ security     │
//!                         │   (bounded accept)  (per-conn task)  rate_limit  │
//!                         │                                         │        │
//!                         │                                         ▼        │
//!     Client Response     │                                     catalog      │
//!     ◀───────────────────┼──────────────────────────────────── routes       │
//!                         │                                                  │
//!                         │  lifecycle: SIGINT/SIGTERM → stop accept → drain │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;

use catalog_api::config::cli::Args;
use catalog_api::net::Listener;
use catalog_api::observability::{logging, metrics};
use catalog_api::HttpServer;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured by this very file, so report plainly.
            eprintln!("catalog-api: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("catalog-api: failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        env = %config.server.env,
        shutdown_timeout_secs = config.server.shutdown_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address parses.
        let exporter = config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .map_err(|e| e.to_string())
            .and_then(|addr| metrics::init_metrics(addr).map_err(|e| e.to_string()));
        if let Err(e) = exporter {
            tracing::error!(error = %e, "Failed to start metrics exporter");
            return ExitCode::FAILURE;
        }
    }

    let listener = match Listener::bind(&config.server).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %config.server.bind_address, error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    let server = HttpServer::new(&config);
    match server.run(listener).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server stopped with error");
            ExitCode::FAILURE
        }
    }
}
