//! Movie catalog JSON API.
//!
//! Requests pass through per-client admission control before reaching the
//! catalog routes; the server drains in-flight work on SIGINT/SIGTERM.

pub mod catalog;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{LifecycleError, LifecycleState, Shutdown};
pub use security::{Admission, RateLimiter};
