//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (derive client key from peer address, admit or deny)
//!     → Pass to routing
//!
//! In the background:
//!     sweeper.rs (evict idle clients every interval)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a request whose peer address is unknown gets a 500, never a bypass
//! - No trust in client input: keys come from the socket, not headers
//! - Limiter state lives only in memory and only in this module

pub mod rate_limit;
pub mod sweeper;

pub use rate_limit::{rate_limit_middleware, Admission, RateLimiter};
pub use sweeper::Sweeper;
