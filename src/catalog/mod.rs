//! Movie catalog routes.
//!
//! # Data Flow
//! ```text
//! Admitted request
//!     → handlers.rs (decode body, map errors to envelopes)
//!     → validation.rs (field checks, 422 on failure)
//!     → store.rs (in-memory records, optimistic versioning)
//! ```
//!
//! # Routes
//! - `GET    /v1/healthcheck`
//! - `POST   /v1/movies`
//! - `GET    /v1/movies/{id}`
//! - `PATCH  /v1/movies/{id}`
//! - `DELETE /v1/movies/{id}`

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub mod handlers;
pub mod movie;
pub mod store;
pub mod validation;

pub use handlers::CatalogState;
pub use movie::{Movie, Runtime};
pub use store::{MovieStore, StoreError};

/// Build the catalog route tree.
pub fn routes(state: CatalogState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/v1/healthcheck", get(handlers::healthcheck))
        .route("/v1/movies", post(handlers::create_movie))
        .route(
            "/v1/movies/{id}",
            get(handlers::show_movie)
                .patch(handlers::update_movie)
                .delete(handlers::delete_movie),
        )
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
