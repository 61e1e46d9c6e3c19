//! Movie and healthcheck handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::catalog::movie::{CreateMovie, Movie, UpdateMovie};
use crate::catalog::store::{MovieStore, StoreError};
use crate::catalog::validation::{validate_movie, Validator};
use crate::http::response;

/// State shared by the catalog handlers.
#[derive(Debug, Clone)]
pub struct CatalogState {
    pub store: Arc<MovieStore>,
    pub env: String,
    pub max_body_bytes: usize,
}

pub async fn healthcheck(State(state): State<CatalogState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.env,
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

pub async fn create_movie(
    State(state): State<CatalogState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let input: CreateMovie = match read_body(&state, body).and_then(|body| read_json(&body)) {
        Ok(input) => input,
        Err(response) => return response,
    };

    let movie = MovieStore::draft(input);
    if let Err(response) = validate(&movie) {
        return response;
    }

    let movie = state.store.insert(movie);
    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)) {
        headers.insert(header::LOCATION, location);
    }

    (StatusCode::CREATED, headers, envelope(&movie)).into_response()
}

pub async fn show_movie(State(state): State<CatalogState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return response::not_found();
    };

    match state.store.get(id) {
        Ok(movie) => envelope(&movie).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn update_movie(
    State(state): State<CatalogState>,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let Some(id) = parse_id(&id) else {
        return response::not_found();
    };

    let mut movie = match state.store.get(id) {
        Ok(movie) => movie,
        Err(e) => return store_error(e),
    };

    let patch: UpdateMovie = match read_body(&state, body).and_then(|body| read_json(&body)) {
        Ok(patch) => patch,
        Err(response) => return response,
    };
    patch.apply(&mut movie);

    if let Err(response) = validate(&movie) {
        return response;
    }

    match state.store.update(&mut movie) {
        Ok(()) => envelope(&movie).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn delete_movie(State(state): State<CatalogState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return response::not_found();
    };

    match state.store.delete(id) {
        Ok(()) => Json(json!({ "message": "movie successfully deleted" })).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn not_found() -> Response {
    response::not_found()
}

pub async fn method_not_allowed() -> Response {
    response::method_not_allowed()
}

fn envelope(movie: &Movie) -> Json<Value> {
    Json(json!({ "movie": movie }))
}

/// Ids must be positive integers; anything else cannot name a record.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id >= 1)
}

fn validate(movie: &Movie) -> Result<(), Response> {
    let mut v = Validator::default();
    validate_movie(&mut v, movie);
    if v.is_valid() {
        Ok(())
    } else {
        Err(response::failed_validation(v.into_errors()))
    }
}

fn store_error(error: StoreError) -> Response {
    match error {
        StoreError::NotFound => response::not_found(),
        StoreError::EditConflict => response::edit_conflict(),
    }
}

/// Surface body extraction failures, such as an oversized body, as envelopes.
fn read_body(state: &CatalogState, body: Result<Bytes, BytesRejection>) -> Result<Bytes, Response> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            response::payload_too_large(state.max_body_bytes)
        } else {
            response::bad_request(&rejection.body_text())
        }
    })
}

/// Decode a JSON body, turning decoder errors into client-facing 400s.
fn read_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(response::bad_request(&"body must not be empty"));
    }

    serde_json::from_slice(body).map_err(|e| {
        use serde_json::error::Category;

        let message = match e.classify() {
            Category::Syntax => format!("body contains badly-formed JSON (at column {})", e.column()),
            Category::Eof => "body contains badly-formed JSON".to_string(),
            Category::Data => format!("body contains invalid data: {}", e),
            Category::Io => "body could not be read".to_string(),
        };
        response::bad_request(&message)
    })
}
