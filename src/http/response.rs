//! Response envelopes.
//!
//! # Responsibilities
//! - Render every error as `{"error": ...}` with the matching status code
//! - Keep client-facing messages fixed; details go to the log, not the wire
//! - Convert panics caught by the middleware stack into a 500
//!
//! # Design Decisions
//! - Server errors are logged here so callers only decide the status
//! - Panic responses ask the client to close the connection

use std::any::Any;
use std::collections::BTreeMap;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
pub const RATE_LIMIT_MESSAGE: &str = "rate limit exceeded";
pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
pub const TIMEOUT_MESSAGE: &str = "the request took too long to process";
pub const EDIT_CONFLICT_MESSAGE: &str =
    "unable to update the record due to an edit conflict, please try again";

/// Build an error envelope with an arbitrary JSON payload.
pub fn error_response(status: StatusCode, message: impl Into<Value>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// 500, logging the underlying cause.
pub fn server_error(error: &dyn std::fmt::Display) -> Response {
    tracing::error!(error = %error, "Request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
}

pub fn rate_limit_exceeded() -> Response {
    error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE)
}

pub fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}

pub fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "the method is not supported for this resource",
    )
}

pub fn bad_request(error: &dyn std::fmt::Display) -> Response {
    error_response(StatusCode::BAD_REQUEST, error.to_string())
}

pub fn payload_too_large(limit: usize) -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("body must not be larger than {} bytes", limit),
    )
}

pub fn request_timeout() -> Response {
    error_response(StatusCode::REQUEST_TIMEOUT, TIMEOUT_MESSAGE)
}

/// Give the bare 408 produced by the timeout layer an error envelope.
pub async fn envelope_timeouts(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        request_timeout()
    } else {
        response
    }
}

pub fn edit_conflict() -> Response {
    error_response(StatusCode::CONFLICT, EDIT_CONFLICT_MESSAGE)
}

/// 422 with one message per offending field.
pub fn failed_validation(errors: BTreeMap<&'static str, &'static str>) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, json!(errors))
}

/// Handler for `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    let mut response = server_error(&detail);
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
