//! Error responses.
//!
//! Handlers return [`ApiError`]; it maps to a status code and a JSON body of
//! the form `{"error": "...", "details": [...]}`.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::security::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Invalid(Vec<String>),
    RateLimited { limit: u32, decision: RateLimitDecision },
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "no_details")]
    details: &'a [String],
}

fn no_details(details: &&[String]) -> bool {
    details.is_empty()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, &message, &[]),
            ApiError::Invalid(details) => {
                error_response(StatusCode::BAD_REQUEST, "Invalid submission", &details)
            }
            ApiError::RateLimited { limit, decision } => {
                let mut response = error_response(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests, please try again later",
                    &[],
                );
                apply_rate_limit_headers(&mut response, limit, &decision);
                if let Some(reset) = decision.reset_after {
                    // Round up so clients never retry inside the window.
                    let secs = reset.as_secs() + u64::from(reset.subsec_nanos() > 0);
                    response
                        .headers_mut()
                        .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
                }
                response
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", &[])
            }
        }
    }
}

/// Attach `X-RateLimit-*` headers.
pub fn apply_rate_limit_headers(response: &mut Response, limit: u32, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), HeaderValue::from(limit));
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
}

fn error_response(status: StatusCode, error: &str, details: &[String]) -> Response {
    (status, Json(ErrorBody { error, details })).into_response()
}
