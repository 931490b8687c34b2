//! Contact-form submission endpoint.
//!
//! The rate limit is checked before the body is looked at, so malformed
//! floods are throttled too. Delivery is delegated to a [`ContactSink`].

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http::request::client_identifier;
use crate::http::response::{apply_rate_limit_headers, ApiError};
use crate::http::server::AppState;

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 320;
const MAX_MESSAGE_LEN: usize = 5_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl ContactForm {
    /// Every problem with the form, empty when it is acceptable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let name = self.name.trim();
        let email = self.email.trim();
        let message = self.message.trim();

        if name.is_empty() {
            problems.push("name is required".to_string());
        } else if name.chars().count() > MAX_NAME_LEN {
            problems.push(format!("name must be at most {MAX_NAME_LEN} characters"));
        }

        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => problems.push("email must be a valid address".to_string()),
        }
        if email.len() > MAX_EMAIL_LEN {
            problems.push(format!("email must be at most {MAX_EMAIL_LEN} characters"));
        }

        if message.is_empty() {
            problems.push("message is required".to_string());
        } else if message.chars().count() > MAX_MESSAGE_LEN {
            problems.push(format!("message must be at most {MAX_MESSAGE_LEN} characters"));
        }

        problems
    }
}

/// A validated submission handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub client: String,
}

#[derive(Debug, thiserror::Error)]
#[error("contact delivery failed: {0}")]
pub struct SinkError(pub String);

/// Where accepted submissions go (mailer, queue, ...).
#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn deliver(&self, message: ContactMessage) -> Result<(), SinkError>;
}

/// Default sink: records the submission in the log.
pub struct LogSink;

#[async_trait]
impl ContactSink for LogSink {
    async fn deliver(&self, message: ContactMessage) -> Result<(), SinkError> {
        tracing::info!(
            client = %message.client,
            email = %message.email,
            length = message.message.len(),
            "Contact form submission received"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct Accepted {
    status: &'static str,
}

pub async fn submit_contact(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<ContactForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let client = client_identifier(&headers, peer);
    let policy = &state.services.contact_policy;

    let decision = state
        .services
        .limiter
        .check(&client, policy)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if decision.limited {
        return Err(ApiError::RateLimited {
            limit: policy.limit(),
            decision,
        });
    }

    let Json(form) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let problems = form.problems();
    if !problems.is_empty() {
        return Err(ApiError::Invalid(problems));
    }

    let message = ContactMessage {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        message: form.message.trim().to_string(),
        client,
    };
    state
        .sink
        .deliver(message)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut response = (StatusCode::ACCEPTED, Json(Accepted { status: "accepted" })).into_response();
    apply_rate_limit_headers(&mut response, policy.limit(), &decision);
    Ok(response)
}
