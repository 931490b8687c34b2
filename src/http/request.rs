//! Request inspection.
//!
//! # Responsibilities
//! - Derive the rate limit identifier for a request
//!
//! # Design Decisions
//! - The first `X-Forwarded-For` hop wins, then `X-Real-IP`, then the peer
//!   address; the service is expected to sit behind a trusted proxy

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Identify the client for rate limiting purposes.
pub fn client_identifier(headers: &HeaderMap, peer: SocketAddr) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
