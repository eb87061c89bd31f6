//! Client IP extraction.
//!
//! Admin deployments usually sit behind a reverse proxy, so the real
//! client address arrives in forwarding headers rather than on the
//! socket. Extraction order: first `X-Forwarded-For` entry, then
//! `X-Real-Ip`, then the connection's remote address, then `"unknown"`.

use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::Request;
use axum::http::HeaderMap;

/// Header carrying the proxy chain, client first.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Header carrying the single original client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Placeholder recorded when no address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Resolves the client IP for a request.
#[must_use]
pub fn client_ip(request: &Request) -> String {
    if let Some(ip) = first_forwarded(request.headers()) {
        return ip;
    }
    if let Some(ip) = header_ip(request.headers(), REAL_IP_HEADER) {
        return ip;
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    UNKNOWN_IP.to_owned()
}

/// First entry of `X-Forwarded-For`, the address closest to the client.
fn first_forwarded(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(FORWARDED_FOR_HEADER)?.to_str().ok()?;
    raw.split(',')
        .map(str::trim)
        .find(|ip| !ip.is_empty())
        .map(str::to_owned)
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(raw.to_owned())
}
