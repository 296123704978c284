//! Subject key extraction.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_REAL_IP: &str = "x-real-ip";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Canonical IP identifying the client: `X-Real-IP`, else the first
/// `X-Forwarded-For` entry, else the connection peer.
///
/// Empty header values fall through to the next source. Returns `None` when
/// the chosen source is not an IP address.
pub fn subject_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let candidate = header(headers, X_REAL_IP).or_else(|| {
        header(headers, crate::security::headers::X_FORWARDED_FOR)
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty())
    });

    match candidate {
        Some(raw) => raw.parse::<IpAddr>().ok().map(|ip| ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}
