//! Request audit trail
//!
//! Classifies every finished request and, when it is worth recording, writes
//! an audit row in a background task. Failures to record are logged and never
//! affect the response.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use shared::{classify_request, describe, extract_object, is_success, RequestFacts, Severity};

use super::auth::authenticate;
use crate::services::audit::{AuditService, NewAuditEntry};
use crate::AppState;

pub async fn audit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.audit.enabled {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let facts = RequestFacts {
        method: &method,
        path: &path,
        status,
        content_type,
    };

    let Some(action) = classify_request(&facts) else {
        return response;
    };

    let caller = bearer(&headers).and_then(|t| authenticate(&t, &state.config.jwt.secret).ok());
    let (object_type, object_id) = match extract_object(&path) {
        Some((kind, id)) => (Some(kind.to_string()), id),
        None => (None, None),
    };

    let entry = NewAuditEntry {
        user_id: caller.as_ref().map(|u| u.user_id),
        username: caller.map(|u| u.username),
        action,
        severity: Severity::from_status(status),
        http_method: method.clone(),
        path: path.clone(),
        status_code: i32::from(status),
        ip_address: client_ip(&headers).or(peer),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.chars().take(500).collect()),
        object_type,
        object_id,
        success: is_success(status),
        description: describe(&method, &path, status),
        duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
    };

    let service = AuditService::new(state.db.clone());
    tokio::spawn(async move {
        if let Err(e) = service.record(entry).await {
            tracing::warn!("Failed to record audit log: {}", e);
        }
    });

    response
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// First address of X-Forwarded-For, else X-Real-IP
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer(&headers).is_none());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer(&headers).as_deref(), Some("abc"));
    }
}
