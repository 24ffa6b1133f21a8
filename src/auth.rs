use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, header::UPGRADE, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

/// Shared bearer token. `None` leaves the API open.
#[derive(Clone, Default)]
pub struct BearerToken(Option<Arc<str>>);

impl BearerToken {
    pub fn new(token: &str) -> Self {
        if token.trim().is_empty() {
            tracing::warn!("auth token is empty, API is unauthenticated");
            Self(None)
        } else {
            Self(Some(Arc::from(token)))
        }
    }

    fn accepts(&self, header: Option<&str>) -> bool {
        self.matches(header.and_then(|h| h.strip_prefix("Bearer ")))
    }

    fn matches(&self, given: Option<&str>) -> bool {
        let Some(expected) = self.0.as_deref() else {
            return true;
        };
        given.is_some_and(|given| constant_time_eq(given.as_bytes(), expected.as_bytes()))
    }
}

/// Token carried as `?access_token=` on WebSocket handshakes, which browsers
/// cannot give an `Authorization` header.
#[derive(Deserialize)]
struct AccessToken {
    access_token: Option<String>,
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

fn query_token(req: &Request) -> Option<String> {
    if !is_websocket_upgrade(req.headers()) {
        return None;
    }
    Query::<AccessToken>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.access_token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects requests without the configured bearer token.
pub async fn require_bearer(
    State(token): State<BearerToken>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !token.accepts(header) && !token.matches(query_token(&req).as_deref()) {
        tracing::debug!(path = %req.uri().path(), "rejected unauthenticated request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}
