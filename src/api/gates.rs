//! Axum middleware around the request-path filters in [`crate::gate`].

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::gate::RateDecision;

/// Methods that count against the rate limit.
#[must_use]
pub fn is_write(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Client identity used for rate limiting.
///
/// The first `X-Forwarded-For` entry wins when `trust_forwarded_for` is on,
/// then the socket peer address, then `"unknown"`.
#[must_use]
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for
        && let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').map(str::trim).find(|s| !s.is_empty())
    {
        return first.to_string();
    }

    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (enabled, trust_forwarded_for) = {
        let config = state.config().read().await;
        (
            config.rate_limit.enabled,
            config.rate_limit.trust_forwarded_for,
        )
    };

    if !enabled || !is_write(request.method()) {
        return Ok(next.run(request).await);
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_address(request.headers(), peer, trust_forwarded_for);

    match state.shared.rate_limiter.check(&client) {
        RateDecision::Allowed { .. } => Ok(next.run(request).await),
        RateDecision::Limited { retry_after } => {
            warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
            metrics::counter!("rate_limited_requests_total").increment(1);
            let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            Err(ApiError::RateLimited {
                retry_after_secs: retry_after_secs.max(1),
            })
        }
    }
}

pub async fn access_window(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(window) = state.shared.access_window
        && !window.allows_now()
    {
        info!(window = %window, path = %request.uri().path(), "Chat request outside access window");
        return Err(ApiError::forbidden(window.denial_message()));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_write_methods() {
        assert!(is_write(&Method::POST));
        assert!(is_write(&Method::PUT));
        assert!(is_write(&Method::PATCH));
        assert!(is_write(&Method::DELETE));
        assert!(!is_write(&Method::GET));
        assert!(!is_write(&Method::HEAD));
        assert!(!is_write(&Method::OPTIONS));
    }

    #[test]
    fn test_client_address() {
        let peer: SocketAddr = "192.0.2.7:51000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );

        assert_eq!(client_address(&headers, Some(peer), true), "203.0.113.9");
        assert_eq!(client_address(&headers, Some(peer), false), "192.0.2.7");
        assert_eq!(client_address(&HeaderMap::new(), None, true), "unknown");
    }
}
