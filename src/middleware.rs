use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{
        header::{CONTENT_TYPE, RETRY_AFTER},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

use crate::schemas::{AppState, ErrorResponse};

const WINDOW: Duration = Duration::from_secs(60);
/// Plain-text error bodies longer than this are replaced by the status reason
const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug)]
struct ClientWindows {
    /// Request timestamps within the last minute, per client
    request_times: HashMap<String, Vec<Instant>>,
    /// Last time idle clients were dropped
    last_cleanup: Instant,
}

/// Sliding one-minute request limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests per minute for each client
    max_requests_per_minute: usize,
    windows: Mutex<ClientWindows>,
}

impl RateLimiter {
    pub fn new(max_requests_per_minute: usize) -> Self {
        Self {
            max_requests_per_minute,
            windows: Mutex::new(ClientWindows {
                request_times: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.max_requests_per_minute
    }

    /// Check if a request is allowed and record it.
    ///
    /// Returns the number of requests the client has left in the window, or
    /// `None` when the limit is already reached.
    pub fn allow_request(&self, client: &str) -> Option<usize> {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if now.duration_since(windows.last_cleanup) >= WINDOW {
            Self::cleanup_old_requests(&mut windows.request_times, now);
            windows.last_cleanup = now;
        }

        let times = windows.request_times.entry(client.to_string()).or_default();
        times.retain(|t| now.duration_since(*t) < WINDOW);

        if times.len() >= self.max_requests_per_minute {
            return None;
        }
        times.push(now);
        Some(self.max_requests_per_minute - times.len())
    }

    /// Remove requests older than one minute and forget idle clients
    fn cleanup_old_requests(request_times: &mut HashMap<String, Vec<Instant>>, now: Instant) {
        request_times.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < WINDOW);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.lock().map(|w| w.request_times.len()).unwrap_or(0)
    }
}

/// First address in `X-Forwarded-For`, else the peer address, else `unknown`.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-client rate limiting with `X-RateLimit-*` headers on every response.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer);
    let limit = state.rate_limiter.limit();

    match state.rate_limiter.allow_request(&client) {
        Some(remaining) => {
            trace!("Request from {} allowed, {} remaining", client, remaining);
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
            response
        }
        None => {
            warn!("Rate limit exceeded for client {}", client);
            let body = ErrorResponse::new(
                format!("Rate limit exceeded: maximum {} requests per minute", limit),
                "RATE_LIMIT_EXCEEDED",
            );
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(WINDOW.as_secs()));
            headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(0usize));
            response
        }
    }
}

fn error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "INVALID_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::REQUEST_TIMEOUT => "TIMEOUT",
        StatusCode::UNPROCESSABLE_ENTITY => "INVALID_REQUEST",
        s if s.is_server_error() => "INTERNAL_ERROR",
        _ => "REQUEST_FAILED",
    }
}

/// Rewrite non-JSON error responses, such as extractor rejections, into `ErrorResponse` bodies.
pub async fn json_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (_, body) = response.into_parts();
    let message = match to_bytes(body, MAX_ERROR_BODY_BYTES).await {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
        _ => status.canonical_reason().unwrap_or("Request failed").to_string(),
    };
    trace!("Wrapping {} error body: {}", status, message);

    (status, Json(ErrorResponse::new(message, error_code(status)))).into_response()
}
