//! Gateway pipeline middleware
//!
//! The single entry point every protected request passes through:
//! validate -> admit -> cache check -> invoke -> post-process. Each stage
//! can short-circuit; whatever the outcome, a usage record is emitted for
//! every request whose key identity was resolvable.

use std::time::Instant;

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::{CacheKey, CachedResponse, RateLimitDecision, UsageRecord};
use crate::infrastructure::api_key::AuthReason;

const HEADER_RATE_LIMIT: &str = "x-ratelimit-limit";
const HEADER_RATE_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RATE_RESET: &str = "x-ratelimit-reset";
const HEADER_CACHE: &str = "x-cache";
const HEADER_RESPONSE_TIME: &str = "x-response-time";

pub async fn gateway_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let meta = RequestMeta::capture(&request);

    // Validate. Rejections with no resolvable key identity (malformed or
    // unknown credentials) produce no usage record.
    let Some(credential) = extract_credential(request.headers()) else {
        return auth_error(AuthReason::Malformed).into_response();
    };

    let key = match state.validator.validate(&credential).await {
        Ok(key) => key,
        Err(rejection) => {
            if let Some(key_id) = &rejection.key_id {
                state
                    .usage
                    .record(meta.record(key_id.as_str(), StatusCode::UNAUTHORIZED.as_u16()));
            }

            return auth_error(rejection.reason).into_response();
        }
    };

    // Admit. Cache hits count against the quota too, so this runs before
    // the cache check.
    let decision = state.rate_limiter.admit(key.id.as_str(), key.rate_limit).await;

    if !decision.allowed {
        debug!(key_id = %key.id, "request rejected by rate limiter");

        let mut response = ApiError::rate_limited("Rate limit exceeded")
            .with_code("rate_limited")
            .into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);

        if let Ok(value) = HeaderValue::from_str(&decision.reset_at.to_rfc3339()) {
            response.headers_mut().insert(HEADER_RATE_RESET, value);
        }

        state
            .usage
            .record(meta.record(key.id.as_str(), StatusCode::TOO_MANY_REQUESTS.as_u16()));
        return response;
    }

    // Cache check, idempotent reads only.
    let cache_key = CacheKey::new(key.id.as_str(), meta.method.as_str(), &meta.path);

    if meta.method == Method::GET {
        match state.cache.get(&cache_key).await {
            Ok(Some(cached)) => {
                let status = cached.status;
                let mut response = render_cached(cached);
                response
                    .headers_mut()
                    .insert(HEADER_CACHE, HeaderValue::from_static("HIT"));
                apply_rate_limit_headers(response.headers_mut(), &decision);

                state.usage.record(meta.record(key.id.as_str(), status));
                return response;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(cache_key = %cache_key, error = %e, "cache lookup failed, passing through");
            }
        }
    }

    // Invoke the inner handler. Panics have already been converted to plain
    // 500 responses by the catch-panic layer stacked underneath.
    let response = next.run(request).await;

    // Post-process: snapshot eligible responses, then annotate.
    let mut response = if meta.method == Method::GET && response.status().is_success() {
        store_response(&state, &cache_key, response).await
    } else {
        response
    };

    if meta.method == Method::GET {
        response
            .headers_mut()
            .insert(HEADER_CACHE, HeaderValue::from_static("MISS"));
    }

    apply_rate_limit_headers(response.headers_mut(), &decision);
    attach_response_time(response.headers_mut(), &meta);

    // The status the caller actually receives, after any buffering
    // substitution.
    let status = response.status();
    state.usage.record(meta.record(key.id.as_str(), status.as_u16()));
    response
}

/// Per-request facts captured before the body is consumed
struct RequestMeta {
    method: Method,
    path: String,
    client_ip: Option<String>,
    user_agent: Option<String>,
    started: Instant,
}

impl RequestMeta {
    fn capture(request: &Request) -> Self {
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        Self {
            method: request.method().clone(),
            path,
            client_ip: extract_client_ip(request.headers()),
            user_agent: extract_user_agent(request.headers()),
            started: Instant::now(),
        }
    }

    fn record(&self, key_id: &str, status: u16) -> UsageRecord {
        let mut record = UsageRecord::new(key_id, self.path.clone(), self.method.as_str(), status)
            .with_latency_ms(self.started.elapsed().as_millis() as u64);

        if let Some(ip) = &self.client_ip {
            record = record.with_client_ip(ip.clone());
        }

        if let Some(ua) = &self.user_agent {
            record = record.with_user_agent(ua.clone());
        }

        record
    }
}

fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn auth_error(reason: AuthReason) -> ApiError {
    let message = match reason {
        AuthReason::Malformed => {
            "API key missing or malformed. Provide via 'Authorization: Bearer <key>' \
             or 'X-API-Key: <key>' header"
        }
        AuthReason::Invalid => "Invalid API key",
        AuthReason::Expired => "API key has expired",
    };

    ApiError::unauthorized(message).with_code(reason.to_string())
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(HEADER_RATE_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(HEADER_RATE_REMAINING, HeaderValue::from(decision.remaining));
}

fn attach_response_time(headers: &mut HeaderMap, meta: &RequestMeta) {
    let elapsed = meta.started.elapsed().as_millis() as u64;

    if let Ok(value) = HeaderValue::from_str(&format!("{}ms", elapsed)) {
        headers.insert(HEADER_RESPONSE_TIME, value);
    }
}

fn render_cached(cached: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() =
        StatusCode::from_u16(cached.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if let Some(content_type) = cached.content_type.as_deref() {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }

    response
}

/// Snapshot a successful GET response into the cache when the body reports
/// an exact size within bounds. Streaming bodies with no known size pass
/// through unbuffered. Content-Length is not consulted: in-process handler
/// responses do not carry the header, it only appears at serialization.
async fn store_response(state: &AppState, cache_key: &CacheKey, response: Response) -> Response {
    let Some(len) = response.body().size_hint().exact() else {
        return response;
    };

    if len > state.gateway.max_cacheable_body_bytes as u64 {
        debug!(cache_key = %cache_key, len, "response too large to cache");
        return response;
    }

    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, state.gateway.max_cacheable_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(cache_key = %cache_key, error = %e, "failed to buffer response body");
            return ApiError::internal("Failed to read response body").into_response();
        }
    };

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let snapshot = CachedResponse::new(parts.status.as_u16(), content_type, bytes.clone());

    if let Err(e) = state.cache.put(cache_key, snapshot).await {
        warn!(cache_key = %cache_key, error = %e, "failed to store response in cache");
    }

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router::create_router;
    use crate::config::GatewayConfig;
    use crate::domain::api_key::{ApiKey, ApiKeyId, KeyStore};
    use crate::domain::ResponseCache;
    use crate::infrastructure::api_key::{
        InMemoryKeyStore, KeyGenerator, KeyValidator, SlidingWindowLimiter,
    };
    use crate::infrastructure::cache::InMemoryResponseCache;
    use crate::infrastructure::usage::{InMemoryUsageSink, UsageRecorder};
    use axum::routing::{get, post};
    use axum::Router;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        store: Arc<InMemoryKeyStore>,
        sink: Arc<InMemoryUsageSink>,
        cache: Arc<InMemoryResponseCache>,
        credential: String,
    }

    async fn report_handler() -> &'static str {
        "report-body"
    }

    async fn create_handler() -> (StatusCode, &'static str) {
        (StatusCode::CREATED, "created")
    }

    async fn panic_handler() -> &'static str {
        panic!("handler blew up")
    }

    async fn bulk_handler() -> String {
        "x".repeat(4096)
    }

    async fn setup(rate_limit: u32) -> Harness {
        setup_with(rate_limit, GatewayConfig::default()).await
    }

    async fn setup_with(rate_limit: u32, gateway: GatewayConfig) -> Harness {
        let store = Arc::new(InMemoryKeyStore::new());
        let generated = KeyGenerator::test().from_secret("pipeline-secret-0001");
        let key = ApiKey::new(
            ApiKeyId::new("svc-key").unwrap(),
            "acct-1",
            &generated.prefix,
            &generated.hash,
        )
        .with_rate_limit(rate_limit);
        store.create(key).await.unwrap();

        let sink = Arc::new(InMemoryUsageSink::new());
        let cache = Arc::new(InMemoryResponseCache::default());

        let state = AppState::new(
            KeyValidator::new(store.clone()),
            Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60))),
            cache.clone(),
            UsageRecorder::spawn(sink.clone(), 64),
            gateway,
        );

        let inner = Router::new()
            .route("/v1/reports", get(report_handler))
            .route("/v1/jobs", post(create_handler))
            .route("/v1/unstable", get(panic_handler))
            .route("/v1/bulk", get(bulk_handler));

        Harness {
            app: create_router(state, inner),
            store,
            sink,
            cache,
            credential: generated.key,
        }
    }

    fn get_request(path: &str, credential: &str) -> Request {
        Request::builder()
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {}", credential))
            .header(header::USER_AGENT, "keygate-tests/1.0")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_missing_credential_rejected() {
        let harness = setup(5).await;

        let response = harness
            .app
            .oneshot(
                Request::builder()
                    .uri("/v1/reports")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_string(response).await;
        assert!(body.contains("authentication_error"));
        assert!(body.contains("malformed"));

        // No key identity was resolvable, so nothing was recorded.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.sink.len().await, 0);
    }

    #[tokio::test]
    async fn test_garbage_credential_rejected_as_malformed() {
        let harness = setup(5).await;

        let response = harness
            .app
            .oneshot(get_request("/v1/reports", "foo"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("malformed"));
    }

    #[tokio::test]
    async fn test_valid_request_passes_with_annotations() {
        let harness = setup(5).await;

        let response = harness
            .app
            .oneshot(get_request("/v1/reports", &harness.credential))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, HEADER_CACHE), Some("MISS"));
        assert_eq!(header(&response, HEADER_RATE_LIMIT), Some("5"));
        assert_eq!(header(&response, HEADER_RATE_REMAINING), Some("4"));
        assert!(header(&response, HEADER_RATE_RESET).is_none());
        assert!(header(&response, HEADER_RESPONSE_TIME)
            .is_some_and(|v| v.ends_with("ms")));
        assert_eq!(body_string(response).await, "report-body");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let records = harness.sink.records_for_key("svc-key").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, 200);
        assert_eq!(records[0].endpoint, "/v1/reports");
        assert_eq!(records[0].client_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(records[0].user_agent.as_deref(), Some("keygate-tests/1.0"));
    }

    #[tokio::test]
    async fn test_repeated_get_served_from_cache() {
        let harness = setup(5).await;

        let first = harness
            .app
            .clone()
            .oneshot(get_request("/v1/reports", &harness.credential))
            .await
            .unwrap();
        assert_eq!(header(&first, HEADER_CACHE), Some("MISS"));

        let second = harness
            .app
            .oneshot(get_request("/v1/reports", &harness.credential))
            .await
            .unwrap();

        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(header(&second, HEADER_CACHE), Some("HIT"));
        // A cache hit still consumed quota.
        assert_eq!(header(&second, HEADER_RATE_REMAINING), Some("3"));
        // Response time covers handler invocations only.
        assert!(header(&second, HEADER_RESPONSE_TIME).is_none());
        assert_eq!(body_string(second).await, "report-body");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let records = harness.sink.records_for_key("svc-key").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status_code, 200);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_yields_429() {
        let harness = setup(2).await;

        for _ in 0..2 {
            let response = harness
                .app
                .clone()
                .oneshot(get_request("/v1/reports", &harness.credential))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = harness
            .app
            .oneshot(get_request("/v1/reports", &harness.credential))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, HEADER_RATE_LIMIT), Some("2"));
        assert_eq!(header(&response, HEADER_RATE_REMAINING), Some("0"));

        let reset = header(&response, HEADER_RATE_RESET).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(reset).unwrap() > Utc::now());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let records = harness.sink.records_for_key("svc-key").await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].status_code, 429);
    }

    #[tokio::test]
    async fn test_non_get_never_cached() {
        let harness = setup(5).await;

        for _ in 0..2 {
            let response = harness
                .app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/v1/jobs")
                        .header(
                            header::AUTHORIZATION,
                            format!("Bearer {}", harness.credential),
                        )
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::CREATED);
            assert!(header(&response, HEADER_CACHE).is_none());
        }

        assert_eq!(harness.cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_key_rejected_and_recorded() {
        let harness = setup(5).await;

        let generated = KeyGenerator::test().from_secret("expired-secret-0001");
        let key = ApiKey::new(
            ApiKeyId::new("old-key").unwrap(),
            "acct-1",
            &generated.prefix,
            &generated.hash,
        )
        .with_expiration(Utc::now() - chrono::Duration::hours(1));
        harness.store.create(key).await.unwrap();

        let response = harness
            .app
            .oneshot(get_request("/v1/reports", &generated.key))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("expired"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let records = harness.sink.records_for_key("old-key").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, 401);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500_and_is_recorded() {
        let harness = setup(5).await;

        let response = harness
            .app
            .clone()
            .oneshot(get_request("/v1/unstable", &harness.credential))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(harness.cache.len().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let records = harness.sink.records_for_key("svc-key").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, 500);

        // The gateway keeps serving after a handler panic.
        let response = harness
            .app
            .oneshot(get_request("/v1/reports", &harness.credential))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_response_passes_through_uncached() {
        let gateway = GatewayConfig {
            max_cacheable_body_bytes: 64,
            ..GatewayConfig::default()
        };
        let harness = setup_with(5, gateway).await;

        let response = harness
            .app
            .oneshot(get_request("/v1/bulk", &harness.credential))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, HEADER_CACHE), Some("MISS"));
        assert_eq!(body_string(response).await.len(), 4096);
        assert_eq!(harness.cache.len().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let records = harness.sink.records_for_key("svc-key").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, 200);
    }

    #[tokio::test]
    async fn test_distinct_query_strings_are_distinct_cache_entries() {
        let harness = setup(10).await;

        harness
            .app
            .clone()
            .oneshot(get_request("/v1/reports?page=1", &harness.credential))
            .await
            .unwrap();

        let other_page = harness
            .app
            .oneshot(get_request("/v1/reports?page=2", &harness.credential))
            .await
            .unwrap();

        assert_eq!(header(&other_page, HEADER_CACHE), Some("MISS"));
        assert_eq!(harness.cache.len().await.unwrap(), 2);
    }

    #[test]
    fn test_extract_credential_bearer_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer gk-bearer".parse().unwrap());
        headers.insert("x-api-key", "gk-x-api-key".parse().unwrap());

        assert_eq!(extract_credential(&headers).as_deref(), Some("gk-bearer"));
    }

    #[test]
    fn test_extract_credential_x_api_key_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "  gk-x-api-key  ".parse().unwrap());

        assert_eq!(extract_credential(&headers).as_deref(), Some("gk-x-api-key"));
    }

    #[test]
    fn test_extract_client_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

        assert_eq!(
            extract_client_ip(&headers).as_deref(),
            Some("203.0.113.9")
        );
        assert!(extract_client_ip(&HeaderMap::new()).is_none());
    }
}
