//! Request-capturing middleware.
//!
//! [`record_activity`] wraps every request the host router sends through
//! it: it buffers and restores both bodies, derives the action and
//! outcome from the method and status code, and submits a sanitized
//! [`ActivityEntry`] to the batching service after the response is built.
//! Recording is best-effort; a submission failure is logged and the
//! response the handler produced is returned untouched.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use xenia_audit::{sanitize_raw, ActionType, ActivityEntry, Category, EntryStatus};
use xenia_pipeline::ActivityLogService;

use crate::client_ip::client_ip;

/// Header an upstream proxy or client uses to propagate a trace ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying an explicit session ID when no auth layer provides one.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Longest inbound request ID accepted; anything longer is replaced.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Tuning for [`record_activity`].
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// `POST` path recorded as a BOOKING action with category CRITICAL.
    pub booking_route: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            booking_route: "/api/bookings".to_owned(),
        }
    }
}

/// Identity of the authenticated caller.
///
/// The host's auth layer attaches this to the request extensions when it
/// runs outside the capture layer, or to the response extensions when it
/// runs inside; [`record_activity`] checks both, request first.
#[derive(Debug, Clone, Default)]
pub struct AuthIdentity {
    /// Authenticated user ID
    pub user_id: Option<Uuid>,

    /// Authenticated user email
    pub user_email: Option<String>,

    /// Session the request belongs to
    pub session_id: Option<String>,
}

/// State handed to [`record_activity`] via
/// `axum::middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct CaptureContext {
    service: Arc<ActivityLogService>,
    config: CaptureConfig,
}

impl CaptureContext {
    /// Context with the default [`CaptureConfig`].
    #[must_use]
    pub fn new(service: Arc<ActivityLogService>) -> Self {
        Self::with_config(service, CaptureConfig::default())
    }

    /// Context with an explicit configuration.
    #[must_use]
    pub fn with_config(service: Arc<ActivityLogService>, config: CaptureConfig) -> Self {
        Self { service, config }
    }
}

/// Records one activity entry per request/response cycle.
///
/// The request body is read fully and handed back to the inner handler
/// byte-for-byte; the response body likewise. Only the sanitized,
/// size-capped copies reach the log.
pub async fn record_activity(
    State(context): State<CaptureContext>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request_id_from(request.headers());
    let ip_address = client_ip(&request);
    let user_agent = header_string(request.headers(), "user-agent");
    let session_header = header_string(request.headers(), SESSION_ID_HEADER);
    let identity = request.extensions().get::<AuthIdentity>().cloned();

    let (parts, body) = request.into_parts();
    let request_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(error = %error, endpoint = %path, "failed to buffer the request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let request = Request::from_parts(parts, Body::from(request_bytes.clone()));

    let response = next.run(request).await;

    let status = response.status();
    let identity = identity.or_else(|| response.extensions().get::<AuthIdentity>().cloned());
    let (parts, body) = response.into_parts();
    let response_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(error = %error, endpoint = %path, "failed to buffer the response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let response = Response::from_parts(parts, Body::from(response_bytes.clone()));

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let action = derive_action(&method, &path, &context.config);
    let mut entry = ActivityEntry::new(action, path.clone(), method.as_str())
        .with_request_id(request_id)
        .with_ip_address(ip_address)
        .with_status(derive_status(status))
        .with_response_code(status.as_u16())
        .with_metadata_entry("latency_ms", json!(latency_ms));

    if action == ActionType::Booking {
        entry = entry.with_category(Category::Critical);
    }

    let (resource, resource_id) = resource_from_path(&path);
    if let Some(resource) = resource {
        entry = entry.with_resource(resource);
    }
    if let Some(resource_id) = resource_id {
        entry = entry.with_resource_id(resource_id);
    }

    if let Some(agent) = user_agent {
        entry = entry.with_user_agent(agent);
    }
    if let Some(identity) = identity {
        if let Some(user_id) = identity.user_id {
            entry = entry.with_user_id(user_id);
        }
        if let Some(email) = identity.user_email {
            entry = entry.with_user_email(email);
        }
        if let Some(session) = identity.session_id {
            entry = entry.with_session_id(session);
        }
    }
    if entry.session_id.is_none() {
        if let Some(session) = session_header {
            entry = entry.with_session_id(session);
        }
    }

    if !request_bytes.is_empty() {
        entry = entry.with_request_payload(sanitize_raw(&request_bytes));
    }
    if !response_bytes.is_empty() {
        entry = entry.with_response_payload(sanitize_raw(&response_bytes));
    }

    if let Err(error) = context.service.log(entry).await {
        tracing::warn!(error = %error, endpoint = %path, "failed to record request activity");
    }

    response
}

/// Inbound header value when present, well-formed and of sane length;
/// otherwise a fresh UUID.
fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(|| Uuid::now_v7().to_string(), str::to_owned)
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn derive_action(method: &Method, path: &str, config: &CaptureConfig) -> ActionType {
    if *method == Method::POST && path == config.booking_route {
        ActionType::Booking
    } else if *method == Method::POST {
        ActionType::Create
    } else if *method == Method::PUT || *method == Method::PATCH {
        ActionType::Update
    } else if *method == Method::DELETE {
        ActionType::Delete
    } else if *method == Method::GET {
        ActionType::Read
    } else {
        ActionType::Other
    }
}

fn derive_status(status: StatusCode) -> EntryStatus {
    if status.is_success() || status.is_redirection() {
        EntryStatus::Success
    } else {
        EntryStatus::Failed
    }
}

/// Splits `/api/v1/rooms/12` style paths into a resource name and ID,
/// skipping the `api` prefix and version segments.
fn resource_from_path(path: &str) -> (Option<String>, Option<String>) {
    let mut segments = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .skip_while(|segment| *segment == "api" || is_version_segment(segment));
    let resource = segments.next().map(str::to_owned);
    let resource_id = segments.next().map(str::to_owned);
    (resource, resource_id)
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Request as HttpRequest;
    use axum::routing::{get, post};
    use axum::{middleware, Json, Router};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use xenia_audit::SearchQuery;
    use xenia_pipeline::PipelineConfig;
    use xenia_store::{ActivityStore, MemoryStore};

    use super::*;

    fn quick_config() -> PipelineConfig {
        PipelineConfig::builder()
            .batch_size(50)
            .flush_interval(Duration::from_millis(20))
            .build()
    }

    async fn ok_handler() -> &'static str {
        "ok"
    }

    async fn no_content_handler() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    async fn echo_handler(body: String) -> String {
        body
    }

    async fn booking_handler() -> Json<Value> {
        Json(json!({"confirmation_token": "tok-123", "room": 12}))
    }

    async fn fail_handler() -> (StatusCode, &'static str) {
        (StatusCode::FORBIDDEN, "no")
    }

    async fn identity_handler() -> Response {
        let mut response = "ok".into_response();
        response.extensions_mut().insert(AuthIdentity {
            user_id: Some(Uuid::from_u128(7)),
            user_email: Some("ada@example.com".to_owned()),
            session_id: Some("sess-inner".to_owned()),
        });
        response
    }

    struct Harness {
        store: Arc<MemoryStore>,
        service: Arc<ActivityLogService>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let service = Arc::new(ActivityLogService::new(
                Arc::clone(&store) as Arc<dyn ActivityStore>,
                quick_config(),
            ));
            Self { store, service }
        }

        fn router(&self) -> Router {
            Router::new()
                .route("/api/rooms", get(ok_handler))
                .route("/api/rooms/{id}", get(ok_handler))
                .route("/api/nothing", get(no_content_handler))
                .route("/api/echo", post(echo_handler))
                .route("/api/bookings", post(booking_handler))
                .route("/api/fail", get(fail_handler))
                .route("/api/whoami", get(identity_handler))
                .layer(middleware::from_fn_with_state(
                    CaptureContext::new(Arc::clone(&self.service)),
                    record_activity,
                ))
        }

        /// Drains the pipeline and returns everything that was recorded.
        async fn recorded(&self) -> Vec<ActivityEntry> {
            self.service.close().await.expect("close service");
            self.store
                .search(&SearchQuery::default())
                .await
                .expect("search")
                .entries
        }
    }

    #[tokio::test]
    async fn test_records_a_read_request() {
        let harness = Harness::new();
        let response = harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/rooms/12")
                    .header("User-Agent", "integration-test")
                    .header("X-Forwarded-For", "203.0.113.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let entries = harness.recorded().await;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.action, ActionType::Read);
        assert_eq!(entry.endpoint, "/api/rooms/12");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.ip_address, "203.0.113.9");
        assert_eq!(entry.user_agent.as_deref(), Some("integration-test"));
        assert_eq!(entry.resource.as_deref(), Some("rooms"));
        assert_eq!(entry.resource_id.as_deref(), Some("12"));
        assert_eq!(entry.status, EntryStatus::Success);
        assert_eq!(entry.response_code, Some(200));
        assert!(entry.metadata.contains_key("latency_ms"));
        assert!(!entry.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_inbound_request_id_wins() {
        let harness = Harness::new();
        harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/rooms")
                    .header("X-Request-Id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = harness.recorded().await;
        assert_eq!(entries[0].request_id, "req-42");
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent_or_oversized() {
        let harness = Harness::new();
        let router = harness.router();

        router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/rooms")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        router
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/rooms")
                    .header("X-Request-Id", "x".repeat(MAX_REQUEST_ID_LEN + 1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = harness.recorded().await;
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert!(
                Uuid::parse_str(&entry.request_id).is_ok(),
                "expected a generated UUID, got {:?}",
                entry.request_id
            );
        }
    }

    #[tokio::test]
    async fn test_request_body_is_restored_for_the_handler() {
        let harness = Harness::new();
        let response = harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/api/echo")
                    .body(Body::from("hello world"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world", "handler must see the original body");

        let entries = harness.recorded().await;
        let payload = entries[0].request_payload.as_ref().expect("payload kept");
        assert_eq!(payload.get("_raw"), Some(&json!("hello world")));
    }

    #[tokio::test]
    async fn test_booking_route_overrides_action_and_category() {
        let harness = Harness::new();
        harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .method(Method::POST)
                    .uri("/api/bookings")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        r#"{"guest": "Ada", "card_number": "4111111111111111"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = harness.recorded().await;
        let entry = &entries[0];
        assert_eq!(entry.action, ActionType::Booking);
        assert_eq!(entry.category, Some(Category::Critical));

        let request_payload = entry.request_payload.as_ref().expect("request payload");
        assert_eq!(request_payload.get("card_number"), Some(&json!("[REDACTED]")));
        assert_eq!(request_payload.get("guest"), Some(&json!("Ada")));

        let response_payload = entry.response_payload.as_ref().expect("response payload");
        assert_eq!(
            response_payload.get("confirmation_token"),
            Some(&json!("[REDACTED]"))
        );
        assert_eq!(response_payload.get("room"), Some(&json!(12)));
    }

    #[tokio::test]
    async fn test_error_status_maps_to_failed_and_response_is_untouched() {
        let harness = Harness::new();
        let response = harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/fail")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"no");

        let entries = harness.recorded().await;
        assert_eq!(entries[0].status, EntryStatus::Failed);
        assert_eq!(entries[0].response_code, Some(403));
    }

    #[tokio::test]
    async fn test_unmatched_method_records_other() {
        let harness = Harness::new();
        let response = harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/rooms")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let entries = harness.recorded().await;
        assert_eq!(entries[0].action, ActionType::Other);
        assert_eq!(entries[0].status, EntryStatus::Failed);
    }

    #[tokio::test]
    async fn test_identity_read_from_request_extensions() {
        let harness = Harness::new();
        // An auth layer outside the capture layer decorates the request.
        let router = harness.router().layer(middleware::from_fn(
            |mut request: Request, next: Next| async move {
                request.extensions_mut().insert(AuthIdentity {
                    user_id: Some(Uuid::from_u128(9)),
                    user_email: Some("ops@example.com".to_owned()),
                    session_id: Some("sess-outer".to_owned()),
                });
                next.run(request).await
            },
        ));

        router
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/rooms")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = harness.recorded().await;
        let entry = &entries[0];
        assert_eq!(entry.user_id, Some(Uuid::from_u128(9)));
        assert_eq!(entry.user_email.as_deref(), Some("ops@example.com"));
        assert_eq!(entry.session_id.as_deref(), Some("sess-outer"));
    }

    #[tokio::test]
    async fn test_identity_read_from_response_extensions() {
        let harness = Harness::new();
        harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = harness.recorded().await;
        let entry = &entries[0];
        assert_eq!(entry.user_id, Some(Uuid::from_u128(7)));
        assert_eq!(entry.session_id.as_deref(), Some("sess-inner"));
    }

    #[tokio::test]
    async fn test_session_header_fills_in_when_no_identity() {
        let harness = Harness::new();
        harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/rooms")
                    .header("X-Session-Id", "sess-header")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = harness.recorded().await;
        assert_eq!(entries[0].session_id.as_deref(), Some("sess-header"));
    }

    #[tokio::test]
    async fn test_empty_bodies_store_no_payloads() {
        let harness = Harness::new();
        let response = harness
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/nothing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let entries = harness.recorded().await;
        assert!(entries[0].request_payload.is_none());
        assert!(entries[0].response_payload.is_none());
    }

    #[test]
    fn test_derive_action_covers_every_method() {
        let config = CaptureConfig::default();
        let cases = [
            (Method::POST, "/api/rooms", ActionType::Create),
            (Method::POST, "/api/bookings", ActionType::Booking),
            (Method::GET, "/api/bookings", ActionType::Read),
            (Method::PUT, "/api/rooms/1", ActionType::Update),
            (Method::PATCH, "/api/rooms/1", ActionType::Update),
            (Method::DELETE, "/api/rooms/1", ActionType::Delete),
            (Method::GET, "/api/rooms", ActionType::Read),
            (Method::HEAD, "/api/rooms", ActionType::Other),
        ];
        for (method, path, want) in cases {
            assert_eq!(derive_action(&method, path, &config), want, "{method} {path}");
        }
    }

    #[test]
    fn test_resource_derivation_skips_api_and_version_prefixes() {
        assert_eq!(
            resource_from_path("/api/rooms/12"),
            (Some("rooms".to_owned()), Some("12".to_owned()))
        );
        assert_eq!(
            resource_from_path("/api/v1/guests"),
            (Some("guests".to_owned()), None)
        );
        assert_eq!(
            resource_from_path("/health"),
            (Some("health".to_owned()), None)
        );
        assert_eq!(resource_from_path("/"), (None, None));
        assert_eq!(
            resource_from_path("/api/v2/bookings/abc/receipt"),
            (Some("bookings".to_owned()), Some("abc".to_owned()))
        );
    }
}
