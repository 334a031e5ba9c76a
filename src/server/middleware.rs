//! HTTP middleware and request-level helpers for the API server.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Header name for request correlation IDs.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID stored in request extensions.
#[derive(Clone, Debug)]
#[allow(dead_code)] // Field is public for handler access
pub struct RequestId(pub String);

/// Middleware that adds request correlation IDs to each request.
///
/// If the request includes an `X-Request-ID` header, that value is used;
/// otherwise a new UUIDv4 is generated. The ID is stored in request
/// extensions, attached to a tracing span, and echoed back in the response.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let response = {
        let _guard = span.enter();
        next.run(request).await
    };

    let mut response = response;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(X_REQUEST_ID.clone(), header_value);
    }

    response
}

/// Rate-limit source key for a request.
///
/// First entry of `X-Forwarded-For` when present (the service normally sits
/// behind a proxy), loopback otherwise. Spoofable, which is acceptable: the
/// limiter governs fairness, not authorization.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
