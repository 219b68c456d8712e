//! Security headers middleware.
//!
//! Adds security-related HTTP headers to all responses. The onboarding pages
//! are plain server-rendered forms, so the content security policy only allows
//! same-origin form posts and inline styles.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;

/// Security header names and values.
pub mod headers {
    pub const X_CONTENT_TYPE_OPTIONS: &str = "x-content-type-options";
    pub const X_FRAME_OPTIONS: &str = "x-frame-options";
    pub const REFERRER_POLICY: &str = "referrer-policy";
    pub const CONTENT_SECURITY_POLICY: &str = "content-security-policy";

    pub const CSP_VALUE: &str =
        "default-src 'none'; style-src 'unsafe-inline'; form-action 'self'; frame-ancestors 'none'";
    pub const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
}

/// Middleware that adds security headers to all responses.
///
/// `Strict-Transport-Security` is only sent when `security.hsts_enabled` is set.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let response_headers = response.headers_mut();

    response_headers.insert(
        header::HeaderName::from_static(headers::X_CONTENT_TYPE_OPTIONS),
        HeaderValue::from_static("nosniff"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::X_FRAME_OPTIONS),
        HeaderValue::from_static("DENY"),
    );
    // Keeps the customer identifier in onboarding URLs from leaking to other sites.
    response_headers.insert(
        header::HeaderName::from_static(headers::REFERRER_POLICY),
        HeaderValue::from_static("no-referrer"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::CONTENT_SECURITY_POLICY),
        HeaderValue::from_static(headers::CSP_VALUE),
    );

    if state.config.security.hsts_enabled {
        response_headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(headers::HSTS_VALUE),
        );
    }

    response
}
