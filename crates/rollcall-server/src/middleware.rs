use std::str::FromStr;
use std::time::Instant;

use axum::extract::{MatchedPath, State};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rollcall_api::ApiError;
use rollcall_core::{Role, UserIdentity, validate_id};
use uuid::Uuid;

use crate::state::AppState;

/// Header carrying the verified user id from the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the verified role from the upstream auth layer.
pub const USER_ROLE_HEADER: &str = "x-user-role";

// =============================================================================
// Identity Middleware
// =============================================================================

/// Reads the identity forwarded by the auth layer and stores a
/// [`UserIdentity`] in request extensions.
///
/// Public endpoints pass through. A missing or malformed identity is a 401.
pub async fn identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    if should_skip_identity(&req) {
        return next.run(req).await;
    }

    match extract_identity(&req) {
        Ok(identity) => {
            tracing::debug!(user = %identity.user_id, role = %identity.role, "identity resolved");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "identity rejected");
            e.into_response()
        }
    }
}

fn extract_identity(req: &Request<Body>) -> Result<UserIdentity, ApiError> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let user_id = header(USER_ID_HEADER)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    validate_id(user_id).map_err(|e| ApiError::unauthorized(format!("Invalid user id: {e}")))?;

    let role = header(USER_ROLE_HEADER)
        .ok_or_else(|| ApiError::unauthorized("Missing user role"))?;
    let role = Role::from_str(role).map_err(|e| ApiError::unauthorized(e.to_string()))?;

    Ok(UserIdentity::new(user_id, role))
}

fn should_skip_identity(req: &Request<Body>) -> bool {
    let public_paths = ["/healthz", "/readyz", "/metrics"];
    public_paths.contains(&req.uri().path())
}

// =============================================================================
// Rate Limiting
// =============================================================================

/// Per-user token bucket. A no-op unless rate limiting is enabled.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let user_id = req
        .extensions()
        .get::<UserIdentity>()
        .map(|identity| identity.user_id.clone());
    let (Some(limiter), Some(user_id)) = (state.rate_limiter, user_id) else {
        return next.run(req).await;
    };

    if limiter.allow(&user_id) {
        return next.run(req).await;
    }

    tracing::debug!(user = %user_id, "rate limit exceeded");
    let retry_after = limiter.retry_after_secs(&user_id);
    let mut res = ApiError::too_many_requests("Rate limit exceeded").into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        res.headers_mut().insert(RETRY_AFTER, value);
    }
    res
}

// =============================================================================
// Other Middleware
// =============================================================================

// Ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // Preserve an incoming request id; otherwise generate one
    let req_id_value = match req.headers().get(&header_name) {
        Some(value) => value.clone(),
        None => HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    };

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

/// Records `http_requests_total` and latency per matched route.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let res = next.run(req).await;
    crate::metrics::record_http_request(&method, &route, res.status().as_u16(), start.elapsed());
    res
}
