use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use rollcall_api::ApiError;
use rollcall_cache::{InvalidationReport, ResourceScope, TtlTier, WriteScope};
use rollcall_core::{AttendanceMark, CalendarDay, UserIdentity, validate_id};
use rollcall_notifications::AttendanceNotice;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::metrics;
use crate::state::AppState;

/// Response header reporting whether a read was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

// ---------------- Health ----------------

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "cache": if state.cache.is_enabled() { "enabled" } else { "disabled" },
    }))
}

pub async fn metrics_handler() -> Response {
    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

// ---------------- Read-through cache ----------------

/// Serve from the cache or compute, store and serve.
///
/// `path` must be the canonical resource path built from the decoded route
/// parameters, the same path writes invalidate by. Never pass the raw
/// request path.
async fn read_through<T, F, Fut>(
    state: &AppState,
    identity: &UserIdentity,
    path: &str,
    uri: &Uri,
    tier: TtlTier,
    fetch: F,
) -> Result<Response, ApiError>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let key = state
        .keys
        .read_key(&identity.user_id, path, uri.query().unwrap_or(""));

    if let Some(value) = state.cache.get(&key) {
        return Ok(cached_response(&value, "HIT"));
    }

    let fresh = fetch().await?;
    let value = Arc::new(
        serde_json::to_value(&fresh)
            .map_err(|e| ApiError::internal(format!("failed to serialize response: {e}")))?,
    );
    state
        .cache
        .set(key, Arc::clone(&value), state.ttl.ttl_for(tier));
    Ok(cached_response(&value, "MISS"))
}

fn cached_response(value: &Value, status: &'static str) -> Response {
    let mut res = Json(value).into_response();
    res.headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    res
}

fn parse_day(field: &str, raw: &str) -> Result<CalendarDay, ApiError> {
    CalendarDay::from_str(raw)
        .map_err(|_| ApiError::bad_request(format!("{field} must be a YYYY-MM-DD date, got {raw:?}")))
}

fn check_section_id(section_id: &str) -> Result<(), ApiError> {
    validate_id(section_id).map_err(|e| ApiError::bad_request(format!("Invalid section id: {e}")))
}

const SECTIONS_PATH: &str = "/api/sections";

fn section_path(section_id: &str) -> String {
    format!("/api/attendance/sections/{section_id}")
}

fn summary_path(section_id: &str) -> String {
    format!("{}/summary", section_path(section_id))
}

// ---------------- Sections & attendance reads ----------------

pub async fn list_sections(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    uri: Uri,
) -> Result<Response, ApiError> {
    read_through(&state, &identity, SECTIONS_PATH, &uri, TtlTier::Standard, || async {
        let sections = state.store.list_sections().await?;
        Ok::<_, ApiError>(json!({ "sections": sections }))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct RosterQuery {
    pub date: Option<String>,
}

pub async fn get_roster(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(section_id): Path<String>,
    Query(query): Query<RosterQuery>,
    uri: Uri,
) -> Result<Response, ApiError> {
    check_section_id(&section_id)?;
    let date = match query.date.as_deref() {
        Some(raw) => parse_day("date", raw)?,
        None => state.keys.creation_day(),
    };

    let path = section_path(&section_id);
    read_through(&state, &identity, &path, &uri, TtlTier::Short, || async {
        Ok::<_, ApiError>(state.store.roster(&section_id, date).await?)
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn get_summary(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(section_id): Path<String>,
    Query(query): Query<SummaryQuery>,
    uri: Uri,
) -> Result<Response, ApiError> {
    check_section_id(&section_id)?;
    let (Some(from), Some(to)) = (query.from.as_deref(), query.to.as_deref()) else {
        return Err(ApiError::bad_request("from and to are required"));
    };
    let from = parse_day("from", from)?;
    let to = parse_day("to", to)?;

    let path = summary_path(&section_id);
    read_through(&state, &identity, &path, &uri, TtlTier::Long, || async {
        Ok::<_, ApiError>(state.store.summary(&section_id, from, to).await?)
    })
    .await
}

// ---------------- Attendance write ----------------

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub date: CalendarDay,
    pub marks: Vec<AttendanceMark>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub written: usize,
    pub date: CalendarDay,
    pub invalidation: InvalidationReport,
}

/// Commit a bulk mark, invalidate every cached view of the section, then
/// hand the notice to the dispatcher in the background.
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(section_id): Path<String>,
    body: Result<Json<MarkRequest>, JsonRejection>,
) -> Result<Json<MarkResponse>, ApiError> {
    if !identity.role.can_mark_attendance() {
        return Err(ApiError::forbidden(format!(
            "role {} cannot mark attendance",
            identity.role
        )));
    }
    check_section_id(&section_id)?;
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let outcome = state
        .store
        .mark_bulk(&section_id, request.date, &request.marks, &identity.user_id)
        .await?;
    metrics::record_attendance_marks(outcome.written);

    // The write is committed; invalidation below is best-effort.
    let path = section_path(&section_id);
    let own_key = state
        .keys
        .read_key(&identity.user_id, &path, &format!("date={}", request.date));
    let scope = WriteScope::new(ResourceScope::new(&path), identity.user_id.clone())
        .with_user_key(own_key)
        .with_business_date(request.date);
    let invalidation = state.invalidator.invalidate_after_write(&scope);

    let notice = AttendanceNotice {
        section_id: outcome.section_id.clone(),
        date: outcome.date,
        marked_by: identity.user_id.clone(),
        written: outcome.written,
        absent_student_ids: outcome.absent_student_ids.clone(),
        sent_at: state.keys.calendar().now(),
    };
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        match notifier.dispatch(&notice).await {
            Ok(result) if result.delivered => {
                tracing::debug!(section = %notice.section_id, "attendance notice delivered");
            }
            Ok(result) => {
                metrics::record_notification_failure(notifier.name());
                tracing::warn!(
                    section = %notice.section_id,
                    error = ?result.error,
                    "attendance notice not delivered"
                );
            }
            Err(e) => {
                metrics::record_notification_failure(notifier.name());
                tracing::warn!(section = %notice.section_id, error = %e, "attendance notice failed");
            }
        }
    });

    Ok(Json(MarkResponse {
        written: outcome.written,
        date: outcome.date,
        invalidation,
    }))
}

// ---------------- Cache administration ----------------

fn require_cache_admin(identity: &UserIdentity) -> Result<(), ApiError> {
    if identity.role.can_manage_cache() {
        Ok(())
    } else {
        Err(ApiError::forbidden("cache administration requires the admin role"))
    }
}

pub async fn cache_stats(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<Value>, ApiError> {
    require_cache_admin(&identity)?;
    let stats = state.cache.stats();
    Ok(Json(json!({
        "enabled": stats.enabled,
        "size": stats.size,
        "maxEntries": stats.max_entries,
        "hits": stats.hits,
        "misses": stats.misses,
        "evictions": stats.evictions,
        "invalidations": stats.invalidations,
        "hitRate": stats.hit_rate(),
    })))
}

pub async fn clear_cache(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<Value>, ApiError> {
    require_cache_admin(&identity)?;
    let removed = state.cache.clear();
    tracing::info!(user = %identity.user_id, removed, "response cache cleared");
    Ok(Json(json!({ "removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
}

pub async fn invalidate_pattern(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    body: Result<Json<InvalidateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_cache_admin(&identity)?;
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let removed = state
        .cache
        .delete_matching_str(&request.pattern)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    tracing::info!(user = %identity.user_id, pattern = %request.pattern, removed, "cache pattern invalidated");
    Ok(Json(json!({ "pattern": request.pattern, "removed": removed })))
}
