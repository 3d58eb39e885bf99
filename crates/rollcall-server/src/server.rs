use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use rollcall_cache::ResponseStore;
use rollcall_core::{Clock, SystemClock};
use rollcall_storage::{AttendanceStore, InMemoryAttendanceStore};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig, handlers, middleware as app_middleware, rate_limiter::RateLimiter,
    state::AppState,
};

pub struct RollcallServer {
    addr: SocketAddr,
    app: Router,
    cache: Arc<dyn ResponseStore>,
    rate_limiter: Option<Arc<RateLimiter>>,
    cleanup_interval: Duration,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_handler))
        // Attendance reads (read-through cache) and writes
        .route("/api/sections", get(handlers::list_sections))
        .route(
            "/api/attendance/sections/{section_id}",
            get(handlers::get_roster),
        )
        .route(
            "/api/attendance/sections/{section_id}/summary",
            get(handlers::get_summary),
        )
        .route(
            "/api/attendance/sections/{section_id}/marks",
            post(handlers::mark_attendance),
        )
        // Cache administration
        .route(
            "/api/cache",
            axum::routing::delete(handlers::clear_cache),
        )
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/invalidate", post(handlers::invalidate_pattern))
        .route_layer(middleware::from_fn(app_middleware::track_metrics))
        // Middleware stack (outermost last): request id -> trace -> identity -> rate limit
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::rate_limit,
        ))
        .layer(middleware::from_fn(app_middleware::identity_middleware))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Periodically sweep expired cache entries and refilled rate-limit buckets.
///
/// `every` must be non-zero.
pub fn start_cleanup_task(
    cache: Arc<dyn ResponseStore>,
    rate_limiter: Option<Arc<RateLimiter>>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            let removed = cache.cleanup_expired();
            crate::metrics::set_cache_entries(cache.len());
            if removed > 0 {
                tracing::debug!(removed, "response cache cleanup completed");
            }

            if let Some(limiter) = &rate_limiter {
                let pruned = limiter.prune_idle();
                if pruned > 0 {
                    tracing::debug!(pruned, "idle rate limit buckets released");
                }
            }
        }
    })
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<Arc<dyn AttendanceStore>>,
    clock: Arc<dyn Clock>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Use an existing store instead of the seeded in-memory one.
    pub fn with_store(mut self, store: Arc<dyn AttendanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn build(self) -> anyhow::Result<RollcallServer> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

        let store = match self.store {
            Some(store) => store,
            None => {
                let store = InMemoryAttendanceStore::with_clock(self.clock.clone());
                if let Some(seed) = &self.config.storage.seed_file {
                    store.load_seed(seed).await?;
                }
                Arc::new(store)
            }
        };

        let state = AppState::new(&self.config, store, self.clock)?;
        let cache = state.cache.clone();
        let rate_limiter = state.rate_limiter.clone();
        let app = build_app(state, &self.config);

        Ok(RollcallServer {
            addr: self.addr,
            app,
            cache,
            rate_limiter,
            cleanup_interval: self.config.cache.cleanup_interval(),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RollcallServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let cleanup = start_cleanup_task(
            self.cache.clone(),
            self.rate_limiter.clone(),
            self.cleanup_interval,
        );

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        cleanup.abort();
        let removed = self.cache.clear();
        tracing::info!(removed, "response cache released");
        result?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
