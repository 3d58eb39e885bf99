use std::sync::Arc;

use anyhow::Context;
use rollcall_cache::{
    CacheKeyBuilder, ResponseStore, TtlPolicy, WriteInvalidator, create_response_cache,
};
use rollcall_core::{Clock, SchoolCalendar};
use rollcall_notifications::{
    LogDispatcher, NotificationDispatcher, WebhookConfig, WebhookDispatcher,
};
use rollcall_storage::AttendanceStore;

use crate::config::AppConfig;
use crate::rate_limiter::RateLimiter;

/// Shared state injected into every handler.
///
/// The response cache is constructed here and owned by the state; there is
/// no process-global cache.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AttendanceStore>,
    pub cache: Arc<dyn ResponseStore>,
    pub keys: CacheKeyBuilder,
    pub invalidator: WriteInvalidator,
    pub ttl: TtlPolicy,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(
        cfg: &AppConfig,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let calendar = SchoolCalendar::with_offset_minutes(clock.clone(), cfg.cache.utc_offset_minutes)
            .context("invalid cache.utc_offset_minutes")?;
        let ttl = cfg.cache.ttl_policy().context("invalid cache.ttl")?;

        let cache = create_response_cache(cfg.cache.enabled, cfg.cache.max_entries, clock);
        let keys = CacheKeyBuilder::new(calendar);
        let invalidator = WriteInvalidator::new(cache.clone(), keys.clone());

        let notifier: Arc<dyn NotificationDispatcher> = if cfg.notifications.enabled {
            let url = cfg
                .notifications
                .webhook_url
                .clone()
                .context("notifications.webhook_url is required")?;
            Arc::new(WebhookDispatcher::new(WebhookConfig {
                url,
                api_key: cfg.notifications.api_key.clone(),
                secret: cfg.notifications.webhook_secret.clone(),
                timeout: cfg.notifications.timeout(),
            })?)
        } else {
            Arc::new(LogDispatcher)
        };

        let rate_limiter = cfg
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&cfg.rate_limit)));

        tracing::info!(
            cache_enabled = cache.is_enabled(),
            max_entries = cfg.cache.max_entries,
            utc_offset_minutes = cfg.cache.utc_offset_minutes,
            notifier = notifier.name(),
            rate_limit = rate_limiter.is_some(),
            "application state initialized"
        );

        Ok(Self {
            store,
            cache,
            keys,
            invalidator,
            ttl,
            notifier,
            rate_limiter,
        })
    }
}
