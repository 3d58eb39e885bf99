//! Write-triggered invalidation.

use std::sync::Arc;

use rollcall_core::CalendarDay;
use serde::Serialize;

use crate::keys::{CacheKeyBuilder, ResourceScope};
use crate::store::ResponseStore;

/// What a committed write touched.
#[derive(Debug, Clone)]
pub struct WriteScope {
    pub resource: ResourceScope,
    pub acting_user_id: String,
    /// Exact read key of the writer's own view, if known.
    pub acting_user_key: Option<String>,
    /// The business date the write changed. Informational only: the sweep is
    /// always scoped to today's creation day.
    pub business_date: Option<CalendarDay>,
}

impl WriteScope {
    pub fn new(resource: ResourceScope, acting_user_id: impl Into<String>) -> Self {
        Self {
            resource,
            acting_user_id: acting_user_id.into(),
            acting_user_key: None,
            business_date: None,
        }
    }

    pub fn with_user_key(mut self, key: impl Into<String>) -> Self {
        self.acting_user_key = Some(key.into());
        self
    }

    pub fn with_business_date(mut self, date: CalendarDay) -> Self {
        self.business_date = Some(date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
    pub creation_day: CalendarDay,
    pub own_view_removed: bool,
    pub views_removed: usize,
}

/// Removes every cached view a committed write could have made stale.
///
/// Invalidation is best-effort and never fails the write it follows.
#[derive(Clone)]
pub struct WriteInvalidator {
    store: Arc<dyn ResponseStore>,
    keys: CacheKeyBuilder,
}

impl WriteInvalidator {
    pub fn new(store: Arc<dyn ResponseStore>, keys: CacheKeyBuilder) -> Self {
        Self { store, keys }
    }

    pub fn invalidate_after_write(&self, scope: &WriteScope) -> InvalidationReport {
        let today = self.keys.creation_day();

        let own_view_removed = scope
            .acting_user_key
            .as_deref()
            .is_some_and(|key| self.store.delete(key));

        let views_removed = match CacheKeyBuilder::build_invalidation_pattern(&today, &scope.resource)
        {
            Ok(pattern) => self.store.delete_matching(&pattern),
            Err(e) => {
                tracing::warn!(
                    scope = %scope.resource,
                    error = %e,
                    "could not build invalidation pattern"
                );
                0
            }
        };

        if let Some(business_date) = scope.business_date.filter(|d| *d != today) {
            tracing::debug!(
                business_date = %business_date,
                creation_day = %today,
                "write for another business date, sweeping today's partition"
            );
        }

        tracing::debug!(
            user = %scope.acting_user_id,
            scope = %scope.resource,
            creation_day = %today,
            own_view_removed,
            views_removed,
            "invalidated cached views after write"
        );

        InvalidationReport {
            creation_day: today,
            own_view_removed,
            views_removed,
        }
    }
}
