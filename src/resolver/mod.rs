//! Status resolution.
//!
//! Combines the notice cache and the service cache into one state per
//! service. A notice that is in force and carries `force_state` always wins
//! over monitoring data; the newest such notice is the one that counts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::Clock;
use crate::catalog::ServiceCache;
use crate::config::Config;
use crate::models::{Category, Column, Notice, Service, ServiceState};
use crate::notices::{NoticeCache, NoticeSet};

/// Snapshot age (seconds) up to which monitoring data counts as current.
const SNAPSHOT_NORMAL_SECS: i64 = 300;
/// Snapshot age (seconds) up to which monitoring data is merely late.
const SNAPSHOT_WARNING_SECS: i64 = 900;

/// Outcome of resolving one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Derived from monitoring data (NA when there is none)
    Monitored(ServiceState),
    /// Set by an in-force notice
    Forced {
        state: ServiceState,
        notice_id: String,
    },
}

impl Resolution {
    pub fn state(&self) -> ServiceState {
        match self {
            Resolution::Monitored(state) => *state,
            Resolution::Forced { state, .. } => *state,
        }
    }

    pub fn forced_by(&self) -> Option<&str> {
        match self {
            Resolution::Monitored(_) => None,
            Resolution::Forced { notice_id, .. } => Some(notice_id.as_str()),
        }
    }
}

/// Resolve `service` given the in-force notices, newest first.
///
/// Notices not affecting the service are ignored.
pub fn resolve(service: Option<&Service>, in_force: &[Arc<Notice>]) -> Resolution {
    let Some(service) = service else {
        return Resolution::Monitored(ServiceState::Na);
    };

    in_force
        .iter()
        .filter(|notice| notice.affects_service(&service.id))
        .find_map(|notice| {
            notice.force_state.map(|state| Resolution::Forced {
                state,
                notice_id: notice.id.clone(),
            })
        })
        .unwrap_or(Resolution::Monitored(service.raw_status))
}

/// One service as shown to consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub status: ServiceState,
    pub status_text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_by: Option<String>,
    pub raw_status: ServiceState,
    /// Visible notices mentioning this service
    pub notice_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub column: Column,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    pub column: Column,
    pub categories: Vec<CategoryView>,
}

/// How current the monitoring snapshot is.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFreshness {
    Normal,
    Warning,
    Critical,
    Unknown,
}

impl SnapshotFreshness {
    pub fn from_age_secs(age: i64) -> Self {
        let age = age.abs();
        if age > SNAPSHOT_WARNING_SECS {
            SnapshotFreshness::Critical
        } else if age > SNAPSHOT_NORMAL_SECS {
            SnapshotFreshness::Warning
        } else {
            SnapshotFreshness::Normal
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<i64>,
    pub freshness: SnapshotFreshness,
}

/// Status of one service id, known or not, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub id: String,
    pub status: ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_by: Option<String>,
    pub raw_status: ServiceState,
    pub visible_notices: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub notices: usize,
    pub services: usize,
    pub catalog_loaded: bool,
}

/// Read API over both caches.
pub struct StatusResolver {
    notices: Arc<NoticeCache>,
    services: Arc<ServiceCache>,
    clock: Arc<dyn Clock>,
}

impl StatusResolver {
    pub fn new(notices: Arc<NoticeCache>, services: Arc<ServiceCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            notices,
            services,
            clock,
        }
    }

    /// Build both caches from configuration.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let notices = NoticeCache::new(
            config.notices_dir.clone(),
            config.notice_ttl,
            config.io_timeout,
            clock.clone(),
        );
        let services = ServiceCache::new(
            config.catalog_path.clone(),
            config.snapshot_path.clone(),
            config.service_ttl,
            config.io_timeout,
            clock.clone(),
        );
        Self::new(Arc::new(notices), Arc::new(services), clock)
    }

    pub async fn resolve_status(&self, service_id: &str) -> Resolution {
        let catalog = self.services.catalog().await;
        let Some(service) = catalog.service(service_id) else {
            return Resolution::Monitored(ServiceState::Na);
        };
        let in_force = self.notices.for_service_active(service_id).await;
        resolve(Some(service), &in_force)
    }

    /// Monitoring-derived state, ignoring notices.
    pub async fn raw_status(&self, service_id: &str) -> ServiceState {
        self.services
            .service(service_id)
            .await
            .map_or(ServiceState::Na, |service| service.raw_status)
    }

    pub async fn visible_notice_count(&self, service_id: &str) -> usize {
        self.notices.for_service_visible(service_id).await.len()
    }

    /// Resolution, raw state and notice count in one report; unknown ids are NA.
    pub async fn status_report(&self, service_id: &str) -> StatusReport {
        let resolution = self.resolve_status(service_id).await;
        StatusReport {
            id: service_id.to_string(),
            status: resolution.state(),
            forced_by: resolution.forced_by().map(str::to_string),
            raw_status: self.raw_status(service_id).await,
            visible_notices: self.visible_notice_count(service_id).await,
        }
    }

    pub async fn get_notice(&self, id: &str) -> Option<Arc<Notice>> {
        self.notices.get(id).await
    }

    pub async fn list_visible_notices(&self) -> NoticeSet {
        self.notices.visible().await
    }

    /// Every parsed notice, including inactive and expired ones.
    pub async fn list_all_notices(&self) -> NoticeSet {
        self.notices.list().await
    }

    pub async fn notices_for_service(&self, service_id: &str) -> NoticeSet {
        self.notices.for_service_visible(service_id).await
    }

    pub async fn service_view(&self, service_id: &str) -> Option<ServiceView> {
        let catalog = self.services.catalog().await;
        let service = catalog.service(service_id)?;
        let (in_force, visible) = self.notice_windows().await;
        Some(view_of(service, &in_force, &visible))
    }

    /// All catalog services with their resolved state.
    pub async fn service_views(&self) -> Vec<ServiceView> {
        let services = self.services.services().await;
        let (in_force, visible) = self.notice_windows().await;
        services
            .iter()
            .map(|service| view_of(service, &in_force, &visible))
            .collect()
    }

    /// Category definitions without resolved services.
    pub async fn categories(&self) -> Vec<Category> {
        self.services.categories().await
    }

    pub async fn services_in_category(&self, category_id: &str) -> Option<CategoryView> {
        let catalog = self.services.catalog().await;
        let category = catalog.category(category_id)?;
        let (in_force, visible) = self.notice_windows().await;
        Some(category_view(
            category,
            &catalog.services,
            &in_force,
            &visible,
        ))
    }

    /// Every layout column with its categories, in definition order.
    pub async fn columns(&self) -> Vec<ColumnView> {
        let catalog = self.services.catalog().await;
        let (in_force, visible) = self.notice_windows().await;

        catalog
            .columns()
            .into_iter()
            .map(|(column, category_ids)| ColumnView {
                column,
                categories: category_ids
                    .iter()
                    .filter_map(|id| catalog.category(id))
                    .map(|category| {
                        category_view(category, &catalog.services, &in_force, &visible)
                    })
                    .collect(),
            })
            .collect()
    }

    pub async fn snapshot_info(&self) -> SnapshotInfo {
        let catalog = self.services.catalog().await;
        match catalog.snapshot_updated_at {
            Some(updated_at) => {
                let age = self.clock.now().signed_duration_since(updated_at).num_seconds();
                SnapshotInfo {
                    updated_at: Some(updated_at),
                    age_secs: Some(age),
                    freshness: SnapshotFreshness::from_age_secs(age),
                }
            }
            None => SnapshotInfo {
                updated_at: None,
                age_secs: None,
                freshness: SnapshotFreshness::Unknown,
            },
        }
    }

    /// Reload both caches now.
    pub async fn force_refresh_all(&self) -> RefreshSummary {
        let (notices, catalog_loaded) =
            tokio::join!(self.notices.refresh(), self.services.refresh());
        let services = self.services.catalog().await.services.len();

        tracing::info!(
            "Forced refresh: {} notices, {} services{}",
            notices,
            services,
            if catalog_loaded { "" } else { " (catalog load failed)" }
        );
        tracing::debug!(
            "Reloads so far: notices {}, catalog {}",
            self.notices.refresh_count(),
            self.services.refresh_count()
        );

        RefreshSummary {
            notices,
            services,
            catalog_loaded,
        }
    }

    async fn notice_windows(&self) -> (NoticeSet, NoticeSet) {
        (self.notices.active_now().await, self.notices.visible().await)
    }
}

fn view_of(service: &Service, in_force: &[Arc<Notice>], visible: &[Arc<Notice>]) -> ServiceView {
    let resolution = resolve(Some(service), in_force);
    let state = resolution.state();
    ServiceView {
        id: service.id.clone(),
        name: service.display_name.clone(),
        category: service.category.clone(),
        status: state,
        status_text: state.description(),
        forced_by: resolution.forced_by().map(str::to_string),
        raw_status: service.raw_status,
        notice_count: visible
            .iter()
            .filter(|notice| notice.affects_service(&service.id))
            .count(),
    }
}

fn category_view(
    category: &Category,
    services: &std::collections::BTreeMap<String, Service>,
    in_force: &[Arc<Notice>],
    visible: &[Arc<Notice>],
) -> CategoryView {
    CategoryView {
        id: category.id.clone(),
        name: category.name.clone(),
        column: category.column,
        services: category
            .services
            .iter()
            .filter_map(|id| services.get(id))
            .map(|service| view_of(service, in_force, visible))
            .collect(),
    }
}
