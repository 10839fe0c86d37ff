//! TTL cache over the catalog definition and monitoring snapshot.
//!
//! A failed load is not isolated: the cache publishes an empty catalog at the
//! stale sentinel, so readers see "no data" and the next access tries again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{stale_sentinel, Clock, Loaded, SnapshotCell};
use crate::errors::AppError;
use crate::models::{Category, Service};

use super::{load_catalog, Catalog};

pub struct ServiceCache {
    catalog_path: PathBuf,
    snapshot_path: PathBuf,
    io_timeout: Duration,
    cell: SnapshotCell<Catalog>,
}

impl ServiceCache {
    pub fn new(
        catalog_path: PathBuf,
        snapshot_path: PathBuf,
        ttl: Duration,
        io_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog_path,
            snapshot_path,
            io_timeout,
            cell: SnapshotCell::new(Catalog::default(), ttl, clock),
        }
    }

    async fn load(&self) -> Option<Loaded<Catalog>> {
        let result = tokio::time::timeout(
            self.io_timeout,
            load_catalog(&self.catalog_path, &self.snapshot_path),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::Timeout(format!(
                "Loading the catalog took longer than {:?}",
                self.io_timeout
            )))
        });

        let loaded = match result {
            Ok(catalog) => {
                if catalog.is_empty() {
                    tracing::warn!(
                        "Catalog {} defines no services or categories",
                        self.catalog_path.display()
                    );
                }
                tracing::debug!(
                    "Service cache refreshed: {} services",
                    catalog.services.len()
                );
                Loaded {
                    value: catalog,
                    loaded_at: self.cell.now(),
                }
            }
            Err(e) => {
                tracing::error!("Service cache refresh failed, serving empty catalog: {}", e);
                Loaded {
                    value: Catalog::default(),
                    loaded_at: stale_sentinel(),
                }
            }
        };
        Some(loaded)
    }

    /// The whole catalog, for callers that need several consistent reads.
    pub async fn catalog(&self) -> Arc<Catalog> {
        self.cell.read_fresh(|| self.load()).await
    }

    /// Reload now regardless of the TTL. Returns false if the load failed.
    pub async fn refresh(&self) -> bool {
        let published = self.cell.refresh(|| self.load()).await;
        published.loaded_at != stale_sentinel()
    }

    pub fn refresh_count(&self) -> u64 {
        self.cell.refresh_count()
    }

    pub async fn services(&self) -> Vec<Service> {
        self.catalog().await.services.values().cloned().collect()
    }

    pub async fn service(&self, id: &str) -> Option<Service> {
        self.catalog().await.service(id).cloned()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.catalog().await.categories.clone()
    }
}
