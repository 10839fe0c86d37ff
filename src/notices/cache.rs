//! TTL cache over the notice directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Clock, Loaded, SnapshotCell};
use crate::errors::AppError;
use crate::models::Notice;

use super::{list_notice_files, read_notice};

/// All parsed notices, newest `created_at` first.
pub type NoticeSet = Vec<Arc<Notice>>;

/// Read every record in `dir`, skipping the ones that fail to parse.
pub async fn load_notices(dir: &Path) -> Result<NoticeSet, AppError> {
    let files = list_notice_files(dir).await?;

    let mut notices = Vec::with_capacity(files.len());
    for path in files {
        match read_notice(&path).await {
            Ok(notice) => notices.push(Arc::new(notice)),
            Err(e) => tracing::warn!("Invalid notice skipped ({}): {}", path.display(), e),
        }
    }

    // Stable sort; records without created_at (None) end up last.
    notices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notices)
}

/// Holds the parsed notices and reloads them once the TTL has elapsed.
pub struct NoticeCache {
    dir: PathBuf,
    io_timeout: Duration,
    cell: SnapshotCell<NoticeSet>,
}

impl NoticeCache {
    pub fn new(dir: PathBuf, ttl: Duration, io_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir,
            io_timeout,
            cell: SnapshotCell::new(Vec::new(), ttl, clock),
        }
    }

    async fn load(&self) -> Option<Loaded<NoticeSet>> {
        match tokio::time::timeout(self.io_timeout, load_notices(&self.dir)).await {
            Ok(Ok(notices)) => {
                tracing::debug!("Loaded {} notices from {}", notices.len(), self.dir.display());
                Some(Loaded {
                    value: notices,
                    loaded_at: self.cell.now(),
                })
            }
            Ok(Err(e)) => {
                tracing::error!("Notice refresh failed, keeping previous notices: {}", e);
                None
            }
            Err(_) => {
                let e = AppError::Timeout(format!(
                    "Reading {} took longer than {:?}",
                    self.dir.display(),
                    self.io_timeout
                ));
                tracing::error!("Notice refresh failed, keeping previous notices: {}", e);
                None
            }
        }
    }

    async fn snapshot(&self) -> Arc<NoticeSet> {
        self.cell.read_fresh(|| self.load()).await
    }

    /// Reload from disk now, regardless of the TTL. Returns the notice count.
    pub async fn refresh(&self) -> usize {
        self.cell.refresh(|| self.load()).await.value.len()
    }

    pub fn refresh_count(&self) -> u64 {
        self.cell.refresh_count()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Notice>> {
        self.snapshot()
            .await
            .iter()
            .find(|notice| notice.id == id)
            .cloned()
    }

    pub async fn list(&self) -> NoticeSet {
        self.snapshot().await.as_ref().clone()
    }

    /// Notices shown in public listings.
    pub async fn visible(&self) -> NoticeSet {
        let now = self.cell.now();
        self.filtered(|notice| notice.is_visible_at(now)).await
    }

    /// Notices currently in force; the only ones allowed to override a state.
    pub async fn active_now(&self) -> NoticeSet {
        let now = self.cell.now();
        self.filtered(|notice| notice.is_in_force_at(now)).await
    }

    pub async fn for_service_active(&self, service_id: &str) -> NoticeSet {
        let now = self.cell.now();
        self.filtered(|notice| notice.is_in_force_at(now) && notice.affects_service(service_id))
            .await
    }

    pub async fn for_service_visible(&self, service_id: &str) -> NoticeSet {
        let now = self.cell.now();
        self.filtered(|notice| notice.is_visible_at(now) && notice.affects_service(service_id))
            .await
    }

    async fn filtered<P>(&self, predicate: P) -> NoticeSet
    where
        P: Fn(&Notice) -> bool,
    {
        self.snapshot()
            .await
            .iter()
            .filter(|notice| predicate(notice))
            .cloned()
            .collect()
    }
}
