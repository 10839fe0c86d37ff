//! Notice API endpoints.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::Notice;
use crate::notices::NoticeSet;
use crate::AppState;

fn owned(notices: NoticeSet) -> Vec<Notice> {
    notices.iter().map(|notice| Notice::clone(notice)).collect()
}

/// Query parameters for notice listings.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Include inactive, expired and future-dated notices
    #[serde(default)]
    pub all: bool,
}

/// GET /api/notices - Visible notices, newest first.
pub async fn list_notices(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Notice>> {
    let notices = if query.all {
        state.resolver.list_all_notices().await
    } else {
        state.resolver.list_visible_notices().await
    };
    success(owned(notices))
}

/// GET /api/notices/:id - Any known notice, visible or not.
pub async fn get_notice(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Notice> {
    match state.resolver.get_notice(&id).await {
        Some(notice) => success(Notice::clone(&notice)),
        None => Err(AppError::NotFound(format!("Notice {} not found", id))),
    }
}

/// GET /api/services/:id/notices - Visible notices affecting a service.
pub async fn service_notices(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Notice>> {
    if state.resolver.service_view(&id).await.is_none() {
        return Err(AppError::NotFound(format!("Service {} not found", id)));
    }
    success(owned(state.resolver.notices_for_service(&id).await))
}
