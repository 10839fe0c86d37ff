//! Service, category and layout endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::Category;
use crate::resolver::{CategoryView, ColumnView, ServiceView, SnapshotInfo, StatusReport};
use crate::AppState;

/// GET /api/services - Every service with its resolved state.
pub async fn list_services(State(state): State<AppState>) -> ApiResult<Vec<ServiceView>> {
    success(state.resolver.service_views().await)
}

/// GET /api/services/:id - One service with its resolved state.
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ServiceView> {
    state
        .resolver
        .service_view(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Service {} not found", id)))
        .and_then(success)
}

/// GET /api/status/:id - Resolved and raw state of any service id.
///
/// Unknown ids report NA instead of 404.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusReport> {
    success(state.resolver.status_report(&id).await)
}

/// GET /api/categories - Category definitions in catalog order.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    success(state.resolver.categories().await)
}

/// GET /api/categories/:id - A category and its services.
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CategoryView> {
    match state.resolver.services_in_category(&id).await {
        Some(category) => success(category),
        None => Err(AppError::NotFound(format!("Category {} not found", id))),
    }
}

/// GET /api/columns - Page layout: columns, categories, services.
pub async fn list_columns(State(state): State<AppState>) -> ApiResult<Vec<ColumnView>> {
    success(state.resolver.columns().await)
}

/// GET /api/snapshot - Age of the monitoring data.
pub async fn get_snapshot_info(State(state): State<AppState>) -> ApiResult<SnapshotInfo> {
    success(state.resolver.snapshot_info().await)
}
