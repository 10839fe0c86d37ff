//! Administrative endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::resolver::RefreshSummary;
use crate::AppState;

/// POST /api/refresh - Reload notices and catalog immediately.
pub async fn force_refresh(State(state): State<AppState>) -> ApiResult<RefreshSummary> {
    success(state.resolver.force_refresh_all().await)
}
