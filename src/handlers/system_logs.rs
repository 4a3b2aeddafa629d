use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use super::common::{PaginationParams, ADMINS};
use crate::{
    auth::AuthRouterExt, entities::system_log, services::system_logs::SystemLogFilter,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn system_log_routes() -> Router<AppState> {
    Router::new()
        .route("/system-logs", get(list_system_logs))
        .with_roles(ADMINS)
}

/// Operational log, newest first
#[utoipa::path(
    get,
    path = "/api/v1/system-logs",
    params(SystemLogFilter, PaginationParams),
    responses(
        (status = 200, description = "System log page"),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "system-logs"
)]
pub async fn list_system_logs(
    State(state): State<AppState>,
    Query(filter): Query<SystemLogFilter>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<system_log::Model>> {
    let page = page.normalized();
    let (items, total) = state
        .services
        .system_logs
        .list(filter, page.page, page.limit)
        .await?;
    Ok(Json(ApiResponse::success(page.wrap(items, total))))
}
