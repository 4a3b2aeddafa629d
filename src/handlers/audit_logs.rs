use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{PaginationParams, ADMINS};
use crate::{
    auth::AuthRouterExt, entities::audit_log, errors::ServiceError,
    services::audit::AuditLogFilter, ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// Read access for administrators. Writes are routed so that they reach the
/// store and come back refused, rather than answering 405.
pub fn audit_log_routes() -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(list_audit_logs))
        .route(
            "/audit-logs/:id",
            get(get_audit_log)
                .put(update_audit_log)
                .delete(delete_audit_log),
        )
        .with_roles(ADMINS)
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(AuditLogFilter, PaginationParams),
    responses((status = 200, description = "Audit trail page")),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(filter): Query<AuditLogFilter>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<audit_log::Model>> {
    let page = page.normalized();
    let (items, total) = state
        .services
        .audit
        .list(filter, page.page, page.limit)
        .await?;
    Ok(Json(ApiResponse::success(page.wrap(items, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/{id}",
    params(("id" = Uuid, Path, description = "Audit entry id")),
    responses(
        (status = 200, description = "Audit entry"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<audit_log::Model> {
    let entry = state.services.audit.get(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// Always refused
#[utoipa::path(
    put,
    path = "/api/v1/audit-logs/{id}",
    params(("id" = Uuid, Path, description = "Audit entry id")),
    responses((status = 409, description = "Audit entries are immutable", body = crate::errors::ErrorResponse)),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub async fn update_audit_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<audit_log::Model> {
    let entry = state.services.audit.update(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// Always refused
#[utoipa::path(
    delete,
    path = "/api/v1/audit-logs/{id}",
    params(("id" = Uuid, Path, description = "Audit entry id")),
    responses((status = 409, description = "Audit entries are immutable", body = crate::errors::ErrorResponse)),
    security(("bearer_auth" = [])),
    tag = "audit-logs"
)]
pub async fn delete_audit_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.audit.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
