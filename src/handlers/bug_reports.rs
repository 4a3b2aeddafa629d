use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{PaginationParams, ADMINS, ALL_STAFF};
use crate::{
    auth::{ActorContext, AuthRouterExt},
    entities::bug_report::{self, BugReportStatus},
    errors::ServiceError,
    services::bug_reports::{CreateBugReportInput, UpdateBugReportInput},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BugReportFilter {
    #[param(value_type = Option<String>, example = "open")]
    pub status: Option<BugReportStatus>,
}

pub fn bug_report_routes() -> Router<AppState> {
    let report = Router::new()
        .route("/bug-reports", post(create_bug_report))
        .with_roles(ALL_STAFF);

    let triage = Router::new()
        .route("/bug-reports", get(list_bug_reports))
        .route(
            "/bug-reports/:id",
            get(get_bug_report)
                .put(update_bug_report)
                .delete(delete_bug_report),
        )
        .with_roles(ADMINS);

    Router::new().merge(report).merge(triage)
}

/// File a bug report
#[utoipa::path(
    post,
    path = "/api/v1/bug-reports",
    request_body = CreateBugReportInput,
    responses(
        (status = 201, description = "Report filed"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bug-reports"
)]
pub async fn create_bug_report(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(input): Json<CreateBugReportInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.bug_reports.create(input, &actor).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(report))))
}

#[utoipa::path(
    get,
    path = "/api/v1/bug-reports",
    params(BugReportFilter, PaginationParams),
    responses((status = 200, description = "Reports page")),
    security(("bearer_auth" = [])),
    tag = "bug-reports"
)]
pub async fn list_bug_reports(
    State(state): State<AppState>,
    Query(filter): Query<BugReportFilter>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<bug_report::Model>> {
    let page = page.normalized();
    let (items, total) = state
        .services
        .bug_reports
        .list(filter.status, page.page, page.limit)
        .await?;
    Ok(Json(ApiResponse::success(page.wrap(items, total))))
}

#[utoipa::path(
    get,
    path = "/api/v1/bug-reports/{id}",
    params(("id" = Uuid, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bug-reports"
)]
pub async fn get_bug_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<bug_report::Model> {
    let report = state.services.bug_reports.get(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Move a report through open, in-progress and resolved
#[utoipa::path(
    put,
    path = "/api/v1/bug-reports/{id}",
    params(("id" = Uuid, Path, description = "Report id")),
    request_body = UpdateBugReportInput,
    responses((status = 200, description = "Report updated")),
    security(("bearer_auth" = [])),
    tag = "bug-reports"
)]
pub async fn update_bug_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(input): Json<UpdateBugReportInput>,
) -> ApiResult<bug_report::Model> {
    let report = state
        .services
        .bug_reports
        .update_status(id, input.status, &actor)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/bug-reports/{id}",
    params(("id" = Uuid, Path, description = "Report id")),
    responses((status = 204, description = "Deleted")),
    security(("bearer_auth" = [])),
    tag = "bug-reports"
)]
pub async fn delete_bug_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> Result<StatusCode, ServiceError> {
    state.services.bug_reports.delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
