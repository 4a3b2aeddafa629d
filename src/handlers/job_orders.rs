use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{PaginationParams, ALL_STAFF, CONTROLLERS, PLANNERS};
use crate::{
    auth::{ActorContext, AuthRouterExt},
    entities::{
        job_order::{self, JobPart, JobTask},
        JobOrderStatus, UserRole,
    },
    errors::ServiceError,
    scheduling::{ClockTime, TimeRange},
    services::{
        availability::{break_override, parse_schedule_date, TechnicianSummary, TechnicianWalkIns},
        carry_over::CarryOverReport,
        job_orders::{
            CreateJobOrderInput, JobOrderFilter, PartsUpdateOutcome, ReplotInput,
            UpdateJobOrderInput,
        },
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    pub status: JobOrderStatus,
    /// Administrators only: skip the transition table.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PartsRequest {
    pub parts: Vec<JobPart>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TasksRequest {
    pub job_list: Vec<JobTask>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailableTechniciansQuery {
    #[param(example = "2024-05-02")]
    pub date: String,
    #[param(example = "09:00")]
    pub start: String,
    #[param(example = "11:00")]
    pub end: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotsQuery {
    pub date: String,
    /// Minutes of work to fit.
    pub duration: u32,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlotsResponse {
    pub technician_id: Uuid,
    pub date: NaiveDate,
    pub duration: u32,
    #[schema(value_type = Vec<String>)]
    pub slots: Vec<ClockTime>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    /// Defaults to today.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EndTimeQuery {
    pub start: String,
    pub duration: u32,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndTimeResponse {
    #[schema(value_type = String)]
    pub start: ClockTime,
    #[schema(value_type = String)]
    pub end: ClockTime,
    pub duration: u32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CarryOverRequest {
    /// The day being closed; defaults to today.
    pub date: Option<NaiveDate>,
}

fn schedule_date(raw: Option<&str>) -> Result<NaiveDate, ServiceError> {
    match raw {
        Some(raw) => parse_schedule_date(raw),
        None => Ok(Local::now().date_naive()),
    }
}

pub fn job_order_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/job-orders", get(list_job_orders))
        .route("/job-orders/:id", get(get_job_order))
        .route(
            "/job-orders/technicians/available",
            get(available_technicians),
        )
        .route("/job-orders/technicians/:id/slots", get(technician_slots))
        .route("/job-orders/walk-in-slots", get(walk_in_slots))
        .route("/job-orders/end-time", get(end_time))
        .route("/job-orders/:id/parts", patch(update_parts))
        .route("/job-orders/:id/tasks", patch(update_tasks))
        .route("/job-orders/:id/submit-qi", post(submit_qi))
        .with_roles(ALL_STAFF);

    let plan = Router::new()
        .route("/job-orders", post(create_job_order))
        .route("/job-orders/:id", axum::routing::put(update_job_order))
        .route("/job-orders/:id/complete", post(complete))
        .route("/job-orders/:id/toggle-important", post(toggle_important))
        .with_roles(PLANNERS);

    let control = Router::new()
        .route("/job-orders/:id/status", patch(change_status))
        .route("/job-orders/:id/replot", post(replot))
        .route("/job-orders/:id/approve-qi", post(approve_qi))
        .route("/job-orders/:id/reject-qi", post(reject_qi))
        .route("/job-orders/:id/redo", post(redo))
        .route(
            "/job-orders/check-carry-over",
            get(preview_carry_over).post(run_carry_over),
        )
        .with_roles(CONTROLLERS);

    let admin = Router::new()
        .route("/job-orders/:id", axum::routing::delete(delete_job_order))
        .with_roles(&[UserRole::Administrator]);

    Router::new()
        .merge(read)
        .merge(plan)
        .merge(control)
        .merge(admin)
}

/// List job orders
#[utoipa::path(
    get,
    path = "/api/v1/job-orders",
    params(JobOrderFilter, PaginationParams),
    responses(
        (status = 200, description = "Job orders page"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn list_job_orders(
    State(state): State<AppState>,
    Query(filter): Query<JobOrderFilter>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<job_order::Model>> {
    let page = page.normalized();
    let (items, total) = state
        .services
        .job_orders
        .list(filter, page.page, page.limit)
        .await?;
    Ok(Json(ApiResponse::success(page.wrap(items, total))))
}

/// Create a job order
#[utoipa::path(
    post,
    path = "/api/v1/job-orders",
    request_body = CreateJobOrderInput,
    responses(
        (status = 201, description = "Job order created", body = job_order::Model),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Job number taken or technician double-booked", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn create_job_order(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(input): Json<CreateJobOrderInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let job = state.services.job_orders.create(input, &actor).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(job))))
}

/// Get a job order
#[utoipa::path(
    get,
    path = "/api/v1/job-orders/{id}",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses(
        (status = 200, description = "Job order", body = job_order::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn get_job_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.get(id).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Update a job order
#[utoipa::path(
    put,
    path = "/api/v1/job-orders/{id}",
    params(("id" = Uuid, Path, description = "Job order id")),
    request_body = UpdateJobOrderInput,
    responses(
        (status = 200, description = "Updated job order", body = job_order::Model),
        (status = 409, description = "Technician double-booked", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn update_job_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(input): Json<UpdateJobOrderInput>,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.update(id, input, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Delete a job order
#[utoipa::path(
    delete,
    path = "/api/v1/job-orders/{id}",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn delete_job_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> Result<StatusCode, ServiceError> {
    state.services.job_orders.delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change status through the transition table
#[utoipa::path(
    patch,
    path = "/api/v1/job-orders/{id}/status",
    params(("id" = Uuid, Path, description = "Job order id")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = job_order::Model),
        (status = 400, description = "Transition not allowed or QI precondition failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(body): Json<StatusChangeRequest>,
) -> ApiResult<job_order::Model> {
    let job = state
        .services
        .job_orders
        .change_status(id, body.status, body.force, &actor)
        .await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Replace the parts list
#[utoipa::path(
    patch,
    path = "/api/v1/job-orders/{id}/parts",
    params(("id" = Uuid, Path, description = "Job order id")),
    request_body = PartsRequest,
    responses((status = 200, description = "Parts updated; freed_slot is set when the job left the board", body = PartsUpdateOutcome)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn update_parts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(body): Json<PartsRequest>,
) -> ApiResult<PartsUpdateOutcome> {
    let outcome = state
        .services
        .job_orders
        .update_parts(id, body.parts, &actor)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Replace the job list
#[utoipa::path(
    patch,
    path = "/api/v1/job-orders/{id}/tasks",
    params(("id" = Uuid, Path, description = "Job order id")),
    request_body = TasksRequest,
    responses((status = 200, description = "Tasks updated", body = job_order::Model)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn update_tasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(body): Json<TasksRequest>,
) -> ApiResult<job_order::Model> {
    let job = state
        .services
        .job_orders
        .update_tasks(id, body.job_list, &actor)
        .await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Assign technician and time
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/replot",
    params(("id" = Uuid, Path, description = "Job order id")),
    request_body = ReplotInput,
    responses(
        (status = 200, description = "Job back on the board as OG", body = job_order::Model),
        (status = 409, description = "Technician double-booked", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn replot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(input): Json<ReplotInput>,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.replot(id, input, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Submit for quality inspection
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/submit-qi",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses(
        (status = 200, description = "Job in QI", body = job_order::Model),
        (status = 400, description = "Unfinished tasks or missing parts", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn submit_qi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.submit_qi(id, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Pass quality inspection
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/approve-qi",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses((status = 200, description = "Job for release", body = job_order::Model)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn approve_qi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.approve_qi(id, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Fail quality inspection
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/reject-qi",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses((status = 200, description = "Job back in rework", body = job_order::Model)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn reject_qi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.reject_qi(id, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Release to the customer
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/complete",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses((status = 200, description = "Job complete", body = job_order::Model)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.complete(id, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Reopen a released or completed job
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/redo",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses((status = 200, description = "Job back to OG", body = job_order::Model)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn redo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.redo(id, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

#[utoipa::path(
    post,
    path = "/api/v1/job-orders/{id}/toggle-important",
    params(("id" = Uuid, Path, description = "Job order id")),
    responses((status = 200, description = "Flag flipped", body = job_order::Model)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn toggle_important(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<job_order::Model> {
    let job = state.services.job_orders.toggle_important(id, &actor).await?;
    Ok(Json(ApiResponse::success(job)))
}

/// Technicians free for a whole time range
#[utoipa::path(
    get,
    path = "/api/v1/job-orders/technicians/available",
    params(AvailableTechniciansQuery),
    responses(
        (status = 200, description = "Free technicians"),
        (status = 400, description = "Bad date or time", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "scheduling"
)]
pub async fn available_technicians(
    State(state): State<AppState>,
    Query(query): Query<AvailableTechniciansQuery>,
) -> ApiResult<Vec<TechnicianSummary>> {
    let date = parse_schedule_date(&query.date)?;
    let range = TimeRange::parse(&query.start, &query.end)?;
    let free = state
        .services
        .availability
        .available_technicians(date, range)
        .await?;
    Ok(Json(ApiResponse::success(free)))
}

/// Start times where a job of the given length fits
#[utoipa::path(
    get,
    path = "/api/v1/job-orders/technicians/{id}/slots",
    params(("id" = Uuid, Path, description = "Technician id"), SlotsQuery),
    responses(
        (status = 200, description = "Candidate start times", body = SlotsResponse),
        (status = 400, description = "Unknown technician or bad date", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "scheduling"
)]
pub async fn technician_slots(
    State(state): State<AppState>,
    Path(technician_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> ApiResult<SlotsResponse> {
    let date = parse_schedule_date(&query.date)?;
    let brk = break_override(query.break_start.as_deref(), query.break_end.as_deref())?;
    let slots = state
        .services
        .availability
        .technician_slots(technician_id, date, query.duration, brk)
        .await?;
    Ok(Json(ApiResponse::success(SlotsResponse {
        technician_id,
        date,
        duration: query.duration,
        slots,
    })))
}

/// Walk-in openings per technician
#[utoipa::path(
    get,
    path = "/api/v1/job-orders/walk-in-slots",
    params(DateQuery),
    responses((status = 200, description = "Walk-in slots by technician")),
    security(("bearer_auth" = [])),
    tag = "scheduling"
)]
pub async fn walk_in_slots(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Vec<TechnicianWalkIns>> {
    let date = schedule_date(query.date.as_deref())?;
    let slots = state.services.availability.walk_in_slots(date).await?;
    Ok(Json(ApiResponse::success(slots)))
}

/// End time of work that pauses through the break
#[utoipa::path(
    get,
    path = "/api/v1/job-orders/end-time",
    params(EndTimeQuery),
    responses((status = 200, description = "Computed end time", body = EndTimeResponse)),
    security(("bearer_auth" = [])),
    tag = "scheduling"
)]
pub async fn end_time(
    State(state): State<AppState>,
    Query(query): Query<EndTimeQuery>,
) -> ApiResult<EndTimeResponse> {
    let start: ClockTime = query.start.parse()?;
    let brk = break_override(query.break_start.as_deref(), query.break_end.as_deref())?;
    let end = state
        .services
        .availability
        .end_time(start, query.duration, brk)?;
    Ok(Json(ApiResponse::success(EndTimeResponse {
        start,
        end,
        duration: query.duration,
    })))
}

/// Jobs that the next end-of-day run would roll
#[utoipa::path(
    get,
    path = "/api/v1/job-orders/check-carry-over",
    params(DateQuery),
    responses((status = 200, description = "Dry-run report", body = CarryOverReport)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn preview_carry_over(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<CarryOverReport> {
    let date = schedule_date(query.date.as_deref())?;
    let report = state.services.carry_over.preview(date).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Run end of day
#[utoipa::path(
    post,
    path = "/api/v1/job-orders/check-carry-over",
    request_body = CarryOverRequest,
    responses((status = 200, description = "Carry-over report", body = CarryOverReport)),
    security(("bearer_auth" = [])),
    tag = "job-orders"
)]
pub async fn run_carry_over(
    State(state): State<AppState>,
    actor: ActorContext,
    body: Option<Json<CarryOverRequest>>,
) -> ApiResult<CarryOverReport> {
    let date = body
        .and_then(|Json(b)| b.date)
        .unwrap_or_else(|| Local::now().date_naive());
    let report = state.services.carry_over.run(date, &actor).await?;
    Ok(Json(ApiResponse::success(report)))
}
