use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{PaginationParams, CONTROLLERS, PLANNERS};
use crate::{
    auth::{ActorContext, AuthRouterExt},
    entities::{appointment, job_order},
    errors::ServiceError,
    services::appointments::{
        AppointmentFilter, ConvertAppointmentInput, CreateAppointmentInput,
        UpdateAppointmentInput,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurgeQuery {
    /// No-shows dated before this day are removed.
    pub before: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResult {
    pub deleted: u64,
}

pub fn appointment_routes() -> Router<AppState> {
    let book = Router::new()
        .route(
            "/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route(
            "/appointments/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/appointments/:id/no-show", post(mark_no_show))
        .route("/appointments/:id/create-job-order", post(convert))
        .with_roles(PLANNERS);

    let purge = Router::new()
        .route(
            "/appointments/no-show",
            axum::routing::delete(purge_no_shows),
        )
        .with_roles(CONTROLLERS);

    Router::new().merge(book).merge(purge)
}

/// List appointments
#[utoipa::path(
    get,
    path = "/api/v1/appointments",
    params(AppointmentFilter, PaginationParams),
    responses((status = 200, description = "Appointments page")),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(filter): Query<AppointmentFilter>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<appointment::Model>> {
    let page = page.normalized();
    let (items, total) = state
        .services
        .appointments
        .list(filter, page.page, page.limit)
        .await?;
    Ok(Json(ApiResponse::success(page.wrap(items, total))))
}

/// Book an appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    request_body = CreateAppointmentInput,
    responses(
        (status = 201, description = "Appointment booked"),
        (status = 409, description = "Technician double-booked", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn create_appointment(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(input): Json<CreateAppointmentInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let appt = state.services.appointments.create(input, &actor).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(appt))))
}

#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}",
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<appointment::Model> {
    let appt = state.services.appointments.get(id).await?;
    Ok(Json(ApiResponse::success(appt)))
}

#[utoipa::path(
    put,
    path = "/api/v1/appointments/{id}",
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body = UpdateAppointmentInput,
    responses(
        (status = 200, description = "Updated appointment"),
        (status = 409, description = "Technician double-booked", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(input): Json<UpdateAppointmentInput>,
) -> ApiResult<appointment::Model> {
    let appt = state.services.appointments.update(id, input, &actor).await?;
    Ok(Json(ApiResponse::success(appt)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/appointments/{id}",
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses((status = 204, description = "Deleted")),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> Result<StatusCode, ServiceError> {
    state.services.appointments.delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark the customer as not having turned up
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/no-show",
    params(("id" = Uuid, Path, description = "Appointment id")),
    responses((status = 200, description = "Marked")),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn mark_no_show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> ApiResult<appointment::Model> {
    let appt = state.services.appointments.mark_no_show(id, &actor).await?;
    Ok(Json(ApiResponse::success(appt)))
}

/// Turn an appointment into a job order
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/create-job-order",
    params(("id" = Uuid, Path, description = "Appointment id")),
    request_body = ConvertAppointmentInput,
    responses(
        (status = 201, description = "Job order created; the appointment is gone", body = job_order::Model),
        (status = 400, description = "Appointment was a no-show", body = crate::errors::ErrorResponse),
        (status = 409, description = "Job number taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn convert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(input): Json<ConvertAppointmentInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let job = state
        .services
        .appointments
        .convert_to_job_order(id, input, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(job))))
}

/// Remove stale no-shows
#[utoipa::path(
    delete,
    path = "/api/v1/appointments/no-show",
    params(PurgeQuery),
    responses((status = 200, description = "Number removed", body = PurgeResult)),
    security(("bearer_auth" = [])),
    tag = "appointments"
)]
pub async fn purge_no_shows(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<PurgeQuery>,
) -> ApiResult<PurgeResult> {
    let deleted = state
        .services
        .appointments
        .purge_no_shows(query.before, &actor)
        .await?;
    Ok(Json(ApiResponse::success(PurgeResult { deleted })))
}
