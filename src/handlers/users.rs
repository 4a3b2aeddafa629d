use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::common::{PaginationParams, ADMINS, ALL_STAFF};
use crate::{
    auth::{ActorContext, AuthRouterExt},
    entities::user,
    errors::ServiceError,
    services::{
        availability::TechnicianSummary,
        users::{CreateUserInput, UpdateUserInput, UserFilter},
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn user_routes() -> Router<AppState> {
    let staff = Router::new()
        .route("/users/technicians", get(list_technicians))
        .with_roles(ALL_STAFF);

    let admin = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_roles(ADMINS);

    Router::new().merge(staff).merge(admin)
}

/// Active technicians, for assignment pickers
#[utoipa::path(
    get,
    path = "/api/v1/users/technicians",
    responses((status = 200, description = "Technicians")),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_technicians(State(state): State<AppState>) -> ApiResult<Vec<TechnicianSummary>> {
    let technicians = state.services.users.technicians().await?;
    Ok(Json(ApiResponse::success(
        technicians.iter().map(TechnicianSummary::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserFilter, PaginationParams),
    responses(
        (status = 200, description = "Users page"),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<user::Model>> {
    let page = page.normalized();
    let (items, total) = state
        .services
        .users
        .list(filter, page.page, page.limit)
        .await?;
    Ok(Json(ApiResponse::success(page.wrap(items, total))))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(input): Json<CreateUserInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.create(input, &actor).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<user::Model> {
    let user = state.services.users.get(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserInput,
    responses((status = 200, description = "User updated")),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
    Json(input): Json<UpdateUserInput>,
) -> ApiResult<user::Model> {
    let user = state.services.users.update(id, input, &actor).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Administrators cannot delete themselves", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: ActorContext,
) -> Result<StatusCode, ServiceError> {
    state.services.users.delete(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
