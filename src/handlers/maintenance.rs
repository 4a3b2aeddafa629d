use axum::{extract::State, routing::get, Json, Router};

use super::common::ADMINS;
use crate::{
    auth::{ActorContext, AuthRouterExt},
    services::maintenance::{
        MaintenanceSettingsView, MaintenanceStatus, UpdateMaintenanceSettingsInput,
    },
    ApiResponse, ApiResult, AppState,
};

pub fn maintenance_routes() -> Router<AppState> {
    let public = Router::new().route("/maintenance/status", get(maintenance_status));

    let admin = Router::new()
        .route(
            "/maintenance/settings",
            get(get_settings).put(update_settings),
        )
        .with_roles(ADMINS);

    Router::new().merge(public).merge(admin)
}

/// Banner shown by clients; needs no token
#[utoipa::path(
    get,
    path = "/api/v1/maintenance/status",
    responses((status = 200, description = "Maintenance flag and message", body = MaintenanceStatus)),
    tag = "maintenance"
)]
pub async fn maintenance_status(State(state): State<AppState>) -> ApiResult<MaintenanceStatus> {
    let status = state.services.maintenance.public_status().await?;
    Ok(Json(ApiResponse::success(status)))
}

#[utoipa::path(
    get,
    path = "/api/v1/maintenance/settings",
    responses(
        (status = 200, description = "Settings with the key masked", body = MaintenanceSettingsView),
        (status = 403, description = "Administrators only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "maintenance"
)]
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<MaintenanceSettingsView> {
    let settings = state.services.maintenance.settings().await?;
    Ok(Json(ApiResponse::success(MaintenanceSettingsView::from(
        &settings,
    ))))
}

/// Toggle maintenance or rotate the instance key
#[utoipa::path(
    put,
    path = "/api/v1/maintenance/settings",
    request_body = UpdateMaintenanceSettingsInput,
    responses(
        (status = 200, description = "Updated settings", body = MaintenanceSettingsView),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "maintenance"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(input): Json<UpdateMaintenanceSettingsInput>,
) -> ApiResult<MaintenanceSettingsView> {
    let view = state
        .services
        .maintenance
        .update_settings(input, &actor)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}
