//! Workshop API Library
//!
//! Job orders, technician scheduling, end-of-day carry-over and the audit
//! trail for an automotive workshop.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod scheduling;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Extension, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

/// Envelope for every successful JSON body. Failures use
/// [`errors::ErrorResponse`] instead.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta {
                request_id: crate::tracing::current_request_id()
                    .map(|rid| rid.as_str().to_string()),
                timestamp: Utc::now().to_rfc3339(),
            }),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Everything under `/api/v1`. Role checks are attached per route group
/// inside each handler module.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(handlers::job_orders::job_order_routes())
        .merge(handlers::appointments::appointment_routes())
        .merge(handlers::users::user_routes())
        .merge(handlers::bug_reports::bug_report_routes())
        .merge(handlers::audit_logs::audit_log_routes())
        .merge(handlers::system_logs::system_log_routes())
        .merge(handlers::maintenance::maintenance_routes())
}

/// The full application: API, docs and the cross-cutting layers. CORS is
/// left to the binary since it depends on deployment.
pub fn app_router(state: AppState, auth_service: Arc<auth::AuthService>) -> Router {
    let gate = state.services.maintenance.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "workshop-api up" }))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // Refuse work while the instance is closed
        .layer(axum::middleware::from_fn_with_state(
            gate,
            middleware_helpers::maintenance_gate,
        ))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "workshop-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(ApiResponse::success(json!({
        "status": database,
        "checks": { "database": database },
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}
