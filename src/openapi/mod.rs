use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workshop API",
        version = "1.0.0",
        description = r#"
# Workshop Job Order API

Back office for an automotive workshop: job orders and their status workflow,
technician scheduling, appointments, end-of-day carry-over and an append-only
audit trail.

## Authentication

Every endpoint except the status, health and maintenance banner requires a JWT:

```
Authorization: Bearer <your-jwt-token>
```

## Availability

When the instance is in maintenance mode, or its API key is missing or
rejected, requests answer `503 Service Unavailable`.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "job-orders", description = "Job order lifecycle"),
        (name = "scheduling", description = "Technician availability and slot search"),
        (name = "appointments", description = "Customer bookings"),
        (name = "users", description = "Staff accounts"),
        (name = "bug-reports", description = "In-app bug reports"),
        (name = "audit-logs", description = "Append-only change history"),
        (name = "system-logs", description = "Operational log"),
        (name = "maintenance", description = "Maintenance mode and instance key")
    ),
    paths(
        // Job orders
        crate::handlers::job_orders::list_job_orders,
        crate::handlers::job_orders::create_job_order,
        crate::handlers::job_orders::get_job_order,
        crate::handlers::job_orders::update_job_order,
        crate::handlers::job_orders::delete_job_order,
        crate::handlers::job_orders::change_status,
        crate::handlers::job_orders::update_parts,
        crate::handlers::job_orders::update_tasks,
        crate::handlers::job_orders::replot,
        crate::handlers::job_orders::submit_qi,
        crate::handlers::job_orders::approve_qi,
        crate::handlers::job_orders::reject_qi,
        crate::handlers::job_orders::complete,
        crate::handlers::job_orders::redo,
        crate::handlers::job_orders::toggle_important,
        crate::handlers::job_orders::preview_carry_over,
        crate::handlers::job_orders::run_carry_over,

        // Scheduling
        crate::handlers::job_orders::available_technicians,
        crate::handlers::job_orders::technician_slots,
        crate::handlers::job_orders::walk_in_slots,
        crate::handlers::job_orders::end_time,

        // Appointments
        crate::handlers::appointments::list_appointments,
        crate::handlers::appointments::create_appointment,
        crate::handlers::appointments::get_appointment,
        crate::handlers::appointments::update_appointment,
        crate::handlers::appointments::delete_appointment,
        crate::handlers::appointments::mark_no_show,
        crate::handlers::appointments::convert,
        crate::handlers::appointments::purge_no_shows,

        // Users
        crate::handlers::users::list_technicians,
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,

        // Bug reports
        crate::handlers::bug_reports::create_bug_report,
        crate::handlers::bug_reports::list_bug_reports,
        crate::handlers::bug_reports::get_bug_report,
        crate::handlers::bug_reports::update_bug_report,
        crate::handlers::bug_reports::delete_bug_report,

        // Logs
        crate::handlers::audit_logs::list_audit_logs,
        crate::handlers::audit_logs::get_audit_log,
        crate::handlers::audit_logs::update_audit_log,
        crate::handlers::audit_logs::delete_audit_log,
        crate::handlers::system_logs::list_system_logs,

        // Maintenance
        crate::handlers::maintenance::maintenance_status,
        crate::handlers::maintenance::get_settings,
        crate::handlers::maintenance::update_settings,
    ),
    components(
        schemas(
            crate::entities::job_order::Model,
            crate::entities::job_order::JobTask,
            crate::entities::job_order::JobPart,
            crate::entities::job_order::CarryOverEntry,
            crate::entities::JobOrderStatus,
            crate::entities::SourceType,
            crate::entities::QiStatus,
            crate::entities::TaskStatus,
            crate::entities::PartAvailability,

            crate::services::job_orders::CreateJobOrderInput,
            crate::services::job_orders::UpdateJobOrderInput,
            crate::services::job_orders::ReplotInput,
            crate::services::job_orders::FreedSlot,
            crate::services::job_orders::PartsUpdateOutcome,
            crate::services::carry_over::CarryOverReport,
            crate::services::appointments::CreateAppointmentInput,
            crate::services::appointments::UpdateAppointmentInput,
            crate::services::appointments::ConvertAppointmentInput,
            crate::services::users::CreateUserInput,
            crate::services::users::UpdateUserInput,
            crate::services::bug_reports::CreateBugReportInput,
            crate::services::bug_reports::UpdateBugReportInput,
            crate::services::maintenance::MaintenanceStatus,
            crate::services::maintenance::MaintenanceSettingsView,
            crate::services::maintenance::UpdateMaintenanceSettingsInput,

            crate::handlers::job_orders::StatusChangeRequest,
            crate::handlers::job_orders::PartsRequest,
            crate::handlers::job_orders::TasksRequest,
            crate::handlers::job_orders::SlotsResponse,
            crate::handlers::job_orders::EndTimeResponse,
            crate::handlers::job_orders::CarryOverRequest,
            crate::handlers::appointments::PurgeResult,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_workshop_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Workshop API"));
        assert!(json.contains("/api/v1/job-orders/{id}/submit-qi"));
        assert!(json.contains("/api/v1/maintenance/status"));
        assert!(json.contains("bearer_auth"));
    }
}
