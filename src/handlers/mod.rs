pub mod appointments;
pub mod audit_logs;
pub mod bug_reports;
pub mod common;
pub mod job_orders;
pub mod maintenance;
pub mod system_logs;
pub mod users;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    services::{
        api_key_validator::{ApiKeyValidator, HttpApiKeyValidator, ValidationCache},
        appointments::AppointmentService,
        audit::AuditLogService,
        availability::{AvailabilityService, SchedulingSettings},
        bug_reports::BugReportService,
        carry_over::CarryOverService,
        job_orders::JobOrderService,
        maintenance::MaintenanceService,
        system_logs::SystemLogService,
        users::UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub job_orders: Arc<JobOrderService>,
    pub availability: Arc<AvailabilityService>,
    pub carry_over: Arc<CarryOverService>,
    pub appointments: Arc<AppointmentService>,
    pub users: Arc<UserService>,
    pub bug_reports: Arc<BugReportService>,
    pub audit: Arc<AuditLogService>,
    pub system_logs: Arc<SystemLogService>,
    pub maintenance: Arc<MaintenanceService>,
}

impl AppServices {
    /// Wires every service against one pool, validating API keys over HTTP.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Result<Self, ServiceError> {
        let validator = HttpApiKeyValidator::new(
            config.api_key_validator_url.clone(),
            config.api_key_validation_timeout(),
        )?;
        Self::with_validator(db_pool, config, Arc::new(validator))
    }

    pub fn with_validator(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        validator: Arc<dyn ApiKeyValidator>,
    ) -> Result<Self, ServiceError> {
        let system_logs = Arc::new(SystemLogService::new(db_pool.clone()));
        let audit = Arc::new(AuditLogService::new(db_pool.clone(), system_logs.clone()));
        let availability = Arc::new(AvailabilityService::new(
            db_pool.clone(),
            SchedulingSettings::from_config(config)?,
        ));
        let job_orders = Arc::new(JobOrderService::new(
            db_pool.clone(),
            availability.clone(),
            audit.clone(),
        ));
        let carry_over = Arc::new(CarryOverService::new(
            db_pool.clone(),
            audit.clone(),
            system_logs.clone(),
        ));
        let appointments = Arc::new(AppointmentService::new(
            db_pool.clone(),
            availability.clone(),
            job_orders.clone(),
            audit.clone(),
        ));
        let users = Arc::new(UserService::new(db_pool.clone(), audit.clone()));
        let bug_reports = Arc::new(BugReportService::new(db_pool.clone(), audit.clone()));
        let cache = Arc::new(ValidationCache::new(
            config.api_key_cache_ttl(),
            config.api_key_grace_period(),
        ));
        let maintenance = Arc::new(MaintenanceService::new(
            db_pool,
            validator,
            cache,
            system_logs.clone(),
            audit.clone(),
        ));

        Ok(Self {
            job_orders,
            availability,
            carry_over,
            appointments,
            users,
            bug_reports,
            audit,
            system_logs,
            maintenance,
        })
    }
}
