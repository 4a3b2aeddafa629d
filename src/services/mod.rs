// Job-order workflow
pub mod carry_over;
pub mod job_orders;
pub mod job_status;

// Scheduling
pub mod appointments;
pub mod availability;

// Staff and support
pub mod bug_reports;
pub mod users;

// Change tracking and operational logs
pub mod audit;
pub mod system_logs;

// Maintenance gate
pub mod api_key_validator;
pub mod maintenance;
