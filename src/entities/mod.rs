pub mod appointment;
pub mod audit_log;
pub mod bug_report;
pub mod job_order;
pub mod maintenance_settings;
pub mod system_log;
pub mod user;

pub use job_order::{JobOrderStatus, PartAvailability, QiStatus, SourceType, TaskStatus};
pub use user::{TechnicianLevel, UserRole};
