use crate::{entities::UserRole, PaginatedResponse};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Every staff role.
pub const ALL_STAFF: &[UserRole] = &[
    UserRole::Administrator,
    UserRole::JobController,
    UserRole::Technician,
    UserRole::ServiceAdvisor,
];

/// Roles that book work and talk to customers.
pub const PLANNERS: &[UserRole] = &[
    UserRole::Administrator,
    UserRole::JobController,
    UserRole::ServiceAdvisor,
];

/// Roles that run the shop floor.
pub const CONTROLLERS: &[UserRole] = &[UserRole::Administrator, UserRole::JobController];

pub const ADMINS: &[UserRole] = &[UserRole::Administrator];

const MAX_LIMIT: u64 = 100;
const MAX_PAGE: u64 = 1_000_000;

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Page numbers start at 1; limits are capped.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.clamp(1, MAX_PAGE),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }

    pub fn wrap<T>(self, items: Vec<T>, total: u64) -> PaginatedResponse<T> {
        PaginatedResponse {
            items,
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total.div_ceil(self.limit.max(1)),
        }
    }
}
