use crate::services::maintenance::MaintenanceService;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Paths that must answer even when the gate is closed: liveness, the public
/// maintenance banner, token issuance and the settings an administrator needs
/// to reopen the gate.
const EXEMPT_EXACT: &[&str] = &[
    "/",
    "/health",
    "/api/v1/health",
    "/api/v1/status",
    "/api/v1/maintenance/status",
    "/api/v1/maintenance/settings",
];

const EXEMPT_PREFIXES: &[&str] = &["/auth", "/api/v1/auth", "/swagger-ui", "/api-docs"];

pub fn is_exempt(path: &str) -> bool {
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    EXEMPT_EXACT.contains(&path)
        || EXEMPT_PREFIXES
            .iter()
            .any(|p| path == *p || path.starts_with(&format!("{}/", p)))
}

/// Admission gate run ahead of every route.
pub async fn maintenance_gate(
    State(maintenance): State<Arc<MaintenanceService>>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    match maintenance.admit().await {
        Ok(()) => next.run(request).await,
        Err(err) => {
            debug!(path = %request.uri().path(), "request refused by maintenance gate");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", true)]
    #[case("/health", true)]
    #[case("/api/v1/health", true)]
    #[case("/api/v1/maintenance/status", true)]
    #[case("/api/v1/maintenance/settings/", true)]
    #[case("/auth/login", true)]
    #[case("/swagger-ui/index.html", true)]
    #[case("/api/v1/job-orders", false)]
    #[case("/api/v1/maintenance", false)]
    #[case("/authority", false)]
    fn exempt_paths(#[case] path: &str, #[case] exempt: bool) {
        assert_eq!(is_exempt(path), exempt);
    }
}
