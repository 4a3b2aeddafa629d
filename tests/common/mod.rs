#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use workshop_api::{
    auth::{ActorContext, AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{user, UserRole},
    errors::ServiceError,
    handlers::AppServices,
    services::{
        api_key_validator::ApiKeyValidator, maintenance::UpdateMaintenanceSettingsInput,
        users::CreateUserInput,
    },
    AppState,
};

pub const INSTANCE_KEY: &str = "wk-test-instance-0001";
const JWT_SECRET: &str =
    "integration-test-signing-secret-with-enough-length-to-pass-validation-0123456789";

/// Validator double that answers from a fixed script and counts calls.
pub struct StubValidator {
    verdict: Result<bool, String>,
    calls: AtomicUsize,
}

impl StubValidator {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            verdict: Ok(true),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            verdict: Ok(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            verdict: Err("connection refused".into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiKeyValidator for StubValidator {
    async fn validate(&self, _api_key: &str) -> Result<bool, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
            .clone()
            .map_err(ServiceError::UpstreamUnavailable)
    }
}

pub struct Staff {
    pub user: user::Model,
    pub token: String,
}

/// Full application over a throwaway SQLite file with one account per role.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin: Staff,
    pub controller: Staff,
    pub advisor: Staff,
    pub technician: Staff,
    auth_service: Arc<AuthService>,
    _dir: TempDir,
}

impl TestApp {
    /// Application with an instance key that the validator accepts.
    pub async fn new() -> Self {
        Self::build(StubValidator::accepting(), Some(INSTANCE_KEY)).await
    }

    pub async fn with_validator(
        validator: Arc<dyn ApiKeyValidator>,
        instance_key: Option<&str>,
    ) -> Self {
        Self::build(validator, instance_key).await
    }

    pub fn config(database_url: String) -> AppConfig {
        let mut cfg = AppConfig::new(database_url, JWT_SECRET.to_string(), "test".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.api_key_cache_ttl_secs = 0;
        cfg
    }

    async fn build(validator: Arc<dyn ApiKeyValidator>, instance_key: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("workshop_test.db");
        let cfg = Self::config(format!("sqlite://{}?mode=rwc", path.display()));

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let services = AppServices::with_validator(db_arc.clone(), &cfg, validator)
            .expect("services for tests");
        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(3600),
        )));

        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
        };

        let bootstrap = ActorContext::system("test-bootstrap");
        if let Some(key) = instance_key {
            state
                .services
                .maintenance
                .update_settings(
                    UpdateMaintenanceSettingsInput {
                        api_key: Some(key.to_string()),
                        ..Default::default()
                    },
                    &bootstrap,
                )
                .await
                .expect("seed instance key");
        }

        let mut staff = Vec::new();
        for (role, name) in [
            (UserRole::Administrator, "Ada Admin"),
            (UserRole::JobController, "Jo Controller"),
            (UserRole::ServiceAdvisor, "Sam Advisor"),
            (UserRole::Technician, "Tia Technician"),
        ] {
            let user = state
                .services
                .users
                .create(
                    CreateUserInput {
                        name: name.to_string(),
                        email: format!("{}@workshop.test", role),
                        password: "correct-horse-battery".to_string(),
                        role,
                        level: None,
                        break_start: None,
                        break_end: None,
                    },
                    &bootstrap,
                )
                .await
                .expect("seed staff");
            let token = auth_service.generate_token(&user).expect("token");
            staff.push(Staff { user, token });
        }
        let technician = staff.pop().expect("technician");
        let advisor = staff.pop().expect("advisor");
        let controller = staff.pop().expect("controller");
        let admin = staff.pop().expect("admin");

        let router = workshop_api::app_router(state.clone(), auth_service.clone());

        Self {
            router,
            state,
            admin,
            controller,
            advisor,
            technician,
            auth_service,
            _dir: dir,
        }
    }

    /// Seeds another technician, optionally with a personal break.
    pub async fn add_technician(&self, name: &str, brk: Option<(&str, &str)>) -> Staff {
        let user = self
            .state
            .services
            .users
            .create(
                CreateUserInput {
                    name: name.to_string(),
                    email: format!("{}@workshop.test", Uuid::new_v4().simple()),
                    password: "correct-horse-battery".to_string(),
                    role: UserRole::Technician,
                    level: None,
                    break_start: brk.map(|b| b.0.to_string()),
                    break_end: brk.map(|b| b.1.to_string()),
                },
                &ActorContext::system("test-bootstrap"),
            )
            .await
            .expect("seed technician");
        let token = self.auth_service.generate_token(&user).expect("token");
        Staff { user, token }
    }

    pub fn actor(&self, staff: &Staff) -> ActorContext {
        ActorContext {
            user_id: Some(staff.user.id),
            email: Some(staff.user.email.clone()),
            name: Some(staff.user.name.clone()),
            role: Some(staff.user.role),
            ..Default::default()
        }
    }

    /// Sends a request and returns the status with the decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, staff: &Staff) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, Some(&staff.token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, staff: &Staff) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body), Some(&staff.token))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value, staff: &Staff) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body), Some(&staff.token))
            .await
    }

    pub async fn patch(&self, uri: &str, body: Value, staff: &Staff) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(body), Some(&staff.token))
            .await
    }

    pub async fn delete(&self, uri: &str, staff: &Staff) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None, Some(&staff.token))
            .await
    }

    /// Creates a job order through the API as the service advisor.
    pub async fn create_job(&self, body: Value) -> Value {
        let (status, value) = self.post("/api/v1/job-orders", body, &self.advisor).await;
        assert_eq!(status, StatusCode::CREATED, "create job failed: {value}");
        value["data"].clone()
    }
}

/// A job body with sensible defaults; `overrides` are merged on top.
pub fn job_body(job_number: &str, date: &str, overrides: Value) -> Value {
    let mut body = json!({
        "job_number": job_number,
        "plate_number": "abc-123",
        "time_start": "09:00",
        "time_end": "10:00",
        "date": date,
        "job_list": [{"description": "Oil change", "status": "Unfinished"}],
        "parts": [{"name": "Oil filter", "availability": "Available"}],
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    body
}
